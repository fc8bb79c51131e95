mod recording_channel;
mod scripted_store;

pub use recording_channel::*;
pub use scripted_store::*;
