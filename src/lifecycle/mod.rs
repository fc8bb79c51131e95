//! Startup and graceful shutdown of the watch thread
//!
//! The coordinator is the only owner of the shutdown token. `start` hands a
//! fresh token to a new supervisor; `stop` cancels it, closes every observer
//! connection and waits a bounded time for the watch thread to finish.

mod coordinator;


pub use coordinator::*;
