//! Operator-facing traffic operations over the resource store
//!
//! Reading the current splits and pushing a new one. Pushed changes are not
//! broadcast from here; observers learn about them through the watch.

mod catalog;
mod split;


pub use catalog::*;
pub use split::*;
