//! Handoff between the watch thread and the connection runtime
//!
//! ```text
//!  watch thread                       │  connection runtime
//!                                     │
//!  supervisor ─forward()─▶ EventBridge ─send()─▶ unbounded queue ─▶ broadcast pump
//!                (translate)          │       (never blocks)        (one task, FIFO)
//!                                     │                                  │
//!                                     │                     ConnectionRegistry::broadcast
//! ```
//!
//! The queue is drained by a single task that awaits each broadcast before
//! taking the next message, so every observer sees changes in the order the
//! store delivered them.

mod event_bridge;


pub use event_bridge::*;
