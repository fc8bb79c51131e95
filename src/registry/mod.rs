//! Registry of connected observers
//!
//! Every observer connection that completed its handshake is held here until
//! it disconnects, fails a send, or the process shuts down. The registry is
//! the only mutable structure shared between the watch side and the
//! connection side; all membership changes go through one lock.
//!
//! ```text
//!   WebSocket upgrade ──register──▶ ┌────────────────────┐
//!                                   │ ConnectionRegistry │──send──▶ observer 1
//!   BroadcastPump ────broadcast───▶ │  (Mutex<BTreeMap>) │──send──▶ observer 2
//!                                   └────────────────────┘──send──▶ observer n
//! ```
//!
//! Sends never happen under the lock: `broadcast` snapshots the members,
//! releases the lock, then delivers to each member independently. A member
//! whose send fails is unregistered without affecting the others.

mod connection_registry;


pub use connection_registry::*;
