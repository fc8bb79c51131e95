//! Keeps WebSocket observers in sync with Traefik weighted services.
//!
//! A dedicated thread watches the `TraefikService` resources of one
//! namespace and resumes from the last seen resource version after every
//! disconnect. Each change is translated into a [`BroadcastMessage`] and
//! pushed, in arrival order, to every connected observer. Operators push a
//! new traffic split through the REST API; observers learn about it through
//! the same watch.

mod api;
mod bridge;
mod config;
mod errors;
mod lifecycle;
mod metrics;
mod registry;
mod store;
mod traffic;
mod watch;
pub mod wire;

pub use api::*;
pub use bridge::*;
pub use config::*;
pub use errors::*;
pub use lifecycle::*;
pub use metrics::*;
pub use registry::*;
pub use store::*;
pub use traffic::*;
pub use watch::*;
pub use wire::now_timestamp;
pub use wire::BroadcastMessage;
pub use wire::ServiceView;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
