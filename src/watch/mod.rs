//! Watch-resume loop over the resource store
//!
//! The supervisor runs on its own OS thread with a private single-threaded
//! runtime, so the long-lived watch read never competes with connection I/O.
//! It owns the [`ResumeCursor`] and forwards every normalized change to the
//! [`EventBridge`](crate::EventBridge), which is the only way events leave
//! the thread.
//!
//! # State machine
//!
//! ```text
//!            ┌──────────── store unavailable (wait, poll shutdown) ──┐
//!            ▼                                                       │
//!  INIT ─▶ CONNECTING ──────── subscription open ────────▶ STREAMING ─┤
//!            ▲                                                │      │
//!            │                                       stream ends     │
//!            │                                   (timeout / error)   │
//!            │                                                ▼      │
//!            └──────── reconnect delay elapsed ─────────── BACKOFF   │
//!                                                                    │
//!  any state ── shutdown token cancelled ──▶ STOPPED ◀───────────────┘
//! ```
//!
//! Every wait is cut into `watch.shutdown_poll_ms` ticks and the token is
//! checked between ticks; an open stream is raced against the token and
//! dropped (closing the request) as soon as shutdown is requested.

mod cursor;
mod supervisor;


use std::fmt;

pub use cursor::*;
use serde_json::Value;
pub use supervisor::*;

use crate::ChangeKind;

/// Normalized change, produced per raw event and consumed once by the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub resource_name: String,
    pub resume_token: String,
    pub raw_spec: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Init,
    Connecting,
    Streaming,
    Backoff,
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            SupervisorState::Init => "INIT",
            SupervisorState::Connecting => "CONNECTING",
            SupervisorState::Streaming => "STREAMING",
            SupervisorState::Backoff => "BACKOFF",
            SupervisorState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}
