//! Access to the remote resource store.
//!
//! The watch supervisor and the REST layer both consume the store through the
//! [`ResourceStore`] trait. The process builds one concrete handle at startup
//! ([`KubeStore`]) and hands it to both sides explicitly.

mod kubernetes;
pub use kubernetes::*;

#[cfg(test)]
mod kubernetes_test;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Lazy sequence of raw change events produced by one watch request.
///
/// Ends without an item on idle timeout; yields an `Err` and then ends on
/// transport, auth or protocol failure. Dropping it closes the request.
pub type WatchStream = BoxStream<'static, StoreResult<RawChangeEvent>>;

/// Kind of change reported by a watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ADDED" => Some(ChangeKind::Added),
            "MODIFIED" => Some(ChangeKind::Modified),
            "DELETED" => Some(ChangeKind::Deleted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "ADDED",
            ChangeKind::Modified => "MODIFIED",
            ChangeKind::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change as delivered by the store, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawChangeEvent {
    pub kind: ChangeKind,
    /// `metadata.name` of the changed resource
    pub name: String,
    /// `metadata.resourceVersion`; empty when the store did not send one
    pub resume_token: String,
    /// The resource `spec`, `Value::Null` when absent
    pub spec: Value,
}

#[async_trait]
pub trait ResourceStore: Send + Sync + 'static {
    /// Whether a client handle has been built successfully.
    fn is_ready(&self) -> bool;

    async fn get(
        &self,
        name: &str,
    ) -> StoreResult<Value>;

    async fn list(&self) -> StoreResult<Vec<Value>>;

    async fn replace(
        &self,
        name: &str,
        resource: Value,
    ) -> StoreResult<Value>;

    /// Opens a subscription starting after `resume_token`.
    ///
    /// An empty token subscribes from the current state, which first
    /// replays every existing resource.
    async fn watch(
        &self,
        resume_token: &str,
        timeout_hint: Option<Duration>,
    ) -> StoreResult<WatchStream>;
}
