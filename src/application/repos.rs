//! Ports to the remote item API.
//!
//! The read side hands out whole collections; the write side creates and
//! updates single items. Implementations live in `infra`.

use async_trait::async_trait;
use omnia_types::{RawItem, ResourceId};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed collection payload: {0}")]
    Decode(String),
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn from_transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

/// Loads one logical collection from the remote item API.
///
/// One call is exactly one request: no caching, no retry, no deduplication.
/// Either every record comes back or the call fails.
#[async_trait]
pub trait CollectionFetcher: Send + Sync {
    async fn fetch(
        &self,
        collection: &str,
        action: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawItem>, FetchError>;
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed write response: {0}")]
    Decode(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl WriteError {
    pub fn from_transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// Write path of the item API.
#[async_trait]
pub trait ItemTransport: Send + Sync {
    async fn create(&self, resource: &str, payload: &Value) -> Result<Value, WriteError>;

    async fn update(
        &self,
        resource: &str,
        id: &ResourceId,
        payload: &Value,
    ) -> Result<Value, WriteError>;
}
