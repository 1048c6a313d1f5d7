use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use crate::{
    application::repos::{FetchError, WriteError},
    cache::CacheError,
    config::LoadError,
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    pub fn from_message(source: &'static str, message: impl Into<String>) -> Self {
        Self {
            source,
            messages: vec![message.into()],
        }
    }

    /// Headline first, then each cause indented on its own line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (depth, message) in self.messages.iter().enumerate() {
            if depth == 0 {
                out.push_str(message);
            } else {
                out.push_str("\n  caused by: ");
                out.push_str(message);
            }
        }
        out
    }
}

/// Failure to produce a hydrated collection.
///
/// Cloneable so one failed load can be handed to every caller that joined it.
/// The message names the requested collection only; the underlying fetch
/// failure stays reachable through [`StdError::source`].
#[derive(Debug, Clone, Error)]
pub enum HydrateError {
    #[error("failed to load collection `{collection}`")]
    Fetch {
        collection: String,
        failed: String,
        #[source]
        source: Arc<FetchError>,
    },
    #[error("loading collection `{collection}` was cancelled")]
    Cancelled { collection: String },
    #[error("hydration of `{collection}` stopped unexpectedly: {reason}")]
    Aborted { collection: String, reason: String },
    #[error("unknown collection `{collection}`")]
    UnknownCollection { collection: String },
}

impl HydrateError {
    pub fn cancelled(collection: impl Into<String>) -> Self {
        Self::Cancelled {
            collection: collection.into(),
        }
    }

    pub fn unknown(collection: impl Into<String>) -> Self {
        Self::UnknownCollection {
            collection: collection.into(),
        }
    }

    /// Wrap a fetch failure of `failed` while loading `collection`.
    pub fn from_fetch(collection: &str, failed: &str, error: FetchError) -> Self {
        match error {
            FetchError::Cancelled => Self::cancelled(collection),
            other => Self::Fetch {
                collection: collection.to_owned(),
                failed: failed.to_owned(),
                source: Arc::new(other),
            },
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            Self::Fetch { collection, .. }
            | Self::Cancelled { collection }
            | Self::Aborted { collection, .. }
            | Self::UnknownCollection { collection } => collection,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Hydrate(#[from] HydrateError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error("`{collection}` has no record with id `{id}`")]
    NotFound { collection: String, id: String },
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code for the command line front end.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) | AppError::Validation(_) => 2,
            AppError::NotFound { .. } => 3,
            AppError::Hydrate(err) if err.is_cancelled() => 130,
            _ => 1,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self)
    }
}
