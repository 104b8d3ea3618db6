//! Unified error handling for the trawler crate
//!
//! This module provides a single `Error` enum consolidating the
//! domain-specific errors raised by the storage adapters and the pipeline,
//! together with the retriability classification the batch handler relies on:
//! retriable errors are surfaced to the delivery transport (the message stays
//! in flight and is redelivered), everything else is consumed locally.

use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::storage::{ArchiveError, BlobError, QueueError, StoreError};

/// Unified error type for the trawler crate
#[derive(Error, Debug)]
pub enum Error {
    /// State store errors (conditional writes, point reads)
    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    /// Delivery queue errors (send, batch send, receive)
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Blob store errors (content uploads)
    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),

    /// Content archival errors (compression + parallel upload)
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A fetch failed in a way that is worth redelivering: 5xx, 429,
    /// network error, SSRF block, read error or zero status.
    #[error("retriable failure for {url}: status={status} err={reason}")]
    Retriable {
        url: String,
        status: u16,
        reason: String,
    },

    /// Configuration errors (startup only)
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Whether the batch handler should withhold the ACK so the transport
    /// redelivers the message.
    ///
    /// Store and queue failures are transient from the worker's point of
    /// view; a redelivery retries the whole per-message pipeline, which is
    /// idempotent by way of the claim gate.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Retriable { .. } => true,
            Self::Store(_) | Self::Queue(_) => true,
            Self::Http(_) => true,
            Self::Blob(_) | Self::Archive(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
