//! Error types surfaced by the engine.
//!
//! The engine has a deliberately small error surface. Malformed external
//! state (query params) never errors — it degrades to defaults. Invalid
//! configuration (duplicate column names) is a programming mistake and
//! panics at construction. The only recoverable failure is the injected
//! fetch, represented here.

use thiserror::Error;

/// A failure reported by an injected data source.
///
/// The engine does not retry or interpret these; it logs driver-initiated
/// failures and returns caller-initiated ones from
/// [`DataFrame::reload`](crate::DataFrame::reload) unchanged, leaving
/// presentation to the integrating view's error-handling layer.
#[derive(Debug, Error)]
#[error("data source fetch failed: {0}")]
pub struct FetchError(#[from] anyhow::Error);

impl FetchError {
    /// Wraps an arbitrary error message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self(anyhow::anyhow!(message.into()))
    }
}
