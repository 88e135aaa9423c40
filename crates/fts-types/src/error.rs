//! Error types for fts-bridge.

use thiserror::Error;

/// Errors raised by a search provider call.
///
/// The core propagates these unmodified; it never retries or falls back.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connection refused, timeout, ...)
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Provider answered with a non-success status
    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Provider response could not be decoded
    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    /// Embedded index failure
    #[error("Index error: {0}")]
    Index(String),

    /// Destination is not known to the provider
    #[error("Unknown destination: {0}")]
    UnknownDestination(String),

    /// Column is not declared for the destination
    #[error("Unknown column {column} for destination {destination}")]
    UnknownColumn { destination: String, column: String },

    /// Provider rejected the request for another reason
    #[error("Provider rejected the request: {0}")]
    Rejected(String),
}

/// Unified error type for filter rewriting and document sync.
#[derive(Debug, Error)]
pub enum FtsError {
    /// The record lacks a value for the declared primary key.
    #[error(
        "The selected columns do not include a primary key; either omit the select parameter or specify select to cover the primary key ({primary_key})."
    )]
    MissingPrimaryKey { primary_key: String },

    /// The record does not cover every bound column.
    #[error(
        "Selected columns are missing for bound columns {missing:?}; either omit the select parameter or specify select to cover all bound columns and the primary key ({primary_key})."
    )]
    IncompleteSelection {
        primary_key: String,
        missing: Vec<String>,
    },

    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The filter is not a well-formed where-expression.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Two flattened paths cannot be reassembled into one tree.
    #[error("Conflicting filter paths at {0}")]
    PathConflict(String),

    /// The trailing options literal of a marker is not a JSON object.
    #[error("Invalid search options in marker at {path}: {reason}")]
    InvalidSearchOptions { path: String, reason: String },

    /// A provider returned an identifier that does not fit the primary key type.
    #[error("Identifier {id:?} returned by provider is not numeric")]
    InvalidIdentifier { id: String },

    /// No provider is bound to the column.
    #[error("No provider bound for column {0}")]
    UnboundColumn(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error surfaced by the wrapped record store
    #[error("Record store error: {0}")]
    Store(String),
}

pub type FtsResult<T> = Result<T, FtsError>;
