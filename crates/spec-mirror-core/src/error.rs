//! Error types for spec-mirror-core

use thiserror::Error;

/// Errors raised while resolving the run configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required value is absent (or empty) in both flags and environment
    #[error("missing required configuration: {var}")]
    Missing { var: &'static str },

    /// Neither a diff file nor inline diff text was supplied
    #[error("no diff source: set DIFF_FILE_PATH or PR_DIFF")]
    NoDiffSource,

    /// A value is present but cannot be used
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Errors from the document workspace (Notion) adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport-level failure (connect, TLS, timeout)
    #[error("document API request failed: {0}")]
    Transport(String),

    /// The API answered with a non-success status
    #[error("document API returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not match the expected block shape
    #[error("document API response could not be decoded: {0}")]
    Decode(String),

    /// Block not found (fakes and 404 responses)
    #[error("block not found: {block_id}")]
    BlockNotFound { block_id: String },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// Errors from the audit oracle.
#[derive(Error, Debug)]
pub enum OracleError {
    /// Transport-level failure
    #[error("oracle request failed: {0}")]
    Transport(String),

    /// The model endpoint answered with a non-success status
    #[error("oracle returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The endpoint answered but produced no candidate text
    #[error("oracle returned no content{}", reason_suffix(.reason))]
    EmptyResponse { reason: Option<String> },

    /// The verdict text is not valid JSON for the declared schema
    #[error("oracle verdict is malformed: {0}")]
    MalformedVerdict(String),
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(" ({r})"))
        .unwrap_or_default()
}

/// Run-level errors. Every variant is a terminal state of the workflow.
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The diff could not be read from its source
    #[error("failed to read diff from {source_name}: {source}")]
    DiffRead {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    /// Listing the checklist blocks failed
    #[error("failed to fetch checklist for page {page_id}: {source}")]
    Fetch {
        page_id: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// A block update failed; earlier updates in the same run stay applied
    #[error("failed to update block {block_id} after {updated} successful update(s): {source}")]
    UpdateFailed {
        block_id: String,
        updated: usize,
        #[source]
        source: StoreError,
    },
}

/// Result type for spec-mirror-core operations
pub type Result<T> = std::result::Result<T, MirrorError>;
