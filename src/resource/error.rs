use thiserror::Error;

use super::Resource;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource {0} not found")]
    NotFound(String),

    #[error("cannot create resource with existing id: {0}")]
    AlreadyExists(String),

    #[error("cannot update resource without existing id")]
    MissingIdentifier,

    #[error("fields of resource {id} could not be decoded: {reason}")]
    Decode { id: String, reason: String },

    #[error("{operation} exceeded {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("invalid table name: {0}")]
    InvalidTable(String),

    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

impl ResourceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceError::NotFound(_) => "not_found",
            ResourceError::AlreadyExists(_) => "already_exists",
            ResourceError::MissingIdentifier => "missing_identifier",
            ResourceError::Decode { .. } => "decode_error",
            ResourceError::Timeout { .. } => "timeout",
            ResourceError::InvalidTable(_) => "invalid_table",
            ResourceError::Store(_) => "store_error",
        }
    }
}

/// A listing that failed part way. `items` holds the rows read before the
/// failure, so a caller that sees this error must treat the page as incomplete.
#[derive(Debug, Error)]
#[error("listing incomplete after {} rows: {source}", .items.len())]
pub struct PartialList {
    pub items: Vec<Resource>,
    #[source]
    pub source: ResourceError,
}
