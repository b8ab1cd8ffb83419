//! Errors raised by the store, the lifecycle engine and account operations.
//!
//! Every variant is recoverable; the `Display` text is what the shell shows.

use crate::model::{DonationStatus, Role};

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("cannot {action} donation {id} while it is {status}")]
    InvalidTransition {
        id: String,
        action: &'static str,
        status: DonationStatus,
    },

    #[error("donation {id} already has a delivery agent ({agent})")]
    AlreadyAssigned { id: String, agent: String },

    #[error("{role} accounts cannot {action}")]
    Unauthorized { role: Role, action: &'static str },

    #[error("not logged in")]
    NotLoggedIn,

    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("donation {id} changed since it was read (expected version {expected}, found {found})")]
    Conflict {
        id: String,
        expected: u64,
        found: u64,
    },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl FlowError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

pub type FlowResult<T> = std::result::Result<T, FlowError>;
