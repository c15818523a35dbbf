//! Error types for the outreach-store crate.

use std::io;

use outreach_common::LeadStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Snapshot file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    /// A conditional update found the row in a different state than expected.
    #[error("Lead {id} is {actual}, expected {expected}")]
    Conflict {
        id: String,
        expected: LeadStatus,
        actual: LeadStatus,
    },

    #[error("Store capacity exceeded: {current}/{capacity} leads")]
    CapacityExceeded { current: usize, capacity: usize },

    /// Lock poisoning and other invariant breaks inside a backend.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Bincode encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Bincode decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("Unsupported snapshot version {found}, expected {expected}")]
    Version { found: u32, expected: u32 },
}

impl StoreError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}
