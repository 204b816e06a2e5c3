use std::path::PathBuf;
use thiserror::Error;

use crate::mesh::CellId;

#[derive(Error, Debug)]
pub enum WayfarerError {
    // Mesh contract violations, reported once at builder entry
    #[error("Malformed mesh: {reason}")]
    InvalidMesh { reason: String },

    // A predecessor map produced by the search engine must be acyclic; hitting
    // the walk bound means the map is corrupt and the build pass must abort.
    #[error("Predecessor walk from cell {terminus} exceeded {limit} steps; predecessor map is cyclic")]
    PredecessorCycle { terminus: CellId, limit: usize },

    #[error("Invalid route parameters: {reason}")]
    InvalidParams { reason: String },

    #[error("Invalid route network: {reason}")]
    InvalidNetwork { reason: String },

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize parameters: {0}")]
    SerializationFailed(#[from] toml::ser::Error),

    #[error("Failed to deserialize parameters: {0}")]
    DeserializationFailed(#[from] toml::de::Error),

    #[error("Network file not found at path: {path}")]
    NetworkFileNotFound { path: PathBuf },

    #[error("Corrupted network file: {reason}")]
    CorruptedNetworkFile { reason: String },
}

/// Result type alias for all operations
pub type WayfarerResult<T> = Result<T, WayfarerError>;
