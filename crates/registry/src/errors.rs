//! Error types for the work registry

use cantus_types::WorkId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Work already registered: \"{title}\" by \"{creator}\"")]
    DuplicateWork { title: String, creator: String },

    #[error("Work not found: {id}")]
    NotFound { id: WorkId },

    #[error("Registry storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
