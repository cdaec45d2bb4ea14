use thiserror::Error;

use crate::backend::StoreError;
use crate::watcher::WatchError;

/// Errors returned by the migration master facade.
///
/// Resolution failures (`NoMigration`) and mutation failures (`Persistence`)
/// carry distinct prefixes so callers can tell them apart. Export and reap
/// are single-step delegations and pass store errors through untouched.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("could not get migration: {0}")]
    NoMigration(#[source] StoreError),

    #[error("invalid phase: {0:?}")]
    InvalidPhase(String),

    #[error("failed to {operation}: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("failed to start watcher: {0}")]
    Watch(#[from] WatchError),

    #[error("failed to serialize model: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MigrationError {
    pub(crate) fn persistence(operation: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| MigrationError::Persistence { operation, source }
    }
}
