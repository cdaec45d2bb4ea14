// Backing store contract - the narrow capability set the migration master needs
//
// Any persistence engine can sit behind these traits. Implementations are
// expected to be safe for concurrent use and to make phase writes atomic:
// a write made through a migration handle must fail rather than overwrite
// when the stored phase has moved since the handle read it.

pub mod memory;

pub use memory::InMemoryBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::migration::{MinionReports, Phase, TargetInfo};
use crate::model::Model;
use crate::watcher::ChangeFeed;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("phase changed concurrently: expected {expected}, found {actual}")]
    PhaseConflict { expected: Phase, actual: Phase },

    #[error("illegal phase transition {from} -> {to}")]
    IllegalTransition { from: Phase, to: Phase },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Model-level operations.
#[async_trait]
pub trait Backend: Send + Sync {
    /// The most recent migration attempt for the model.
    async fn latest_migration(&self) -> Result<Box<dyn ModelMigration>, StoreError>;

    /// Fires when a migration is created or an existing one changes.
    fn watch_for_migration(&self) -> ChangeFeed;

    /// Removes the documents of a model that has been exported. Idempotent.
    async fn remove_exporting_model_docs(&self) -> Result<(), StoreError>;

    async fn export(&self) -> Result<Model, StoreError>;
}

/// One migration attempt, as read from the store.
///
/// Plain accessors return the values loaded with the handle; the fallible
/// ones may consult the store.
#[async_trait]
pub trait ModelMigration: Send + Sync {
    fn id(&self) -> &str;

    fn model_uuid(&self) -> &str;

    fn phase_changed_time(&self) -> DateTime<Utc>;

    fn status_message(&self) -> &str;

    async fn attempt(&self) -> Result<u32, StoreError>;

    async fn phase(&self) -> Result<Phase, StoreError>;

    async fn target_info(&self) -> Result<TargetInfo, StoreError>;

    async fn set_phase(&self, phase: Phase) -> Result<(), StoreError>;

    async fn set_status_message(&self, message: &str) -> Result<(), StoreError>;

    async fn watch_minion_reports(&self) -> Result<ChangeFeed, StoreError>;

    /// Reports for the phase the migration is currently in.
    async fn minion_reports(&self) -> Result<MinionReports, StoreError>;
}
