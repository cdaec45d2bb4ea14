// Migration Master Library - controller-side coordination of model migrations
// This exposes the core components for testing and integration

pub mod backend;
pub mod config;
pub mod error;
pub mod master;
pub mod migration;
pub mod model;
pub mod names;
pub mod telemetry;
pub mod watcher;

// Re-export key types for easy access
pub use backend::{Backend, InMemoryBackend, ModelMigration, StoreError};
pub use config::{config, MigrationMasterConfig};
pub use error::MigrationError;
pub use master::{Authorizer, MigrationMaster, StaticAuthorizer};
pub use migration::{MinionReports, MinionReportsSummary, Phase, TargetInfo};
pub use model::{ExportBundle, Model};
pub use names::Tag;
pub use telemetry::{create_migration_span, generate_correlation_id, init_telemetry};
pub use watcher::{change_feed, ChangeFeed, FeedSender, NotifyWatcher, Resources, WatchError};
