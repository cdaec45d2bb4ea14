// Result types returned by the facade, shaped for an RPC layer to ship as-is

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::migration::MinionReportsSummary;
pub use crate::model::{ExportBundle, SerializedModelTools};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyWatchResult {
    pub notify_watcher_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationTargetInfo {
    pub controller_tag: String,
    pub addrs: Vec<String>,
    pub ca_cert: String,
    pub auth_tag: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMigrationSpec {
    pub model_tag: String,
    pub target_info: MigrationTargetInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterMigrationStatus {
    pub spec: ModelMigrationSpec,
    pub migration_id: String,
    pub attempt: u32,
    pub phase: String,
    pub phase_changed_time: DateTime<Utc>,
    pub status_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMigrationPhaseArgs {
    pub phase: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMigrationStatusMessageArgs {
    pub message: String,
}
