// Migration domain types - phases, target descriptors and minion reports

pub mod phase;
pub mod reports;
pub mod types;

pub use phase::{ParsePhaseError, Phase};
pub use reports::{natural_cmp, MinionReports, MinionReportsSummary, UNKNOWN_SAMPLE_LIMIT};
pub use types::{TargetInfo, TargetInfoError};
