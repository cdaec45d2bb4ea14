// Migration phases - the closed set of stages a migration attempt moves through

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raised when a phase name is not one of the canonical phase names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid phase: {0:?}")]
pub struct ParsePhaseError(pub String);

/// A stage in a model migration.
///
/// Names are the upper-case literals used on the wire; parsing is
/// case-sensitive. The successor graph is exposed for backing stores that
/// enforce transition legality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Phase {
    Quiesce,
    Precheck,
    Import,
    Validation,
    Success,
    LogTransfer,
    Reap,
    ReapFailed,
    Done,
    Abort,
    AbortDone,
}

impl Phase {
    pub const ALL: [Phase; 11] = [
        Phase::Quiesce,
        Phase::Precheck,
        Phase::Import,
        Phase::Validation,
        Phase::Success,
        Phase::LogTransfer,
        Phase::Reap,
        Phase::ReapFailed,
        Phase::Done,
        Phase::Abort,
        Phase::AbortDone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Quiesce => "QUIESCE",
            Phase::Precheck => "PRECHECK",
            Phase::Import => "IMPORT",
            Phase::Validation => "VALIDATION",
            Phase::Success => "SUCCESS",
            Phase::LogTransfer => "LOGTRANSFER",
            Phase::Reap => "REAP",
            Phase::ReapFailed => "REAPFAILED",
            Phase::Done => "DONE",
            Phase::Abort => "ABORT",
            Phase::AbortDone => "ABORTDONE",
        }
    }

    /// Phases that may directly follow this one.
    pub fn successors(&self) -> &'static [Phase] {
        match self {
            Phase::Quiesce => &[Phase::Precheck, Phase::Abort],
            Phase::Precheck => &[Phase::Import, Phase::Abort],
            Phase::Import => &[Phase::Validation, Phase::Abort],
            Phase::Validation => &[Phase::Success, Phase::Abort],
            Phase::Success => &[Phase::LogTransfer, Phase::Abort],
            Phase::LogTransfer => &[Phase::Reap, Phase::Abort],
            Phase::Reap => &[Phase::Done, Phase::ReapFailed, Phase::Abort],
            Phase::Abort => &[Phase::AbortDone],
            Phase::ReapFailed | Phase::Done | Phase::AbortDone => &[],
        }
    }

    pub fn can_transition_to(&self, next: Phase) -> bool {
        self.successors().contains(&next)
    }

    /// No further transitions are possible from a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::ReapFailed | Phase::Done | Phase::AbortDone)
    }

    /// The source controller still owns the model.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            Phase::Quiesce | Phase::Precheck | Phase::Import | Phase::Validation
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .iter()
            .copied()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| ParsePhaseError(s.to_string()))
    }
}

impl TryFrom<String> for Phase {
    type Error = ParsePhaseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Phase> for String {
    fn from(phase: Phase) -> Self {
        phase.as_str().to_string()
    }
}
