// Minion report aggregation
//
// A migration can have thousands of agents reporting per phase. Failures are
// returned in full, pending agents only as a small deterministic sample.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::migration::Phase;
use crate::names::Tag;

/// Maximum number of pending agents returned in a summary.
pub const UNKNOWN_SAMPLE_LIMIT: usize = 10;

/// Agent responses for the current phase of one migration. An agent
/// appears in at most one of the three collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinionReports {
    pub succeeded: Vec<Tag>,
    pub failed: Vec<Tag>,
    pub unknown: Vec<Tag>,
}

/// Bounded view of a report set, safe to return to any caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinionReportsSummary {
    pub migration_id: String,
    pub phase: String,
    pub success_count: usize,
    pub unknown_count: usize,
    pub unknown_sample: Vec<String>,
    pub failed: Vec<String>,
}

impl MinionReports {
    pub fn summarize(&self, migration_id: &str, phase: Phase) -> MinionReportsSummary {
        let mut unknown_sample = sorted_strings(&self.unknown);
        unknown_sample.truncate(UNKNOWN_SAMPLE_LIMIT);
        MinionReportsSummary {
            migration_id: migration_id.to_string(),
            phase: phase.to_string(),
            success_count: self.succeeded.len(),
            unknown_count: self.unknown.len(),
            unknown_sample,
            failed: sorted_strings(&self.failed),
        }
    }
}

fn sorted_strings(tags: &[Tag]) -> Vec<String> {
    let mut out: Vec<String> = tags.iter().map(Tag::to_string).collect();
    out.sort_by(|a, b| natural_cmp(a, b));
    out
}

/// Compares strings run by run, treating runs of ASCII digits as numbers so
/// that `machine-2` sorts before `machine-10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks { rest: a };
    let mut right = Chunks { rest: b };
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (is_digits(x), is_digits(y)) {
                    (true, true) => cmp_numeric(x, y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn is_digits(chunk: &str) -> bool {
    chunk.as_bytes().first().is_some_and(u8::is_ascii_digit)
}

fn cmp_numeric(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.rest.as_bytes().first()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .bytes()
            .position(|b| b.is_ascii_digit() != digits)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(chunk)
    }
}
