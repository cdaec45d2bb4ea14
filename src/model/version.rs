use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static BINARY_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+\.\d+(?:-[a-z]+\d+)?(?:\.\d+){0,2})-([a-z0-9]+)-([a-z0-9_]+)$")
        .expect("binary version pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid binary version {0:?}")]
pub struct ParseVersionError(pub String);

/// An agent tools build: release number, OS series and architecture,
/// rendered as `2.0.0-xenial-amd64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BinaryVersion {
    pub number: String,
    pub series: String,
    pub arch: String,
}

impl fmt::Display for BinaryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.number, self.series, self.arch)
    }
}

impl FromStr for BinaryVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = BINARY_VERSION
            .captures(s)
            .ok_or_else(|| ParseVersionError(s.to_string()))?;
        Ok(BinaryVersion {
            number: caps[1].to_string(),
            series: caps[2].to_string(),
            arch: caps[3].to_string(),
        })
    }
}

impl TryFrom<String> for BinaryVersion {
    type Error = ParseVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BinaryVersion> for String {
    fn from(version: BinaryVersion) -> Self {
        version.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_and_beta_versions() {
        let v: BinaryVersion = "2.0.0-xenial-amd64".parse().unwrap();
        assert_eq!(v.number, "2.0.0");
        assert_eq!(v.series, "xenial");
        assert_eq!(v.arch, "amd64");
        assert_eq!(v.to_string(), "2.0.0-xenial-amd64");

        let beta: BinaryVersion = "2.0-beta1.1-trusty-ppc64el".parse().unwrap();
        assert_eq!(beta.number, "2.0-beta1.1");
        assert_eq!(beta.arch, "ppc64el");
    }

    #[test]
    fn test_reject_malformed_versions() {
        for bad in ["2.0.0", "2.0.0-xenial", "xenial-amd64", "2-xenial-amd64", ""] {
            assert!(bad.parse::<BinaryVersion>().is_err(), "{bad}");
        }
    }
}
