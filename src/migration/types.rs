// Core migration types shared by the backend contract and the facade

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::names::Tag;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetInfoError {
    #[error("empty target address list")]
    NoAddrs,
    #[error("{0} is not a controller tag")]
    NotController(Tag),
    #[error("{0} is not a user tag")]
    NotUser(Tag),
    #[error("empty CA certificate")]
    NoCACert,
}

/// Connection details for the controller a model is migrating to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub controller_tag: Tag,
    /// Tried in order; never empty once validated.
    pub addrs: Vec<String>,
    pub ca_cert: String,
    pub auth_tag: Tag,
    pub password: String,
}

impl TargetInfo {
    pub fn validate(&self) -> Result<(), TargetInfoError> {
        if !matches!(self.controller_tag, Tag::Controller(_)) {
            return Err(TargetInfoError::NotController(self.controller_tag.clone()));
        }
        if self.addrs.is_empty() {
            return Err(TargetInfoError::NoAddrs);
        }
        if self.ca_cert.is_empty() {
            return Err(TargetInfoError::NoCACert);
        }
        if !matches!(self.auth_tag, Tag::User(_)) {
            return Err(TargetInfoError::NotUser(self.auth_tag.clone()));
        }
        Ok(())
    }
}
