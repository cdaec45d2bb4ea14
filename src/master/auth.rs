// Authorization seam - identity checks happen elsewhere, we only ask yes/no

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

/// Capability checks for the entity calling the facade.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait Authorizer: Send + Sync {
    /// True when the caller manages the model being migrated, which is
    /// required for every migration master operation.
    fn auth_model_manager(&self) -> bool;
}

/// Fixed-answer authorizer for wiring the facade in tools and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticAuthorizer {
    pub model_manager: bool,
}

impl StaticAuthorizer {
    pub fn model_manager() -> Self {
        Self {
            model_manager: true,
        }
    }
}

impl Authorizer for StaticAuthorizer {
    fn auth_model_manager(&self) -> bool {
        self.model_manager
    }
}
