//! Boundary to the optional resource-ACL backend.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::id::IdentityId;

/// Decides whether an identity may observe a specific backend resource.
///
/// Consulted for `resource.<id>` and `presence-resource.<id>` channels after
/// the role threshold has passed. Errors are treated as a denial.
#[async_trait]
pub trait ResourceAccessCheck: Send + Sync + std::fmt::Debug + 'static {
    /// Returns `true` if `identity_id` may access `resource_type/resource_id`.
    async fn check(
        &self,
        resource_type: &str,
        resource_id: &str,
        identity_id: &IdentityId,
    ) -> AppResult<bool>;
}
