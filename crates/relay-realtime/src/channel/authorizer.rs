//! Channel authorization: decides whether an identity may join a channel.
//!
//! Rules, by channel class:
//! - `public.*`: any authenticated identity
//! - `private-identity.<id>`: only that identity
//! - `resource.<id>` / `presence-resource.<id>`: role threshold, then the
//!   resource-ACL backend
//! - `admin.*` / `moderator.*`: role threshold
//! - anything else: denied
//!
//! Every error path denies.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use relay_auth::rbac::RoleHierarchy;
use relay_core::config::{ChannelAccessConfig, ResourceAclMode};
use relay_core::error::{AppError, AuthorizationDenial};
use relay_core::traits::resource_access::ResourceAccessCheck;
use relay_core::types::identity::Identity;

use super::resource_acl::HttpResourceAccess;
use super::types::ChannelType;

/// Pattern-based channel access decisions.
#[derive(Debug, Clone)]
pub struct ChannelAuthorizer {
    /// Role ranks.
    hierarchy: RoleHierarchy,
    /// Minimum role for `admin.*`.
    admin_role: String,
    /// Minimum role for `moderator.*`.
    moderator_role: String,
    /// Minimum role for `resource.<id>`.
    resource_min_role: String,
    /// Minimum role for `presence-resource.<id>`.
    presence_min_role: String,
    /// Resource-ACL backend.
    resource_access: Option<Arc<dyn ResourceAccessCheck>>,
    /// Bound on a single resource check.
    acl_timeout: Duration,
    /// Behaviour without a resource-ACL backend.
    mode: ResourceAclMode,
}

impl ChannelAuthorizer {
    /// Creates an authorizer with an explicit resource-ACL backend.
    pub fn new(
        config: &ChannelAccessConfig,
        resource_access: Option<Arc<dyn ResourceAccessCheck>>,
    ) -> Self {
        Self {
            hierarchy: RoleHierarchy::from_config(config),
            admin_role: config.admin_role.clone(),
            moderator_role: config.moderator_role.clone(),
            resource_min_role: config.resource_min_role.clone(),
            presence_min_role: config.presence_min_role.clone(),
            resource_access,
            acl_timeout: config.resource_acl.timeout(),
            mode: config.resource_acl.mode,
        }
    }

    /// Creates an authorizer using the configured HTTP resource ACL, if any.
    pub fn from_config(config: &ChannelAccessConfig) -> Result<Self, AppError> {
        let resource_access = match config.resource_acl.url {
            Some(_) => {
                let check: Arc<dyn ResourceAccessCheck> =
                    Arc::new(HttpResourceAccess::new(&config.resource_acl)?);
                Some(check)
            }
            None => {
                if config.resource_acl.mode == ResourceAclMode::Permissive {
                    warn!("Resource ACL not configured; permissive mode admits resource channels on role alone");
                }
                None
            }
        };
        Ok(Self::new(config, resource_access))
    }

    /// The role hierarchy in use.
    pub fn hierarchy(&self) -> &RoleHierarchy {
        &self.hierarchy
    }

    /// Returns `true` iff `identity` may subscribe to `channel`.
    pub async fn authorize(&self, identity: &Identity, channel: &str) -> bool {
        self.decide(identity, channel).await.is_ok()
    }

    /// Like [`authorize`](Self::authorize) but reports why access was denied.
    pub async fn decide(
        &self,
        identity: &Identity,
        channel: &str,
    ) -> Result<(), AuthorizationDenial> {
        let channel_type = ChannelType::parse(channel)
            .ok_or_else(|| AuthorizationDenial::UnknownChannel(channel.to_string()))?;

        match &channel_type {
            ChannelType::Public(_) => Ok(()),
            ChannelType::PrivateIdentity(owner) => {
                if *owner == identity.id {
                    Ok(())
                } else {
                    Err(AuthorizationDenial::ResourceForbidden(channel.to_string()))
                }
            }
            ChannelType::Resource(resource_id) => {
                self.hierarchy
                    .require_minimum_role(&identity.role, &self.resource_min_role)?;
                self.check_resource(identity, channel_type.prefix(), resource_id, channel)
                    .await
            }
            ChannelType::PresenceResource(resource_id) => {
                self.hierarchy
                    .require_minimum_role(&identity.role, &self.presence_min_role)?;
                self.check_resource(identity, channel_type.prefix(), resource_id, channel)
                    .await
            }
            ChannelType::Admin(_) => self
                .hierarchy
                .require_minimum_role(&identity.role, &self.admin_role),
            ChannelType::Moderator(_) => self
                .hierarchy
                .require_minimum_role(&identity.role, &self.moderator_role),
        }
    }

    async fn check_resource(
        &self,
        identity: &Identity,
        resource_type: &str,
        resource_id: &str,
        channel: &str,
    ) -> Result<(), AuthorizationDenial> {
        let forbidden = || AuthorizationDenial::ResourceForbidden(channel.to_string());

        let Some(checker) = &self.resource_access else {
            return match self.mode {
                ResourceAclMode::Permissive => Ok(()),
                ResourceAclMode::Strict => {
                    debug!(channel = %channel, "No resource ACL configured; denying");
                    Err(forbidden())
                }
            };
        };

        let verdict = tokio::time::timeout(
            self.acl_timeout,
            checker.check(resource_type, resource_id, &identity.id),
        )
        .await;

        match verdict {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(forbidden()),
            Ok(Err(e)) => {
                warn!(channel = %channel, error = %e, "Resource ACL check failed; denying");
                Err(forbidden())
            }
            Err(_) => {
                warn!(
                    channel = %channel,
                    timeout_ms = self.acl_timeout.as_millis() as u64,
                    "Resource ACL check timed out; denying"
                );
                Err(forbidden())
            }
        }
    }
}
