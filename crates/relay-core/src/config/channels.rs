//! Channel authorization configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Role hierarchy and channel-class thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelAccessConfig {
    /// Roles from least to most privileged. Rank is position + 1.
    #[serde(default = "default_role_hierarchy")]
    pub role_hierarchy: Vec<String>,
    /// Minimum role for `admin.*` channels.
    #[serde(default = "default_admin_role")]
    pub admin_role: String,
    /// Minimum role for `moderator.*` channels.
    #[serde(default = "default_moderator_role")]
    pub moderator_role: String,
    /// Minimum role for `resource.<id>` channels.
    #[serde(default = "default_member_role")]
    pub resource_min_role: String,
    /// Minimum role for `presence-resource.<id>` channels.
    #[serde(default = "default_member_role")]
    pub presence_min_role: String,
    /// Resource-ACL collaborator settings.
    #[serde(default)]
    pub resource_acl: ResourceAclConfig,
}

impl Default for ChannelAccessConfig {
    fn default() -> Self {
        Self {
            role_hierarchy: default_role_hierarchy(),
            admin_role: default_admin_role(),
            moderator_role: default_moderator_role(),
            resource_min_role: default_member_role(),
            presence_min_role: default_member_role(),
            resource_acl: ResourceAclConfig::default(),
        }
    }
}

/// How resource channels behave when no resource-ACL backend is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAclMode {
    /// Deny resource channels without a backend answer.
    #[default]
    Strict,
    /// Allow resource channels once the role threshold passes. Not for production.
    Permissive,
}

/// Resource-ACL backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceAclConfig {
    /// Behaviour when `url` is unset.
    #[serde(default)]
    pub mode: ResourceAclMode,
    /// Base URL of the resource-ACL endpoint.
    #[serde(default)]
    pub url: Option<String>,
    /// API key sent with each check.
    #[serde(default)]
    pub api_key: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_acl_timeout")]
    pub timeout_ms: u64,
}

impl Default for ResourceAclConfig {
    fn default() -> Self {
        Self {
            mode: ResourceAclMode::default(),
            url: None,
            api_key: String::new(),
            timeout_ms: default_acl_timeout(),
        }
    }
}

impl ResourceAclConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_role_hierarchy() -> Vec<String> {
    ["guest", "member", "moderator", "admin"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_admin_role() -> String {
    "admin".to_string()
}

fn default_moderator_role() -> String {
    "moderator".to_string()
}

fn default_member_role() -> String {
    "member".to_string()
}

fn default_acl_timeout() -> u64 {
    5_000
}
