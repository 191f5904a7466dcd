//! Role hierarchy: one ordered table mapping role names to ranks.

use relay_core::config::ChannelAccessConfig;
use relay_core::error::AuthorizationDenial;

/// Total order over roles used for threshold checks.
///
/// Ranks start at 1 for the least privileged role. Unknown roles rank 0 and
/// therefore fail every threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleHierarchy {
    /// Lower-cased role names, least privileged first.
    roles: Vec<String>,
}

impl RoleHierarchy {
    /// Builds a hierarchy from role names ordered least to most privileged.
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            roles: roles
                .into_iter()
                .map(|r| r.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    /// Builds the hierarchy from channel configuration.
    pub fn from_config(config: &ChannelAccessConfig) -> Self {
        Self::new(&config.role_hierarchy)
    }

    /// Returns the rank of a role (0 when unknown).
    pub fn rank(&self, role: &str) -> usize {
        let role = role.trim().to_lowercase();
        self.roles
            .iter()
            .position(|r| *r == role)
            .map(|idx| idx + 1)
            .unwrap_or(0)
    }

    /// Checks whether `actual` ranks at least as high as `minimum`.
    ///
    /// An unknown `minimum` can never be met.
    pub fn has_at_least(&self, actual: &str, minimum: &str) -> bool {
        let required = self.rank(minimum);
        required > 0 && self.rank(actual) >= required
    }

    /// Like [`has_at_least`](Self::has_at_least) but returns the typed denial.
    pub fn require_minimum_role(
        &self,
        actual: &str,
        minimum: &str,
    ) -> Result<(), AuthorizationDenial> {
        if self.has_at_least(actual, minimum) {
            Ok(())
        } else {
            Err(AuthorizationDenial::RoleInsufficient {
                required: minimum.to_string(),
                actual: actual.to_string(),
            })
        }
    }

    /// Role names, least privileged first.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

impl Default for RoleHierarchy {
    fn default() -> Self {
        Self::from_config(&ChannelAccessConfig::default())
    }
}
