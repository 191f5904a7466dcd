//! Channel naming patterns.

use relay_core::types::id::IdentityId;

/// Channel classes, recognized from the name prefix before the first `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelType {
    /// `public.*`: any authenticated identity.
    Public(String),
    /// `private-identity.<id>`: only the identity itself.
    PrivateIdentity(IdentityId),
    /// `presence-resource.<id>`: role threshold plus resource ACL.
    PresenceResource(String),
    /// `resource.<id>`: role threshold plus resource ACL.
    Resource(String),
    /// `admin.*`: admin role and above.
    Admin(String),
    /// `moderator.*`: moderator role and above.
    Moderator(String),
}

impl ChannelType {
    /// Parses a channel name. Unknown prefixes yield `None`, as do suffixes
    /// that are empty, a dot segment, or contain `/`.
    pub fn parse(channel: &str) -> Option<Self> {
        let (prefix, suffix) = channel.split_once('.')?;
        if matches!(suffix, "" | "." | "..") || suffix.contains('/') {
            return None;
        }
        let suffix = suffix.to_string();
        match prefix {
            "public" => Some(Self::Public(suffix)),
            "private-identity" => Some(Self::PrivateIdentity(IdentityId::new(suffix))),
            "presence-resource" => Some(Self::PresenceResource(suffix)),
            "resource" => Some(Self::Resource(suffix)),
            "admin" => Some(Self::Admin(suffix)),
            "moderator" => Some(Self::Moderator(suffix)),
            _ => None,
        }
    }

    /// Pattern prefix of this class.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Public(_) => "public",
            Self::PrivateIdentity(_) => "private-identity",
            Self::PresenceResource(_) => "presence-resource",
            Self::Resource(_) => "resource",
            Self::Admin(_) => "admin",
            Self::Moderator(_) => "moderator",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_patterns() {
        assert_eq!(
            ChannelType::parse("public.news.sports"),
            Some(ChannelType::Public("news.sports".into()))
        );
        assert_eq!(
            ChannelType::parse("private-identity.22"),
            Some(ChannelType::PrivateIdentity(IdentityId::from(22u64)))
        );
        assert_eq!(
            ChannelType::parse("presence-resource.room-1"),
            Some(ChannelType::PresenceResource("room-1".into()))
        );
        assert_eq!(
            ChannelType::parse("admin.settings"),
            Some(ChannelType::Admin("settings".into()))
        );
    }

    #[test]
    fn test_unknown_or_empty_suffix() {
        for name in ["private.7", "public.", "admin", "resource.", "", "Public.news"] {
            assert_eq!(ChannelType::parse(name), None, "{name:?}");
        }
    }

    #[test]
    fn test_path_like_suffix_rejected() {
        for name in ["resource..", "resource...", "presence-resource...", "resource.a/b", "admin./"] {
            assert_eq!(ChannelType::parse(name), None, "{name:?}");
        }
        assert_eq!(
            ChannelType::parse("resource.v1.2"),
            Some(ChannelType::Resource("v1.2".into()))
        );
    }
}
