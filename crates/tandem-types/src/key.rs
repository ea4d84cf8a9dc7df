//! External subscriber keys

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The external identity of a subscriber.
///
/// Subscribers known to the primary panel carry a UUID, which is the portable
/// join key across both panels and the bot's own storage. A subscriber that
/// only exists on the secondary panel and was never linked falls back to the
/// panel-local username, which is not portable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriberKey {
    /// Shared UUID identity.
    Uuid(Uuid),
    /// Secondary-panel username, used only when no UUID is known.
    Name(String),
}

impl SubscriberKey {
    /// Parse a key from user input: anything that parses as a UUID is a UUID,
    /// everything else is treated as a secondary-panel username.
    pub fn parse(input: &str) -> Self {
        match Uuid::parse_str(input.trim()) {
            Ok(uuid) => Self::Uuid(uuid),
            Err(_) => Self::Name(input.trim().to_string()),
        }
    }

    /// The UUID, if this key carries one.
    pub fn uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(uuid) => Some(*uuid),
            Self::Name(_) => None,
        }
    }
}

impl std::fmt::Display for SubscriberKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uuid(uuid) => write!(f, "{uuid}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<Uuid> for SubscriberKey {
    fn from(uuid: Uuid) -> Self {
        Self::Uuid(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid() {
        let key = SubscriberKey::parse("a1b2c3d4-e5f6-7a8b-9c0d-1e2f3a4b5c6d");
        assert!(matches!(key, SubscriberKey::Uuid(_)));
    }

    #[test]
    fn test_parse_name_fallback() {
        let key = SubscriberKey::parse("customer-42");
        assert_eq!(key, SubscriberKey::Name("customer-42".to_string()));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let key = SubscriberKey::parse("  a1b2c3d4-e5f6-7a8b-9c0d-1e2f3a4b5c6d ");
        assert!(matches!(key, SubscriberKey::Uuid(_)));
    }
}
