//! Strongly-typed identifiers (avoid mixing strings/UUIDs arbitrarily).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque user identity issued by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

macro_rules! store_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new time-ordered (UUID v7) identifier.
            pub fn generate() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

store_id!(
    /// Cohort document identifier.
    CohortId
);
store_id!(
    /// Message identifier within a cohort's `messages` collection.
    MessageId
);
store_id!(
    /// Task identifier within a cohort's `tasks` collection.
    TaskId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn cohort_id_display_and_parse() {
        let id = CohortId::generate();
        let parsed: CohortId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn invalid_id_fails_to_parse() {
        assert!("not-a-uuid".parse::<CohortId>().is_err());
        assert!("".parse::<TaskId>().is_err());
    }

    #[test]
    fn generated_message_ids_are_time_ordered() {
        let first = MessageId::generate();
        let second = MessageId::generate();
        assert!(first < second);
    }

    #[test]
    fn user_id_hash_and_display() {
        let alice = UserId::from("alice");
        let mut set = HashSet::new();
        set.insert(alice.clone());
        assert!(set.contains(&UserId("alice".to_string())));
        assert_eq!(alice.to_string(), "alice");
        assert_eq!(alice.as_str(), "alice");
    }
}
