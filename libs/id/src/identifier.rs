//! Container instance identifiers.

use serde::{Deserialize, Serialize};

use crate::IdError;

/// Shortest valid identifier.
pub const MIN_IDENTIFIER_LEN: usize = 4;

/// Longest valid identifier.
pub const MAX_IDENTIFIER_LEN: usize = 24;

/// Random identifiers always carry at least this many random characters.
const MIN_RANDOM_LEN: usize = 8;

/// Characters of a ULID that come from its random component.
const ULID_RANDOM_CHARS: usize = 16;

/// The identifier of one container instance.
///
/// Deserialization does not validate, so descriptors written by other tools
/// load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Creates a validated identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        validate(&value)?;
        Ok(Self(value))
    }

    /// Generates a random identifier starting with `prefix`.
    ///
    /// The random part is lowercase base32 taken from the random bits of a
    /// fresh ULID, so it never contains a `-`.
    pub fn random(prefix: &str) -> Result<Self, IdError> {
        if !prefix.chars().all(is_identifier_char) {
            return Err(IdError::InvalidPrefix(prefix.to_string()));
        }
        let max_prefix = MAX_IDENTIFIER_LEN - MIN_RANDOM_LEN;
        if prefix.len() > max_prefix {
            return Err(IdError::PrefixTooLong {
                prefix: prefix.to_string(),
                max: max_prefix,
            });
        }

        let random_len = (MAX_IDENTIFIER_LEN - prefix.len()).min(ULID_RANDOM_CHARS);
        let ulid = ulid::Ulid::new().to_string().to_ascii_lowercase();
        let tail = &ulid[ulid.len() - random_len..];

        Self::new(format!("{prefix}{tail}"))
    }

    /// Checks the identifier against the allowed format.
    pub fn validate(&self) -> Result<(), IdError> {
        validate(&self.0)
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Identifier {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Identifier {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Identifier {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '.'
}

fn validate(value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    let len_ok = (MIN_IDENTIFIER_LEN..=MAX_IDENTIFIER_LEN).contains(&value.len());
    if !len_ok || !value.chars().all(is_identifier_char) {
        return Err(IdError::InvalidIdentifier(value.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_accepts_deployment_style_ids() {
        assert!(Identifier::new("web-1").is_ok());
        assert!(Identifier::new("prod.db-12").is_ok());
    }

    #[test]
    fn test_rejects_bad_ids() {
        assert_eq!(Identifier::new(""), Err(IdError::Empty));
        assert!(matches!(
            Identifier::new("abc"),
            Err(IdError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            Identifier::new("web_1"),
            Err(IdError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            Identifier::new("a".repeat(25)),
            Err(IdError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_random_id_keeps_prefix() {
        let id = Identifier::random("app-").unwrap();
        assert!(id.as_str().starts_with("app-"));
        assert_eq!(id.as_str().len(), MAX_IDENTIFIER_LEN - 4);
        assert!(id.validate().is_ok());
    }

    #[test]
    fn test_random_id_rejects_long_prefix() {
        let err = Identifier::random("a-very-long-prefix-").unwrap_err();
        assert!(err.is_prefix_error());
    }

    #[test]
    fn test_random_id_rejects_bad_prefix() {
        let err = Identifier::random("bad/").unwrap_err();
        assert_eq!(err, IdError::InvalidPrefix("bad/".to_string()));
    }

    #[test]
    fn test_deserialize_does_not_validate() {
        let id: Identifier = serde_json::from_str("\"foo\"").unwrap();
        assert_eq!(id, "foo");
        assert!(id.validate().is_err());
    }

    proptest! {
        #[test]
        fn random_ids_are_valid_and_dashless(prefix in "[a-z0-9.]{0,16}") {
            let id = Identifier::random(&prefix).unwrap();
            prop_assert!(id.validate().is_ok());
            prop_assert!(id.as_str().starts_with(&prefix));
            prop_assert!(!id.as_str()[prefix.len()..].contains('-'));
        }
    }
}
