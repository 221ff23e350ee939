//! Session attribute plumbing
//!
//! Typed transaction isolation levels and identifier validation for the
//! session attributes a tracked connection forwards to the server.

use std::fmt;

/// Transaction isolation levels supported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Read uncommitted (treated as read committed by PostgreSQL)
    ReadUncommitted,
    /// Read committed, the server default
    ReadCommitted,
    /// Repeatable read
    RepeatableRead,
    /// Serializable
    Serializable,
}

impl IsolationLevel {
    /// The SQL spelling used in `SET default_transaction_isolation`
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }

    /// Parse the spelling returned by `SHOW default_transaction_isolation`
    #[must_use]
    pub fn from_show(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "read uncommitted" => Some(Self::ReadUncommitted),
            "read committed" => Some(Self::ReadCommitted),
            "repeatable read" => Some(Self::RepeatableRead),
            "serializable" => Some(Self::Serializable),
            _ => None,
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Check that a name is safe to interpolate into SQL as an identifier.
///
/// Accepts unquoted PostgreSQL identifiers: a letter or underscore followed
/// by letters, digits, underscores, or dollar signs, at most 63 bytes.
/// Savepoint names and `search_path` values go through this before
/// interpolation so they cannot smuggle SQL.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_sql_spelling() {
        assert_eq!(IsolationLevel::ReadCommitted.as_sql(), "READ COMMITTED");
        assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
    }

    #[test]
    fn test_isolation_from_show_round_trip() {
        for level in [
            IsolationLevel::ReadUncommitted,
            IsolationLevel::ReadCommitted,
            IsolationLevel::RepeatableRead,
            IsolationLevel::Serializable,
        ] {
            let shown = level.as_sql().to_ascii_lowercase();
            assert_eq!(IsolationLevel::from_show(&shown), Some(level));
        }
    }

    #[test]
    fn test_isolation_from_show_unknown() {
        assert_eq!(IsolationLevel::from_show("chaos"), None);
        assert_eq!(IsolationLevel::from_show(""), None);
    }

    #[test]
    fn test_identifier_rejects_injection() {
        assert!(!is_valid_identifier("sp1; DROP TABLE users"));
        assert!(!is_valid_identifier("sp'1"));
        assert!(!is_valid_identifier("1starts_with_digit"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_identifier_accepts_plain_names() {
        assert!(is_valid_identifier("sp1"));
        assert!(is_valid_identifier("_before_retry"));
        assert!(is_valid_identifier("batch$2"));
    }

    #[test]
    fn test_identifier_length_limit() {
        let at_limit = "a".repeat(63);
        let over_limit = "a".repeat(64);
        assert!(is_valid_identifier(&at_limit));
        assert!(!is_valid_identifier(&over_limit));
    }
}
