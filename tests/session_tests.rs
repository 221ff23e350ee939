//! Tests for session attribute plumbing

use dbtrack::session::is_valid_identifier;
use dbtrack::IsolationLevel;

#[test]
fn test_isolation_display_matches_sql() {
    assert_eq!(
        IsolationLevel::RepeatableRead.to_string(),
        "REPEATABLE READ"
    );
    assert_eq!(
        IsolationLevel::ReadUncommitted.to_string(),
        "READ UNCOMMITTED"
    );
}

#[test]
fn test_from_show_accepts_server_spelling() {
    // The server reports lowercase spellings
    assert_eq!(
        IsolationLevel::from_show("read committed"),
        Some(IsolationLevel::ReadCommitted)
    );
    assert_eq!(
        IsolationLevel::from_show("serializable"),
        Some(IsolationLevel::Serializable)
    );
}

#[test]
fn test_from_show_trims_whitespace() {
    assert_eq!(
        IsolationLevel::from_show("  repeatable read\n"),
        Some(IsolationLevel::RepeatableRead)
    );
}

#[test]
fn test_identifier_validation() {
    assert!(is_valid_identifier("order_items"));
    assert!(is_valid_identifier("_private"));
    assert!(is_valid_identifier("stage$final"));

    assert!(!is_valid_identifier("with space"));
    assert!(!is_valid_identifier("semi;colon"));
    assert!(!is_valid_identifier("\"quoted\""));
    assert!(!is_valid_identifier("$starts_with_dollar"));
}
