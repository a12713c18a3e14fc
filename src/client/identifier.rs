//! SQL identifier validation and quoting
//!
//! Database and table names are interpolated into DDL, so only plain
//! identifiers are accepted: a letter or underscore followed by letters,
//! digits, underscores or `$`, at most 63 bytes (the PostgreSQL limit).

use std::sync::OnceLock;

use regex::Regex;

use super::errors::{ClientError, ClientResult};

/// Longest identifier PostgreSQL keeps without truncation
pub const MAX_IDENTIFIER_LEN: usize = 63;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("identifier pattern is valid")
    })
}

pub fn is_valid_identifier(name: &str) -> bool {
    name.len() <= MAX_IDENTIFIER_LEN && identifier_pattern().is_match(name)
}

/// A table name, optionally schema-qualified (`schema.table`).
pub fn is_valid_table_name(name: &str) -> bool {
    match name.split_once('.') {
        Some((schema, table)) => is_valid_identifier(schema) && is_valid_identifier(table),
        None => is_valid_identifier(name),
    }
}

pub fn validate_identifier(name: &str) -> ClientResult<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(ClientError::InvalidIdentifier(name.to_string()))
    }
}

pub fn validate_table_name(name: &str) -> ClientResult<()> {
    if is_valid_table_name(name) {
        Ok(())
    } else {
        Err(ClientError::InvalidIdentifier(name.to_string()))
    }
}

/// Double-quoted identifier. Only call with validated names.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Single-quoted literal. Only call with validated names.
pub(crate) fn quote_literal(name: &str) -> String {
    format!("'{}'", name)
}

/// `schema.table` with each part double-quoted. Only call with validated
/// table names.
pub(crate) fn quote_table_name(name: &str) -> String {
    name.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

/// Single-quoted literal for arbitrary text, embedded quotes doubled
pub(crate) fn escape_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_identifier("shop"));
        assert!(is_valid_identifier("_shop_temp_1739000000000"));
        assert!(is_valid_identifier("Shop$2"));
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1shop"));
        assert!(!is_valid_identifier("shop-db"));
        assert!(!is_valid_identifier("shop\"; DROP DATABASE x"));
        assert!(!is_valid_identifier("shop'"));
        assert!(!is_valid_identifier(&"a".repeat(64)));
        assert!(is_valid_identifier(&"a".repeat(63)));
    }

    #[test]
    fn test_table_names() {
        assert!(is_valid_table_name("db_backups"));
        assert!(is_valid_table_name("public.db_backups"));
        assert!(!is_valid_table_name("public."));
        assert!(!is_valid_table_name("a.b.c"));
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_ident("shop"), "\"shop\"");
        assert_eq!(quote_literal("shop"), "'shop'");
        assert!(validate_identifier("bad name").is_err());
        assert_eq!(quote_table_name("audit.db_backups"), "\"audit\".\"db_backups\"");
        assert_eq!(escape_literal("it's"), "'it''s'");
    }
}
