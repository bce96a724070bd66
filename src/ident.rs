//! SQL identifier sanitizer and Oracle index-name derivation.
//!
//! Grammar: `[A-Za-z_.]` at any position, plus `[0-9]` from position 1
//! onward, case-insensitive.

use md5::{Digest, Md5};

use crate::error::DestinationError;

/// Check (and optionally sanitize) a SQL identifier in place.
///
/// When `sanitize` is `true`, out-of-grammar bytes are replaced with `_` and
/// the function always succeeds. When `false`, the first violation is
/// rejected with [`DestinationError::InvalidIdentifier`].
pub fn check_identifier(s: &mut String, sanitize: bool) -> Result<(), DestinationError> {
    // Work on bytes: the grammar is ASCII-only by definition.
    let mut bytes = std::mem::take(s).into_bytes();

    for (pos, byte) in bytes.iter_mut().enumerate() {
        if is_valid_byte(*byte, pos) {
            continue;
        }
        if sanitize {
            *byte = b'_';
        } else {
            let name = String::from_utf8_lossy(&bytes).into_owned();
            *s = name.clone();
            return Err(DestinationError::InvalidIdentifier {
                name,
                reason: format!("invalid character {:?} at position {pos}", *byte as char),
            });
        }
    }

    *s = String::from_utf8(bytes).expect("sanitizer never produces invalid utf8 from ascii input");
    Ok(())
}

fn is_valid_byte(byte: u8, pos: usize) -> bool {
    let is_letter_or_sep = byte.is_ascii_alphabetic() || byte == b'_' || byte == b'.';
    let is_digit = byte.is_ascii_digit();
    is_letter_or_sep || (pos > 0 && is_digit)
}

/// Validate a column identifier at configuration time (never sanitized;
/// invalid column names are an initialization-fatal error).
pub fn validate_column_name(name: &str) -> Result<(), DestinationError> {
    let mut copy = name.to_string();
    check_identifier(&mut copy, false)
}

/// Sanitize a table name in place, as the schema reconciler does before
/// every lookup.
pub fn sanitize_table_name(name: &mut String) {
    check_identifier(name, true).expect("sanitize mode never fails");
}

/// Derive an index name for `table`/`column`.
///
/// Oracle identifiers are capped at 30 characters; when `table.len() +
/// column.len() > 25` the name becomes the hex digest of `"{table}_{column}"`
/// MD5-hashed, truncated to 30 characters, with the first character
/// overwritten to `i` so it can never start with a digit.
pub fn oracle_index_name(table: &str, column: &str) -> String {
    if table.len() + column.len() > 25 {
        let mut hasher = Md5::new();
        hasher.update(table.as_bytes());
        hasher.update(b"_");
        hasher.update(column.as_bytes());
        let digest = hasher.finalize();
        let hex = digest.iter().fold(String::with_capacity(32), |mut acc, b| {
            use std::fmt::Write as _;
            let _ = write!(acc, "{b:02x}");
            acc
        });
        let mut name: String = hex.chars().take(30).collect();
        name.replace_range(0..1, "i");
        name
    } else {
        format!("{table}_{column}_idx")
    }
}

/// Derive the index name for any dialect; only Oracle uses the
/// length-sensitive rule.
pub fn index_name(dialect: &crate::dialect::Dialect, table: &str, column: &str) -> String {
    if dialect.uses_long_index_names() {
        oracle_index_name(table, column)
    } else {
        format!("{table}_{column}_idx")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;

    #[test]
    fn accepts_plain_identifier() {
        let mut s = "orders".to_string();
        check_identifier(&mut s, false).unwrap();
        assert_eq!(s, "orders");
    }

    #[test]
    fn rejects_leading_digit_without_sanitize() {
        let mut s = "1orders".to_string();
        assert!(check_identifier(&mut s, false).is_err());
    }

    #[test]
    fn allows_digit_after_first_position() {
        let mut s = "orders1".to_string();
        check_identifier(&mut s, false).unwrap();
        assert_eq!(s, "orders1");
    }

    #[test]
    fn sanitizes_invalid_bytes_in_place() {
        let mut s = "my table!".to_string();
        check_identifier(&mut s, true).unwrap();
        assert_eq!(s, "my_table_");
    }

    #[test]
    fn sanitizer_is_idempotent() {
        let mut once = "w€ird 1table".to_string();
        check_identifier(&mut once, true).unwrap();
        let mut twice = once.clone();
        check_identifier(&mut twice, true).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn case_insensitive_letters_accepted() {
        let mut s = "MixedCase_Name".to_string();
        check_identifier(&mut s, false).unwrap();
        assert_eq!(s, "MixedCase_Name");
    }

    #[test]
    fn short_name_uses_idx_suffix() {
        assert_eq!(index_name(&Dialect::Mysql, "t", "c"), "t_c_idx");
    }

    #[test]
    fn oracle_short_name_uses_idx_suffix() {
        assert_eq!(oracle_index_name("users", "email"), "users_email_idx");
    }

    #[test]
    fn oracle_long_name_is_hashed_and_bounded() {
        let table = "a_very_long_table_name_indeed";
        let column = "a_very_long_column_name_too";
        let name = oracle_index_name(table, column);
        assert!(name.len() <= 30);
        assert!(name.starts_with('i'));
        assert!(name[1..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn oracle_long_name_deterministic() {
        let a = oracle_index_name("tablexxxxxxxxxxxxxxx", "columnxxxxxxxxxxxxxx");
        let b = oracle_index_name("tablexxxxxxxxxxxxxxx", "columnxxxxxxxxxxxxxx");
        assert_eq!(a, b);
    }

    proptest::proptest! {
        /// The sanitizer is idempotent for any input, not just the
        /// hand-picked cases above.
        #[test]
        fn sanitize_is_idempotent_for_any_input(s in ".*") {
            let mut once = s.clone();
            check_identifier(&mut once, true).unwrap();
            let mut twice = once.clone();
            check_identifier(&mut twice, true).unwrap();
            proptest::prop_assert_eq!(once, twice);
        }

        /// Oracle index names never exceed the 30-character identifier cap
        /// and never start with a digit, regardless of input length.
        #[test]
        fn oracle_index_name_always_bounded(table in "[a-zA-Z_]{1,40}", column in "[a-zA-Z_]{1,40}") {
            let name = oracle_index_name(&table, &column);
            proptest::prop_assert!(name.len() <= 30);
            proptest::prop_assert!(!name.chars().next().unwrap().is_ascii_digit());
        }
    }
}
