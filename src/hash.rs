//! xxHash-based row identity.
//!
//! Row keys and AST canonicalization hashes are deterministic 64-bit xxHash
//! values, used to identify rows in the row store and to detect when two
//! queries canonicalize to the same operator subtree for sharing (§4.5, §5).

use xxhash_rust::xxh64;

const SEED: u64 = 0x517cc1b727220a95;

/// Compute a 64-bit xxHash of a single text value.
pub fn hash_str(input: &str) -> u64 {
    xxh64::xxh64(input.as_bytes(), SEED)
}

/// Compute a row/composite-key hash from an ordered list of optional values.
///
/// Used for primary-key hashing and join/group-by composite keys. Values are
/// joined by a record separator so that `["ab", "c"]` and `["a", "bc"]`
/// never collide; `None` is encoded by a sentinel distinct from any string a
/// caller could supply, so a true NULL never collides with the literal text
/// `"NULL"`.
pub fn hash_multi<'a, I>(inputs: I) -> u64
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut combined = String::new();
    for (i, input) in inputs.into_iter().enumerate() {
        if i > 0 {
            combined.push('\x1E');
        }
        match input {
            Some(val) => combined.push_str(val),
            None => combined.push_str("\x00NULL\x00"),
        }
    }
    xxh64::xxh64(combined.as_bytes(), SEED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_determinism() {
        assert_eq!(hash_str("hello world"), hash_str("hello world"));
    }

    #[test]
    fn test_hash_different_inputs() {
        assert_ne!(hash_str("hello"), hash_str("world"));
    }

    #[test]
    fn test_null_handling_in_multi_hash() {
        let h1 = hash_multi([Some("a"), None, Some("b")]);
        let h2 = hash_multi([Some("a"), None, Some("c")]);
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_multi_hash_separator_prevents_collision() {
        let h1 = hash_multi([Some("ab"), Some("c")]);
        let h2 = hash_multi([Some("a"), Some("bc")]);
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_multi_hash_null_vs_string_null() {
        let with_null_marker = hash_multi([None]);
        let with_string_null = hash_multi([Some("NULL")]);
        assert_ne!(
            with_null_marker, with_string_null,
            "NULL marker and string 'NULL' should hash differently"
        );
    }

    #[test]
    fn test_hash_multi_empty() {
        // Should not panic on an empty key.
        let _ = hash_multi(std::iter::empty());
    }

    #[test]
    fn test_hash_multi_order_sensitive() {
        let h1 = hash_multi([Some("a"), Some("b")]);
        let h2 = hash_multi([Some("b"), Some("a")]);
        assert_ne!(h1, h2);
    }
}
