//! Chunk file naming: `{database}_{collection}_{sequence}.json`

use crate::error::{HonoError, Result};
use crate::storage::traits::TEMP_SUFFIX;

const CHUNK_EXTENSION: &str = ".json";
const MAX_NAME_LEN: usize = 64;

pub fn chunk_file_name(database: &str, collection: &str, sequence: u32) -> String {
    format!("{}_{}_{}{}", database, collection, sequence, CHUNK_EXTENSION)
}

/// Sequence number of `name` if it is a chunk of `database`/`collection`
///
/// Matches the exact prefix and a plain decimal sequence, so chunks of
/// `students` are never confused with chunks of `students_archive`.
pub fn parse_chunk_sequence(database: &str, collection: &str, name: &str) -> Option<u32> {
    let rest = name
        .strip_prefix(database)?
        .strip_prefix('_')?
        .strip_prefix(collection)?
        .strip_prefix('_')?
        .strip_suffix(CHUNK_EXTENSION)?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) || rest.starts_with('0') {
        return None;
    }
    rest.parse().ok()
}

/// True for a leftover scratch copy of one of this collection's chunks
pub fn is_temp_chunk(database: &str, collection: &str, name: &str) -> bool {
    name.strip_suffix(TEMP_SUFFIX)
        .and_then(|chunk| parse_chunk_sequence(database, collection, chunk))
        .is_some()
}

/// Database names: ASCII letters, digits and `-`
///
/// `_` separates the parts of a chunk file name, so it is not allowed here.
pub fn validate_database_name(name: &str) -> Result<()> {
    validate(name, |c| c.is_ascii_alphanumeric() || c == '-')
}

/// Collection names: ASCII letters, digits, `-` and `_`
pub fn validate_collection_name(name: &str) -> Result<()> {
    validate(name, |c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn validate(name: &str, allowed: impl Fn(char) -> bool) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.len() > MAX_NAME_LEN {
        "name is longer than 64 characters"
    } else if !name.chars().all(allowed) {
        "name contains a character that is not allowed"
    } else {
        return Ok(());
    };
    Err(HonoError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_name_roundtrip() {
        let name = chunk_file_name("school", "students", 12);
        assert_eq!(name, "school_students_12.json");
        assert_eq!(parse_chunk_sequence("school", "students", &name), Some(12));
    }

    #[test]
    fn test_prefix_collections_not_confused() {
        assert_eq!(
            parse_chunk_sequence("school", "students", "school_students_archive_1.json"),
            None
        );
        assert_eq!(
            parse_chunk_sequence("school", "students_archive", "school_students_archive_1.json"),
            Some(1)
        );
    }

    #[test]
    fn test_rejects_odd_sequences() {
        for name in [
            "school_students_.json",
            "school_students_0.json",
            "school_students_01.json",
            "school_students_-1.json",
            "school_students_1.json.tmp",
            "school_students_1.txt",
            "metadata.json",
        ] {
            assert_eq!(parse_chunk_sequence("school", "students", name), None, "{}", name);
        }
    }

    #[test]
    fn test_temp_detection() {
        assert!(is_temp_chunk("school", "students", "school_students_3.json.tmp"));
        assert!(!is_temp_chunk("school", "students", "school_students_3.json"));
        assert!(!is_temp_chunk("school", "students", "metadata.json.tmp"));
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_database_name("school-2024").is_ok());
        assert!(validate_database_name("my_db").is_err());
        assert!(validate_collection_name("old_students").is_ok());
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name("../etc").is_err());
        assert!(validate_collection_name(&"x".repeat(65)).is_err());
    }
}
