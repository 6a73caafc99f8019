//! Database configuration.

use crate::error::{HonoError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default chunk size threshold in bytes (4 MB).
pub const DEFAULT_MAX_CHUNK_BYTES: u64 = 4_000_000;

/// Configuration shared by every collection of a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Soft size cap of a chunk file. A document larger than this is stored alone.
    pub max_chunk_bytes: u64,

    /// Abort opening a collection on the first undecodable record.
    pub strict_replay: bool,

    /// fsync chunk files after appends and rewrites.
    pub sync_writes: bool,

    /// Assign a UUID `id` to inserted documents that carry none.
    pub generate_missing_ids: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
            strict_replay: false,
            sync_writes: true,
            generate_missing_ids: false,
        }
    }
}

impl DatabaseConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a JSON file. Missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: DatabaseConfig = serde_json::from_str(&content).map_err(|e| {
            HonoError::Config(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the chunk size threshold.
    #[must_use]
    pub const fn max_chunk_bytes(mut self, size: u64) -> Self {
        self.max_chunk_bytes = size;
        self
    }

    /// Sets strict replay mode.
    #[must_use]
    pub const fn strict_replay(mut self, value: bool) -> Self {
        self.strict_replay = value;
        self
    }

    /// Sets whether writes are synced to disk.
    #[must_use]
    pub const fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    #[must_use]
    pub const fn generate_missing_ids(mut self, value: bool) -> Self {
        self.generate_missing_ids = value;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_bytes == 0 {
            return Err(HonoError::Config(
                "max_chunk_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_chunk_bytes, 4_000_000);
        assert!(!config.strict_replay);
        assert!(config.sync_writes);
        assert!(!config.generate_missing_ids);
    }

    #[test]
    fn builder_pattern() {
        let config = DatabaseConfig::new()
            .max_chunk_bytes(1024)
            .strict_replay(true)
            .sync_writes(false);

        assert_eq!(config.max_chunk_bytes, 1024);
        assert!(config.strict_replay);
        assert!(!config.sync_writes);
    }

    #[test]
    fn zero_threshold_rejected() {
        let err = DatabaseConfig::new().max_chunk_bytes(0).validate().unwrap_err();
        assert!(matches!(err, HonoError::Config(_)));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_chunk_bytes": 512, "strict_replay": true}}"#).unwrap();

        let config = DatabaseConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_chunk_bytes, 512);
        assert!(config.strict_replay);
        assert!(config.sync_writes);
    }

    #[test]
    fn malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(matches!(
            DatabaseConfig::from_file(file.path()),
            Err(HonoError::Config(_))
        ));
    }
}
