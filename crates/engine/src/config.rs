//! Restore and backup configuration via `tablekeep.toml`
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Values are checked by `validate()` before a restore or
//! backup starts.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tablekeep_archive::{Compression, WriteOptions};

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "tablekeep.toml";

/// Default ceiling on in-flight records and outstanding store calls
pub const DEFAULT_CONCURRENCY: usize = 30;

/// Default number of decoded records buffered ahead of the pipeline
pub const DEFAULT_READ_AHEAD: usize = 1;

// ============================================================================
// Restore
// ============================================================================

/// Restore settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// Ceiling on concurrently processed records and store calls
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Archive decompression
    #[serde(default)]
    pub compression: Compression,
    /// Delete destination tables that the archive does not name
    #[serde(default = "default_true")]
    pub reconcile_tables: bool,
    /// Records decoded ahead of admission
    #[serde(default = "default_read_ahead")]
    pub read_ahead: usize,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_read_ahead() -> usize {
    DEFAULT_READ_AHEAD
}

fn default_true() -> bool {
    true
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            compression: Compression::Auto,
            reconcile_tables: true,
            read_ahead: DEFAULT_READ_AHEAD,
        }
    }
}

impl RestoreConfig {
    /// Same config with another concurrency ceiling
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Same config with another compression setting
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Same config with reconciliation switched on or off
    pub fn with_reconcile_tables(mut self, reconcile: bool) -> Self {
        self.reconcile_tables = reconcile;
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("concurrency", "must be at least 1"));
        }
        if self.read_ahead == 0 {
            return Err(ConfigError::invalid("read_ahead", "must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Backup
// ============================================================================

/// Backup settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Output codec
    #[serde(default = "default_backup_compression")]
    pub compression: Compression,
    /// Codec level; gzip takes 0-9, zstd 1-22
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<i32>,
}

fn default_backup_compression() -> Compression {
    Compression::Gzip
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            compression: default_backup_compression(),
            compression_level: None,
        }
    }
}

impl BackupConfig {
    /// Check value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        let Some(level) = self.compression_level else {
            return Ok(());
        };
        let range = match self.compression {
            Compression::Auto | Compression::Gzip => 0..=9,
            Compression::Zstd => 1..=22,
            Compression::None => {
                return Err(ConfigError::invalid(
                    "compression_level",
                    "set but compression is \"none\"",
                ))
            }
        };
        if !range.contains(&level) {
            return Err(ConfigError::invalid(
                "compression_level",
                format!(
                    "{} is outside {}..={} for {}",
                    level,
                    range.start(),
                    range.end(),
                    self.compression.name()
                ),
            ));
        }
        Ok(())
    }

    /// Archive writer options for these settings
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            compression: self.compression,
            level: self.compression_level,
        }
    }
}

// ============================================================================
// File
// ============================================================================

/// Contents of `tablekeep.toml`
///
/// # Example
///
/// ```toml
/// [restore]
/// concurrency = 30
/// compression = "auto"
///
/// [backup]
/// compression = "zstd"
/// compression_level = 3
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablekeepConfig {
    /// `[restore]` section
    #[serde(default)]
    pub restore: RestoreConfig,
    /// `[backup]` section
    #[serde(default)]
    pub backup: BackupConfig,
}

impl TablekeepConfig {
    /// Parse and validate config text
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: TablekeepConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate both sections
    pub fn validate(&self) -> ConfigResult<()> {
        self.restore.validate()?;
        self.backup.validate()
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Tablekeep configuration

[restore]
# Maximum records processed at once, and maximum store calls outstanding
# at once (default: 30)
concurrency = 30

# Archive compression: "auto" (default), "gzip", "zstd" or "none"
#   "auto" detects gzip and zstd by their magic number
compression = "auto"

# Delete destination tables that the archive does not contain (default: true)
reconcile_tables = true

# Records decoded ahead of the pipeline (default: 1)
read_ahead = 1

[backup]
# Output compression: "gzip" (default), "zstd" or "none"
compression = "gzip"

# Codec level; gzip 0-9, zstd 1-22 (default: codec default)
# compression_level = 6
"#
    }
}
