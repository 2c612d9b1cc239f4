//! Build configuration.
//!
//! A [`TableConfig`] can be constructed in code, loaded from a JSON file, or
//! assembled by the CLI.  Every field has a default; the defaults reproduce
//! the canonical table for `g = 2`, `p = 2^32`.

use crate::{ring::ResidueRing, TableError};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default base `g`.
pub const DEFAULT_BASE: u64 = 2;
/// Default modulus `p = 2^32`.
pub const DEFAULT_MODULUS: u64 = 0x1_0000_0000;
/// Default artifact path.
pub const DEFAULT_OUTPUT: &str = "computed_values.json";
/// Default number of exponents handled per worker chunk.
pub const DEFAULT_CHUNK_SIZE: u64 = 1 << 20;
/// Largest modulus for which [`StorageMode::Auto`] picks dense storage.
pub const DENSE_AUTO_LIMIT: u64 = 1 << 24;
/// Largest modulus accepted with explicit [`StorageMode::Dense`] (1 GiB of slots).
pub const DENSE_MAX_MODULUS: u64 = 1 << 28;

/// In-memory representation of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Dense below [`DENSE_AUTO_LIMIT`], sparse above.
    #[default]
    Auto,
    /// One `u32` slot per residue.
    Dense,
    /// Hash map holding only the residues actually reached.
    Sparse,
}

/// Which exponent is kept when several exponents produce the same residue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// The largest producing exponent, i.e. the last one written in increasing order.
    #[default]
    #[value(name = "last")]
    #[serde(rename = "last")]
    LastWins,
    /// The smallest producing exponent, i.e. the discrete logarithm proper.
    #[value(name = "first")]
    #[serde(rename = "first")]
    FirstWins,
}

impl CollisionPolicy {
    /// Returns `true` when `candidate` should replace `current`.
    #[inline]
    pub fn prefers(self, candidate: u32, current: u32) -> bool {
        match self {
            CollisionPolicy::LastWins => candidate > current,
            CollisionPolicy::FirstWins => candidate < current,
        }
    }
}

/// Parameters of a single table build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableConfig {
    /// Base `g`; reduced modulo `p` before use.
    pub base: u64,
    /// Modulus `p`, in `[2, 2^32]`.
    pub modulus: u64,
    /// Where the finished table is written.
    pub output: PathBuf,
    /// Storage representation.
    pub storage: StorageMode,
    /// Tie-break for colliding residues.
    pub collision: CollisionPolicy,
    /// Worker threads: `0` for the rayon default, `1` for a sequential build.
    pub threads: usize,
    /// Exponents per worker chunk.
    pub chunk_size: u64,
    /// Pretty-print the JSON artifact.
    pub pretty: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            modulus: DEFAULT_MODULUS,
            output: PathBuf::from(DEFAULT_OUTPUT),
            storage: StorageMode::Auto,
            collision: CollisionPolicy::LastWins,
            threads: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            pretty: false,
        }
    }
}

impl TableConfig {
    /// Convenience constructor for a base/modulus pair with every other field defaulted.
    pub fn new(base: u64, modulus: u64) -> Self {
        Self {
            base,
            modulus,
            ..Self::default()
        }
    }

    /// Loads a configuration from a JSON file; absent fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let bytes = fs::read(path).map_err(|err| TableError::io(path, err))?;
        serde_json::from_slice(&bytes).map_err(|source| TableError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks the configuration and returns the ring it describes.
    pub fn validate(&self) -> Result<ResidueRing, TableError> {
        if self.chunk_size == 0 {
            return Err(TableError::InvalidChunkSize);
        }
        let ring = ResidueRing::new(self.modulus)?;
        if self.storage == StorageMode::Dense && self.modulus > DENSE_MAX_MODULUS {
            return Err(TableError::DenseTooLarge {
                modulus: self.modulus,
                limit: DENSE_MAX_MODULUS,
            });
        }
        Ok(ring)
    }

    /// Resolves [`StorageMode::Auto`] against the configured modulus.
    pub fn resolved_storage(&self) -> StorageMode {
        match self.storage {
            StorageMode::Auto if self.modulus <= DENSE_AUTO_LIMIT => StorageMode::Dense,
            StorageMode::Auto => StorageMode::Sparse,
            explicit => explicit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn test_defaults_match_canonical_table() {
        let cfg = TableConfig::default();
        assert_eq!(cfg.base, 2);
        assert_eq!(cfg.modulus, 4_294_967_296);
        assert_eq!(cfg.output, PathBuf::from("computed_values.json"));
        assert_eq!(cfg.collision, CollisionPolicy::LastWins);
        assert_eq!(cfg.resolved_storage(), StorageMode::Sparse);
    }

    #[test]
    fn test_auto_storage_is_dense_for_small_moduli() {
        let cfg = TableConfig::new(3, 256);
        assert_eq!(cfg.resolved_storage(), StorageMode::Dense);
        let forced = TableConfig {
            storage: StorageMode::Sparse,
            ..cfg
        };
        assert_eq!(forced.resolved_storage(), StorageMode::Sparse);
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        assert!(matches!(
            TableConfig::new(2, 1).validate(),
            Err(TableError::InvalidModulus(1))
        ));
        let cfg = TableConfig {
            chunk_size: 0,
            ..TableConfig::new(2, 16)
        };
        assert!(matches!(cfg.validate(), Err(TableError::InvalidChunkSize)));
        assert_eq!(TableConfig::new(2, 16).validate().unwrap().modulus(), 16);
    }

    #[test]
    fn test_validate_rejects_oversized_dense_storage() {
        let cfg = TableConfig {
            storage: StorageMode::Dense,
            ..TableConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(TableError::DenseTooLarge {
                modulus: DEFAULT_MODULUS,
                limit: DENSE_MAX_MODULUS
            })
        ));
        let at_limit = TableConfig {
            storage: StorageMode::Dense,
            ..TableConfig::new(2, DENSE_MAX_MODULUS)
        };
        assert!(at_limit.validate().is_ok());
        // Auto never selects dense storage above its own, lower limit.
        assert!(TableConfig::default().validate().is_ok());
    }

    #[test]
    fn test_collision_preference() {
        assert!(CollisionPolicy::LastWins.prefers(9, 4));
        assert!(!CollisionPolicy::LastWins.prefers(4, 9));
        assert!(CollisionPolicy::FirstWins.prefers(4, 9));
        assert!(!CollisionPolicy::FirstWins.prefers(9, 9));
    }

    #[test]
    fn test_load_partial_config_file() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("dlog_table_cfg_{unique}.json"));
        fs::write(
            &path,
            r#"{"base": 3, "modulus": 256, "collision": "first", "storage": "sparse"}"#,
        )
        .unwrap();
        let cfg = TableConfig::load(&path).unwrap();
        assert_eq!(cfg.base, 3);
        assert_eq!(cfg.modulus, 256);
        assert_eq!(cfg.collision, CollisionPolicy::FirstWins);
        assert_eq!(cfg.storage, StorageMode::Sparse);
        assert_eq!(cfg.chunk_size, DEFAULT_CHUNK_SIZE);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("dlog_table_badcfg_{unique}.json"));
        fs::write(&path, r#"{"generator": 3}"#).unwrap();
        assert!(matches!(
            TableConfig::load(&path),
            Err(TableError::Decode { .. })
        ));
        fs::remove_file(&path).unwrap();
    }
}
