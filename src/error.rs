//! Error type shared by the table builder, persistence and verification layers.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while configuring, building, persisting or loading a table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("modulus {0} is outside the supported range [2, 2^32]")]
    /// Modulus too small to enumerate or too large to enumerate exhaustively.
    InvalidModulus(u64),
    #[error("dense storage for modulus {modulus} exceeds the {limit}-slot limit")]
    /// Dense storage was requested for a modulus too large to hold one slot per residue.
    DenseTooLarge {
        /// Requested modulus.
        modulus: u64,
        /// Largest modulus dense storage accepts.
        limit: u64,
    },
    #[error("could not allocate {slots} table slots: {reason}")]
    /// The table's up-front allocation failed.
    Allocation {
        /// Number of slots requested.
        slots: u64,
        /// Allocator or platform explanation.
        reason: String,
    },
    #[error("chunk size must be non-zero")]
    /// A zero-length exponent chunk was requested.
    InvalidChunkSize,
    #[error("io error on {}: {source}", path.display())]
    /// Underlying filesystem failure.
    Io {
        /// Path being read or written when the failure occurred.
        path: PathBuf,
        /// Source I/O error.
        #[source]
        source: io::Error,
    },
    #[error("encode error: {0}")]
    /// The table could not be serialized.
    Encode(#[source] serde_json::Error),
    #[error("decode error in {}: {source}", path.display())]
    /// A persisted table is not a valid JSON object of residue keys.
    Decode {
        /// Path of the malformed artifact.
        path: PathBuf,
        /// Source JSON error.
        #[source]
        source: serde_json::Error,
    },
    #[error("residue {residue} is not below modulus {modulus}")]
    /// A loaded residue does not belong to the ring.
    ResidueOutOfRange {
        /// Offending residue.
        residue: u64,
        /// Modulus the table was loaded against.
        modulus: u64,
    },
    #[error("exponent {exponent} exceeds the last enumerated exponent for modulus {modulus}")]
    /// A loaded exponent lies outside `0..=p-2`.
    ExponentOutOfRange {
        /// Offending exponent.
        exponent: u64,
        /// Modulus the table was loaded against.
        modulus: u64,
    },
    #[error("thread pool error: {0}")]
    /// The worker pool could not be constructed.
    ThreadPool(String),
    #[error("table build cancelled")]
    /// The build was halted through its cancel flag; nothing was produced.
    Cancelled,
}

impl TableError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TableError::Io {
            path: path.into(),
            source,
        }
    }
}
