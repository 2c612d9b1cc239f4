#![deny(missing_docs)]

//! The design philosophy underlying `dlog_table` is to trade space for time, exactly and
//! reproducibly.  Each module encapsulates one step of that trade: arithmetic, enumeration,
//! storage, persistence and verification.
//!
//! # dlog_table
//!
//! **dlog_table** precomputes, for a fixed base `g` and a small modulus `p`,
//! the table mapping every residue `g^i mod p` (for `i` in `0..=p-2`) back to
//! an exponent that produced it.  With the table in hand, inverting modular
//! exponentiation is a single lookup instead of a discrete-logarithm search.
//! The approach only makes sense while `p` is small enough to enumerate, so
//! moduli are capped at `2^32`.
//!
//! ## Features
//!
//! * **Residue ring arithmetic** via the [`ResidueRing`](ring/struct.ResidueRing.html)
//!   type: widened multiplication and square-and-multiply exponentiation.
//! * **Table construction**: [`TableBuilder`](builder/struct.TableBuilder.html)
//!   enumerates the exponent range sequentially or across a rayon pool,
//!   with cancellation and build statistics.
//! * **Storage**: [`ResidueTable`](table/struct.ResidueTable.html) keeps pairs
//!   in a dense slot vector or a sparse map, with a configurable collision
//!   policy (last exponent wins by default).
//! * **Persistence**: [`write_table`] emits a JSON object
//!   `{"residue": exponent}` atomically and reports a BLAKE2b-256 digest.
//! * **Verification**: [`verify_table`] re-checks every stored pair.
//!
//! ## Usage
//!
//! ```rust
//! use dlog_table::{TableBuilder, TableConfig};
//!
//! // 2^i mod 16 for i in 0..=14: 1, 2, 4, 8, then 0 from i = 4 onwards.
//! let table = TableBuilder::new(TableConfig::new(2, 16))?.build()?;
//! assert_eq!(table.lookup(8), Some(3));
//! // Residue 0 keeps the last exponent that produced it.
//! assert_eq!(table.lookup(0), Some(14));
//! assert_eq!(
//!     serde_json::to_string(&table).unwrap(),
//!     r#"{"0":14,"1":0,"2":1,"4":2,"8":3}"#
//! );
//! # Ok::<(), dlog_table::TableError>(())
//! ```

pub mod builder;
pub mod config;
mod error;
mod persist;
pub mod ring;
pub mod table;
mod verify;

pub use builder::{build_table, BuildStats, CancelFlag, TableBuilder};
pub use config::{CollisionPolicy, StorageMode, TableConfig};
pub use error::TableError;
pub use persist::{file_digest, read_table, write_table, ArtifactDigest, WrittenTable};
pub use ring::{ResidueRing, MAX_MODULUS};
pub use table::{Entries, ResidueTable};
pub use verify::{verify_against_rebuild, verify_table, Mismatch, VerifyReport};
