//! Consistency checks for finished tables.

use crate::builder::TableBuilder;
use crate::config::TableConfig;
use crate::ring::ResidueRing;
use crate::table::ResidueTable;
use crate::TableError;
use log::{info, warn};

/// A stored pair whose exponent does not reproduce its residue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Residue key found in the table.
    pub residue: u32,
    /// Exponent stored for it.
    pub exponent: u32,
    /// What `g^exponent mod p` actually evaluates to.
    pub actual: u64,
}

/// Result of [`verify_table`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Pairs examined.
    pub checked: usize,
    /// Pairs that failed.
    pub mismatches: Vec<Mismatch>,
}

impl VerifyReport {
    /// `true` when every pair checked out.
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Checks that every stored exponent `e` satisfies `base^e mod p == residue`.
///
/// This proves soundness of each entry but not that the table is complete
/// or that colliding residues kept the right exponent; see
/// [`verify_against_rebuild`] for that.
pub fn verify_table(table: &ResidueTable, base: u64) -> Result<VerifyReport, TableError> {
    let ring = ResidueRing::new(table.modulus())?;
    let mut report = VerifyReport::default();
    for (residue, exponent) in table.iter() {
        report.checked += 1;
        let actual = ring.pow(base, exponent as u64);
        if actual != residue as u64 {
            report.mismatches.push(Mismatch {
                residue,
                exponent,
                actual,
            });
        }
    }
    if report.is_ok() {
        info!("verified {} entries for g={base} p={}", report.checked, ring.modulus());
    } else {
        warn!(
            "{} of {} entries failed verification for g={base} p={}",
            report.mismatches.len(),
            report.checked,
            ring.modulus()
        );
    }
    Ok(report)
}

/// Rebuilds the table described by `config` and compares it with `table`.
///
/// Returns `Ok(true)` when both hold exactly the same pairs.  A table built
/// for a different modulus than `config` names is reported as a mismatch
/// without rebuilding.
pub fn verify_against_rebuild(
    table: &ResidueTable,
    config: &TableConfig,
) -> Result<bool, TableError> {
    let builder = TableBuilder::new(config.clone())?;
    if builder.ring().modulus() != table.modulus() {
        warn!(
            "table modulus {} differs from configured modulus {}",
            table.modulus(),
            builder.ring().modulus()
        );
        return Ok(false);
    }
    let rebuilt = builder.build()?;
    let same = rebuilt == *table;
    if !same {
        warn!(
            "table differs from a fresh build: {} stored vs {} expected residues",
            table.len(),
            rebuilt.len()
        );
    }
    Ok(same)
}
