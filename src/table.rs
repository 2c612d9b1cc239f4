//! Residue → exponent tables.
//!
//! A [`ResidueTable`] maps each residue reached by `g^i mod p` to a single
//! producing exponent.  Two representations are available: a dense slot
//! vector indexed by residue, and a sparse hash map.  They are observably
//! identical; equality, iteration order and serialization only depend on the
//! stored pairs.

use crate::config::{CollisionPolicy, StorageMode, DENSE_AUTO_LIMIT, DENSE_MAX_MODULUS};
use crate::ring::ResidueRing;
use crate::TableError;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// Marker for an unused dense slot.  Exponents never exceed `2^32 - 2`.
const EMPTY: u32 = u32::MAX;

/// Upper bound on the capacity reserved up front by a sparse table.
const SPARSE_RESERVE: u64 = 1 << 20;

fn dense_slots(modulus: u64) -> Result<Vec<u32>, TableError> {
    if modulus > DENSE_MAX_MODULUS {
        return Err(TableError::DenseTooLarge {
            modulus,
            limit: DENSE_MAX_MODULUS,
        });
    }
    let len = usize::try_from(modulus).map_err(|_| TableError::Allocation {
        slots: modulus,
        reason: "slot count exceeds the address space".to_string(),
    })?;
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(len)
        .map_err(|err| TableError::Allocation {
            slots: modulus,
            reason: err.to_string(),
        })?;
    slots.resize(len, EMPTY);
    Ok(slots)
}

#[derive(Debug, Clone)]
enum Slots {
    Dense(Vec<u32>),
    Sparse(HashMap<u32, u32>),
}

/// Lookup table from residues modulo `p` to the exponent that produced them.
#[derive(Debug, Clone)]
pub struct ResidueTable {
    modulus: u64,
    slots: Slots,
    len: usize,
}

impl ResidueTable {
    /// Creates an empty table for `ring`, pre-sized for the chosen storage.
    ///
    /// [`StorageMode::Auto`] picks dense storage up to
    /// [`DENSE_AUTO_LIMIT`](crate::config::DENSE_AUTO_LIMIT).  Explicit dense
    /// storage above [`DENSE_MAX_MODULUS`](crate::config::DENSE_MAX_MODULUS)
    /// is refused, and a failed slot allocation is reported rather than
    /// aborting.
    pub fn new(ring: &ResidueRing, storage: StorageMode) -> Result<Self, TableError> {
        let modulus = ring.modulus();
        let slots = match storage {
            StorageMode::Dense => Slots::Dense(dense_slots(modulus)?),
            StorageMode::Auto if modulus <= DENSE_AUTO_LIMIT => {
                Slots::Dense(dense_slots(modulus)?)
            }
            StorageMode::Auto | StorageMode::Sparse => {
                let reserve = (modulus - 1).min(SPARSE_RESERVE) as usize;
                Slots::Sparse(HashMap::with_capacity(reserve))
            }
        };
        Ok(Self {
            modulus,
            slots,
            len: 0,
        })
    }

    /// Creates an empty sparse table that grows on demand.
    pub(crate) fn growable(ring: &ResidueRing) -> Self {
        Self {
            modulus: ring.modulus(),
            slots: Slots::Sparse(HashMap::new()),
            len: 0,
        }
    }

    /// Builds a table from explicit pairs, checking them against `ring`.
    ///
    /// Pairs are recorded in iteration order under `policy`.
    pub fn from_entries<I>(
        ring: &ResidueRing,
        storage: StorageMode,
        policy: CollisionPolicy,
        entries: I,
    ) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = (u64, u64)>,
    {
        let mut table = Self::new(ring, storage)?;
        for (residue, exponent) in entries {
            if residue >= ring.modulus() {
                return Err(TableError::ResidueOutOfRange {
                    residue,
                    modulus: ring.modulus(),
                });
            }
            if exponent > ring.last_exponent() {
                return Err(TableError::ExponentOutOfRange {
                    exponent,
                    modulus: ring.modulus(),
                });
            }
            table.record(residue as u32, exponent as u32, policy);
        }
        Ok(table)
    }

    /// Stores `exponent` for `residue`.
    ///
    /// An empty slot is always filled; an occupied one is replaced only when
    /// `policy` prefers the new exponent.  Under [`CollisionPolicy::LastWins`]
    /// and increasing exponents this is a plain overwrite.
    ///
    /// # Panics
    ///
    /// Panics if `residue` is not below the modulus.
    #[inline]
    pub fn record(&mut self, residue: u32, exponent: u32, policy: CollisionPolicy) {
        debug_assert!(exponent != EMPTY);
        match &mut self.slots {
            Slots::Dense(slots) => {
                let slot = &mut slots[residue as usize];
                if *slot == EMPTY {
                    *slot = exponent;
                    self.len += 1;
                } else if policy.prefers(exponent, *slot) {
                    *slot = exponent;
                }
            }
            Slots::Sparse(map) => {
                assert!((residue as u64) < self.modulus, "residue out of range");
                match map.get_mut(&residue) {
                    Some(current) => {
                        if policy.prefers(exponent, *current) {
                            *current = exponent;
                        }
                    }
                    None => {
                        map.insert(residue, exponent);
                        self.len += 1;
                    }
                }
            }
        }
    }

    /// Folds every pair of `other` into `self` under `policy`.
    pub fn merge(&mut self, other: &ResidueTable, policy: CollisionPolicy) {
        for (residue, exponent) in other.iter() {
            self.record(residue, exponent, policy);
        }
    }

    /// Returns the stored exponent for `residue`, if any.
    ///
    /// This is the discrete-log inversion the table exists for.
    pub fn lookup(&self, residue: u64) -> Option<u32> {
        if residue >= self.modulus {
            return None;
        }
        match &self.slots {
            Slots::Dense(slots) => Some(slots[residue as usize]).filter(|&e| e != EMPTY),
            Slots::Sparse(map) => map.get(&(residue as u32)).copied(),
        }
    }

    /// Returns the modulus the table was built for.
    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    /// Returns the concrete storage in use (never [`StorageMode::Auto`]).
    pub fn storage(&self) -> StorageMode {
        match self.slots {
            Slots::Dense(_) => StorageMode::Dense,
            Slots::Sparse(_) => StorageMode::Sparse,
        }
    }

    /// Number of distinct residues stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no residue has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates `(residue, exponent)` pairs in ascending residue order.
    pub fn iter(&self) -> Entries<'_> {
        match &self.slots {
            Slots::Dense(slots) => Entries {
                inner: EntriesInner::Dense {
                    slots,
                    next: 0,
                    remaining: self.len,
                },
            },
            Slots::Sparse(map) => {
                let mut pairs: Vec<(u32, u32)> = map.iter().map(|(&r, &e)| (r, e)).collect();
                pairs.sort_unstable_by_key(|&(r, _)| r);
                Entries {
                    inner: EntriesInner::Sorted(pairs.into_iter()),
                }
            }
        }
    }
}

impl PartialEq for ResidueTable {
    fn eq(&self, other: &Self) -> bool {
        self.modulus == other.modulus && self.len == other.len && self.iter().eq(other.iter())
    }
}

impl Eq for ResidueTable {}

impl<'a> IntoIterator for &'a ResidueTable {
    type Item = (u32, u32);
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ascending `(residue, exponent)` iterator returned by [`ResidueTable::iter`].
#[derive(Debug)]
pub struct Entries<'a> {
    inner: EntriesInner<'a>,
}

#[derive(Debug)]
enum EntriesInner<'a> {
    Dense {
        slots: &'a [u32],
        next: usize,
        remaining: usize,
    },
    Sorted(std::vec::IntoIter<(u32, u32)>),
}

impl Iterator for Entries<'_> {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            EntriesInner::Dense {
                slots,
                next,
                remaining,
            } => {
                if *remaining == 0 {
                    return None;
                }
                while *next < slots.len() {
                    let idx = *next;
                    *next += 1;
                    if slots[idx] != EMPTY {
                        *remaining -= 1;
                        return Some((idx as u32, slots[idx]));
                    }
                }
                None
            }
            EntriesInner::Sorted(inner) => inner.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            EntriesInner::Dense { remaining, .. } => (*remaining, Some(*remaining)),
            EntriesInner::Sorted(inner) => inner.size_hint(),
        }
    }
}

impl ExactSizeIterator for Entries<'_> {}

/// Serializes as a map keyed by residue, in ascending residue order.
///
/// With `serde_json` the integer keys become decimal strings, giving
/// `{"1":0,"2":1,...}`.
impl Serialize for ResidueTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(p: u64) -> ResidueRing {
        ResidueRing::new(p).unwrap()
    }

    #[test]
    fn test_dense_storage_refuses_full_width_modulus() {
        let full = ring(1 << 32);
        assert!(matches!(
            ResidueTable::new(&full, StorageMode::Dense),
            Err(TableError::DenseTooLarge { modulus, .. }) if modulus == 1 << 32
        ));
        let auto = ResidueTable::new(&full, StorageMode::Auto).unwrap();
        assert_eq!(auto.storage(), StorageMode::Sparse);
        let small = ResidueTable::new(&ring(16), StorageMode::Dense).unwrap();
        assert_eq!(small.storage(), StorageMode::Dense);
        assert!(small.is_empty());
    }

    #[test]
    fn test_last_wins_overwrites() {
        let mut table = ResidueTable::new(&ring(16), StorageMode::Dense).unwrap();
        table.record(0, 4, CollisionPolicy::LastWins);
        table.record(0, 5, CollisionPolicy::LastWins);
        table.record(0, 14, CollisionPolicy::LastWins);
        assert_eq!(table.lookup(0), Some(14));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_first_wins_keeps_smallest() {
        let mut table = ResidueTable::new(&ring(16), StorageMode::Sparse).unwrap();
        table.record(0, 9, CollisionPolicy::FirstWins);
        table.record(0, 4, CollisionPolicy::FirstWins);
        table.record(0, 14, CollisionPolicy::FirstWins);
        assert_eq!(table.lookup(0), Some(4));
    }

    #[test]
    fn test_lookup_outside_ring_is_none() {
        let mut table = ResidueTable::new(&ring(16), StorageMode::Dense).unwrap();
        table.record(1, 0, CollisionPolicy::LastWins);
        assert_eq!(table.lookup(16), None);
        assert_eq!(table.lookup(u64::MAX), None);
        assert_eq!(table.lookup(3), None);
        assert_eq!(table.lookup(1), Some(0));
    }

    #[test]
    fn test_dense_and_sparse_compare_equal() {
        let pairs = [(8u32, 3u32), (1, 0), (4, 2), (2, 1)];
        let mut dense = ResidueTable::new(&ring(16), StorageMode::Dense).unwrap();
        let mut sparse = ResidueTable::new(&ring(16), StorageMode::Sparse).unwrap();
        for &(r, e) in &pairs {
            dense.record(r, e, CollisionPolicy::LastWins);
            sparse.record(r, e, CollisionPolicy::LastWins);
        }
        assert_eq!(dense.storage(), StorageMode::Dense);
        assert_eq!(sparse.storage(), StorageMode::Sparse);
        assert_eq!(dense, sparse);
        let ordered: Vec<_> = sparse.iter().collect();
        assert_eq!(ordered, vec![(1, 0), (2, 1), (4, 2), (8, 3)]);
        assert_eq!(dense.iter().len(), 4);
    }

    #[test]
    fn test_merge_respects_policy() {
        let r = ring(256);
        let mut left = ResidueTable::new(&r, StorageMode::Sparse).unwrap();
        left.record(7, 10, CollisionPolicy::LastWins);
        left.record(9, 3, CollisionPolicy::LastWins);
        let mut right = ResidueTable::new(&r, StorageMode::Sparse).unwrap();
        right.record(7, 200, CollisionPolicy::LastWins);
        right.record(11, 1, CollisionPolicy::LastWins);

        let mut last = left.clone();
        last.merge(&right, CollisionPolicy::LastWins);
        assert_eq!(last.lookup(7), Some(200));
        assert_eq!(last.len(), 3);

        let mut first = right.clone();
        first.merge(&left, CollisionPolicy::FirstWins);
        assert_eq!(first.lookup(7), Some(10));
    }

    #[test]
    fn test_from_entries_validates_ranges() {
        let r = ring(16);
        let ok = ResidueTable::from_entries(
            &r,
            StorageMode::Auto,
            CollisionPolicy::LastWins,
            vec![(1, 0), (0, 14)],
        )
        .unwrap();
        assert_eq!(ok.lookup(0), Some(14));
        assert!(matches!(
            ResidueTable::from_entries(
                &r,
                StorageMode::Auto,
                CollisionPolicy::LastWins,
                vec![(16, 0)]
            ),
            Err(TableError::ResidueOutOfRange { residue: 16, modulus: 16 })
        ));
        assert!(matches!(
            ResidueTable::from_entries(
                &r,
                StorageMode::Auto,
                CollisionPolicy::LastWins,
                vec![(1, 15)]
            ),
            Err(TableError::ExponentOutOfRange { exponent: 15, .. })
        ));
    }

    #[test]
    fn test_serializes_with_string_keys_in_residue_order() {
        let mut table = ResidueTable::new(&ring(16), StorageMode::Sparse).unwrap();
        for (r, e) in [(8u32, 3u32), (0, 14), (1, 0), (4, 2), (2, 1)] {
            table.record(r, e, CollisionPolicy::LastWins);
        }
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"{"0":14,"1":0,"2":1,"4":2,"8":3}"#);
    }
}
