//! Exhaustive table construction.
//!
//! [`TableBuilder`] enumerates every exponent `i` in `0..=p-2`, computes
//! `g^i mod p` with square-and-multiply and records `residue → i` in a
//! [`ResidueTable`].  Large ranges are cut into disjoint chunks and spread
//! over a rayon pool; each chunk fills a private partial table and the
//! partials are merged by exponent value, so the result never depends on
//! scheduling.

use crate::config::{CollisionPolicy, StorageMode, TableConfig};
use crate::ring::ResidueRing;
use crate::table::ResidueTable;
use crate::TableError;
use log::{debug, info};
#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Exponent ranges shorter than this are always enumerated sequentially.
pub const PARALLEL_THRESHOLD: u64 = 1 << 16;

/// Shared flag that halts a running build between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.  Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Statistics describing a completed build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStats {
    /// Exponents enumerated, always `p - 1`.
    pub exponents: u64,
    /// Distinct residues in the finished table.
    pub distinct_residues: usize,
    /// Number of exponent chunks processed.
    pub chunks: u64,
    /// Worker threads used; `1` for a sequential build.
    pub threads: usize,
    /// Wall-clock duration of the enumeration.
    pub elapsed: Duration,
}

/// Builds residue tables for a validated [`TableConfig`].
#[derive(Debug, Clone)]
pub struct TableBuilder {
    config: TableConfig,
    ring: ResidueRing,
}

impl TableBuilder {
    /// Validates `config` and prepares a builder for it.
    pub fn new(config: TableConfig) -> Result<Self, TableError> {
        let ring = config.validate()?;
        Ok(Self { config, ring })
    }

    /// The configuration this builder was created with.
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// The ring the table is built over.
    pub fn ring(&self) -> ResidueRing {
        self.ring
    }

    /// Builds the complete table.
    pub fn build(&self) -> Result<ResidueTable, TableError> {
        self.build_with_cancel(&CancelFlag::new())
            .map(|(table, _)| table)
    }

    /// Builds the complete table, polling `cancel` between chunks.
    ///
    /// A cancelled build returns [`TableError::Cancelled`] and discards all
    /// partial work.
    pub fn build_with_cancel(
        &self,
        cancel: &CancelFlag,
    ) -> Result<(ResidueTable, BuildStats), TableError> {
        let exponents = self.ring.modulus() - 1;
        let chunk_size = self.config.chunk_size;
        let chunks = exponents.div_ceil(chunk_size);
        let storage = self.config.resolved_storage();
        let threads = self.worker_threads(exponents);
        info!(
            "building table g={} p={} exponents={} storage={:?} collision={:?} threads={} chunks={}",
            self.config.base,
            self.ring.modulus(),
            exponents,
            storage,
            self.config.collision,
            threads,
            chunks
        );

        let start = Instant::now();
        let table = if threads > 1 {
            self.build_parallel(storage, chunks, threads, cancel)?
        } else {
            self.build_sequential(storage, chunks, cancel)?
        };
        let stats = BuildStats {
            exponents,
            distinct_residues: table.len(),
            chunks,
            threads,
            elapsed: start.elapsed(),
        };
        info!(
            "table complete: {} distinct residues from {} exponents in {:.3}s",
            stats.distinct_residues,
            stats.exponents,
            stats.elapsed.as_secs_f64()
        );
        Ok((table, stats))
    }

    fn worker_threads(&self, exponents: u64) -> usize {
        #[cfg(not(target_arch = "wasm32"))]
        {
            if exponents < PARALLEL_THRESHOLD || self.config.threads == 1 {
                return 1;
            }
            match self.config.threads {
                0 => rayon::current_num_threads().max(1),
                n => n,
            }
        }
        #[cfg(target_arch = "wasm32")]
        {
            let _ = exponents;
            1
        }
    }

    fn chunk_range(&self, chunk: u64) -> Range<u64> {
        let end = self.ring.modulus() - 1;
        let start = chunk * self.config.chunk_size;
        start..(start + self.config.chunk_size).min(end)
    }

    fn fill_chunk(&self, range: Range<u64>, table: &mut ResidueTable) {
        let base = self.config.base;
        let policy = self.config.collision;
        for exponent in range {
            let residue = self.ring.pow(base, exponent);
            table.record(residue as u32, exponent as u32, policy);
        }
    }

    fn build_sequential(
        &self,
        storage: StorageMode,
        chunks: u64,
        cancel: &CancelFlag,
    ) -> Result<ResidueTable, TableError> {
        let mut table = ResidueTable::new(&self.ring, storage)?;
        let progress = Progress::new(chunks);
        for chunk in 0..chunks {
            if cancel.is_cancelled() {
                info!("build cancelled after {chunk} of {chunks} chunks");
                return Err(TableError::Cancelled);
            }
            self.fill_chunk(self.chunk_range(chunk), &mut table);
            progress.chunk_done(chunk);
        }
        Ok(table)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn build_parallel(
        &self,
        storage: StorageMode,
        chunks: u64,
        threads: usize,
        cancel: &CancelFlag,
    ) -> Result<ResidueTable, TableError> {
        let policy = self.config.collision;
        let progress = Progress::new(chunks);
        let run = || {
            (0..chunks)
                .into_par_iter()
                .map(|chunk| {
                    if cancel.is_cancelled() {
                        return Err(TableError::Cancelled);
                    }
                    let mut partial = ResidueTable::growable(&self.ring);
                    self.fill_chunk(self.chunk_range(chunk), &mut partial);
                    progress.chunk_done(chunk);
                    Ok(partial)
                })
                .try_reduce(
                    || ResidueTable::growable(&self.ring),
                    |mut acc, partial| {
                        acc.merge(&partial, policy);
                        Ok(acc)
                    },
                )
        };
        let merged = if self.config.threads == 0 {
            run()
        } else {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|err| TableError::ThreadPool(err.to_string()))?
                .install(run)
        };
        let merged = match merged {
            Ok(table) => table,
            Err(err) => {
                if matches!(err, TableError::Cancelled) {
                    info!("build cancelled after {} of {chunks} chunks", progress.done());
                }
                return Err(err);
            }
        };
        if storage == StorageMode::Sparse {
            return Ok(merged);
        }
        let mut table = ResidueTable::new(&self.ring, storage)?;
        table.merge(&merged, policy);
        Ok(table)
    }

    #[cfg(target_arch = "wasm32")]
    fn build_parallel(
        &self,
        storage: StorageMode,
        chunks: u64,
        _threads: usize,
        cancel: &CancelFlag,
    ) -> Result<ResidueTable, TableError> {
        self.build_sequential(storage, chunks, cancel)
    }
}

/// Chunk completion counter that logs at every tenth of the work.
struct Progress {
    total: u64,
    step: u64,
    done: AtomicU64,
}

impl Progress {
    fn new(total: u64) -> Self {
        Self {
            total,
            step: (total / 10).max(1),
            done: AtomicU64::new(0),
        }
    }

    fn chunk_done(&self, chunk: u64) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("chunk {chunk} finished ({done}/{})", self.total);
        if done % self.step == 0 || done == self.total {
            info!("progress: {done}/{} chunks ({}%)", self.total, done * 100 / self.total);
        }
    }

    fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }
}

/// Convenience wrapper: validates `config` and builds its table.
pub fn build_table(config: &TableConfig) -> Result<ResidueTable, TableError> {
    TableBuilder::new(config.clone())?.build()
}
