//! Atomic persistence of residue tables.
//!
//! Tables are written as a JSON object `{"residue": exponent, ...}` to a
//! sibling `<name>.<pid>.<seq>.tmp` file, flushed, synced and renamed into place.  Readers
//! therefore see either no artifact, the previous artifact, or the complete
//! new one.  The bytes are hashed with BLAKE2b-256 on the way out so runs
//! can be compared without re-reading the file.

use crate::config::{CollisionPolicy, StorageMode};
use crate::ring::ResidueRing;
use crate::table::ResidueTable;
use crate::TableError;
use blake2::digest::{consts::U32, Digest};
use log::{debug, info};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-process counter keeping concurrent writers off each other's temp files.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

type Blake2b256 = blake2::Blake2b<U32>;

/// BLAKE2b-256 digest of a persisted artifact.
pub type ArtifactDigest = [u8; 32];

/// Outcome of a successful [`write_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenTable {
    /// Final location of the artifact.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes: u64,
    /// BLAKE2b-256 over exactly those bytes.
    pub digest: ArtifactDigest,
}

impl WrittenTable {
    /// Hex encoding of [`digest`](Self::digest).
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Writer adapter that hashes and counts everything passing through it.
struct HashingWriter<W> {
    inner: W,
    hasher: Blake2b256,
    bytes: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Blake2b256::new(),
            bytes: 0,
        }
    }

    fn finish(self) -> (W, u64, ArtifactDigest) {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&self.hasher.finalize());
        (self.inner, self.bytes, digest)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn temp_path(path: &Path) -> Result<PathBuf, TableError> {
    let name = path.file_name().ok_or_else(|| {
        TableError::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "output path has no file name"),
        )
    })?;
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut tmp: OsString = name.to_os_string();
    tmp.push(format!(".{}.{seq}.tmp", process::id()));
    Ok(path.with_file_name(tmp))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn encode_into(
    tmp: &Path,
    table: &ResidueTable,
    pretty: bool,
) -> Result<(u64, ArtifactDigest), TableError> {
    let file = File::create(tmp).map_err(|err| TableError::io(tmp, err))?;
    let mut writer = HashingWriter::new(BufWriter::new(file));
    let encoded = if pretty {
        serde_json::to_writer_pretty(&mut writer, table)
    } else {
        serde_json::to_writer(&mut writer, table)
    };
    encoded.map_err(|err| {
        if err.is_io() {
            TableError::io(tmp, io::Error::from(err))
        } else {
            TableError::Encode(err)
        }
    })?;
    writer.flush().map_err(|err| TableError::io(tmp, err))?;
    let (buffered, bytes, digest) = writer.finish();
    let file = buffered
        .into_inner()
        .map_err(|err| TableError::io(tmp, err.into_error()))?;
    file.sync_all().map_err(|err| TableError::io(tmp, err))?;
    Ok((bytes, digest))
}

/// Persists `table` at `path` atomically.
///
/// Parent directories are created as needed.  On any failure the temporary
/// file is removed and whatever was previously at `path` is left untouched.
pub fn write_table(
    path: &Path,
    table: &ResidueTable,
    pretty: bool,
) -> Result<WrittenTable, TableError> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir).map_err(|err| TableError::io(dir, err))?;
    let tmp = temp_path(path)?;
    debug!("encoding {} residues into {}", table.len(), tmp.display());

    let (bytes, digest) = match encode_into(&tmp, table, pretty) {
        Ok(done) => done,
        Err(err) => {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }
    };
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(TableError::io(path, err));
    }
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }

    let written = WrittenTable {
        path: path.to_path_buf(),
        bytes,
        digest,
    };
    info!(
        "wrote {} residues to {} ({} bytes, blake2b-256 {})",
        table.len(),
        path.display(),
        bytes,
        written.digest_hex()
    );
    Ok(written)
}

/// Loads a persisted table, checking every pair against `ring`.
pub fn read_table(
    path: &Path,
    ring: &ResidueRing,
    storage: StorageMode,
) -> Result<ResidueTable, TableError> {
    let file = File::open(path).map_err(|err| TableError::io(path, err))?;
    let pairs: BTreeMap<u64, u64> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| TableError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("decoded {} residues from {}", pairs.len(), path.display());
    ResidueTable::from_entries(ring, storage, CollisionPolicy::LastWins, pairs)
}

/// Computes the BLAKE2b-256 digest of the file at `path`.
pub fn file_digest(path: &Path) -> Result<ArtifactDigest, TableError> {
    let mut file = File::open(path).map_err(|err| TableError::io(path, err))?;
    let mut hasher = Blake2b256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|err| TableError::io(path, err))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    Ok(digest)
}
