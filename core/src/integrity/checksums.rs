use crate::error::CoreResult;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub const CHECKSUMS_DIR: &str = "checksums";

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

/// Sidecar store of per-file content digests, kept in a `checksums/`
/// directory next to the metadata file.
///
/// The stored digest reflects the first time this tool observed the file:
/// [`ChecksumStore::record_if_absent`] never overwrites an existing sidecar.
/// A regenerated or tampered metadata file therefore cannot make a modified
/// output look untouched; later `verify` calls compare against the original
/// baseline.
pub struct ChecksumStore {
    dir: PathBuf,
}

impl ChecksumStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted beside the given metadata file.
    pub fn for_metadata(metadata_path: &Path) -> Self {
        let parent = metadata_path.parent().unwrap_or_else(|| Path::new("."));
        Self::new(parent.join(CHECKSUMS_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn sidecar_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.txt"))
    }

    /// Record the digest of `bytes` under `name` unless a sidecar already
    /// exists. Idempotent: the first recorded digest is the baseline.
    pub fn record_if_absent(&self, name: &str, bytes: &[u8]) -> CoreResult<()> {
        let path = self.sidecar_path(name);
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, sha256_hex(bytes))?;
        Ok(())
    }

    /// Compare `actual_bytes` against the stored baseline.
    ///
    /// Returns `(None, false)` when no sidecar exists; the digest is never
    /// computed freshly in that case, so an unrecorded file can never appear
    /// valid.
    pub fn verify(&self, name: &str, actual_bytes: &[u8]) -> CoreResult<(Option<String>, bool)> {
        let path = self.sidecar_path(name);
        if !path.exists() {
            return Ok((None, false));
        }
        let stored = fs::read_to_string(path)?;
        let valid = stored == sha256_hex(actual_bytes);
        Ok((Some(stored), valid))
    }
}
