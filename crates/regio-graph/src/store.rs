//! # Slice Store
//!
//! The destination for generated processes. Output is written in slices,
//! one per commodity plus one for rewired consumers, keyed by
//! `(namespace, slice)`. A slice is either fully present or absent: the
//! directory store writes to a temporary file and renames it into place.
//!
//! Every write returns the slice's [`ContentDigest`], computed over the
//! canonical bytes of its processes in identity order, so a later run can
//! tell whether what is on disk is what the ledger committed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use regio_core::{sha256_digest, CanonicalBytes, ContentDigest, Namespace};

use crate::error::StoreError;
use crate::model::Process;

const SLICE_EXTENSION: &str = "json";

/// Compute the digest of a slice independent of the order it was given in.
pub fn slice_digest(processes: &[Process]) -> Result<ContentDigest, StoreError> {
    let mut ordered: Vec<&Process> = processes.iter().collect();
    ordered.sort_by_key(|p| p.id);
    let bytes = CanonicalBytes::new(&ordered)?;
    Ok(sha256_digest(&bytes))
}

/// A bulk-write destination for finished graph slices.
pub trait ProcessStore: Send + Sync {
    /// Replace the slice with `processes` and return its digest.
    fn write_slice(
        &self,
        namespace: &Namespace,
        slice: &str,
        processes: &[Process],
    ) -> Result<ContentDigest, StoreError>;

    /// Read a slice back, or `None` if it does not exist.
    fn read_slice(&self, namespace: &Namespace, slice: &str) -> Result<Option<Vec<Process>>, StoreError>;

    /// Remove a slice. Returns whether anything was removed.
    fn delete_slice(&self, namespace: &Namespace, slice: &str) -> Result<bool, StoreError>;

    /// Names of all slices in the namespace, sorted.
    fn slices(&self, namespace: &Namespace) -> Result<Vec<String>, StoreError>;

    /// Digest of the stored slice, or `None` if it does not exist.
    fn stored_digest(&self, namespace: &Namespace, slice: &str) -> Result<Option<ContentDigest>, StoreError> {
        self.read_slice(namespace, slice)?
            .map(|processes| slice_digest(&processes))
            .transpose()
    }
}

fn validate_component(name: &str) -> Result<(), StoreError> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(|c| matches!(c, '/' | '\\' | '\0'))
        || name.contains("..");
    if bad {
        Err(StoreError::InvalidSliceName(name.to_string()))
    } else {
        Ok(())
    }
}

// ─── In-memory store ─────────────────────────────────────────────────

/// A store that keeps slices in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slices: RwLock<BTreeMap<(Namespace, String), Vec<Process>>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored processes across all slices.
    pub fn process_count(&self) -> usize {
        self.slices.read().values().map(Vec::len).sum()
    }
}

impl ProcessStore for MemoryStore {
    fn write_slice(
        &self,
        namespace: &Namespace,
        slice: &str,
        processes: &[Process],
    ) -> Result<ContentDigest, StoreError> {
        validate_component(slice)?;
        let digest = slice_digest(processes)?;
        self.slices
            .write()
            .insert((namespace.clone(), slice.to_string()), processes.to_vec());
        Ok(digest)
    }

    fn read_slice(&self, namespace: &Namespace, slice: &str) -> Result<Option<Vec<Process>>, StoreError> {
        Ok(self
            .slices
            .read()
            .get(&(namespace.clone(), slice.to_string()))
            .cloned())
    }

    fn delete_slice(&self, namespace: &Namespace, slice: &str) -> Result<bool, StoreError> {
        Ok(self
            .slices
            .write()
            .remove(&(namespace.clone(), slice.to_string()))
            .is_some())
    }

    fn slices(&self, namespace: &Namespace) -> Result<Vec<String>, StoreError> {
        Ok(self
            .slices
            .read()
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, slice)| slice.clone())
            .collect())
    }
}

// ─── JSON directory store ────────────────────────────────────────────

/// A store that writes each slice as `<root>/<namespace>/<slice>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// A store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &Namespace) -> Result<PathBuf, StoreError> {
        validate_component(namespace.as_str())?;
        Ok(self.root.join(namespace.as_str()))
    }

    fn slice_path(&self, namespace: &Namespace, slice: &str) -> Result<PathBuf, StoreError> {
        validate_component(slice)?;
        Ok(self
            .namespace_dir(namespace)?
            .join(format!("{slice}.{SLICE_EXTENSION}")))
    }
}

impl ProcessStore for JsonDirStore {
    fn write_slice(
        &self,
        namespace: &Namespace,
        slice: &str,
        processes: &[Process],
    ) -> Result<ContentDigest, StoreError> {
        let path = self.slice_path(namespace, slice)?;
        std::fs::create_dir_all(self.namespace_dir(namespace)?)?;
        let digest = slice_digest(processes)?;

        let tmp = path.with_extension(format!("{SLICE_EXTENSION}.partial"));
        std::fs::write(&tmp, serde_json::to_vec_pretty(processes)?)?;
        std::fs::rename(&tmp, &path)?;

        tracing::debug!(
            slice,
            processes = processes.len(),
            digest = %digest,
            "wrote slice"
        );
        Ok(digest)
    }

    fn read_slice(&self, namespace: &Namespace, slice: &str) -> Result<Option<Vec<Process>>, StoreError> {
        let path = self.slice_path(namespace, slice)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_slice(&self, namespace: &Namespace, slice: &str) -> Result<bool, StoreError> {
        let path = self.slice_path(namespace, slice)?;
        let partial = path.with_extension(format!("{SLICE_EXTENSION}.partial"));
        if partial.exists() {
            std::fs::remove_file(&partial)?;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn slices(&self, namespace: &Namespace) -> Result<Vec<String>, StoreError> {
        let dir = self.namespace_dir(namespace)?;
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(SLICE_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
