//! # Run Ledger
//!
//! Tracks, per output slice, whether its construction completed, so that an
//! interrupted run leaves nothing the next run cannot identify and purge.
//!
//! ## States
//!
//! ```text
//! Planned ──begin()──▶ InFlight ──commit()──▶ Committed
//!    ▲                    │                       │
//!    └──── reset() ───────┴───────────────────────┘
//! ```
//!
//! A slice is marked `IN_FLIGHT` (and the ledger saved) before its write
//! starts and `COMMITTED` only after the store returned its digest. A slice
//! found `IN_FLIGHT` at startup is therefore possibly partial and is purged.
//!
//! In memory a checkpoint is a typestate, [`Checkpoint<S>`]: committing a
//! checkpoint that was never begun does not compile. On disk it is a
//! [`CheckpointRecord`] with a runtime [`CheckpointStatus`] whose
//! transitions are checked by [`CheckpointRecord::try_transition`].

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use regio_core::{CommodityId, ContentDigest, Namespace, Timestamp};

use crate::error::LedgerError;

/// File name of the ledger inside an output directory.
pub const LEDGER_FILE: &str = "regio-ledger.json";

// ─── State Types ─────────────────────────────────────────────────────

/// Checkpoint state: known to the run, nothing written.
#[derive(Debug, Clone, Copy)]
pub struct Planned;

/// Checkpoint state: write started, slice may be partial.
#[derive(Debug, Clone, Copy)]
pub struct InFlight;

/// Checkpoint state: slice fully written with a known digest.
#[derive(Debug, Clone, Copy)]
pub struct Committed;

mod private {
    pub trait Sealed {}
    impl Sealed for super::Planned {}
    impl Sealed for super::InFlight {}
    impl Sealed for super::Committed {}
}

/// Marker trait for checkpoint states.
pub trait CheckpointState: private::Sealed + std::fmt::Debug {
    /// The canonical state name.
    fn name() -> &'static str;
}

impl CheckpointState for Planned {
    fn name() -> &'static str {
        "PLANNED"
    }
}
impl CheckpointState for InFlight {
    fn name() -> &'static str {
        "IN_FLIGHT"
    }
}
impl CheckpointState for Committed {
    fn name() -> &'static str {
        "COMMITTED"
    }
}

// ─── Transition Record ───────────────────────────────────────────────

/// One state change of a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// State before.
    pub from_state: String,
    /// State after.
    pub to_state: String,
    /// When (UTC).
    pub timestamp: Timestamp,
    /// Digest of the slice, on commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<ContentDigest>,
    /// Why, for resets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ─── Typed Checkpoint ────────────────────────────────────────────────

/// A slice checkpoint, parameterized by its state.
#[derive(Debug)]
pub struct Checkpoint<S: CheckpointState> {
    /// Slice name in the store.
    pub slice: String,
    /// The commodity, for commodity slices.
    pub commodity: Option<CommodityId>,
    digest: Option<ContentDigest>,
    processes: usize,
    transition_log: Vec<TransitionRecord>,
    _state: PhantomData<S>,
}

impl<S: CheckpointState> Checkpoint<S> {
    /// The canonical state name.
    pub fn state_name(&self) -> &'static str {
        S::name()
    }

    /// The transition log.
    pub fn transition_log(&self) -> &[TransitionRecord] {
        &self.transition_log
    }

    fn transition_to<T: CheckpointState>(mut self, digest: Option<ContentDigest>, reason: Option<String>) -> Checkpoint<T> {
        self.transition_log.push(TransitionRecord {
            from_state: S::name().to_string(),
            to_state: T::name().to_string(),
            timestamp: Timestamp::now(),
            digest: digest.clone(),
            reason,
        });
        Checkpoint {
            slice: self.slice,
            commodity: self.commodity,
            digest: digest.or(self.digest),
            processes: self.processes,
            transition_log: self.transition_log,
            _state: PhantomData,
        }
    }
}

impl Checkpoint<Planned> {
    /// A fresh checkpoint for `slice`.
    pub fn new(slice: impl Into<String>, commodity: Option<CommodityId>) -> Self {
        Self {
            slice: slice.into(),
            commodity,
            digest: None,
            processes: 0,
            transition_log: Vec::new(),
            _state: PhantomData,
        }
    }

    /// Mark the write as started.
    pub fn begin(self) -> Checkpoint<InFlight> {
        self.transition_to(None, None)
    }
}

impl Checkpoint<InFlight> {
    /// Mark the write as complete.
    pub fn commit(mut self, digest: ContentDigest, processes: usize) -> Checkpoint<Committed> {
        self.processes = processes;
        self.transition_to(Some(digest), None)
    }
}

impl Checkpoint<Committed> {
    /// Digest of the committed slice.
    pub fn digest(&self) -> Option<&ContentDigest> {
        self.digest.as_ref()
    }

    /// Processes in the committed slice.
    pub fn processes(&self) -> usize {
        self.processes
    }
}

// ─── Runtime Record ──────────────────────────────────────────────────

/// Runtime checkpoint state, as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckpointStatus {
    /// Nothing written.
    Planned,
    /// Write started.
    InFlight,
    /// Fully written.
    Committed,
}

impl CheckpointStatus {
    /// The canonical state name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Planned => "PLANNED",
            Self::InFlight => "IN_FLIGHT",
            Self::Committed => "COMMITTED",
        }
    }
}

impl std::fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A persisted checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Slice name in the store.
    pub slice: String,
    /// The commodity, for commodity slices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commodity: Option<CommodityId>,
    /// Current state.
    pub status: CheckpointStatus,
    /// Digest of the committed slice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<ContentDigest>,
    /// Processes in the committed slice.
    #[serde(default)]
    pub processes: usize,
    /// All transitions.
    #[serde(default)]
    pub transition_log: Vec<TransitionRecord>,
}

impl CheckpointRecord {
    /// Attempt a transition with runtime validation.
    pub fn try_transition(&mut self, to: CheckpointStatus, reason: Option<String>) -> Result<(), LedgerError> {
        let valid = matches!(
            (self.status, to),
            (CheckpointStatus::Planned, CheckpointStatus::InFlight)
                | (CheckpointStatus::InFlight, CheckpointStatus::Committed)
                | (CheckpointStatus::Committed, CheckpointStatus::InFlight)
                | (CheckpointStatus::InFlight, CheckpointStatus::Planned)
                | (CheckpointStatus::Committed, CheckpointStatus::Planned)
        );
        if !valid {
            return Err(LedgerError::InvalidTransition {
                slice: self.slice.clone(),
                from: self.status.name().to_string(),
                to: to.name().to_string(),
            });
        }
        self.transition_log.push(TransitionRecord {
            from_state: self.status.name().to_string(),
            to_state: to.name().to_string(),
            timestamp: Timestamp::now(),
            digest: None,
            reason,
        });
        if to != CheckpointStatus::Committed {
            self.digest = None;
            self.processes = 0;
        }
        self.status = to;
        Ok(())
    }

    /// Whether the slice is committed with `digest`.
    pub fn is_committed_as(&self, digest: &ContentDigest) -> bool {
        self.status == CheckpointStatus::Committed && self.digest.as_ref() == Some(digest)
    }
}

/// Convert a typed checkpoint into its persisted record.
macro_rules! impl_into_record {
    ($state_type:ty, $status:ident) => {
        impl From<Checkpoint<$state_type>> for CheckpointRecord {
            fn from(c: Checkpoint<$state_type>) -> Self {
                CheckpointRecord {
                    slice: c.slice,
                    commodity: c.commodity,
                    status: CheckpointStatus::$status,
                    digest: c.digest,
                    processes: c.processes,
                    transition_log: c.transition_log,
                }
            }
        }
    };
}

impl_into_record!(Planned, Planned);
impl_into_record!(InFlight, InFlight);
impl_into_record!(Committed, Committed);

// ─── Ledger ──────────────────────────────────────────────────────────

/// Checkpoints of every slice of one namespace, optionally backed by a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLedger {
    #[serde(skip)]
    path: Option<PathBuf>,
    namespace: Namespace,
    checkpoints: BTreeMap<String, CheckpointRecord>,
}

impl RunLedger {
    /// A ledger that is never persisted.
    pub fn in_memory(namespace: Namespace) -> Self {
        Self {
            path: None,
            namespace,
            checkpoints: BTreeMap::new(),
        }
    }

    /// The ledger path inside an output directory.
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(LEDGER_FILE)
    }

    /// Read an existing ledger file.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let bytes = std::fs::read(path)?;
        let mut ledger: Self = serde_json::from_slice(&bytes)?;
        ledger.path = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), slices = ledger.checkpoints.len(), "loaded ledger");
        Ok(ledger)
    }

    /// Load the ledger at `path`, or start an empty one there. Fails if the
    /// file belongs to another namespace.
    pub fn open(path: &Path, namespace: &Namespace) -> Result<Self, LedgerError> {
        if !path.exists() {
            return Ok(Self {
                path: Some(path.to_path_buf()),
                ..Self::in_memory(namespace.clone())
            });
        }
        let ledger = Self::load(path)?;
        if &ledger.namespace != namespace {
            return Err(LedgerError::NamespaceMismatch {
                expected: namespace.to_string(),
                found: ledger.namespace.to_string(),
            });
        }
        Ok(ledger)
    }

    /// Persist the ledger. Writes a temporary file and renames it into place.
    pub fn save(&self) -> Result<(), LedgerError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// The namespace this ledger tracks.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The record of `slice`.
    pub fn get(&self, slice: &str) -> Option<&CheckpointRecord> {
        self.checkpoints.get(slice)
    }

    /// All records in slice order.
    pub fn entries(&self) -> impl Iterator<Item = &CheckpointRecord> {
        self.checkpoints.values()
    }

    /// Slices whose write may be partial.
    pub fn in_flight(&self) -> impl Iterator<Item = &CheckpointRecord> {
        self.entries()
            .filter(|r| r.status == CheckpointStatus::InFlight)
    }

    /// Fully written slices.
    pub fn committed(&self) -> impl Iterator<Item = &CheckpointRecord> {
        self.entries()
            .filter(|r| r.status == CheckpointStatus::Committed)
    }

    /// Mark `slice` in flight and save, before its write starts.
    pub fn begin(&mut self, slice: &str, commodity: Option<CommodityId>) -> Result<Checkpoint<InFlight>, LedgerError> {
        let checkpoint = match self.checkpoints.remove(slice) {
            None => Checkpoint::new(slice, commodity).begin(),
            Some(mut record) => {
                if let Err(error) = record.try_transition(CheckpointStatus::InFlight, None) {
                    self.checkpoints.insert(slice.to_string(), record);
                    return Err(error);
                }
                Checkpoint {
                    slice: record.slice,
                    commodity: commodity.or(record.commodity),
                    digest: None,
                    processes: 0,
                    transition_log: record.transition_log,
                    _state: PhantomData,
                }
            }
        };
        let record = CheckpointRecord {
            slice: checkpoint.slice.clone(),
            commodity: checkpoint.commodity.clone(),
            status: CheckpointStatus::InFlight,
            digest: None,
            processes: 0,
            transition_log: checkpoint.transition_log.clone(),
        };
        self.checkpoints.insert(slice.to_string(), record);
        self.save()?;
        Ok(checkpoint)
    }

    /// Record a committed slice and save.
    pub fn commit(&mut self, checkpoint: Checkpoint<Committed>) -> Result<(), LedgerError> {
        let current = self.checkpoints.get(&checkpoint.slice).map(|r| r.status);
        if current != Some(CheckpointStatus::InFlight) {
            return Err(LedgerError::InvalidTransition {
                slice: checkpoint.slice.clone(),
                from: current.map_or("ABSENT", |s| s.name()).to_string(),
                to: CheckpointStatus::Committed.name().to_string(),
            });
        }
        let record = CheckpointRecord::from(checkpoint);
        tracing::debug!(slice = %record.slice, processes = record.processes, "slice committed");
        self.checkpoints.insert(record.slice.clone(), record);
        self.save()
    }

    /// Return `slice` to `PLANNED` after its data was purged. Returns
    /// whether anything changed.
    pub fn reset(&mut self, slice: &str, reason: &str) -> Result<bool, LedgerError> {
        let Some(record) = self.checkpoints.get_mut(slice) else {
            return Ok(false);
        };
        if record.status == CheckpointStatus::Planned {
            return Ok(false);
        }
        record.try_transition(CheckpointStatus::Planned, Some(reason.to_string()))?;
        self.save()?;
        Ok(true)
    }

    /// Forget `slice` entirely.
    pub fn remove(&mut self, slice: &str) -> Result<Option<CheckpointRecord>, LedgerError> {
        let removed = self.checkpoints.remove(slice);
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regio_core::DigestAlgorithm;

    fn digest(byte: u8) -> ContentDigest {
        ContentDigest::new(DigestAlgorithm::Sha256, &[byte; 32])
    }

    fn steel() -> Option<CommodityId> {
        Some(CommodityId::new("steel").unwrap())
    }

    // ── Typestate ────────────────────────────────────────────────────

    #[test]
    fn test_typestate_lifecycle() {
        let planned = Checkpoint::new("steel", steel());
        assert_eq!(planned.state_name(), "PLANNED");
        let in_flight = planned.begin();
        assert_eq!(in_flight.state_name(), "IN_FLIGHT");
        let committed = in_flight.commit(digest(1), 12);
        assert_eq!(committed.state_name(), "COMMITTED");
        assert_eq!(committed.digest(), Some(&digest(1)));
        assert_eq!(committed.processes(), 12);
        assert_eq!(committed.transition_log().len(), 2);
        assert_eq!(committed.transition_log()[1].from_state, "IN_FLIGHT");

        let record = CheckpointRecord::from(committed);
        assert_eq!(record.status, CheckpointStatus::Committed);
        assert!(record.is_committed_as(&digest(1)));
        assert!(!record.is_committed_as(&digest(2)));
    }

    // ── Runtime transitions ──────────────────────────────────────────

    #[test]
    fn test_try_transition_rejects_planned_to_committed() {
        let mut record = CheckpointRecord::from(Checkpoint::new("steel", steel()));
        let err = record
            .try_transition(CheckpointStatus::Committed, None)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
        assert_eq!(record.status, CheckpointStatus::Planned);
        assert!(record.transition_log.is_empty());
    }

    #[test]
    fn test_reset_clears_digest() {
        let mut record = CheckpointRecord::from(Checkpoint::new("steel", steel()).begin().commit(digest(1), 3));
        record
            .try_transition(CheckpointStatus::Planned, Some("digest mismatch".into()))
            .unwrap();
        assert_eq!(record.digest, None);
        assert_eq!(record.processes, 0);
        assert_eq!(record.transition_log.last().unwrap().reason.as_deref(), Some("digest mismatch"));
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&CheckpointStatus::InFlight).unwrap(),
            "\"IN_FLIGHT\""
        );
    }

    // ── Ledger ───────────────────────────────────────────────────────

    #[test]
    fn test_begin_commit_and_rebegin() {
        let mut ledger = RunLedger::in_memory(Namespace::default());
        let checkpoint = ledger.begin("steel", steel()).unwrap();
        assert_eq!(ledger.in_flight().count(), 1);
        ledger.commit(checkpoint.commit(digest(1), 4)).unwrap();
        assert_eq!(ledger.committed().count(), 1);
        assert_eq!(ledger.in_flight().count(), 0);

        // Rebuilding a committed slice goes back in flight.
        let again = ledger.begin("steel", None).unwrap();
        assert_eq!(again.commodity, steel());
        assert_eq!(ledger.get("steel").unwrap().status, CheckpointStatus::InFlight);
        assert_eq!(ledger.get("steel").unwrap().transition_log.len(), 3);
    }

    #[test]
    fn test_begin_twice_is_rejected() {
        let mut ledger = RunLedger::in_memory(Namespace::default());
        let _first = ledger.begin("steel", steel()).unwrap();
        assert!(ledger.begin("steel", steel()).is_err());
        assert_eq!(ledger.get("steel").unwrap().status, CheckpointStatus::InFlight);
    }

    #[test]
    fn test_commit_without_begin_is_rejected() {
        let mut ledger = RunLedger::in_memory(Namespace::default());
        let stray = Checkpoint::new("steel", steel()).begin().commit(digest(1), 1);
        assert!(ledger.commit(stray).is_err());
    }

    #[test]
    fn test_reset_and_remove() {
        let mut ledger = RunLedger::in_memory(Namespace::default());
        let _ = ledger.begin("steel", steel()).unwrap();
        assert!(ledger.reset("steel", "purged").unwrap());
        assert!(!ledger.reset("steel", "purged").unwrap());
        assert!(!ledger.reset("copper", "purged").unwrap());
        assert!(ledger.remove("steel").unwrap().is_some());
        assert!(ledger.get("steel").is_none());
    }

    #[test]
    fn test_file_round_trip_and_namespace_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = RunLedger::path_in(dir.path());
        let namespace = Namespace::default();

        let mut ledger = RunLedger::open(&path, &namespace).unwrap();
        assert!(!path.exists());
        let checkpoint = ledger.begin("steel", steel()).unwrap();
        assert!(path.exists());
        ledger.commit(checkpoint.commit(digest(7), 2)).unwrap();

        let reloaded = RunLedger::open(&path, &namespace).unwrap();
        assert!(reloaded.get("steel").unwrap().is_committed_as(&digest(7)));
        assert_eq!(reloaded.path(), Some(path.as_path()));

        let other = Namespace::new("other").unwrap();
        let err = RunLedger::open(&path, &other).unwrap_err();
        assert!(matches!(err, LedgerError::NamespaceMismatch { .. }));
    }

    #[test]
    fn test_corrupt_ledger_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = RunLedger::path_in(dir.path());
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(RunLedger::load(&path), Err(LedgerError::Json(_))));
    }
}
