//! # Process Graph Arena
//!
//! [`ProcessGraph`] owns every process node, keyed by stable identity.
//! Passes never mutate a shared graph in place: each one returns a
//! [`GraphDelta`] of new and replacement nodes, which the pipeline applies
//! once the pass is complete. Iteration order is identity order, so two runs
//! over the same input visit processes identically.

use std::collections::BTreeMap;

use regio_core::{Geography, ProcessId};

use crate::error::GraphError;
use crate::model::Process;

/// An arena of processes keyed by identity.
#[derive(Debug, Clone, Default)]
pub struct ProcessGraph {
    nodes: BTreeMap<ProcessId, Process>,
}

impl ProcessGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from processes, validating each and rejecting
    /// duplicate identities.
    pub fn from_processes(processes: impl IntoIterator<Item = Process>) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for process in processes {
            graph.insert(process)?;
        }
        Ok(graph)
    }

    /// Insert a new process.
    pub fn insert(&mut self, process: Process) -> Result<(), GraphError> {
        process.validate()?;
        if self.nodes.contains_key(&process.id) {
            return Err(GraphError::DuplicateProcess(process.id));
        }
        self.nodes.insert(process.id, process);
        Ok(())
    }

    /// Look up a process by identity.
    pub fn get(&self, id: &ProcessId) -> Option<&Process> {
        self.nodes.get(id)
    }

    /// Whether a process with this identity exists.
    pub fn contains(&self, id: &ProcessId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of processes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All processes in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.nodes.values()
    }

    /// All processes located in `geography`.
    pub fn processes_in<'a>(&'a self, geography: &'a Geography) -> impl Iterator<Item = &'a Process> {
        self.nodes.values().filter(move |p| &p.geography == geography)
    }

    /// Total number of exchanges across all processes.
    pub fn exchange_count(&self) -> usize {
        self.nodes.values().map(|p| p.exchanges.len()).sum()
    }

    /// Apply a delta. Additions must be new identities; replacements must
    /// target existing ones. The graph is unchanged if any check fails.
    pub fn apply(&mut self, delta: GraphDelta) -> Result<(), GraphError> {
        for id in delta.added.keys() {
            if self.nodes.contains_key(id) {
                return Err(GraphError::DuplicateProcess(*id));
            }
        }
        for id in delta.replaced.keys() {
            if !self.nodes.contains_key(id) {
                return Err(GraphError::UnknownProcess(*id));
            }
        }
        for process in delta.added.values().chain(delta.replaced.values()) {
            process.validate()?;
        }
        self.nodes.extend(delta.added);
        self.nodes.extend(delta.replaced);
        Ok(())
    }

    /// Consume the graph, yielding processes in identity order.
    pub fn into_processes(self) -> impl Iterator<Item = Process> {
        self.nodes.into_values()
    }
}

/// The output of one pass: processes to add and processes to replace.
#[derive(Debug, Clone, Default)]
pub struct GraphDelta {
    added: BTreeMap<ProcessId, Process>,
    replaced: BTreeMap<ProcessId, Process>,
}

impl GraphDelta {
    /// An empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a new process.
    pub fn add(&mut self, process: Process) -> Result<(), GraphError> {
        if self.added.contains_key(&process.id) || self.replaced.contains_key(&process.id) {
            return Err(GraphError::DuplicateProcess(process.id));
        }
        self.added.insert(process.id, process);
        Ok(())
    }

    /// Stage a replacement for an existing process. A later replacement of
    /// the same identity overwrites an earlier one.
    pub fn replace(&mut self, process: Process) {
        self.replaced.insert(process.id, process);
    }

    /// Look up a staged process, preferring additions.
    pub fn get(&self, id: &ProcessId) -> Option<&Process> {
        self.added.get(id).or_else(|| self.replaced.get(id))
    }

    /// Mutable access to a staged addition.
    pub fn get_added_mut(&mut self, id: &ProcessId) -> Option<&mut Process> {
        self.added.get_mut(id)
    }

    /// Staged additions in identity order.
    pub fn added(&self) -> impl Iterator<Item = &Process> {
        self.added.values()
    }

    /// Staged replacements in identity order.
    pub fn replaced(&self) -> impl Iterator<Item = &Process> {
        self.replaced.values()
    }

    /// All staged processes, additions first.
    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.added.values().chain(self.replaced.values())
    }

    /// Number of staged processes.
    pub fn len(&self) -> usize {
        self.added.len() + self.replaced.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.replaced.is_empty()
    }

    /// Fold another delta into this one. Additions must not collide.
    pub fn merge(&mut self, other: GraphDelta) -> Result<(), GraphError> {
        for process in other.added.into_values() {
            self.add(process)?;
        }
        for process in other.replaced.into_values() {
            self.replace(process);
        }
        Ok(())
    }
}
