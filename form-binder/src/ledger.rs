//! Validation ledger
//!
//! Tracks every validation currently in flight, keyed by node identity and
//! validator identity. Holding at most one entry per pair is what lets the
//! binder join an outstanding run instead of starting another, and the ledger
//! running empty is what ends the binder's `validating` state.

use std::fmt;

use indexmap::IndexMap;

use crate::model::ModelPath;
use crate::validation::PendingValidation;
use crate::validation::ValidatorKey;

/// Identity of one registration of a node.
///
/// A node deleted and registered again at the same path gets a new
/// generation, so runs scheduled for the old node never touch the new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct NodeKey {
    pub(crate) path: ModelPath,
    pub(crate) generation: u64,
}

impl NodeKey {
    pub(crate) fn new(path: ModelPath, generation: u64) -> Self {
        Self { path, generation }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'#{}", self.path, self.generation)
    }
}

#[derive(Debug, Default)]
pub(crate) struct ValidationLedger {
    entries: IndexMap<NodeKey, IndexMap<ValidatorKey, PendingValidation>>,
}

impl ValidationLedger {
    pub(crate) fn get(&self, node: &NodeKey, key: ValidatorKey) -> Option<&PendingValidation> {
        self.entries.get(node)?.get(&key)
    }

    /// Records a new in-flight validation.
    ///
    /// Callers check [`get`](Self::get) first; an existing entry for the pair
    /// is replaced and logged.
    pub(crate) fn insert(&mut self, node: NodeKey, key: ValidatorKey, pending: PendingValidation) {
        let validations = self.entries.entry(node).or_default();
        if validations.insert(key, pending).is_some() {
            log::error!("Replaced an in-flight validation; its result will be lost");
        }
    }

    /// Removes a settled validation. Returns `true` if it was present.
    pub(crate) fn complete(&mut self, node: &NodeKey, key: ValidatorKey) -> bool {
        let Some(validations) = self.entries.get_mut(node) else {
            return false;
        };
        let removed = validations.shift_remove(&key).is_some();
        if validations.is_empty() {
            self.entries.shift_remove(node);
        }
        removed
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of in-flight validations across all nodes.
    pub(crate) fn len(&self) -> usize {
        self.entries.values().map(IndexMap::len).sum()
    }

    /// Handles to every validation in flight, in request order per node.
    pub(crate) fn pending(&self) -> Vec<PendingValidation> {
        self.entries
            .values()
            .flat_map(|validations| validations.values().cloned())
            .collect()
    }
}
