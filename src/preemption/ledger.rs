//! Bookkeeping of the phase currently enforced at each preempted intersection

use std::collections::{BTreeMap, BTreeSet};

use super::types::TlsId;

/// Phase index being enforced per intersection.
///
/// An entry exists iff a preemption command was issued for that intersection
/// and has not been reset yet. Each simulation run owns its own ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideLedger {
    entries: BTreeMap<TlsId, usize>,
}

impl OverrideLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tls_id: &TlsId) -> Option<usize> {
        self.entries.get(tls_id).copied()
    }

    /// Record (or overwrite) the enforced phase for an intersection
    pub fn set(&mut self, tls_id: TlsId, phase: usize) {
        self.entries.insert(tls_id, phase);
    }

    pub fn remove(&mut self, tls_id: &TlsId) -> Option<usize> {
        self.entries.remove(tls_id)
    }

    pub fn active_ids(&self) -> BTreeSet<TlsId> {
        self.entries.keys().cloned().collect()
    }

    /// Drop every entry whose intersection is not in `active`.
    /// Returns the released intersections in id order.
    pub fn reconcile(&mut self, active: &BTreeSet<TlsId>) -> Vec<TlsId> {
        let stale: Vec<TlsId> = self
            .entries
            .keys()
            .filter(|id| !active.contains(*id))
            .cloned()
            .collect();

        for id in &stale {
            self.entries.remove(id);
        }

        stale
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TlsId, usize)> {
        self.entries.iter().map(|(id, phase)| (id, *phase))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(TlsId, usize)> for OverrideLedger {
    fn from_iter<I: IntoIterator<Item = (TlsId, usize)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
