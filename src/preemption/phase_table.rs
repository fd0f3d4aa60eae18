//! Static mapping from (intersection, direction) to the phase that gives
//! that direction its green.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::types::{Direction, TlsId};

/// Per-intersection entry of the phase table file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhasePolicy {
    pub north_south: Option<usize>,
    pub east_west: Option<usize>,
}

/// Desired phase index for each configured (intersection, direction) pair.
///
/// Immutable once built. A missing pair means no preemption policy exists
/// there, which the engine treats as a normal skip.
#[derive(Debug, Clone, Default)]
pub struct DesiredPhaseTable {
    phases: HashMap<(TlsId, Direction), usize>,
}

impl DesiredPhaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table for the two-junction demo network: Node2 and Node5 give
    /// east-west traffic phase 0 and north-south traffic phase 2.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for tls in ["Node2", "Node5"] {
            table = table
                .with(TlsId::new(tls), Direction::EastWest, 0)
                .with(TlsId::new(tls), Direction::NorthSouth, 2);
        }
        table
    }

    /// Builder-style insert
    pub fn with(mut self, tls_id: TlsId, direction: Direction, phase: usize) -> Self {
        self.phases.insert((tls_id, direction), phase);
        self
    }

    /// Build a table from parsed per-intersection policies
    pub fn from_policies(policies: BTreeMap<String, PhasePolicy>) -> Result<Self> {
        let mut table = Self::new();
        for (tls, policy) in policies {
            if let Some(phase) = policy.north_south {
                table = table.with(TlsId::new(tls.clone()), Direction::NorthSouth, phase);
            }
            if let Some(phase) = policy.east_west {
                table = table.with(TlsId::new(tls.clone()), Direction::EastWest, phase);
            }
        }

        if table.is_empty() {
            anyhow::bail!("Phase table does not configure any intersection");
        }

        Ok(table)
    }

    /// Parse a JSON document of the form
    /// `{"Node2": {"north_south": 2, "east_west": 0}}`
    pub fn from_json(json: &str) -> Result<Self> {
        let policies: BTreeMap<String, PhasePolicy> =
            serde_json::from_str(json).context("Invalid phase table JSON")?;
        Self::from_policies(policies)
    }

    /// Load a JSON phase table from disk
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read phase table {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Failed to load {}", path.display()))
    }

    /// Phase to enforce for a vehicle travelling in `direction` towards `tls_id`
    pub fn desired_phase(&self, tls_id: &TlsId, direction: Direction) -> Option<usize> {
        self.phases.get(&(tls_id.clone(), direction)).copied()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}
