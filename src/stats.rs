//! Run statistics folded from per-tick preemption reports

use log::info;

use crate::preemption::{SignalCommand, SkipReason, TickReport};

/// Counters for one controller run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub ticks: u64,
    /// Emergency vehicles seen, summed over ticks
    pub emergency_sightings: u64,
    pub extensions: u64,
    pub forced_transitions: u64,
    pub releases: u64,
    /// Largest number of intersections preempted in a single tick
    pub peak_active: usize,
    pub skipped_unresolved_direction: u64,
    pub skipped_no_signal: u64,
    pub skipped_unmapped: u64,
    /// The run hit its tick limit with vehicles still expected
    pub truncated: bool,
}

impl RunStats {
    /// Fold one tick's report into the totals
    pub fn record(&mut self, report: &TickReport) {
        self.emergency_sightings += report.emergency_vehicles as u64;
        self.releases += report.released.len() as u64;
        self.peak_active = self.peak_active.max(report.active.len());

        for command in &report.commands {
            match command {
                SignalCommand::Extend { .. } => self.extensions += 1,
                SignalCommand::ForceTransition { .. } => self.forced_transitions += 1,
            }
        }

        for (_, reason) in &report.skipped {
            match reason {
                SkipReason::UnresolvedDirection { .. } => self.skipped_unresolved_direction += 1,
                SkipReason::NoUpcomingSignal => self.skipped_no_signal += 1,
                SkipReason::UnmappedPhasePolicy { .. } => self.skipped_unmapped += 1,
            }
        }
    }

    pub fn commands_issued(&self) -> u64 {
        self.extensions + self.forced_transitions
    }

    /// Log the end-of-run summary
    pub fn log_summary(&self) {
        info!("=== SIMULATION COMPLETE ===");
        info!("Ticks: {}", self.ticks);
        if self.truncated {
            info!("Stopped at tick limit with vehicles remaining");
        }
        info!("Emergency sightings: {}", self.emergency_sightings);
        info!("Phase extensions: {}", self.extensions);
        info!("Forced transitions: {}", self.forced_transitions);
        info!("Signals released: {}", self.releases);
        info!("Peak preempted intersections: {}", self.peak_active);
        info!(
            "Skipped: {} unresolved direction, {} no upcoming signal, {} unmapped",
            self.skipped_unresolved_direction, self.skipped_no_signal, self.skipped_unmapped
        );
    }
}
