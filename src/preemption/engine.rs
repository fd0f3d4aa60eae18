//! Per-tick emergency-vehicle preemption
//!
//! Once per simulation tick the engine looks at every emergency vehicle,
//! works out which intersection it is approaching and which phase would
//! give it a green, and then either extends the current green or cuts the
//! current phase short so the signal program moves on. Intersections that no
//! longer have an approaching emergency vehicle are handed back to their
//! normal program.

use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::BTreeSet;

use super::direction::{DirectionClassifier, EdgeNameClassifier};
use super::ledger::OverrideLedger;
use super::phase_table::DesiredPhaseTable;
use super::resolver::upcoming_signal;
use super::types::{Direction, TlsId, VehicleId, EMERGENCY_TYPE};
use crate::simulator::TrafficSimulator;

/// Minimum green time guaranteed when extending, in seconds
pub const DEFAULT_MIN_GREEN: f64 = 20.0;

/// Time added to an already-desired phase, in seconds
pub const DEFAULT_EXTENSION: f64 = 10.0;

/// Remaining duration used to force the signal to move on, in seconds
pub const DEFAULT_FORCED_TRANSITION: f64 = 0.1;

/// Durations used by the extend/shorten decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreemptionTiming {
    pub min_green: f64,
    pub extension: f64,
    pub forced_transition: f64,
}

impl Default for PreemptionTiming {
    fn default() -> Self {
        Self {
            min_green: DEFAULT_MIN_GREEN,
            extension: DEFAULT_EXTENSION,
            forced_transition: DEFAULT_FORCED_TRANSITION,
        }
    }
}

impl PreemptionTiming {
    /// New duration for a phase that already serves the emergency vehicle
    pub fn extended_duration(&self, current: f64) -> f64 {
        self.min_green.max(current + self.extension)
    }
}

/// A duration command issued to an intersection
#[derive(Debug, Clone, PartialEq)]
pub enum SignalCommand {
    /// The desired phase is already active and was lengthened
    Extend {
        tls_id: TlsId,
        phase: usize,
        duration: f64,
    },
    /// The active phase was cut short so the program advances
    ForceTransition {
        tls_id: TlsId,
        current_phase: usize,
        desired_phase: usize,
        duration: f64,
    },
}

impl SignalCommand {
    pub fn tls_id(&self) -> &TlsId {
        match self {
            SignalCommand::Extend { tls_id, .. } => tls_id,
            SignalCommand::ForceTransition { tls_id, .. } => tls_id,
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            SignalCommand::Extend { duration, .. } => *duration,
            SignalCommand::ForceTransition { duration, .. } => *duration,
        }
    }
}

/// Why an emergency vehicle did not take part in preemption this tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The road name matches neither direction convention
    UnresolvedDirection { road_id: String },
    /// Nothing signalized is left on the vehicle's route
    NoUpcomingSignal,
    /// No desired phase is configured for this approach
    UnmappedPhasePolicy { tls_id: TlsId, direction: Direction },
}

/// Everything that happened during one call to [`PreemptionEngine::process_tick`]
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Tick counter to pass to the next call
    pub next_tick: u64,
    /// Intersections with an approaching emergency vehicle this tick
    pub active: BTreeSet<TlsId>,
    pub commands: Vec<SignalCommand>,
    /// Intersections handed back to their normal program
    pub released: Vec<TlsId>,
    pub skipped: Vec<(VehicleId, SkipReason)>,
    /// Emergency vehicles seen this tick
    pub emergency_vehicles: usize,
}

/// Preemption state machine for one simulation run
pub struct PreemptionEngine {
    classifier: Box<dyn DirectionClassifier>,
    phase_table: DesiredPhaseTable,
    ledger: OverrideLedger,
    timing: PreemptionTiming,
}

impl PreemptionEngine {
    /// Engine with the default road-name classifier and timing
    pub fn new(phase_table: DesiredPhaseTable) -> Self {
        Self {
            classifier: Box::new(EdgeNameClassifier::default()),
            phase_table,
            ledger: OverrideLedger::new(),
            timing: PreemptionTiming::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: impl DirectionClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn with_timing(mut self, timing: PreemptionTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Start from an existing ledger instead of an empty one
    pub fn with_ledger(mut self, ledger: OverrideLedger) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn ledger(&self) -> &OverrideLedger {
        &self.ledger
    }

    /// Run one preemption pass against the simulator's current state.
    ///
    /// Must be called after the simulator has advanced to `tick` and before
    /// it advances again. Errors are simulator boundary failures and are
    /// fatal for the run; per-vehicle problems are reported as skips.
    pub fn process_tick<S>(&mut self, sim: &mut S, tick: u64) -> Result<TickReport>
    where
        S: TrafficSimulator + ?Sized,
    {
        let mut report = TickReport::default();

        let emergency_vehicles = self.emergency_vehicles(sim)?;
        report.emergency_vehicles = emergency_vehicles.len();

        for vehicle in emergency_vehicles {
            if let Err(reason) = self.process_vehicle(sim, &vehicle, &mut report)? {
                debug!("Skipping {} this tick: {:?}", vehicle, reason);
                report.skipped.push((vehicle, reason));
            }
        }

        // Hand intersections nobody is approaching back to their program
        report.released = self.ledger.reconcile(&report.active);
        for tls_id in &report.released {
            info!("Resetting traffic light {} to normal operation", tls_id);
        }

        report.next_tick = tick + 1;
        Ok(report)
    }

    /// Vehicles tagged as emergency, in simulator order
    fn emergency_vehicles<S>(&self, sim: &mut S) -> Result<Vec<VehicleId>>
    where
        S: TrafficSimulator + ?Sized,
    {
        let mut emergency = Vec::new();
        for vehicle in sim.vehicle_ids().context("vehicle.getIDList()")? {
            let type_id = sim
                .vehicle_type(&vehicle)
                .with_context(|| format!("vehicle.getTypeID({vehicle})"))?;
            if type_id == EMERGENCY_TYPE {
                emergency.push(vehicle);
            }
        }
        Ok(emergency)
    }

    /// Handle a single emergency vehicle. The outer error is fatal; the inner
    /// one is a skip.
    fn process_vehicle<S>(
        &mut self,
        sim: &mut S,
        vehicle: &VehicleId,
        report: &mut TickReport,
    ) -> Result<std::result::Result<(), SkipReason>>
    where
        S: TrafficSimulator + ?Sized,
    {
        let road_id = sim
            .vehicle_road(vehicle)
            .with_context(|| format!("vehicle.getRoadID({vehicle})"))?;

        let direction = self.classifier.classify(&road_id);
        debug!("Vehicle {} is on road {} ({})", vehicle, road_id, direction);
        if direction == Direction::Unknown {
            return Ok(Err(SkipReason::UnresolvedDirection { road_id }));
        }

        let signal = match upcoming_signal(sim, vehicle)? {
            Some(signal) => signal,
            None => return Ok(Err(SkipReason::NoUpcomingSignal)),
        };
        let tls_id = signal.tls_id;

        let desired_phase = match self.phase_table.desired_phase(&tls_id, direction) {
            Some(phase) => phase,
            None => return Ok(Err(SkipReason::UnmappedPhasePolicy { tls_id, direction })),
        };

        report.active.insert(tls_id.clone());

        let current_phase = sim
            .phase(&tls_id)
            .with_context(|| format!("trafficlight.getPhase({tls_id})"))?;
        debug!(
            "TLS {}: current phase {}, desired phase {}",
            tls_id, current_phase, desired_phase
        );

        // Already locked in for this phase; reissuing would restart the
        // extension or short-cycle the signal
        if self.ledger.get(&tls_id) == Some(desired_phase) {
            return Ok(Ok(()));
        }

        self.ledger.set(tls_id.clone(), desired_phase);

        let command = if current_phase == desired_phase {
            let current_duration = sim
                .phase_duration(&tls_id)
                .with_context(|| format!("trafficlight.getPhaseDuration({tls_id})"))?;
            let duration = self.timing.extended_duration(current_duration);
            info!(
                "Extended phase {} of {} to {} seconds for {}",
                current_phase, tls_id, duration, vehicle
            );
            SignalCommand::Extend {
                tls_id: tls_id.clone(),
                phase: current_phase,
                duration,
            }
        } else {
            let duration = self.timing.forced_transition;
            info!(
                "Shortened phase {} of {} to {} seconds for {} (want phase {})",
                current_phase, tls_id, duration, vehicle, desired_phase
            );
            SignalCommand::ForceTransition {
                tls_id: tls_id.clone(),
                current_phase,
                desired_phase,
                duration,
            }
        };

        sim.set_phase_duration(&tls_id, command.duration())
            .with_context(|| format!("trafficlight.setPhaseDuration({tls_id})"))?;
        report.commands.push(command);

        Ok(Ok(()))
    }
}
