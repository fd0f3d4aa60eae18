//! Junctions and their fixed-time signal programs

use crate::preemption::{Direction, TlsId};

use super::types::{JunctionId, LightState, Position, SignalPhase};

/// Cyclic fixed-time signal program of a traffic-light system.
///
/// Mirrors how SUMO treats duration overrides: the programmed duration of a
/// phase never changes, a duration override only moves the next switch.
#[derive(Debug, Clone)]
pub struct SignalProgram {
    pub tls_id: TlsId,
    phases: Vec<SignalPhase>,
    current_phase: usize,
    /// Seconds until the program switches to the next phase
    remaining: f64,
}

impl SignalProgram {
    pub fn new(tls_id: TlsId, phases: Vec<SignalPhase>) -> Self {
        let remaining = phases.first().map(|p| p.duration).unwrap_or(f64::INFINITY);
        Self {
            tls_id,
            phases,
            current_phase: 0,
            remaining,
        }
    }

    /// Four-phase program: east-west green, east-west yellow, north-south
    /// green, north-south yellow
    pub fn four_way(tls_id: TlsId, green: f64, yellow: f64) -> Self {
        use LightState::*;
        Self::new(
            tls_id,
            vec![
                SignalPhase::new(green, Red, Green),
                SignalPhase::new(yellow, Red, Yellow),
                SignalPhase::new(green, Green, Red),
                SignalPhase::new(yellow, Yellow, Red),
            ],
        )
    }

    pub fn current_phase(&self) -> usize {
        self.current_phase
    }

    /// Programmed duration of the active phase
    pub fn phase_duration(&self) -> f64 {
        self.phases
            .get(self.current_phase)
            .map(|p| p.duration)
            .unwrap_or(0.0)
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    /// Make the active phase end `seconds` from now
    pub fn set_remaining(&mut self, seconds: f64) {
        self.remaining = seconds.max(0.0);
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    pub fn light_for(&self, approach: Direction) -> LightState {
        match self.phases.get(self.current_phase) {
            Some(phase) => phase.light_for(approach),
            None => LightState::Red,
        }
    }

    /// Advance the program clock, switching phases as they expire
    pub fn update_timer(&mut self, delta_secs: f64) {
        if self.phases.is_empty() {
            return;
        }

        self.remaining -= delta_secs;
        // Switch only once per step; a very short override still shows the
        // next phase for at least one step
        if self.remaining <= 1e-9 {
            self.current_phase = (self.current_phase + 1) % self.phases.len();
            self.remaining += self.phases[self.current_phase].duration;
        }
    }
}

/// A junction in the simulated network
#[derive(Debug, Clone)]
pub struct SimIntersection {
    pub id: JunctionId,
    /// Public name, e.g. `Node2`
    pub name: String,
    pub position: Position,
    /// Signal program, if this junction is signalized
    pub signal: Option<SignalProgram>,
}

impl SimIntersection {
    pub fn new(id: JunctionId, name: String, position: Position) -> Self {
        Self {
            id,
            name,
            position,
            signal: None,
        }
    }

    pub fn signalized(
        id: JunctionId,
        name: String,
        position: Position,
        program: SignalProgram,
    ) -> Self {
        Self {
            id,
            name,
            position,
            signal: Some(program),
        }
    }

    /// Whether traffic arriving on `approach` may enter the junction
    pub fn can_enter(&self, approach: Direction) -> bool {
        match &self.signal {
            Some(program) => program.light_for(approach) == LightState::Green,
            None => true,
        }
    }

    /// Update the signal timer
    pub fn update_timer(&mut self, delta_secs: f64) {
        if let Some(program) = &mut self.signal {
            program.update_timer(delta_secs);
        }
    }
}
