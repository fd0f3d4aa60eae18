//! Emergency-vehicle signal preemption
//!
//! The controller core: direction inference, desired-phase lookup, the
//! extend-vs-shorten decision and the override ledger that is reset once an
//! intersection no longer needs preemption.

mod direction;
mod engine;
mod ledger;
mod phase_table;
mod resolver;
mod types;

pub use direction::{DirectionClassifier, EdgeNameClassifier};
pub use engine::{
    PreemptionEngine, PreemptionTiming, SignalCommand, SkipReason, TickReport, DEFAULT_EXTENSION,
    DEFAULT_FORCED_TRANSITION, DEFAULT_MIN_GREEN,
};
pub use ledger::OverrideLedger;
pub use phase_table::{DesiredPhaseTable, PhasePolicy};
pub use resolver::upcoming_signal;
pub use types::{Direction, NextSignal, TlsId, VehicleId, EMERGENCY_TYPE};
