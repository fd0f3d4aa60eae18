//! The tick loop: advance the simulator, then run one preemption pass

use anyhow::{Context, Result};
use log::{trace, warn};

use crate::preemption::PreemptionEngine;
use crate::simulator::TrafficSimulator;
use crate::stats::RunStats;

/// Options for [`drive`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DriveOptions {
    /// Stop after this many ticks even if vehicles remain
    pub max_ticks: Option<u64>,
}

/// Step the simulator until it expects no more vehicles, running the
/// preemption engine after every step.
///
/// The engine pass for a tick always completes before the next step is
/// requested. Any simulator failure aborts the run.
pub fn drive<S>(
    sim: &mut S,
    engine: &mut PreemptionEngine,
    options: DriveOptions,
) -> Result<RunStats>
where
    S: TrafficSimulator + ?Sized,
{
    let mut stats = RunStats::default();
    let mut tick = 0;

    loop {
        let remaining = sim
            .min_expected_vehicles()
            .context("simulation.getMinExpectedNumber()")?;
        if remaining == 0 {
            break;
        }

        if let Some(limit) = options.max_ticks {
            if tick >= limit {
                warn!(
                    "Stopping after {} ticks with {} vehicles still expected",
                    tick, remaining
                );
                stats.truncated = true;
                break;
            }
        }

        sim.advance_tick().context("simulationStep()")?;
        let report = engine.process_tick(sim, tick)?;
        trace!(
            "Tick {}: {} active, {} commands, {} released",
            tick,
            report.active.len(),
            report.commands.len(),
            report.released.len()
        );

        stats.record(&report);
        tick = report.next_tick;
    }

    stats.ticks = tick;
    Ok(stats)
}
