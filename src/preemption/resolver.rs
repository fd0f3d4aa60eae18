//! Lookup of the next signalized intersection ahead of a vehicle

use anyhow::{Context, Result};
use log::debug;

use super::types::{NextSignal, VehicleId};
use crate::simulator::TrafficSimulator;

/// Nearest upcoming signal on the vehicle's route, or `None` when no
/// signalized intersection is left ahead (e.g. the vehicle is about to leave
/// the network). Entries beyond the first are ignored.
pub fn upcoming_signal<S>(sim: &mut S, vehicle: &VehicleId) -> Result<Option<NextSignal>>
where
    S: TrafficSimulator + ?Sized,
{
    let signals = sim
        .next_signals(vehicle)
        .with_context(|| format!("vehicle.getNextTLS({vehicle})"))?;

    debug!("Next signals for {}: {:?}", vehicle, signals);

    Ok(signals.into_iter().next())
}
