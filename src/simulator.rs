//! Request/response boundary to the stepped traffic simulator
//!
//! Every call may fail; a failure means the connection to the simulator is
//! no longer trustworthy and the run must abort.

use anyhow::Result;

use crate::preemption::{NextSignal, TlsId, VehicleId};

/// The calls the preemption controller and its driving loop make into a
/// traffic simulator. Implemented by the TraCI client (SUMO) and by the
/// in-process [`SimWorld`](crate::simulation::SimWorld).
pub trait TrafficSimulator {
    /// All vehicles currently in the network, in simulator order
    fn vehicle_ids(&mut self) -> Result<Vec<VehicleId>>;

    /// Type tag of a vehicle, e.g. `"emergency"`
    fn vehicle_type(&mut self, vehicle: &VehicleId) -> Result<String>;

    /// Id of the road segment the vehicle is currently on
    fn vehicle_road(&mut self, vehicle: &VehicleId) -> Result<String>;

    /// Upcoming signals along the vehicle's remaining route, nearest first
    fn next_signals(&mut self, vehicle: &VehicleId) -> Result<Vec<NextSignal>>;

    /// Index of the intersection's active phase
    fn phase(&mut self, tls: &TlsId) -> Result<usize>;

    /// Duration of the intersection's active phase in seconds
    fn phase_duration(&mut self, tls: &TlsId) -> Result<f64>;

    /// Make the active phase end `seconds` from now
    fn set_phase_duration(&mut self, tls: &TlsId, seconds: f64) -> Result<()>;

    /// Advance the simulation by one step
    fn advance_tick(&mut self) -> Result<()>;

    /// Vehicles in the network plus vehicles still waiting to depart
    fn min_expected_vehicles(&mut self) -> Result<usize>;
}
