//! Standalone headless traffic simulation
//!
//! A small signalized road network that implements the simulator boundary,
//! so the preemption controller can be run and tested without SUMO.

mod intersection;
mod road_network;
mod types;
mod vehicle;
mod world;

pub use intersection::{SignalProgram, SimIntersection};
pub use road_network::SimRoadNetwork;
pub use types::{
    Heading, JunctionId, LightState, Position, RoadId, SignalPhase, SimId, SimRoad,
    DEFAULT_SPEED_LIMIT, MIN_GAP, PASSENGER_TYPE, VEHICLE_LENGTH,
};
pub use vehicle::{SimVehicle, VehicleUpdateResult};
pub use world::{
    ArrivalRecord, PlannedTrip, SimWorld, DEFAULT_STEP_LENGTH, DEMO_GREEN_TIME, DEMO_YELLOW_TIME,
};
