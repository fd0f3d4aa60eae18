//! Emergency-vehicle traffic signal preemption
//!
//! A controller that gives approaching emergency vehicles a green light,
//! driving either SUMO over TraCI or the built-in headless simulation.

pub mod driver;
pub mod preemption;
pub mod simulation;
pub mod simulator;
pub mod stats;
pub mod traci;
