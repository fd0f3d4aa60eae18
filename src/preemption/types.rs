//! Core types shared by the preemption components and the simulator boundary

use std::fmt;

/// Vehicle type tag that marks a vehicle as eligible for signal preemption
pub const EMERGENCY_TYPE: &str = "emergency";

/// Identifier of a vehicle as reported by the simulator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub String);

/// Identifier of a traffic-light system (a signalized intersection)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TlsId(pub String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TlsId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TlsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse travel direction of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Northbound or southbound
    NorthSouth,
    /// Eastbound or westbound
    EastWest,
    /// The road naming resolves to neither axis
    Unknown,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::NorthSouth => "NorthSouth",
            Direction::EastWest => "EastWest",
            Direction::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// One entry of a vehicle's signal lookahead
#[derive(Debug, Clone, PartialEq)]
pub struct NextSignal {
    pub tls_id: TlsId,
    /// Index of the controlled link the vehicle will use
    pub link_index: i32,
    /// Distance to the stop line in meters
    pub distance: f64,
    /// Signal state character of the link (e.g. 'G', 'y', 'r')
    pub state: char,
}
