//! Core types for the in-process simulation

use crate::preemption::Direction;

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimId(pub usize);

/// A wrapper type for junction IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JunctionId(pub SimId);

/// A wrapper type for road IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoadId(pub SimId);

/// A 2D position in meters; +y is north, +x is east
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Compass heading of a one-way road
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Heading {
    North,
    South,
    East,
    West,
}

impl Heading {
    /// Heading of the dominant axis of travel from `start` to `end`
    pub fn between(start: &Position, end: &Position) -> Self {
        let dx = end.x - start.x;
        let dy = end.y - start.y;
        if dy.abs() >= dx.abs() {
            if dy >= 0.0 {
                Heading::North
            } else {
                Heading::South
            }
        } else if dx >= 0.0 {
            Heading::East
        } else {
            Heading::West
        }
    }

    /// Suffix used in generated road names (`E4_nb`, `E7_wb`, ...)
    pub fn suffix(&self) -> &'static str {
        match self {
            Heading::North => "nb",
            Heading::South => "sb",
            Heading::East => "eb",
            Heading::West => "wb",
        }
    }

    /// Signal approach this heading belongs to
    pub fn axis(&self) -> Direction {
        match self {
            Heading::North | Heading::South => Direction::NorthSouth,
            Heading::East | Heading::West => Direction::EastWest,
        }
    }
}

/// A one-way road segment connecting two junctions
#[derive(Debug, Clone)]
pub struct SimRoad {
    pub id: RoadId,
    /// Public name, as reported to the controller
    pub name: String,
    pub start_junction: JunctionId,
    pub end_junction: JunctionId,
    pub length: f64,
    pub heading: Heading,
    /// Speed limit in m/s
    pub speed_limit: f64,
}

impl SimRoad {
    pub fn new(
        id: RoadId,
        name: String,
        start_junction: JunctionId,
        end_junction: JunctionId,
        start_pos: &Position,
        end_pos: &Position,
        speed_limit: f64,
    ) -> Self {
        Self {
            id,
            name,
            start_junction,
            end_junction,
            length: start_pos.distance(end_pos),
            heading: Heading::between(start_pos, end_pos),
            speed_limit,
        }
    }
}

/// Signal indication for one approach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightState {
    Green,
    Yellow,
    Red,
}

impl LightState {
    /// TraCI-style state character
    pub fn as_char(&self) -> char {
        match self {
            LightState::Green => 'G',
            LightState::Yellow => 'y',
            LightState::Red => 'r',
        }
    }
}

/// One step of a fixed-time signal program
#[derive(Debug, Clone, PartialEq)]
pub struct SignalPhase {
    pub duration: f64,
    pub north_south: LightState,
    pub east_west: LightState,
}

impl SignalPhase {
    pub fn new(duration: f64, north_south: LightState, east_west: LightState) -> Self {
        Self {
            duration,
            north_south,
            east_west,
        }
    }

    pub fn light_for(&self, approach: Direction) -> LightState {
        match approach {
            Direction::NorthSouth => self.north_south,
            Direction::EastWest => self.east_west,
            Direction::Unknown => LightState::Red,
        }
    }
}

/// Length of a vehicle in meters
pub const VEHICLE_LENGTH: f64 = 5.0;

/// Standstill gap kept to the vehicle ahead, in meters
pub const MIN_GAP: f64 = 2.5;

/// Default urban speed limit in m/s
pub const DEFAULT_SPEED_LIMIT: f64 = 16.67;

/// Vehicle type tag for ordinary traffic
pub const PASSENGER_TYPE: &str = "passenger";
