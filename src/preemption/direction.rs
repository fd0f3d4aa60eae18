//! Travel direction inference from road naming conventions

use log::trace;

use super::types::Direction;

/// Strategy that maps a road-segment identifier to a travel direction.
///
/// Returning [`Direction::Unknown`] is a normal outcome, not an error; the
/// engine simply ignores the vehicle for the current tick.
pub trait DirectionClassifier {
    fn classify(&self, road_id: &str) -> Direction;
}

impl<F> DirectionClassifier for F
where
    F: Fn(&str) -> Direction,
{
    fn classify(&self, road_id: &str) -> Direction {
        self(road_id)
    }
}

/// Classifies roads by marker substrings in their (lower-cased) name,
/// e.g. `E0_nb` is northbound and `E3_wb` is westbound.
#[derive(Debug, Clone)]
pub struct EdgeNameClassifier {
    north_south: Vec<String>,
    east_west: Vec<String>,
}

impl Default for EdgeNameClassifier {
    fn default() -> Self {
        Self::new(["nb", "sb"], ["eb", "wb"])
    }
}

impl EdgeNameClassifier {
    /// Create a classifier with custom markers. Markers are matched
    /// case-insensitively; north-south markers are checked first.
    pub fn new<I, J, S>(north_south: I, east_west: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            north_south: north_south
                .into_iter()
                .map(|m| m.as_ref().to_lowercase())
                .collect(),
            east_west: east_west
                .into_iter()
                .map(|m| m.as_ref().to_lowercase())
                .collect(),
        }
    }
}

impl DirectionClassifier for EdgeNameClassifier {
    fn classify(&self, road_id: &str) -> Direction {
        let road = road_id.to_lowercase();

        let direction = if self.north_south.iter().any(|m| road.contains(m.as_str())) {
            Direction::NorthSouth
        } else if self.east_west.iter().any(|m| road.contains(m.as_str())) {
            Direction::EastWest
        } else {
            Direction::Unknown
        };

        trace!("Road {} classified as {}", road_id, direction);
        direction
    }
}
