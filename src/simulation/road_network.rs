//! Road network graph for routing and per-road vehicle tracking

use anyhow::{Context, Result};
use ordered_float::OrderedFloat;
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::ops::Bound;

use super::types::{JunctionId, Position, RoadId, SimRoad, MIN_GAP, VEHICLE_LENGTH};
use crate::preemption::VehicleId;

/// Edge data for the road network graph
#[derive(Debug, Clone, Copy)]
pub struct RoadEdge {
    pub road_id: RoadId,
    pub weight: u32, // Road length in centimeters for integer weights
}

impl RoadEdge {
    pub fn from_road(road: &SimRoad) -> Self {
        let weight = (road.length * 100.0) as u32;
        Self {
            road_id: road.id,
            weight: weight.max(1), // Ensure minimum weight of 1
        }
    }
}

/// Directed road graph with per-road vehicle positions
#[derive(Default)]
pub struct SimRoadNetwork {
    /// The underlying petgraph directed graph (one-way roads)
    graph: DiGraph<JunctionId, RoadEdge>,

    /// Maps junction IDs to their node indices in the graph
    junction_to_node: HashMap<JunctionId, NodeIndex>,

    /// Cached routes, keyed by (origin, destination)
    route_cache: HashMap<(JunctionId, JunctionId), Vec<RoadId>>,

    /// Maps road IDs to (distance, vehicle) for car-following
    vehicles_on_roads: HashMap<RoadId, BTreeMap<OrderedFloat<f64>, VehicleId>>,

    /// Storage for road data
    roads: HashMap<RoadId, SimRoad>,

    /// Road lookup by public name
    road_names: HashMap<String, RoadId>,

    /// Storage for junction positions
    junction_positions: HashMap<JunctionId, Position>,
}

impl SimRoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a junction to the network graph
    pub fn add_junction(&mut self, junction_id: JunctionId, position: Position) {
        if self.junction_to_node.contains_key(&junction_id) {
            return;
        }

        let node_index = self.graph.add_node(junction_id);
        self.junction_to_node.insert(junction_id, node_index);
        self.junction_positions.insert(junction_id, position);
        self.route_cache.clear();
    }

    pub fn get_junction_position(&self, junction_id: JunctionId) -> Option<&Position> {
        self.junction_positions.get(&junction_id)
    }

    /// Adds a road to the network. Both junctions must already exist.
    pub fn add_road(&mut self, road: SimRoad) -> Result<()> {
        let start_node = *self
            .junction_to_node
            .get(&road.start_junction)
            .context("Start junction not in network")?;
        let end_node = *self
            .junction_to_node
            .get(&road.end_junction)
            .context("End junction not in network")?;

        if self.road_names.contains_key(&road.name) {
            anyhow::bail!("Duplicate road name {}", road.name);
        }

        self.graph
            .add_edge(start_node, end_node, RoadEdge::from_road(&road));
        self.road_names.insert(road.name.clone(), road.id);
        self.roads.insert(road.id, road);
        self.route_cache.clear();
        Ok(())
    }

    pub fn get_road(&self, road_id: RoadId) -> Option<&SimRoad> {
        self.roads.get(&road_id)
    }

    pub fn find_road_by_name(&self, name: &str) -> Option<RoadId> {
        self.road_names.get(name).copied()
    }

    /// Finds the road connecting two junctions
    pub fn find_road_between(&self, from: JunctionId, to: JunctionId) -> Result<RoadId> {
        let from_node = self
            .junction_to_node
            .get(&from)
            .ok_or_else(|| anyhow::anyhow!("Junction {:?} not found", from))?;
        let to_node = self
            .junction_to_node
            .get(&to)
            .ok_or_else(|| anyhow::anyhow!("Junction {:?} not found", to))?;

        self.graph
            .edges(*from_node)
            .find(|edge| edge.target() == *to_node)
            .map(|edge| edge.weight().road_id)
            .ok_or_else(|| anyhow::anyhow!("No road found connecting {:?} to {:?}", from, to))
    }

    /// Shortest route between two junctions as a list of roads
    /// (A* with a null heuristic, i.e. Dijkstra)
    pub fn find_route(&mut self, start: JunctionId, end: JunctionId) -> Option<Vec<RoadId>> {
        if start == end {
            return Some(vec![]);
        }

        if let Some(route) = self.route_cache.get(&(start, end)) {
            return Some(route.clone());
        }

        let start_node = self.junction_to_node.get(&start)?;
        let end_node = self.junction_to_node.get(&end)?;

        let (_, node_path) = astar(
            &self.graph,
            *start_node,
            |node| node == *end_node,
            |edge| edge.weight().weight,
            |_| 0,
        )?;

        let route: Vec<RoadId> = node_path
            .windows(2)
            .filter_map(|pair| {
                self.graph
                    .edges(pair[0])
                    .find(|edge| edge.target() == pair[1])
                    .map(|edge| edge.weight().road_id)
            })
            .collect();

        self.route_cache.insert((start, end), route.clone());
        Some(route)
    }

    /// Record a vehicle's new position, removing its previous one
    pub fn update_vehicle_position(
        &mut self,
        vehicle: &VehicleId,
        road_id: RoadId,
        distance: OrderedFloat<f64>,
        previous: Option<(RoadId, OrderedFloat<f64>)>,
    ) {
        if let Some((prev_road, prev_distance)) = previous {
            self.remove_vehicle(vehicle, prev_road, prev_distance);
        }

        self.vehicles_on_roads
            .entry(road_id)
            .or_default()
            .insert(distance, vehicle.clone());
    }

    /// Stop tracking a vehicle at the given position
    pub fn remove_vehicle(
        &mut self,
        vehicle: &VehicleId,
        road_id: RoadId,
        distance: OrderedFloat<f64>,
    ) {
        if let Some(on_road) = self.vehicles_on_roads.get_mut(&road_id) {
            if on_road.get(&distance) == Some(vehicle) {
                on_road.remove(&distance);
            }
        }
    }

    /// Distance of the nearest vehicle ahead on the same road
    pub fn find_vehicle_ahead(
        &self,
        road_id: RoadId,
        current_distance: OrderedFloat<f64>,
    ) -> Option<OrderedFloat<f64>> {
        self.vehicles_on_roads.get(&road_id).and_then(|on_road| {
            on_road
                .range((Bound::Excluded(current_distance), Bound::Unbounded))
                .next()
                .map(|(distance, _)| *distance)
        })
    }

    /// Whether a vehicle can be placed at `distance` on a road without
    /// overlapping the last vehicle on it
    pub fn has_room_at(&self, road_id: RoadId, distance: f64) -> bool {
        let last = self
            .vehicles_on_roads
            .get(&road_id)
            .and_then(|on_road| on_road.keys().next().copied());

        match last {
            Some(last) => last.into_inner() - distance >= VEHICLE_LENGTH + MIN_GAP,
            None => true,
        }
    }

    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    pub fn junction_count(&self) -> usize {
        self.junction_to_node.len()
    }

    /// Mean speed limit over all roads, in m/s
    pub fn average_speed_limit(&self) -> Option<f64> {
        if self.roads.is_empty() {
            return None;
        }
        let total: f64 = self.roads.values().map(|r| r.speed_limit).sum();
        Some(total / self.roads.len() as f64)
    }
}
