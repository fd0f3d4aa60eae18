//! Vehicle movement logic for the in-process simulation

use anyhow::{Context, Result};
use ordered_float::OrderedFloat;
use std::collections::HashMap;

use super::intersection::SimIntersection;
use super::road_network::SimRoadNetwork;
use super::types::{JunctionId, RoadId, MIN_GAP, VEHICLE_LENGTH};
use crate::preemption::VehicleId;

/// Result of a vehicle update indicating what action should be taken
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VehicleUpdateResult {
    Continue,            // Vehicle continues moving
    Arrived(JunctionId), // Vehicle reached the end of its route
}

/// A vehicle driving along a fixed route
#[derive(Debug, Clone)]
pub struct SimVehicle {
    pub id: VehicleId,
    /// Type tag, e.g. `passenger` or `emergency`
    pub type_id: String,
    /// Desired speed in m/s, capped by each road's speed limit
    pub speed: f64,
    pub route: Vec<RoadId>,
    /// Index into `route` of the road the vehicle is on
    pub route_index: usize,
    pub distance_along_road: OrderedFloat<f64>,
    pub depart_time: f64,
    /// Accumulated time spent (nearly) stopped
    pub waiting_time: f64,
}

impl SimVehicle {
    pub fn new(
        id: VehicleId,
        type_id: String,
        speed: f64,
        route: Vec<RoadId>,
        depart_time: f64,
    ) -> Self {
        Self {
            id,
            type_id,
            speed,
            route,
            route_index: 0,
            distance_along_road: OrderedFloat(0.0),
            depart_time,
            waiting_time: 0.0,
        }
    }

    pub fn current_road(&self) -> Option<RoadId> {
        self.route.get(self.route_index).copied()
    }

    /// Roads still ahead, including the current one
    pub fn remaining_route(&self) -> &[RoadId] {
        self.route.get(self.route_index..).unwrap_or(&[])
    }

    /// Update vehicle movement for one step
    pub fn update(
        &mut self,
        delta_secs: f64,
        road_network: &mut SimRoadNetwork,
        intersections: &HashMap<JunctionId, SimIntersection>,
    ) -> Result<VehicleUpdateResult> {
        let road_id = self.current_road().context("Vehicle has no current road")?;
        let road = road_network
            .get_road(road_id)
            .context("Road not found")?
            .clone();

        let prev_distance = self.distance_along_road;
        let speed = self.speed.min(road.speed_limit);
        let mut target = prev_distance.into_inner() + speed * delta_secs;

        // Keep a safe gap to the vehicle ahead
        if let Some(ahead) = road_network.find_vehicle_ahead(road_id, prev_distance) {
            let limit = ahead.into_inner() - VEHICLE_LENGTH - MIN_GAP;
            target = target.min(limit).max(prev_distance.into_inner());
        }

        if target >= road.length {
            let overflow = target - road.length;

            // End of the route: leave the network
            if self.route_index + 1 >= self.route.len() {
                road_network.remove_vehicle(&self.id, road_id, prev_distance);
                return Ok(VehicleUpdateResult::Arrived(road.end_junction));
            }

            let next_road = self.route[self.route_index + 1];
            let junction = intersections
                .get(&road.end_junction)
                .context("Junction at end of road not found")?;

            if junction.can_enter(road.heading.axis())
                && road_network.has_room_at(next_road, overflow)
            {
                self.route_index += 1;
                self.distance_along_road = OrderedFloat(overflow);
                road_network.update_vehicle_position(
                    &self.id,
                    next_road,
                    self.distance_along_road,
                    Some((road_id, prev_distance)),
                );
                return Ok(VehicleUpdateResult::Continue);
            }

            // Hold at the stop line
            target = road.length;
        }

        if target - prev_distance.into_inner() < 0.1 * speed * delta_secs {
            self.waiting_time += delta_secs;
        }

        self.distance_along_road = OrderedFloat(target);
        road_network.update_vehicle_position(
            &self.id,
            road_id,
            self.distance_along_road,
            Some((road_id, prev_distance)),
        );

        Ok(VehicleUpdateResult::Continue)
    }
}
