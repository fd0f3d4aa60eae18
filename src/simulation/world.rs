//! Main simulation world that ties everything together
//!
//! A small stepped traffic simulation: junctions (some signalized), one-way
//! roads, scheduled trips and vehicles that follow each other and stop at
//! red lights. It implements [`TrafficSimulator`], so the preemption
//! controller drives it exactly like it drives SUMO.

use anyhow::{Context, Result};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap, VecDeque};

use super::intersection::{SignalProgram, SimIntersection};
use super::road_network::SimRoadNetwork;
use super::types::{
    Heading, JunctionId, Position, RoadId, SimId, SimRoad, DEFAULT_SPEED_LIMIT, PASSENGER_TYPE,
};
use super::vehicle::{SimVehicle, VehicleUpdateResult};
use crate::preemption::{Direction, NextSignal, TlsId, VehicleId, EMERGENCY_TYPE};
use crate::simulator::TrafficSimulator;

/// Default simulation step in seconds
pub const DEFAULT_STEP_LENGTH: f64 = 0.1;

/// Green time of the demo signal programs, in seconds
pub const DEMO_GREEN_TIME: f64 = 30.0;

/// Yellow time of the demo signal programs, in seconds
pub const DEMO_YELLOW_TIME: f64 = 3.0;

/// Link index reported for north-south approaches; east-west use 1
const NORTH_SOUTH_LINK: i32 = 0;
const EAST_WEST_LINK: i32 = 1;

/// A trip waiting for its departure time
#[derive(Debug, Clone)]
pub struct PlannedTrip {
    pub vehicle_id: VehicleId,
    pub type_id: String,
    pub depart: f64,
    pub from: JunctionId,
    pub to: JunctionId,
    pub speed: f64,
}

/// A completed trip
#[derive(Debug, Clone)]
pub struct ArrivalRecord {
    pub vehicle_id: VehicleId,
    pub type_id: String,
    pub travel_time: f64,
    pub waiting_time: f64,
}

/// The main simulation world
pub struct SimWorld {
    /// Road network for routing and car-following
    pub road_network: SimRoadNetwork,

    /// All junctions
    pub intersections: HashMap<JunctionId, SimIntersection>,

    /// Signalized junctions by traffic-light id
    tls_index: HashMap<TlsId, JunctionId>,

    /// Vehicles in the network, in id order
    pub vehicles: BTreeMap<VehicleId, SimVehicle>,

    /// Trips not yet departed, sorted by departure time
    pending: VecDeque<PlannedTrip>,

    /// Completed trips
    pub arrivals: Vec<ArrivalRecord>,

    /// Next ID to assign
    next_id: usize,

    /// Simulation time
    pub time: f64,

    /// Step length in seconds
    step_length: f64,

    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_LENGTH)
    }
}

impl SimWorld {
    fn new_internal(step_length: f64, rng: Option<StdRng>) -> Self {
        Self {
            road_network: SimRoadNetwork::new(),
            intersections: HashMap::new(),
            tls_index: HashMap::new(),
            vehicles: BTreeMap::new(),
            pending: VecDeque::new(),
            arrivals: Vec::new(),
            next_id: 0,
            time: 0.0,
            step_length,
            rng,
        }
    }

    pub fn new(step_length: f64) -> Self {
        Self::new_internal(step_length, None)
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(step_length: f64, seed: u64) -> Self {
        Self::new_internal(step_length, Some(StdRng::seed_from_u64(seed)))
    }

    /// Get a random value in the given range, using seeded RNG if available
    fn random_range(&mut self, range: std::ops::Range<f64>) -> f64 {
        match &mut self.rng {
            Some(rng) => rng.random_range(range),
            None => rand::rng().random_range(range),
        }
    }

    /// Choose a random element from a slice, using seeded RNG if available
    fn choose_random<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        match &mut self.rng {
            Some(rng) => slice.choose(rng),
            None => slice.choose(&mut rand::rng()),
        }
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn step_length(&self) -> f64 {
        self.step_length
    }

    /// Add an unsignalized junction
    pub fn add_junction(&mut self, name: &str, position: Position) -> JunctionId {
        let id = JunctionId(self.next_sim_id());
        let junction = SimIntersection::new(id, name.to_string(), position);
        self.insert_junction(junction, position)
    }

    /// Add a junction controlled by a signal program. The program's
    /// traffic-light id is how the controller addresses it.
    pub fn add_signalized_junction(
        &mut self,
        name: &str,
        position: Position,
        program: SignalProgram,
    ) -> JunctionId {
        let id = JunctionId(self.next_sim_id());
        self.tls_index.insert(program.tls_id.clone(), id);
        let junction = SimIntersection::signalized(id, name.to_string(), position, program);
        self.insert_junction(junction, position)
    }

    fn insert_junction(&mut self, junction: SimIntersection, position: Position) -> JunctionId {
        let id = junction.id;
        self.intersections.insert(id, junction);
        self.road_network.add_junction(id, position);
        id
    }

    /// Add a one-way road. Its name encodes its heading, e.g. `E3_nb`.
    pub fn add_road(&mut self, start: JunctionId, end: JunctionId) -> Result<RoadId> {
        self.add_road_with_limit(start, end, DEFAULT_SPEED_LIMIT)
    }

    pub fn add_road_with_limit(
        &mut self,
        start: JunctionId,
        end: JunctionId,
        speed_limit: f64,
    ) -> Result<RoadId> {
        let start_pos = *self
            .road_network
            .get_junction_position(start)
            .context("Start junction not found")?;

        let end_pos = *self
            .road_network
            .get_junction_position(end)
            .context("End junction not found")?;

        let heading = Heading::between(&start_pos, &end_pos);
        let name = format!("E{}_{}", self.road_network.road_count(), heading.suffix());
        let id = RoadId(self.next_sim_id());
        let road = SimRoad::new(id, name, start, end, &start_pos, &end_pos, speed_limit);

        self.road_network.add_road(road)?;
        Ok(id)
    }

    /// Add a two-way road between junctions (creates two one-way roads)
    pub fn add_two_way_road(&mut self, a: JunctionId, b: JunctionId) -> Result<(RoadId, RoadId)> {
        let forward = self.add_road(a, b)?;
        let backward = self.add_road(b, a)?;
        Ok((forward, backward))
    }

    /// Queue a trip. Trips are kept in departure order.
    pub fn schedule_trip(&mut self, trip: PlannedTrip) {
        let index = self
            .pending
            .iter()
            .position(|t| t.depart > trip.depart)
            .unwrap_or(self.pending.len());
        self.pending.insert(index, trip);
    }

    /// Queue `count` passenger trips between random pairs of `endpoints`,
    /// departing uniformly within `[0, window)` seconds
    pub fn schedule_random_trips(&mut self, count: usize, endpoints: &[JunctionId], window: f64) {
        if endpoints.len() < 2 {
            return;
        }

        for n in 0..count {
            let from = match self.choose_random(endpoints) {
                Some(&j) => j,
                None => continue,
            };
            let destinations: Vec<JunctionId> =
                endpoints.iter().copied().filter(|&j| j != from).collect();
            let to = match self.choose_random(&destinations) {
                Some(&j) => j,
                None => continue,
            };
            let depart = self.random_range(0.0..window);
            let speed = self.random_range(9.0..14.0);
            self.schedule_trip(PlannedTrip {
                vehicle_id: VehicleId::new(format!("veh{}", n)),
                type_id: PASSENGER_TYPE.to_string(),
                depart,
                from,
                to,
                speed,
            });
        }
    }

    /// Insert vehicles whose departure time has come. A trip whose entry
    /// road is blocked waits for the next step.
    fn depart_pending(&mut self) {
        let mut waiting = VecDeque::new();

        while let Some(trip) = self.pending.pop_front() {
            if trip.depart > self.time {
                self.pending.push_front(trip);
                break;
            }

            let route = match self.road_network.find_route(trip.from, trip.to) {
                Some(route) if !route.is_empty() => route,
                _ => {
                    warn!("No route for {}; dropping trip", trip.vehicle_id);
                    continue;
                }
            };

            if !self.road_network.has_room_at(route[0], 0.0) {
                waiting.push_back(trip);
                continue;
            }

            debug!("Departing {} ({}) at {:.2}s", trip.vehicle_id, trip.type_id, self.time);
            let vehicle = SimVehicle::new(
                trip.vehicle_id.clone(),
                trip.type_id,
                trip.speed,
                route,
                self.time,
            );
            self.road_network.update_vehicle_position(
                &vehicle.id,
                vehicle.route[0],
                vehicle.distance_along_road,
                None,
            );
            self.vehicles.insert(trip.vehicle_id, vehicle);
        }

        // Delayed trips go back in front, still in departure order
        while let Some(trip) = waiting.pop_back() {
            self.pending.push_front(trip);
        }
    }

    /// Update all intersections
    fn update_intersections(&mut self, delta_secs: f64) {
        for intersection in self.intersections.values_mut() {
            intersection.update_timer(delta_secs);
        }
    }

    /// Update all vehicles and retire the ones that arrived
    fn update_vehicles(&mut self, delta_secs: f64) -> Result<()> {
        let vehicle_ids: Vec<VehicleId> = self.vehicles.keys().cloned().collect();

        for vehicle_id in vehicle_ids {
            let Some(vehicle) = self.vehicles.get_mut(&vehicle_id) else {
                continue;
            };

            match vehicle.update(delta_secs, &mut self.road_network, &self.intersections)? {
                VehicleUpdateResult::Continue => {}
                VehicleUpdateResult::Arrived(_) => {
                    if let Some(vehicle) = self.vehicles.remove(&vehicle_id) {
                        debug!("{} arrived at {:.2}s", vehicle.id, self.time);
                        self.arrivals.push(ArrivalRecord {
                            travel_time: self.time - vehicle.depart_time,
                            waiting_time: vehicle.waiting_time,
                            vehicle_id: vehicle.id,
                            type_id: vehicle.type_id,
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Main simulation tick
    pub fn tick(&mut self) -> Result<()> {
        let delta_secs = self.step_length;
        self.time += delta_secs;

        self.update_intersections(delta_secs);
        self.depart_pending();
        self.update_vehicles(delta_secs)
    }

    fn signal(&self, tls: &TlsId) -> Result<&SignalProgram> {
        self.tls_index
            .get(tls)
            .and_then(|id| self.intersections.get(id))
            .and_then(|junction| junction.signal.as_ref())
            .with_context(|| format!("Unknown traffic light {}", tls))
    }

    fn signal_mut(&mut self, tls: &TlsId) -> Result<&mut SignalProgram> {
        self.tls_index
            .get(tls)
            .and_then(|id| self.intersections.get_mut(id))
            .and_then(|junction| junction.signal.as_mut())
            .with_context(|| format!("Unknown traffic light {}", tls))
    }

    fn vehicle(&self, vehicle: &VehicleId) -> Result<&SimVehicle> {
        self.vehicles
            .get(vehicle)
            .with_context(|| format!("Unknown vehicle {}", vehicle))
    }

    /// Signal program of a traffic light, for inspection
    pub fn signal_program(&self, tls: &TlsId) -> Option<&SignalProgram> {
        self.signal(tls).ok()
    }

    /// Trips that have not departed yet
    pub fn pending_trips(&self) -> usize {
        self.pending.len()
    }

    /// Create the demo world with a seeded RNG for reproducible runs
    pub fn create_demo_world_with_seed(
        step_length: f64,
        seed: u64,
        passengers: usize,
    ) -> Result<Self> {
        Self::build_demo_world(SimWorld::new_with_seed(step_length, seed), passengers)
    }

    /// Build the demo network: two rows of three junctions with signals at
    /// the middle column (Node2, Node5), a south entry below Node2 and a
    /// north exit above Node5. Three emergency vehicles cross the signals
    /// from different approaches while random passenger traffic runs.
    pub fn build_demo_world(mut world: SimWorld, passengers: usize) -> Result<Self> {
        let spacing = 100.0;

        let node1 = world.add_junction("Node1", Position::new(0.0, 0.0));
        let node2 = world.add_signalized_junction(
            "Node2",
            Position::new(spacing, 0.0),
            SignalProgram::four_way(TlsId::new("Node2"), DEMO_GREEN_TIME, DEMO_YELLOW_TIME),
        );
        let node3 = world.add_junction("Node3", Position::new(2.0 * spacing, 0.0));
        let node4 = world.add_junction("Node4", Position::new(0.0, spacing));
        let node5 = world.add_signalized_junction(
            "Node5",
            Position::new(spacing, spacing),
            SignalProgram::four_way(TlsId::new("Node5"), DEMO_GREEN_TIME, DEMO_YELLOW_TIME),
        );
        let node6 = world.add_junction("Node6", Position::new(2.0 * spacing, spacing));
        let node7 = world.add_junction("Node7", Position::new(spacing, -spacing));
        let node8 = world.add_junction("Node8", Position::new(spacing, 2.0 * spacing));

        for (a, b) in [
            (node1, node2),
            (node2, node3),
            (node4, node5),
            (node5, node6),
            (node7, node2),
            (node2, node5),
            (node5, node8),
            (node1, node4),
            (node3, node6),
        ] {
            world.add_two_way_road(a, b)?;
        }

        let endpoints = [node1, node3, node4, node6, node7, node8];
        world.schedule_random_trips(passengers, &endpoints, 150.0);

        for (n, depart, from, to) in [
            (0, 15.0, node7, node8),
            (1, 70.0, node3, node1),
            (2, 120.0, node6, node4),
        ] {
            world.schedule_trip(PlannedTrip {
                vehicle_id: VehicleId::new(format!("emergency{}", n)),
                type_id: EMERGENCY_TYPE.to_string(),
                depart,
                from,
                to,
                speed: 15.0,
            });
        }

        Ok(world)
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        println!("=== Traffic Simulation Summary ===");
        println!("Time: {:.2}s", self.time);
        println!(
            "Junctions: {}, Roads: {}",
            self.road_network.junction_count(),
            self.road_network.road_count()
        );
        if let Some(avg) = self.road_network.average_speed_limit() {
            println!("Average speed limit: {:.2} m/s", avg);
        }
        println!("Vehicles in network: {}", self.vehicles.len());
        println!("Trips pending: {}", self.pending.len());
        println!("Trips completed: {}", self.arrivals.len());

        let mut tls_ids: Vec<&TlsId> = self.tls_index.keys().collect();
        tls_ids.sort();
        println!("--- Signals ---");
        for tls in tls_ids {
            if let Ok(program) = self.signal(tls) {
                println!(
                    "  {}: phase {}/{}, {:.1}s remaining",
                    tls,
                    program.current_phase(),
                    program.phase_count(),
                    program.remaining()
                );
            }
        }

        let emergency: Vec<&ArrivalRecord> = self
            .arrivals
            .iter()
            .filter(|a| a.type_id == EMERGENCY_TYPE)
            .collect();
        if !emergency.is_empty() {
            println!("--- Emergency Trips ---");
            for arrival in emergency {
                println!(
                    "  {}: travel {:.1}s, waiting {:.1}s",
                    arrival.vehicle_id, arrival.travel_time, arrival.waiting_time
                );
            }
        }

        let passengers: Vec<&ArrivalRecord> = self
            .arrivals
            .iter()
            .filter(|a| a.type_id != EMERGENCY_TYPE)
            .collect();
        if !passengers.is_empty() {
            let mean_wait =
                passengers.iter().map(|a| a.waiting_time).sum::<f64>() / passengers.len() as f64;
            println!("--- Passenger Trips ---");
            println!("  Completed: {}, mean waiting {:.1}s", passengers.len(), mean_wait);
        }
    }
}

impl TrafficSimulator for SimWorld {
    fn vehicle_ids(&mut self) -> Result<Vec<VehicleId>> {
        Ok(self.vehicles.keys().cloned().collect())
    }

    fn vehicle_type(&mut self, vehicle: &VehicleId) -> Result<String> {
        Ok(self.vehicle(vehicle)?.type_id.clone())
    }

    fn vehicle_road(&mut self, vehicle: &VehicleId) -> Result<String> {
        let road_id = self
            .vehicle(vehicle)?
            .current_road()
            .context("Vehicle has no current road")?;
        let road = self.road_network.get_road(road_id).context("Road not found")?;
        Ok(road.name.clone())
    }

    fn next_signals(&mut self, vehicle: &VehicleId) -> Result<Vec<NextSignal>> {
        let vehicle = self.vehicle(vehicle)?;
        let mut signals = Vec::new();
        let mut distance = -vehicle.distance_along_road.into_inner();

        for road_id in vehicle.remaining_route() {
            let road = self
                .road_network
                .get_road(*road_id)
                .context("Road not found")?;
            distance += road.length;

            let junction = self
                .intersections
                .get(&road.end_junction)
                .context("Junction not found")?;
            if let Some(program) = &junction.signal {
                let approach = road.heading.axis();
                let link_index = match approach {
                    Direction::NorthSouth => NORTH_SOUTH_LINK,
                    _ => EAST_WEST_LINK,
                };
                signals.push(NextSignal {
                    tls_id: program.tls_id.clone(),
                    link_index,
                    distance: distance.max(0.0),
                    state: program.light_for(approach).as_char(),
                });
            }
        }

        Ok(signals)
    }

    fn phase(&mut self, tls: &TlsId) -> Result<usize> {
        Ok(self.signal(tls)?.current_phase())
    }

    fn phase_duration(&mut self, tls: &TlsId) -> Result<f64> {
        Ok(self.signal(tls)?.phase_duration())
    }

    fn set_phase_duration(&mut self, tls: &TlsId, seconds: f64) -> Result<()> {
        self.signal_mut(tls)?.set_remaining(seconds);
        Ok(())
    }

    fn advance_tick(&mut self) -> Result<()> {
        self.tick()
    }

    fn min_expected_vehicles(&mut self) -> Result<usize> {
        Ok(self.vehicles.len() + self.pending.len())
    }
}
