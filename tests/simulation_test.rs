use std::process::Command;

use signal_preemption::driver::{drive, DriveOptions};
use signal_preemption::preemption::{
    DesiredPhaseTable, Direction, PreemptionEngine, TlsId, VehicleId,
};
use signal_preemption::simulation::{
    JunctionId, LightState, PlannedTrip, Position, SignalPhase, SignalProgram, SimWorld,
};
use signal_preemption::simulator::TrafficSimulator;

/// Three junctions in a row, west to east, with a signal in the middle
fn corridor(program: SignalProgram) -> (SimWorld, JunctionId, JunctionId) {
    let mut world = SimWorld::new(0.1);
    let west = world.add_junction("West", Position::new(0.0, 0.0));
    let middle = world.add_signalized_junction("Middle", Position::new(100.0, 0.0), program);
    let east = world.add_junction("East", Position::new(200.0, 0.0));
    world.add_two_way_road(west, middle).unwrap();
    world.add_two_way_road(middle, east).unwrap();
    (world, west, east)
}

fn emergency_trip(from: JunctionId, to: JunctionId) -> PlannedTrip {
    PlannedTrip {
        vehicle_id: VehicleId::new("amb"),
        type_id: "emergency".to_string(),
        depart: 0.0,
        from,
        to,
        speed: 10.0,
    }
}

#[test]
fn test_signal_program_cycles_through_phases() {
    let mut program = SignalProgram::four_way(TlsId::new("T"), 30.0, 3.0);
    assert_eq!(program.current_phase(), 0);
    assert_eq!(program.phase_count(), 4);
    assert_eq!(program.light_for(Direction::EastWest), LightState::Green);

    program.update_timer(30.0);
    assert_eq!(program.current_phase(), 1);
    assert!((program.remaining() - 3.0).abs() < 1e-9);

    program.update_timer(3.0);
    assert_eq!(program.current_phase(), 2);
    assert_eq!(program.phase_duration(), 30.0);
}

#[test]
fn test_duration_override_moves_switch_only() {
    let mut program = SignalProgram::four_way(TlsId::new("T"), 30.0, 3.0);

    program.set_remaining(0.1);
    assert_eq!(program.phase_duration(), 30.0);

    program.update_timer(0.1);
    assert_eq!(program.current_phase(), 1);

    // A long override keeps the phase past its programmed end
    program.set_remaining(50.0);
    program.update_timer(40.0);
    assert_eq!(program.current_phase(), 1);
    assert_eq!(program.phase_duration(), 3.0);
}

#[test]
fn test_roads_are_named_by_heading() {
    let (world, _, _) = corridor(SignalProgram::four_way(TlsId::new("Middle"), 30.0, 3.0));

    assert_eq!(world.road_network.road_count(), 4);
    assert!(world.road_network.find_road_by_name("E0_eb").is_some());
    assert!(world.road_network.find_road_by_name("E1_wb").is_some());
    assert!(world.road_network.find_road_by_name("E2_eb").is_some());
    assert!(world.road_network.find_road_by_name("E3_wb").is_some());
}

#[test]
fn test_vehicle_lookahead_reports_next_signal() {
    let (mut world, west, east) =
        corridor(SignalProgram::four_way(TlsId::new("Middle"), 30.0, 3.0));
    world.schedule_trip(emergency_trip(west, east));

    world.tick().unwrap();

    let amb = VehicleId::new("amb");
    assert_eq!(world.vehicle_ids().unwrap(), vec![amb.clone()]);
    assert_eq!(world.vehicle_type(&amb).unwrap(), "emergency");
    assert_eq!(world.vehicle_road(&amb).unwrap(), "E0_eb");

    let signals = world.next_signals(&amb).unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].tls_id, TlsId::new("Middle"));
    assert!((signals[0].distance - 99.0).abs() < 1e-6);
    assert_eq!(signals[0].state, 'G');
}

#[test]
fn test_phase_queries_through_simulator_interface() {
    let (mut world, _, _) = corridor(SignalProgram::four_way(TlsId::new("Middle"), 30.0, 3.0));
    let tls = TlsId::new("Middle");

    assert_eq!(world.phase(&tls).unwrap(), 0);
    assert_eq!(world.phase_duration(&tls).unwrap(), 30.0);

    world.set_phase_duration(&tls, 5.0).unwrap();
    assert_eq!(world.phase_duration(&tls).unwrap(), 30.0);
    assert_eq!(world.signal_program(&tls).unwrap().remaining(), 5.0);

    let err = world.phase(&TlsId::new("Nowhere")).unwrap_err();
    assert!(err.to_string().contains("Nowhere"));
}

#[test]
fn test_red_light_holds_vehicle_until_switch() {
    let program = SignalProgram::new(
        TlsId::new("Middle"),
        vec![
            SignalPhase::new(1000.0, LightState::Green, LightState::Red),
            SignalPhase::new(1000.0, LightState::Red, LightState::Green),
        ],
    );
    let (mut world, west, east) = corridor(program);
    world.schedule_trip(emergency_trip(west, east));

    for _ in 0..300 {
        world.tick().unwrap();
    }

    let amb = VehicleId::new("amb");
    let vehicle = &world.vehicles[&amb];
    assert_eq!(vehicle.distance_along_road.into_inner(), 100.0);
    assert!(vehicle.waiting_time > 10.0);
    assert_eq!(world.min_expected_vehicles().unwrap(), 1);

    world.set_phase_duration(&TlsId::new("Middle"), 0.1).unwrap();
    let mut ticks = 0;
    while world.min_expected_vehicles().unwrap() > 0 && ticks < 1000 {
        world.tick().unwrap();
        ticks += 1;
    }

    assert_eq!(world.arrivals.len(), 1);
    assert_eq!(world.arrivals[0].vehicle_id, amb);
    assert!(world.arrivals[0].waiting_time > 10.0);
}

#[test]
fn test_pending_trips_count_as_expected_vehicles() {
    let (mut world, west, east) =
        corridor(SignalProgram::four_way(TlsId::new("Middle"), 30.0, 3.0));
    let mut trip = emergency_trip(west, east);
    trip.depart = 5.0;
    world.schedule_trip(trip);

    world.tick().unwrap();
    assert!(world.vehicles.is_empty());
    assert_eq!(world.pending_trips(), 1);
    assert_eq!(world.min_expected_vehicles().unwrap(), 1);
}

#[test]
fn test_demo_world_layout() {
    let world = SimWorld::create_demo_world_with_seed(0.1, 42, 20).unwrap();

    assert_eq!(world.road_network.junction_count(), 8);
    assert_eq!(world.road_network.road_count(), 18);
    assert!(world.signal_program(&TlsId::new("Node2")).is_some());
    assert!(world.signal_program(&TlsId::new("Node5")).is_some());
    assert!(world.signal_program(&TlsId::new("Node1")).is_none());
    assert_eq!(world.pending_trips(), 23);
}

#[test]
fn test_demo_run_preempts_signals_for_emergency_vehicles() {
    let mut world = SimWorld::create_demo_world_with_seed(0.1, 7, 10).unwrap();
    let mut engine = PreemptionEngine::new(DesiredPhaseTable::builtin());

    let options = DriveOptions {
        max_ticks: Some(20_000),
    };
    let stats = drive(&mut world, &mut engine, options).unwrap();

    assert!(!stats.truncated);
    assert!(stats.commands_issued() > 0);
    assert!(stats.releases > 0);
    assert!(engine.ledger().is_empty());

    let emergency = world
        .arrivals
        .iter()
        .filter(|a| a.type_id == "emergency")
        .count();
    assert_eq!(emergency, 3);
    assert_eq!(world.arrivals.len(), 13);
}

#[test]
fn test_seeded_demo_runs_are_reproducible() {
    let run = |seed| {
        let mut world = SimWorld::create_demo_world_with_seed(0.1, seed, 10).unwrap();
        let mut engine = PreemptionEngine::new(DesiredPhaseTable::builtin());
        let options = DriveOptions {
            max_ticks: Some(20_000),
        };
        drive(&mut world, &mut engine, options).unwrap()
    };

    assert_eq!(run(11), run(11));
}

#[test]
fn test_demo_binary_prints_summary() {
    let output = Command::new(env!("CARGO_BIN_EXE_signal_preemption"))
        .args(["demo", "--seed", "3", "--passengers", "5"])
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to execute demo");

    assert!(
        output.status.success(),
        "Demo failed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(
        stderr.contains("=== SIMULATION COMPLETE ==="),
        "Missing completion message. stderr: {}",
        stderr
    );
    assert!(stderr.contains("Forced transitions:"));
    assert!(stdout.contains("=== Traffic Simulation Summary ==="));
    assert!(stdout.contains("--- Emergency Trips ---"));
}

#[test]
fn test_demo_binary_accepts_phase_table_file() {
    let table = concat!(env!("CARGO_MANIFEST_DIR"), "/config/phase_table.json");
    let output = Command::new(env!("CARGO_BIN_EXE_signal_preemption"))
        .args(["--phase-table", table, "demo", "--seed", "5", "--passengers", "0"])
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to execute demo");

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Phase table covers 4 approaches"));
}

#[test]
fn test_missing_phase_table_exits_with_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_signal_preemption"))
        .args(["--phase-table", "does/not/exist.json", "demo"])
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to execute demo");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read phase table"));
}
