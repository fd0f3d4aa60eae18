//! TraCI framing, decoding and a full controller run against a fake server

use std::io::{Cursor, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;

use signal_preemption::driver::{drive, DriveOptions};
use signal_preemption::preemption::{DesiredPhaseTable, PreemptionEngine, TlsId, VehicleId};
use signal_preemption::simulator::TrafficSimulator;
use signal_preemption::traci::constants::*;
use signal_preemption::traci::{
    encode_message, find_sumo_binary, free_port, read_message, Command, Response, SumoLaunch,
    SumoSession, TraciClient,
};

fn string_bytes(value: &str) -> Vec<u8> {
    let mut out = (value.len() as i32).to_be_bytes().to_vec();
    out.extend_from_slice(value.as_bytes());
    out
}

fn status(id: u8, result: u8, description: &str) -> Vec<u8> {
    let mut out = vec![(7 + description.len()) as u8, id, result];
    out.extend(string_bytes(description));
    out
}

fn get_response(id: u8, variable: u8, object: &str, value_type: u8, value: &[u8]) -> Vec<u8> {
    let mut body = vec![id + RESPONSE_OFFSET, variable];
    body.extend(string_bytes(object));
    body.push(value_type);
    body.extend_from_slice(value);

    let mut out = vec![(body.len() + 1) as u8];
    out.extend(body);
    out
}

fn next_tls_value(entries: &[(&str, i32, f64, u8)]) -> Vec<u8> {
    let mut out = 4i32.to_be_bytes().to_vec();
    out.push(TYPE_INTEGER);
    out.extend((entries.len() as i32).to_be_bytes());
    for (id, link, distance, state) in entries {
        out.push(TYPE_STRING);
        out.extend(string_bytes(id));
        out.push(TYPE_INTEGER);
        out.extend(link.to_be_bytes());
        out.push(TYPE_DOUBLE);
        out.extend(distance.to_be_bytes());
        out.push(TYPE_BYTE);
        out.push(*state);
    }
    out
}

#[test]
fn test_get_command_framing() {
    let message = encode_message(&[Command::get(CMD_GET_VEHICLE_VARIABLE, VAR_ROAD_ID, "veh0")]);

    assert_eq!(
        message,
        vec![0, 0, 0, 15, 11, 0xa4, 0x50, 0, 0, 0, 4, b'v', b'e', b'h', b'0']
    );
}

#[test]
fn test_set_phase_duration_framing() {
    let mut command = Command::new(CMD_SET_TL_VARIABLE);
    command
        .put_u8(TL_PHASE_DURATION)
        .put_string("Node2")
        .put_typed_double(0.1);
    let message = encode_message(&[command]);

    let mut expected = vec![0, 0, 0, 25, 21, 0xc2, 0x24, 0, 0, 0, 5];
    expected.extend_from_slice(b"Node2");
    expected.push(TYPE_DOUBLE);
    expected.extend_from_slice(&0.1f64.to_be_bytes());
    assert_eq!(message, expected);
}

#[test]
fn test_long_command_uses_extended_length() {
    let mut command = Command::new(CMD_SET_TL_VARIABLE);
    command.put_string(&"x".repeat(296));
    let message = encode_message(&[command]);

    // 1 + 4 + 1 + 300 bytes of payload
    assert_eq!(&message[4..10], &[0, 0, 0, 1, 50, 0xc2]);
    assert_eq!(message.len(), 4 + 306);
}

#[test]
fn test_status_and_value_decoding() {
    let mut body = status(CMD_GET_VEHICLE_VARIABLE, RTYPE_OK, "");
    body.extend(get_response(
        CMD_GET_VEHICLE_VARIABLE,
        VAR_TYPE,
        "amb",
        TYPE_STRING,
        &string_bytes("emergency"),
    ));
    let mut response = Response::new(body);

    response.check_status(CMD_GET_VEHICLE_VARIABLE).unwrap();
    let value_type = response
        .read_get_header(CMD_GET_VEHICLE_VARIABLE, VAR_TYPE, "amb")
        .unwrap();
    assert_eq!(value_type, TYPE_STRING);
    assert_eq!(response.read_string().unwrap(), "emergency");
    assert_eq!(response.remaining(), 0);
}

#[test]
fn test_error_status_is_reported() {
    let mut response = Response::new(status(CMD_SET_TL_VARIABLE, RTYPE_ERR, "no such tls"));
    let err = response.check_status(CMD_SET_TL_VARIABLE).unwrap_err();
    assert!(err.to_string().contains("no such tls"));

    let mut response = Response::new(status(CMD_SIMSTEP, RTYPE_NOTIMPLEMENTED, ""));
    assert!(response.check_status(CMD_SIMSTEP).is_err());

    // OK with a description still counts as a failure
    let mut response = Response::new(status(CMD_SIMSTEP, RTYPE_OK, "warning"));
    assert!(response.check_status(CMD_SIMSTEP).is_err());
}

#[test]
fn test_mismatched_response_is_rejected() {
    let mut response = Response::new(get_response(
        CMD_GET_TL_VARIABLE,
        TL_CURRENT_PHASE,
        "Node5",
        TYPE_INTEGER,
        &2i32.to_be_bytes(),
    ));
    assert!(response
        .read_get_header(CMD_GET_TL_VARIABLE, TL_CURRENT_PHASE, "Node2")
        .is_err());
}

#[test]
fn test_truncated_response_is_an_error() {
    let mut response = Response::new(vec![0, 0]);
    assert!(response.read_i32().is_err());

    let mut response = Response::new(vec![0, 0, 0, 9, b'a']);
    assert!(response.read_string().is_err());
}

#[test]
fn test_next_tls_decoding() {
    let mut response = Response::new(next_tls_value(&[
        ("Node2", 3, 42.5, b'r'),
        ("Node5", 1, 142.5, b'G'),
    ]));

    let signals = response.read_next_tls().unwrap();

    assert_eq!(signals.len(), 2);
    assert_eq!(signals[0].tls_id, TlsId::new("Node2"));
    assert_eq!(signals[0].link_index, 3);
    assert_eq!(signals[0].distance, 42.5);
    assert_eq!(signals[0].state, 'r');
    assert_eq!(signals[1].tls_id, TlsId::new("Node5"));
    assert_eq!(signals[1].state, 'G');
}

#[test]
fn test_next_tls_count_beyond_body_is_rejected() {
    let mut response = Response::new(vec![0, 0, 0, 1, TYPE_INTEGER, 0x7f, 0xff, 0xff, 0xff]);
    let err = response.read_next_tls().unwrap_err();
    assert!(err.to_string().contains("Invalid next-TLS count"));

    // One entry announced, two claimed
    let mut value = next_tls_value(&[("Node2", 0, 10.0, b'G')]);
    value[5..9].copy_from_slice(&2i32.to_be_bytes());
    assert!(Response::new(value).read_next_tls().is_err());
}

#[test]
fn test_string_list_count_beyond_body_is_rejected() {
    let mut response = Response::new(vec![0x7f, 0xff, 0xff, 0xff, 0, 0, 0, 0]);
    assert!(response.read_string_list().is_err());
}

#[test]
fn test_oversized_message_length_is_rejected() {
    let mut reader = Cursor::new(vec![0x7f, 0xff, 0xff, 0xff]);
    let err = read_message(&mut reader).unwrap_err();
    assert!(err.to_string().contains("Invalid TraCI message length"));

    let mut reader = Cursor::new(vec![0, 0, 0, 2]);
    assert!(read_message(&mut reader).is_err());
}

#[test]
fn test_framed_message_reads_back_body() {
    let mut reader = Cursor::new(encode_message(&[Command::new(CMD_CLOSE)]));
    let mut response = read_message(&mut reader).unwrap();
    assert_eq!(response.read_length().unwrap(), 2);
    assert_eq!(response.read_u8().unwrap(), CMD_CLOSE);
    assert_eq!(response.remaining(), 0);
}

#[test]
fn test_launch_arguments() {
    let mut launch = SumoLaunch::new("Test1.sumocfg");
    let args = launch.args(8813);
    assert_eq!(
        args,
        vec![
            "-c",
            "Test1.sumocfg",
            "--step-length",
            "0.05",
            "--lateral-resolution",
            "0.1",
            "--remote-port",
            "8813"
        ]
    );

    launch.gui = true;
    let args = launch.args(9000);
    let delay = args.iter().position(|a| a == "--delay").unwrap();
    assert_eq!(args[delay + 1], "1000");
}

#[test]
fn test_free_port_is_usable() {
    let port = free_port().unwrap();
    assert_ne!(port, 0);
    TcpListener::bind(("127.0.0.1", port)).unwrap();
}

#[test]
fn test_sumo_binary_found_in_sumo_home() {
    let home = std::env::temp_dir().join(format!("sumo_home_{}", std::process::id()));
    let bin = home.join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let binary = bin.join(format!("sumo{}", std::env::consts::EXE_SUFFIX));
    std::fs::write(&binary, b"").unwrap();

    std::env::set_var("SUMO_HOME", &home);
    let found = find_sumo_binary(false).unwrap();
    std::env::remove_var("SUMO_HOME");
    std::fs::remove_dir_all(&home).unwrap();

    assert_eq!(found, binary);
}

/// Reply to one request the way SUMO would for a single northbound
/// ambulance approaching Node2 while Node2 shows phase 0.
fn fake_reply(
    body: &[u8],
    steps: &mut i32,
    sets: &mpsc::Sender<(String, f64)>,
    fail_set: bool,
) -> (Vec<u8>, bool) {
    let mut request = Response::new(body.to_vec());
    request.read_length().unwrap();
    let id = request.read_u8().unwrap();

    let mut out = Vec::new();
    match id {
        CMD_GETVERSION => {
            out.extend(status(id, RTYPE_OK, ""));
            let mut version = vec![19, CMD_GETVERSION];
            version.extend(21i32.to_be_bytes());
            version.extend(string_bytes("fake SUMO"));
            out.extend(version);
        }
        CMD_SIMSTEP => {
            *steps += 1;
            out.extend(status(id, RTYPE_OK, ""));
            out.extend(0i32.to_be_bytes());
        }
        CMD_CLOSE => {
            out.extend(status(id, RTYPE_OK, ""));
            return (out, true);
        }
        CMD_SET_TL_VARIABLE => {
            let variable = request.read_u8().unwrap();
            let tls = request.read_string().unwrap();
            assert_eq!(variable, TL_PHASE_DURATION);
            assert_eq!(request.read_u8().unwrap(), TYPE_DOUBLE);
            let value = request.read_f64().unwrap();
            if fail_set {
                out.extend(status(id, RTYPE_ERR, "tls rejected"));
            } else {
                sets.send((tls, value)).unwrap();
                out.extend(status(id, RTYPE_OK, ""));
            }
        }
        _ => {
            let variable = request.read_u8().unwrap();
            let object = request.read_string().unwrap();
            let (value_type, value) = match (id, variable) {
                (CMD_GET_SIM_VARIABLE, VAR_MIN_EXPECTED_VEHICLES) => {
                    (TYPE_INTEGER, (2 - *steps).max(0).to_be_bytes().to_vec())
                }
                (CMD_GET_VEHICLE_VARIABLE, ID_LIST) => {
                    let mut list = 1i32.to_be_bytes().to_vec();
                    list.extend(string_bytes("amb"));
                    (TYPE_STRINGLIST, list)
                }
                (CMD_GET_VEHICLE_VARIABLE, VAR_TYPE) => (TYPE_STRING, string_bytes("emergency")),
                (CMD_GET_VEHICLE_VARIABLE, VAR_ROAD_ID) => (TYPE_STRING, string_bytes("E0_nb")),
                (CMD_GET_VEHICLE_VARIABLE, VAR_NEXT_TLS) => {
                    (TYPE_COMPOUND, next_tls_value(&[("Node2", 0, 30.0, b'r')]))
                }
                (CMD_GET_TL_VARIABLE, TL_CURRENT_PHASE) => {
                    (TYPE_INTEGER, 0i32.to_be_bytes().to_vec())
                }
                (CMD_GET_TL_VARIABLE, TL_PHASE_DURATION) => {
                    (TYPE_DOUBLE, 15.0f64.to_be_bytes().to_vec())
                }
                other => panic!("unexpected request {:?}", other),
            };
            out.extend(status(id, RTYPE_OK, ""));
            out.extend(get_response(id, variable, &object, value_type, &value));
        }
    }
    (out, false)
}

fn serve(mut stream: TcpStream, sets: mpsc::Sender<(String, f64)>, fail_set: bool) {
    let mut steps = 0;
    loop {
        let mut len = [0u8; 4];
        if stream.read_exact(&mut len).is_err() {
            return;
        }
        let mut body = vec![0; i32::from_be_bytes(len) as usize - 4];
        stream.read_exact(&mut body).unwrap();

        let (reply, done) = fake_reply(&body, &mut steps, &sets, fail_set);
        stream
            .write_all(&((reply.len() + 4) as i32).to_be_bytes())
            .unwrap();
        stream.write_all(&reply).unwrap();
        if done {
            return;
        }
    }
}

fn start_fake_server(fail_set: bool) -> (u16, mpsc::Receiver<(String, f64)>) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            serve(stream, tx, fail_set);
        }
    });
    (port, rx)
}

#[test]
fn test_client_queries_against_fake_server() {
    let (port, _sets) = start_fake_server(false);
    let mut client = TraciClient::connect(("127.0.0.1", port)).unwrap();

    let (api, description) = client.version().unwrap();
    assert_eq!(api, 21);
    assert_eq!(description, "fake SUMO");

    let amb = VehicleId::new("amb");
    assert_eq!(client.vehicle_ids().unwrap(), vec![amb.clone()]);
    assert_eq!(client.vehicle_type(&amb).unwrap(), "emergency");
    assert_eq!(client.vehicle_road(&amb).unwrap(), "E0_nb");
    assert_eq!(client.next_signals(&amb).unwrap()[0].tls_id, TlsId::new("Node2"));
    assert_eq!(client.phase(&TlsId::new("Node2")).unwrap(), 0);
    assert_eq!(client.phase_duration(&TlsId::new("Node2")).unwrap(), 15.0);
    assert_eq!(client.min_expected_vehicles().unwrap(), 2);

    client.close().unwrap();
}

#[test]
fn test_controller_run_over_traci() {
    let (port, sets) = start_fake_server(false);
    let client = TraciClient::connect(("127.0.0.1", port)).unwrap();
    let mut session = SumoSession::attach(client);
    let mut engine = PreemptionEngine::new(DesiredPhaseTable::builtin());

    let stats = drive(session.client_mut(), &mut engine, DriveOptions::default()).unwrap();
    session.shutdown().unwrap();

    assert_eq!(stats.ticks, 2);
    assert_eq!(stats.forced_transitions, 1);
    let received: Vec<(String, f64)> = sets.try_iter().collect();
    assert_eq!(received, vec![("Node2".to_string(), 0.1)]);
}

#[test]
fn test_rejected_command_aborts_run() {
    let (port, _sets) = start_fake_server(true);
    let mut client = TraciClient::connect(("127.0.0.1", port)).unwrap();
    let mut engine = PreemptionEngine::new(DesiredPhaseTable::builtin());

    let err = drive(&mut client, &mut engine, DriveOptions::default()).unwrap_err();
    let message = format!("{:#}", err);

    assert!(message.contains("trafficlight.setPhaseDuration(Node2)"));
    assert!(message.contains("tls rejected"));
}

#[test]
fn test_connect_retries_give_up() {
    let port = free_port().unwrap();
    let wait = std::time::Duration::from_millis(10);
    let result = TraciClient::connect_with_retries("127.0.0.1", port, 2, wait);
    assert!(result.is_err());
}
