//! Blocking TraCI client over TCP

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use super::codec::{encode_message, ensure_type, read_message, Command, Response};
use super::constants::*;
use crate::preemption::{NextSignal, TlsId, VehicleId};
use crate::simulator::TrafficSimulator;

/// Pause between connection attempts while SUMO starts up
pub const CONNECT_RETRY_WAIT: Duration = Duration::from_secs(1);

/// One connection to a SUMO TraCI server. Requests are strictly
/// request/response; nothing is pipelined.
pub struct TraciClient {
    stream: TcpStream,
}

impl TraciClient {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).context("Failed to connect to TraCI server")?;
        stream
            .set_nodelay(true)
            .context("Failed to configure TraCI socket")?;
        Ok(Self { stream })
    }

    /// Connect, retrying while the server is not yet listening
    pub fn connect_with_retries(
        host: &str,
        port: u16,
        retries: u32,
        wait: Duration,
    ) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match Self::connect((host, port)) {
                Ok(client) => {
                    info!("Connected to TraCI server at {}:{}", host, port);
                    return Ok(client);
                }
                Err(err) if attempt < retries => {
                    attempt += 1;
                    debug!(
                        "TraCI connection attempt {} to {}:{} failed: {:#}",
                        attempt, host, port, err
                    );
                    thread::sleep(wait);
                }
                Err(err) => {
                    warn!("Giving up on {}:{} after {} retries", host, port, retries);
                    return Err(err);
                }
            }
        }
    }

    /// Send one command and return the response positioned after its status
    fn exchange(&mut self, command: Command) -> Result<Response> {
        let message = encode_message(std::slice::from_ref(&command));
        self.stream
            .write_all(&message)
            .context("Failed to send TraCI command")?;

        let mut response = read_message(&mut self.stream)?;
        response.check_status(command.id())?;
        Ok(response)
    }

    /// Read a variable and return the response positioned at its value
    fn get(&mut self, domain: u8, variable: u8, object: &str, value_type: u8) -> Result<Response> {
        let mut response = self.exchange(Command::get(domain, variable, object))?;
        let found = response.read_get_header(domain, variable, object)?;
        ensure_type(found, value_type, "Response value")?;
        Ok(response)
    }

    fn get_string(&mut self, domain: u8, variable: u8, object: &str) -> Result<String> {
        self.get(domain, variable, object, TYPE_STRING)?.read_string()
    }

    fn get_int(&mut self, domain: u8, variable: u8, object: &str) -> Result<i32> {
        self.get(domain, variable, object, TYPE_INTEGER)?.read_i32()
    }

    fn get_double(&mut self, domain: u8, variable: u8, object: &str) -> Result<f64> {
        self.get(domain, variable, object, TYPE_DOUBLE)?.read_f64()
    }

    /// API level and server description
    pub fn version(&mut self) -> Result<(i32, String)> {
        let mut response = self.exchange(Command::new(CMD_GETVERSION))?;
        response.read_length()?;
        let id = response.read_u8()?;
        if id != CMD_GETVERSION {
            bail!("Unexpected version response {:#04x}", id);
        }
        let api = response.read_i32()?;
        let description = response.read_string()?;
        Ok((api, description))
    }

    /// Advance SUMO by exactly one step
    pub fn simulation_step(&mut self) -> Result<()> {
        let mut command = Command::new(CMD_SIMSTEP);
        command.put_f64(0.0);
        let mut response = self.exchange(command)?;

        // No subscriptions are ever made, so none may come back
        let subscriptions = response.read_i32()?;
        if subscriptions != 0 {
            bail!("Unexpected {} subscription results", subscriptions);
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.exchange(Command::new(CMD_CLOSE))?;
        debug!("TraCI connection closed");
        Ok(())
    }
}

impl TrafficSimulator for TraciClient {
    fn vehicle_ids(&mut self) -> Result<Vec<VehicleId>> {
        let ids = self
            .get(CMD_GET_VEHICLE_VARIABLE, ID_LIST, "", TYPE_STRINGLIST)?
            .read_string_list()?;
        Ok(ids.into_iter().map(VehicleId).collect())
    }

    fn vehicle_type(&mut self, vehicle: &VehicleId) -> Result<String> {
        self.get_string(CMD_GET_VEHICLE_VARIABLE, VAR_TYPE, vehicle.as_str())
    }

    fn vehicle_road(&mut self, vehicle: &VehicleId) -> Result<String> {
        self.get_string(CMD_GET_VEHICLE_VARIABLE, VAR_ROAD_ID, vehicle.as_str())
    }

    fn next_signals(&mut self, vehicle: &VehicleId) -> Result<Vec<NextSignal>> {
        self.get(
            CMD_GET_VEHICLE_VARIABLE,
            VAR_NEXT_TLS,
            vehicle.as_str(),
            TYPE_COMPOUND,
        )?
        .read_next_tls()
    }

    fn phase(&mut self, tls: &TlsId) -> Result<usize> {
        let phase = self.get_int(CMD_GET_TL_VARIABLE, TL_CURRENT_PHASE, tls.as_str())?;
        usize::try_from(phase).with_context(|| format!("Negative phase index {}", phase))
    }

    fn phase_duration(&mut self, tls: &TlsId) -> Result<f64> {
        self.get_double(CMD_GET_TL_VARIABLE, TL_PHASE_DURATION, tls.as_str())
    }

    fn set_phase_duration(&mut self, tls: &TlsId, seconds: f64) -> Result<()> {
        let mut command = Command::new(CMD_SET_TL_VARIABLE);
        command
            .put_u8(TL_PHASE_DURATION)
            .put_string(tls.as_str())
            .put_typed_double(seconds);
        self.exchange(command)?;
        Ok(())
    }

    fn advance_tick(&mut self) -> Result<()> {
        self.simulation_step()
    }

    fn min_expected_vehicles(&mut self) -> Result<usize> {
        let count = self.get_int(CMD_GET_SIM_VARIABLE, VAR_MIN_EXPECTED_VEHICLES, "")?;
        usize::try_from(count).with_context(|| format!("Negative vehicle count {}", count))
    }
}
