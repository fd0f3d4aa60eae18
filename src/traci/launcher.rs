//! Starting SUMO as a child process and attaching to it

use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::env;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use super::client::{TraciClient, CONNECT_RETRY_WAIT};

/// How to start SUMO
#[derive(Debug, Clone)]
pub struct SumoLaunch {
    pub config: PathBuf,
    pub gui: bool,
    /// Explicit binary; otherwise found via `SUMO_HOME` or `PATH`
    pub binary: Option<PathBuf>,
    pub step_length: f64,
    /// Milliseconds between GUI steps, ignored without `gui`
    pub delay: u32,
    pub lateral_resolution: f64,
    pub connect_retries: u32,
}

impl SumoLaunch {
    pub fn new(config: impl Into<PathBuf>) -> Self {
        Self {
            config: config.into(),
            gui: false,
            binary: None,
            step_length: 0.05,
            delay: 1000,
            lateral_resolution: 0.1,
            connect_retries: 60,
        }
    }

    /// Command-line arguments for a server listening on `port`
    pub fn args(&self, port: u16) -> Vec<String> {
        let mut args = vec![
            "-c".to_string(),
            self.config.display().to_string(),
            "--step-length".to_string(),
            self.step_length.to_string(),
        ];
        if self.gui {
            args.push("--delay".to_string());
            args.push(self.delay.to_string());
        }
        args.extend([
            "--lateral-resolution".to_string(),
            self.lateral_resolution.to_string(),
            "--remote-port".to_string(),
            port.to_string(),
        ]);
        args
    }

    /// Spawn SUMO on a free port and connect to it
    pub fn spawn(&self) -> Result<SumoSession> {
        let binary = match &self.binary {
            Some(binary) => binary.clone(),
            None => find_sumo_binary(self.gui)?,
        };
        let port = free_port()?;

        info!("Starting {} on port {}", binary.display(), port);
        let mut child = Command::new(&binary)
            .args(self.args(port))
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start {}", binary.display()))?;

        match TraciClient::connect_with_retries(
            "localhost",
            port,
            self.connect_retries,
            CONNECT_RETRY_WAIT,
        ) {
            Ok(client) => Ok(SumoSession {
                child: Some(child),
                client,
            }),
            Err(err) => {
                if let Err(kill_err) = child.kill() {
                    warn!("Failed to stop SUMO: {}", kill_err);
                }
                Err(err)
            }
        }
    }
}

/// Binary name for the command-line or GUI build
fn binary_name(gui: bool) -> String {
    let base = if gui { "sumo-gui" } else { "sumo" };
    format!("{}{}", base, env::consts::EXE_SUFFIX)
}

/// Locate SUMO: `$SUMO_HOME/bin` first, then every `PATH` entry
pub fn find_sumo_binary(gui: bool) -> Result<PathBuf> {
    let name = binary_name(gui);

    if let Some(home) = env::var_os("SUMO_HOME") {
        let candidate = Path::new(&home).join("bin").join(&name);
        if candidate.is_file() {
            return Ok(candidate);
        }
        warn!("SUMO_HOME is set but {} was not found", candidate.display());
    }

    if let Some(path) = env::var_os("PATH") {
        if let Some(found) = env::split_paths(&path)
            .map(|dir| dir.join(&name))
            .find(|candidate| candidate.is_file())
        {
            return Ok(found);
        }
    }

    bail!(
        "Could not find {}; set SUMO_HOME or pass --sumo-binary",
        name
    )
}

/// Ask the OS for a port nobody is listening on
pub fn free_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).context("Failed to reserve a port")?;
    Ok(listener.local_addr()?.port())
}

/// A connected simulator, optionally owning the SUMO process behind it
pub struct SumoSession {
    child: Option<Child>,
    client: TraciClient,
}

impl SumoSession {
    /// Wrap a connection to a SUMO instance started elsewhere
    pub fn attach(client: TraciClient) -> Self {
        Self {
            child: None,
            client,
        }
    }

    pub fn client_mut(&mut self) -> &mut TraciClient {
        &mut self.client
    }

    /// Close the connection and wait for an owned SUMO process to exit
    pub fn shutdown(mut self) -> Result<()> {
        self.client.close().context("close()")?;
        if let Some(mut child) = self.child.take() {
            let status = child.wait().context("Failed to wait for SUMO")?;
            info!("SUMO exited with {}", status);
        }
        Ok(())
    }
}

impl Drop for SumoSession {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            // Still running after an error: don't leave it behind
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
