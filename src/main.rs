use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;

use signal_preemption::driver::{drive, DriveOptions};
use signal_preemption::preemption::{
    DesiredPhaseTable, PreemptionEngine, PreemptionTiming, DEFAULT_EXTENSION,
    DEFAULT_FORCED_TRANSITION, DEFAULT_MIN_GREEN,
};
use signal_preemption::simulation::{SimWorld, DEFAULT_STEP_LENGTH};
use signal_preemption::traci::{SumoLaunch, SumoSession, TraciClient, CONNECT_RETRY_WAIT};

/// Tick limit for demo runs when none is given
const DEMO_MAX_TICKS: u64 = 20_000;

#[derive(Parser)]
#[command(name = "signal_preemption")]
#[command(about = "Emergency-vehicle traffic signal preemption")]
struct Cli {
    #[command(flatten)]
    controller: ControllerArgs,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Args)]
struct ControllerArgs {
    /// JSON file mapping intersections to their north-south/east-west phases
    #[arg(long, global = true)]
    phase_table: Option<PathBuf>,

    /// Minimum green guaranteed when extending, in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_MIN_GREEN)]
    min_green: f64,

    /// Seconds added to an already-green desired phase
    #[arg(long, global = true, default_value_t = DEFAULT_EXTENSION)]
    extension: f64,

    /// Remaining duration used to cut a phase short, in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_FORCED_TRANSITION)]
    forced_transition: f64,

    /// Stop after this many ticks
    #[arg(long, global = true)]
    max_ticks: Option<u64>,
}

#[derive(Subcommand)]
enum Mode {
    /// Run against the built-in headless simulation
    Demo {
        /// Seed for reproducible background traffic
        #[arg(long)]
        seed: Option<u64>,

        /// Simulation step in seconds
        #[arg(long, default_value_t = DEFAULT_STEP_LENGTH)]
        step_length: f64,

        /// Number of random passenger trips
        #[arg(long, default_value_t = 40)]
        passengers: usize,
    },
    /// Run against SUMO over TraCI
    Sumo(SumoArgs),
}

#[derive(Args)]
struct SumoArgs {
    /// SUMO configuration file
    #[arg(short = 'c', long, required_unless_present = "port")]
    config: Option<PathBuf>,

    /// Use sumo-gui instead of sumo
    #[arg(long)]
    gui: bool,

    /// Path to the SUMO binary
    #[arg(long)]
    sumo_binary: Option<PathBuf>,

    #[arg(long, default_value_t = 0.05)]
    step_length: f64,

    /// GUI delay between steps in milliseconds
    #[arg(long, default_value_t = 1000)]
    delay: u32,

    #[arg(long, default_value_t = 0.1)]
    lateral_resolution: f64,

    /// Attach to an already running TraCI server instead of starting SUMO
    #[arg(long)]
    port: Option<u16>,

    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(long, default_value_t = 60)]
    connect_retries: u32,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut engine = build_engine(&cli.controller)?;

    match cli.mode {
        Mode::Demo {
            seed,
            step_length,
            passengers,
        } => run_demo(&mut engine, cli.controller.max_ticks, seed, step_length, passengers),
        Mode::Sumo(args) => run_sumo(&mut engine, cli.controller.max_ticks, args),
    }
}

fn build_engine(args: &ControllerArgs) -> Result<PreemptionEngine> {
    let phase_table = match &args.phase_table {
        Some(path) => DesiredPhaseTable::load(path)?,
        None => DesiredPhaseTable::builtin(),
    };
    info!("Phase table covers {} approaches", phase_table.len());

    let timing = PreemptionTiming {
        min_green: args.min_green,
        extension: args.extension,
        forced_transition: args.forced_transition,
    };
    Ok(PreemptionEngine::new(phase_table).with_timing(timing))
}

fn run_demo(
    engine: &mut PreemptionEngine,
    max_ticks: Option<u64>,
    seed: Option<u64>,
    step_length: f64,
    passengers: usize,
) -> Result<()> {
    println!("Running emergency preemption against the headless simulation...");

    let mut world = match seed {
        Some(seed) => SimWorld::create_demo_world_with_seed(step_length, seed, passengers)?,
        None => SimWorld::build_demo_world(SimWorld::new(step_length), passengers)?,
    };

    let options = DriveOptions {
        max_ticks: Some(max_ticks.unwrap_or(DEMO_MAX_TICKS)),
    };
    let stats = drive(&mut world, engine, options)?;

    stats.log_summary();
    world.print_summary();
    Ok(())
}

fn run_sumo(engine: &mut PreemptionEngine, max_ticks: Option<u64>, args: SumoArgs) -> Result<()> {
    let mut session = match (args.port, args.config) {
        (Some(port), _) => {
            let client = TraciClient::connect_with_retries(
                &args.host,
                port,
                args.connect_retries,
                CONNECT_RETRY_WAIT,
            )?;
            SumoSession::attach(client)
        }
        (None, Some(config)) => {
            let launch = SumoLaunch {
                config,
                gui: args.gui,
                binary: args.sumo_binary,
                step_length: args.step_length,
                delay: args.delay,
                lateral_resolution: args.lateral_resolution,
                connect_retries: args.connect_retries,
            };
            launch.spawn()?
        }
        (None, None) => anyhow::bail!("Either --config or --port is required"),
    };

    let (api, description) = session.client_mut().version().context("getVersion()")?;
    info!("Connected to {} (TraCI API {})", description, api);

    let stats = drive(session.client_mut(), engine, DriveOptions { max_ticks })?;
    stats.log_summary();
    session.shutdown()
}
