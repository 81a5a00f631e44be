//! Omniwheel simulator executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise session, logging and parameters
//!     - Load the maze and place the robot
//!     - Main loop:
//!         - Motor command processing
//!         - Fixed timestep physics:
//!             - Motor response
//!             - Kinematics and integration
//!             - Collision resolution
//!         - Telemetry
//!     - Save the final state on Ctrl-C

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use log::info;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use structopt::StructOpt;

// Internal
use comms_if::net::zmq;
use sim_lib::{
    data_store::DataStore,
    maze::Maze,
    motor_server::MotorServer,
    params::SimExecParams,
    sim_loop::SimLoop,
    tm_server::{TmPacket, TmServer},
    traj_archive::TrajArchive,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "sim_exec", about = "Omniwheel robot simulator")]
struct Opt {
    /// Maze file to load, overrides the parameter file
    #[structopt(short, long, parse(from_os_str))]
    maze: Option<PathBuf>,

    /// Enable motor noise
    #[structopt(long)]
    noise: bool,

    /// Disable motor noise
    #[structopt(long, conflicts_with = "noise")]
    no_noise: bool,

    /// Seed for the motor noise generator
    #[structopt(long)]
    seed: Option<u64>,

    /// Log every physics step
    #[structopt(long)]
    trace_physics: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<()> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("sim_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger, the physics modules are very verbose at trace level
    let physics_level = match opt.trace_physics {
        true => LevelFilter::Trace,
        false => LevelFilter::Info,
    };
    logger_init(
        LevelFilter::Debug,
        &[
            ("sim_lib::robot", physics_level),
            ("sim_lib::collision", physics_level),
        ],
        &session,
    )
    .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Omniwheel Simulator Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut params: SimExecParams =
        util::params::load("sim_exec.toml").wrap_err("Could not load sim_exec params")?;

    if let Some(m) = opt.maze {
        params.maze_path = m;
    }
    if opt.noise {
        params.motor_noise.enabled = true;
    }
    if opt.no_noise {
        params.motor_noise.enabled = false;
    }
    if let Some(s) = opt.seed {
        params.motor_noise.seed = Some(s);
    }

    info!("Exec parameters loaded");

    // ---- INITIALISE SIMULATION ----

    let maze_path = match params.maze_path.is_absolute() {
        true => params.maze_path.clone(),
        false => host::get_sw_root()
            .wrap_err("Could not resolve the maze path")?
            .join(&params.maze_path),
    };
    let maze = Maze::load_or_default(&maze_path).wrap_err("Failed to load the maze")?;

    let mut ds = DataStore::new(&params, maze).wrap_err("Failed to initialise the robot")?;

    info!(
        "Robot starting at ({:.2}, {:.2}), motor noise {}",
        ds.robot.position_m.x,
        ds.robot.position_m.y,
        match params.motor_noise.enabled {
            true => "enabled",
            false => "disabled",
        }
    );
    info!("Robot parameters: {:?}", ds.robot.params());
    info!("Motor pin configuration:");
    for (wheel, pins) in params.pins.iter() {
        info!("    Pins ({}, {}) -> {} wheel", pins[0], pins[1], wheel);
    }

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = zmq::Context::new();

    let motor_server = MotorServer::new(&zmq_ctx, &params.net)
        .wrap_err("Failed to initialise the MotorServer")?;
    info!("MotorServer listening on {}", params.net.motor_endpoint);

    let tm_server =
        TmServer::new(&zmq_ctx, &params.net).wrap_err("Failed to initialise the TmServer")?;
    info!("TmServer publishing on {}", params.net.tm_endpoint);

    let mut sim_loop = SimLoop::new(motor_server, &params)
        .wrap_err("Failed to create the simulation loop")?
        .with_tm_server(tm_server);

    if params.archive_trajectory {
        let path = session.arch_root.join("trajectory.csv");
        let archive =
            TrajArchive::new(&path).wrap_err("Failed to create the trajectory archive")?;
        info!("Archiving trajectory to {:?}", path);
        sim_loop = sim_loop.with_archive(archive);
    }

    // ---- MAIN LOOP ----

    let running = setup_ctrl_c_handler().wrap_err("Failed to set the Ctrl-C handler")?;

    sim_loop
        .run(&mut ds, &running)
        .wrap_err("Error in the simulation loop")?;

    // ---- SHUTDOWN ----

    session.save("final_state.json", TmPacket::from_datastore(&ds));

    // Drop the sockets before exiting the session
    drop(sim_loop);
    session.exit();

    info!("End of execution");

    Ok(())
}

/// Set up a Ctrl-C handler that clears the returned flag.
fn setup_ctrl_c_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}
