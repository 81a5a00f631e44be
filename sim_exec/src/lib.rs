//! # Simulator library.
//!
//! This library allows other crates in the workspace, as well as the integration tests and
//! benchmarks, to access items defined inside the simulator crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Motor command processor - applies decoded commands to the robot
pub mod cmd_processor;

/// Collision detection and response against the maze
pub mod collision;

/// Global state of the simulation
pub mod data_store;

/// Maze grid and maze file loading
pub mod maze;

/// Motor server - recieves motor commands from clients
pub mod motor_server;

/// Parameters of the simulator executable
pub mod params;

/// Robot physics model
pub mod robot;

/// Fixed timestep simulation loop
pub mod sim_loop;

/// Telemetry server - publishes the simulation state
pub mod tm_server;

/// Trajectory archive - CSV record of every physics step
pub mod traj_archive;
