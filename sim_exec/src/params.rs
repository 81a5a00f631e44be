//! # Simulator Executable Parameters
//!
//! This module provides parameters for the simulator executable, loaded from
//! `sim_exec.toml`. Every field has a default so a partial file is valid.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{eqpt::motor::WheelMap, net::NetParams};
use serde::Deserialize;
use std::path::PathBuf;

use crate::robot::{MotorNoiseParams, RobotParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimExecParams {
    /// Network endpoints of the motor command and telemetry sockets
    pub net: NetParams,

    /// Fixed physics timestep
    ///
    /// Units: seconds
    pub physics_dt_s: f64,

    /// Target period of one main loop cycle
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Number of physics steps in a single cycle above which a warning is issued
    pub max_steps_warn: u32,

    /// Path to the maze file. Relative paths are relative to the software root.
    pub maze_path: PathBuf,

    /// Heading the robot starts with
    ///
    /// Units: radians
    pub start_heading_rad: f64,

    /// Radius around the arena centre searched for a collision-free start position
    ///
    /// Units: meters
    pub start_search_radius_m: f64,

    pub robot: RobotParams,

    pub motor_noise: MotorNoiseParams,

    /// Motor driver pin pairs of each wheel
    pub pins: WheelMap<[i64; 2]>,

    /// If true a CSV of the robot state is written to the session archive every physics step
    pub archive_trajectory: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimExecParams {
    fn default() -> Self {
        Self {
            net: NetParams::default(),
            physics_dt_s: 0.01,
            cycle_period_s: 1.0 / 60.0,
            max_steps_warn: 10,
            maze_path: PathBuf::from("params/mazes/default.json"),
            start_heading_rad: std::f64::consts::FRAC_PI_2,
            start_search_radius_m: 1.0,
            robot: RobotParams::default(),
            motor_noise: MotorNoiseParams::default(),
            pins: WheelMap {
                north: [17, 27],
                south: [22, 23],
                east: [24, 25],
                west: [5, 6],
            },
            archive_trajectory: false,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_file() {
        let params: SimExecParams = util::params::from_str(
            r#"
            physics_dt_s = 0.005
            archive_trajectory = true

            [robot]
            radius_m = 0.1

            [motor_noise]
            enabled = true
            seed = 42

            [pins]
            north = [1, 2]
            south = [3, 4]
            east = [5, 6]
            west = [7, 8]
            "#,
        )
        .unwrap();

        assert_eq!(params.physics_dt_s, 0.005);
        assert!(params.archive_trajectory);
        assert_eq!(params.robot.radius_m, 0.1);
        assert_eq!(params.robot.max_linear_speed_ms, 0.5);
        assert!(params.motor_noise.enabled);
        assert_eq!(params.motor_noise.seed, Some(42));
        assert_eq!(params.motor_noise.std_dev, 0.03);
        assert_eq!(params.pins.west, [7, 8]);
        assert_eq!(params.net.motor_endpoint, "tcp://*:5555");
    }

    #[test]
    fn test_shipped_params() {
        let params: SimExecParams = util::params::load_from_path(
            concat!(env!("CARGO_MANIFEST_DIR"), "/../params/sim_exec.toml"),
        )
        .unwrap();

        assert_eq!(params.pins.north, [17, 27]);
        assert_eq!(params.physics_dt_s, 0.01);
        assert_eq!(params.net.tm_endpoint, "tcp://*:5556");
    }
}
