//! # Data Store
//!
//! All mutable state of the simulation, owned by the main loop and passed by
//! reference to the command processor and the servers.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{info, warn};
use nalgebra::Point2;

use crate::{
    cmd_processor::PinTable,
    collision::{CollisionHandler, DEFAULT_RESOLVE_ITERATIONS},
    maze::Maze,
    params::SimExecParams,
    robot::{MotorError, Robot, StartPose},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Text shown as the last command before any command has been received.
pub const NO_COMMAND: &str = "None";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
pub struct DataStore {
    // Cycle management
    /// Number of main loop cycles already executed
    pub num_cycles: u64,

    /// Number of physics steps already executed
    pub num_steps: u64,

    /// Simulation elapsed time, advanced in physics steps
    pub sim_time_s: f64,

    /// Wall time not yet consumed by physics steps
    pub accumulator_s: f64,

    // Simulation
    pub robot: Robot,

    pub collision: CollisionHandler,

    pub pins: PinTable,

    /// True if a collision had to be resolved in the last physics step
    pub collided: bool,

    /// Human readable summary of the last command, for display
    pub last_command: String,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Build the simulation state for the given maze.
    pub fn new(params: &SimExecParams, maze: Maze) -> Result<Self, MotorError> {
        let collision = CollisionHandler::new(maze);

        let start = start_pose(
            &collision,
            params.robot.radius_m,
            params.start_heading_rad,
            params.start_search_radius_m,
        );

        let robot = Robot::new(params.robot.clone(), &params.motor_noise, start)?;

        Ok(Self {
            num_cycles: 0,
            num_steps: 0,
            sim_time_s: 0.0,
            accumulator_s: 0.0,
            robot,
            collision,
            pins: PinTable::new(params.pins),
            collided: false,
            last_command: NO_COMMAND.into(),
            num_consec_cycle_overruns: 0,
        })
    }

    /// Advance the physics by one step of `dt` seconds.
    ///
    /// The robot is integrated, pushed out of any walls and then kept inside the arena. Returns
    /// true if a collision was resolved.
    pub fn step_physics(&mut self, dt: f64) -> bool {
        self.robot.step(dt);

        let resolved = self
            .collision
            .resolve_collision(&mut self.robot, DEFAULT_RESOLVE_ITERATIONS);
        let clamped = self.collision.clamp_to_arena(&mut self.robot);

        self.collided = resolved || clamped;
        self.sim_time_s += dt;
        self.num_steps += 1;

        self.collided
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Find where the robot should start: the arena centre if it is clear, otherwise the nearest
/// clear point around it.
fn start_pose(
    collision: &CollisionHandler,
    radius: f64,
    heading_rad: f64,
    search_radius: f64,
) -> StartPose {
    let centre = collision.maze().centre();

    let position_m = match collision.find_valid_position(&centre, radius, search_radius) {
        Some(p) => p,
        None => {
            warn!(
                "No collision-free start position within {} m of the arena centre, starting at \
                 the centre",
                search_radius
            );
            centre
        }
    };

    if position_m != centre {
        info!(
            "Arena centre is blocked, robot starts at ({:.3}, {:.3})",
            position_m.x, position_m.y
        );
    }

    StartPose {
        position_m: Point2::new(position_m.x, position_m.y),
        heading_rad,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::motor::WheelId;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_start_at_centre() {
        let ds = DataStore::new(&SimExecParams::default(), Maze::default()).unwrap();

        assert_eq!(ds.robot.position_m, Point2::new(1.0, 1.0));
        assert_eq!(ds.robot.heading_rad, FRAC_PI_2);
        assert_eq!(ds.last_command, NO_COMMAND);
        assert_eq!(ds.num_steps, 0);
    }

    #[test]
    fn test_start_moved_off_wall() {
        // Centre of this maze is inside a wall
        let maze = Maze::from_ascii(
            "blocked",
            0.2,
            &["#####", "#...#", "#.#.#", "#...#", "#####"],
        )
        .unwrap();
        let ds = DataStore::new(&SimExecParams::default(), maze).unwrap();

        let start = ds.robot.start_pose().position_m;
        assert!(start != Point2::new(0.5, 0.5));
        assert!(!ds.collision.check_collision(&start, 0.075).collides);
    }

    #[test]
    fn test_step_physics() {
        let mut ds = DataStore::new(&SimExecParams::default(), Maze::default()).unwrap();
        ds.robot.set_wheel_target(WheelId::West, 1.0);
        ds.robot.set_wheel_target(WheelId::East, -1.0);

        for _ in 0..10 {
            assert!(!ds.step_physics(0.01));
        }

        assert_eq!(ds.num_steps, 10);
        assert!((ds.sim_time_s - 0.1).abs() < 1e-12);

        // Facing +Y in the world, forward drive moves towards -X
        assert!(ds.robot.position_m.x < 1.0);
    }

    #[test]
    fn test_drive_into_wall() {
        let mut ds = DataStore::new(&SimExecParams::default(), Maze::default()).unwrap();
        ds.robot.set_wheel_target(WheelId::West, 1.0);
        ds.robot.set_wheel_target(WheelId::East, -1.0);

        let mut any_collision = false;
        for _ in 0..500 {
            any_collision |= ds.step_physics(0.01);
        }

        // Stopped against the inside of the west border wall
        assert!(any_collision);
        assert!(ds.robot.position_m.x >= 0.2 + 0.075 - 1e-3);
        assert!(ds.robot.position_m.x < 0.3);
    }
}
