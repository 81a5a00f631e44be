//! # Robot module
//!
//! Rigid body model of the circular omniwheel robot. The robot owns its
//! motor model and integrates its own pose, while collisions against the
//! maze are handled externally by the [`crate::collision`] module.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod kinematics;
pub mod motor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::motor::{WheelId, WheelMap};
use log::trace;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use util::maths::{clamp, wrap_pi};

pub use kinematics::BodyVelocity;
pub use motor::{MotorError, MotorLag, MotorNoiseParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Physical constants of the robot.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RobotParams {
    /// Radius of the circular body.
    ///
    /// Units: meters
    pub radius_m: f64,

    /// Linear speed reached with full throttle on the drive axis.
    ///
    /// Units: meters/second
    pub max_linear_speed_ms: f64,

    /// Turn rate reached with full throttle on all wheels.
    ///
    /// Units: radians/second
    pub max_angular_speed_rads: f64,

    /// Motor response time constant.
    ///
    /// Units: seconds
    pub motor_tau_s: f64,

    /// Linear damping factor applied to all velocities.
    ///
    /// Units: 1/seconds
    pub friction_factor: f64,
}

/// Pose the robot returns to on reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartPose {
    pub position_m: Point2<f64>,
    pub heading_rad: f64,
}

/// The simulated robot.
pub struct Robot {
    params: RobotParams,

    motor: MotorLag,

    start: StartPose,

    /// Position of the body centre in the world frame.
    pub position_m: Point2<f64>,

    /// Heading, always within (-pi, pi].
    pub heading_rad: f64,

    /// Velocity in the world frame.
    pub velocity_ms: Vector2<f64>,

    pub omega_rads: f64,

    /// Wheel speeds demanded by the last accepted commands, in [-1, 1].
    pub wheel_target: WheelMap<f64>,

    /// Wheel speeds after the motor response, in [-1, 1].
    pub wheel_actual: WheelMap<f64>,
}

/// Snapshot of the robot state, suitable for telemetry and saving.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RobotStatus {
    pub position: PoseStatus,
    pub velocity: VelocityStatus,
    pub motors: MotorStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PoseStatus {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VelocityStatus {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MotorStatus {
    pub target: WheelMap<f64>,
    pub actual: WheelMap<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for RobotParams {
    fn default() -> Self {
        Self {
            radius_m: 0.075,
            max_linear_speed_ms: 0.5,
            max_angular_speed_rads: 4.0,
            motor_tau_s: 0.05,
            friction_factor: 0.1,
        }
    }
}

impl Robot {
    /// Create a new robot at rest at the given start pose.
    pub fn new(
        params: RobotParams,
        noise: &MotorNoiseParams,
        start: StartPose,
    ) -> Result<Self, MotorError> {
        let motor = MotorLag::new(params.motor_tau_s, noise)?;

        Ok(Self {
            params,
            motor,
            start,
            position_m: start.position_m,
            heading_rad: wrap_pi(start.heading_rad),
            velocity_ms: Vector2::zeros(),
            omega_rads: 0.0,
            wheel_target: WheelMap::splat(0.0),
            wheel_actual: WheelMap::splat(0.0),
        })
    }

    pub fn params(&self) -> &RobotParams {
        &self.params
    }

    pub fn radius(&self) -> f64 {
        self.params.radius_m
    }

    pub fn start_pose(&self) -> StartPose {
        self.start
    }

    /// Set the target speed of a wheel, clamped to [-1, 1].
    pub fn set_wheel_target(&mut self, wheel: WheelId, speed: f64) {
        self.wheel_target[wheel] = clamp(speed, -1.0, 1.0);
    }

    /// Advance the robot by one physics step.
    pub fn step(&mut self, dt: f64) {
        // Motor response
        self.motor.update(&self.wheel_target, &mut self.wheel_actual, dt);

        // Kinematics, velocities come straight from the wheels
        let body = kinematics::body_velocity(
            &self.wheel_actual,
            self.params.max_linear_speed_ms,
            self.params.max_angular_speed_rads,
        );
        self.velocity_ms = kinematics::body_to_world(&body.linear_ms, self.heading_rad);
        self.omega_rads = body.omega_rads;

        // Linear damping
        let damping = 1.0 - self.params.friction_factor * dt;
        self.velocity_ms *= damping;
        self.omega_rads *= damping;

        // Euler integration
        self.position_m += self.velocity_ms * dt;
        self.heading_rad = wrap_pi(self.heading_rad + self.omega_rads * dt);

        trace!(
            "Robot at ({:.4}, {:.4}, {:.4}) moving ({:.4}, {:.4}, {:.4})",
            self.position_m.x,
            self.position_m.y,
            self.heading_rad,
            self.velocity_ms.x,
            self.velocity_ms.y,
            self.omega_rads
        );
    }

    /// Zero all wheel speeds, targets and velocities.
    pub fn stop(&mut self) {
        self.wheel_target = WheelMap::splat(0.0);
        self.wheel_actual = WheelMap::splat(0.0);
        self.velocity_ms = Vector2::zeros();
        self.omega_rads = 0.0;
    }

    /// Stop the robot and return it to its start pose.
    pub fn reset(&mut self) {
        self.stop();
        self.position_m = self.start.position_m;
        self.heading_rad = wrap_pi(self.start.heading_rad);
    }

    /// World positions of the wheels.
    pub fn wheel_positions(&self) -> WheelMap<Point2<f64>> {
        let r = self.params.radius_m;
        let offsets = WheelMap {
            north: Vector2::new(0.0, r),
            south: Vector2::new(0.0, -r),
            east: Vector2::new(r, 0.0),
            west: Vector2::new(-r, 0.0),
        };

        offsets.map(|_, o| self.position_m + kinematics::body_to_world(&o, self.heading_rad))
    }

    /// Take a snapshot of the robot state.
    pub fn status(&self) -> RobotStatus {
        RobotStatus {
            position: PoseStatus {
                x: self.position_m.x,
                y: self.position_m.y,
                theta: self.heading_rad,
            },
            velocity: VelocityStatus {
                vx: self.velocity_ms.x,
                vy: self.velocity_ms.y,
                omega: self.omega_rads,
            },
            motors: MotorStatus {
                target: self.wheel_target,
                actual: self.wheel_actual,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
