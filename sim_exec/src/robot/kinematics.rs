//! Omniwheel kinematics
//!
//! The robot has four omniwheels mounted tangentially at the poles of a
//! circular body:
//!
//! ```text
//!            N
//!           ═══
//!            │
//!   W ║──────●──────║ E
//!            │
//!           ═══
//!            S
//! ```
//!
//! The body frame has +X to the right and +Y forward. World velocities are
//! the body velocities rotated by the heading. The north and south wheels
//! drive the strafe (X) axis, east and west drive the forward (Y) axis, and
//! all four wheels turning the same way rotate the body clockwise.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::motor::WheelMap;
use nalgebra::{Rotation2, Vector2};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Velocity of the robot body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyVelocity {
    /// Linear velocity in the body frame, `x` is strafe and `y` is forward.
    ///
    /// Units: meters/second
    pub linear_ms: Vector2<f64>,

    /// Rotation rate, positive counter-clockwise.
    ///
    /// Units: radians/second
    pub omega_rads: f64,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the body velocity produced by the given normalised wheel speeds.
pub fn body_velocity(
    speeds: &WheelMap<f64>,
    max_linear_speed_ms: f64,
    max_angular_speed_rads: f64,
) -> BodyVelocity {
    let WheelMap { north, south, east, west } = *speeds;

    BodyVelocity {
        linear_ms: Vector2::new(
            (north - south) / 2.0 * max_linear_speed_ms,
            (west - east) / 2.0 * max_linear_speed_ms,
        ),
        omega_rads: -(north + south + east + west) / 4.0 * max_angular_speed_rads,
    }
}

/// Rotate a body frame vector into the world frame for the given heading.
pub fn body_to_world(body: &Vector2<f64>, heading_rad: f64) -> Vector2<f64> {
    Rotation2::new(heading_rad) * *body
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;
    use std::f64::consts::{FRAC_PI_2, PI};

    const MAX_LIN: f64 = 0.5;
    const MAX_ANG: f64 = 4.0;

    fn wheels(north: f64, south: f64, east: f64, west: f64) -> WheelMap<f64> {
        WheelMap { north, south, east, west }
    }

    #[rstest]
    #[case(1.0)]
    #[case(0.5)]
    #[case(-0.3)]
    fn test_pure_rotation(#[case] s: f64) {
        let v = body_velocity(&WheelMap::splat(s), MAX_LIN, MAX_ANG);

        assert_abs_diff_eq!(v.linear_ms.x, 0.0);
        assert_abs_diff_eq!(v.linear_ms.y, 0.0);
        assert_abs_diff_eq!(v.omega_rads, -s * MAX_ANG, epsilon = 1e-12);
    }

    #[rstest]
    #[case(1.0)]
    #[case(0.4)]
    fn test_forward(#[case] s: f64) {
        let v = body_velocity(&wheels(0.0, 0.0, -s, s), MAX_LIN, MAX_ANG);

        assert_abs_diff_eq!(v.linear_ms.x, 0.0);
        assert_abs_diff_eq!(v.linear_ms.y, s * MAX_LIN, epsilon = 1e-12);
        assert_abs_diff_eq!(v.omega_rads, 0.0);
    }

    #[test]
    fn test_strafe() {
        let v = body_velocity(&wheels(0.6, -0.6, 0.0, 0.0), MAX_LIN, MAX_ANG);

        assert_abs_diff_eq!(v.linear_ms.x, 0.6 * MAX_LIN, epsilon = 1e-12);
        assert_abs_diff_eq!(v.linear_ms.y, 0.0);
        assert_abs_diff_eq!(v.omega_rads, 0.0);
    }

    #[rstest]
    #[case(0.0, Vector2::new(0.0, 1.0))]
    #[case(FRAC_PI_2, Vector2::new(-1.0, 0.0))]
    #[case(PI, Vector2::new(0.0, -1.0))]
    #[case(-FRAC_PI_2, Vector2::new(1.0, 0.0))]
    fn test_forward_to_world(#[case] heading: f64, #[case] expected: Vector2<f64>) {
        let world = body_to_world(&Vector2::new(0.0, 1.0), heading);

        assert_abs_diff_eq!(world.x, expected.x, epsilon = 1e-12);
        assert_abs_diff_eq!(world.y, expected.y, epsilon = 1e-12);
    }
}
