//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp a value into the range `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Wrap an angle into the half-open range (-pi, pi].
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    if angle > -pi_t && angle <= pi_t {
        return angle
    }

    let wrapped = rem_euclid(angle + pi_t, tau_t) - pi_t;

    // rem_euclid maps onto [-pi, pi), so fold the lower bound onto pi
    if wrapped <= -pi_t {
        wrapped + tau_t
    }
    else {
        wrapped
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
/// This result is not an element of the function's codomain, but it is the
/// closest floating point number in the real numbers and thus fulfills the
/// property `self == self.div_euclid(rhs) * rhs + self.rem_euclid(rhs)`
/// approximatively.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{PI, TAU};

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(1.5, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-1.5, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.25, 0.0, 1.0), 0.25);
        assert_eq!(clamp(-0.25, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_wrap_pi() {
        assert_abs_diff_eq!(wrap_pi(0.0), 0.0);
        assert_abs_diff_eq!(wrap_pi(PI), PI);
        assert_abs_diff_eq!(wrap_pi(-PI), PI);
        assert_abs_diff_eq!(wrap_pi(PI + 0.1), -PI + 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_pi(-PI - 0.1), PI - 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_pi(3.0 * TAU + 1.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_pi(-3.0 * TAU - 1.0), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_wrap_pi_range() {
        let mut angle = -20.0;
        while angle < 20.0 {
            let w = wrap_pi(angle);
            assert!(w > -PI && w <= PI, "{} wrapped to {}", angle, w);
            angle += 0.01;
        }
    }
}
