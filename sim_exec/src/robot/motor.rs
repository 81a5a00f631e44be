//! Motor response model
//!
//! Each wheel motor is modelled as a first-order lag between the commanded
//! (target) speed and the actual speed, with an optional Gaussian fluctuation
//! to mimic real motor imprecision.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::motor::{WheelId, WheelMap};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Wheels turning slower than this (normalised) are considered stopped and do
/// not receive noise.
pub const NOISE_THRESHOLD: f64 = 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the motor noise.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotorNoiseParams {
    /// Whether noise is added at all.
    pub enabled: bool,

    /// Standard deviation of the noise, in normalised speed units.
    pub std_dev: f64,

    /// Seed for the noise generator. If `None` the generator is seeded from
    /// the OS entropy source.
    pub seed: Option<u64>,
}

/// First-order lag model shared by all four wheel motors.
pub struct MotorLag {
    /// Motor time constant
    ///
    /// Units: seconds
    tau_s: f64,

    noise: Option<MotorNoise>,
}

struct MotorNoise {
    rng: ChaCha8Rng,
    dist: Normal<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MotorError {
    #[error("Invalid motor noise standard deviation: {0}")]
    InvalidNoiseStdDev(f64),

    #[error("Motor time constant must be non-negative, found {0}")]
    InvalidTimeConstant(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for MotorNoiseParams {
    fn default() -> Self {
        Self {
            enabled: false,
            std_dev: 0.03,
            seed: None,
        }
    }
}

impl MotorLag {
    /// Create a new motor model with the given time constant and noise.
    pub fn new(tau_s: f64, noise_params: &MotorNoiseParams) -> Result<Self, MotorError> {
        if !(tau_s >= 0.0) {
            return Err(MotorError::InvalidTimeConstant(tau_s));
        }

        let noise = match noise_params.enabled {
            true => {
                // Normal only rejects a non-finite deviation
                if !(noise_params.std_dev >= 0.0 && noise_params.std_dev.is_finite()) {
                    return Err(MotorError::InvalidNoiseStdDev(noise_params.std_dev));
                }

                let dist = Normal::new(0.0, noise_params.std_dev)
                    .map_err(|_| MotorError::InvalidNoiseStdDev(noise_params.std_dev))?;
                let rng = match noise_params.seed {
                    Some(s) => ChaCha8Rng::seed_from_u64(s),
                    None => ChaCha8Rng::from_entropy(),
                };
                Some(MotorNoise { rng, dist })
            }
            false => None,
        };

        Ok(Self { tau_s, noise })
    }

    /// Returns true if noise is being added to the wheel speeds.
    pub fn noisy(&self) -> bool {
        self.noise.is_some()
    }

    /// Move the actual wheel speeds towards their targets over `dt` seconds.
    pub fn update(&mut self, target: &WheelMap<f64>, actual: &mut WheelMap<f64>, dt: f64) {
        let alpha = dt / (self.tau_s + dt);

        for wheel in WheelId::iter() {
            let mut speed = actual[*wheel] + alpha * (target[*wheel] - actual[*wheel]);

            if let Some(ref mut noise) = self.noise {
                if speed.abs() > NOISE_THRESHOLD {
                    speed = clamp(speed + noise.dist.sample(&mut noise.rng), -1.0, 1.0);
                }
            }

            actual[*wheel] = speed;
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    const TAU_S: f64 = 0.05;
    const DT_S: f64 = 0.01;

    fn noisy(seed: u64) -> MotorNoiseParams {
        MotorNoiseParams {
            enabled: true,
            std_dev: 0.03,
            seed: Some(seed),
        }
    }

    #[test]
    fn test_single_step() {
        let mut lag = MotorLag::new(TAU_S, &MotorNoiseParams::default()).unwrap();
        let target = WheelMap::splat(1.0);
        let mut actual = WheelMap::splat(0.0);

        lag.update(&target, &mut actual, DT_S);

        // alpha = 0.01 / 0.06
        assert_abs_diff_eq!(actual.north, 1.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(actual.west, 1.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_lag_convergence() {
        let mut lag = MotorLag::new(TAU_S, &MotorNoiseParams::default()).unwrap();
        let mut target = WheelMap::splat(0.0);
        target.north = 0.8;
        target.east = -0.6;
        let mut actual = WheelMap::splat(0.0);

        // First step at which more than 5 tau has elapsed
        let num_steps = (5.0 * TAU_S / DT_S).ceil() as usize + 1;

        let mut prev = actual;
        for _ in 0..num_steps {
            lag.update(&target, &mut actual, DT_S);

            // Monotone approach with no overshoot
            assert!(actual.north >= prev.north && actual.north <= 0.8);
            assert!(actual.east <= prev.east && actual.east >= -0.6);
            assert_eq!(actual.south, 0.0);

            prev = actual;
        }

        assert!((actual.north - 0.8).abs() < 0.01 * 0.8);
        assert!((actual.east + 0.6).abs() < 0.01 * 0.6);
    }

    #[test]
    fn test_noise_seeded() {
        let target = WheelMap::splat(0.5);

        let mut lag_a = MotorLag::new(TAU_S, &noisy(7)).unwrap();
        let mut lag_b = MotorLag::new(TAU_S, &noisy(7)).unwrap();
        let mut a = WheelMap::splat(0.0);
        let mut b = WheelMap::splat(0.0);

        for _ in 0..50 {
            lag_a.update(&target, &mut a, DT_S);
            lag_b.update(&target, &mut b, DT_S);
        }

        assert!(lag_a.noisy());
        assert_eq!(a, b);
        assert!(a.iter().all(|(_, s)| (-1.0..=1.0).contains(&s)));
        assert!(a.north != a.south || a.east != a.west);
    }

    #[test]
    fn test_noise_skips_stopped_wheels() {
        let mut lag = MotorLag::new(TAU_S, &noisy(3)).unwrap();
        let target = WheelMap::splat(0.0);
        let mut actual = WheelMap::splat(0.0);

        for _ in 0..20 {
            lag.update(&target, &mut actual, DT_S);
        }

        assert_eq!(actual, WheelMap::splat(0.0));
    }

    #[test]
    fn test_noise_clamped() {
        let params = MotorNoiseParams {
            enabled: true,
            std_dev: 5.0,
            seed: Some(11),
        };
        let mut lag = MotorLag::new(TAU_S, &params).unwrap();
        let target = WheelMap::splat(1.0);
        let mut actual = WheelMap::splat(1.0);

        for _ in 0..20 {
            lag.update(&target, &mut actual, DT_S);
            assert!(actual.iter().all(|(_, s)| (-1.0..=1.0).contains(&s)));
        }
    }

    #[test]
    fn test_invalid_params() {
        let params = MotorNoiseParams {
            enabled: true,
            std_dev: -1.0,
            seed: None,
        };
        assert!(matches!(
            MotorLag::new(TAU_S, &params),
            Err(MotorError::InvalidNoiseStdDev(_))
        ));
        for std_dev in [f64::NAN, f64::INFINITY].iter() {
            let params = MotorNoiseParams {
                enabled: true,
                std_dev: *std_dev,
                seed: None,
            };
            assert!(matches!(
                MotorLag::new(TAU_S, &params),
                Err(MotorError::InvalidNoiseStdDev(_))
            ));
        }

        // A disabled generator isn't validated
        let params = MotorNoiseParams {
            enabled: false,
            std_dev: -1.0,
            seed: None,
        };
        assert!(MotorLag::new(TAU_S, &params).is_ok());

        assert!(matches!(
            MotorLag::new(-0.1, &MotorNoiseParams::default()),
            Err(MotorError::InvalidTimeConstant(_))
        ));
    }
}
