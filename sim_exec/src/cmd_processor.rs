//! # Motor command processor module
//!
//! The command processor decodes motor commands coming from any source, applies them to the
//! robot held in the [`DataStore`] and builds the response to send back to the client.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};

// Internal
use comms_if::eqpt::motor::{MotorCmd, MotorResponse, ResponseStatus, WheelId, WheelMap};
use util::maths::clamp;
use crate::data_store::DataStore;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Speeds below this magnitude are reported as stopped.
pub const STOPPED_THRESHOLD: f64 = 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Mapping between motor driver pin pairs and wheels.
#[derive(Debug, Clone, Copy)]
pub struct PinTable {
    pins: WheelMap<[i64; 2]>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl PinTable {
    pub fn new(pins: WheelMap<[i64; 2]>) -> Self {
        Self { pins }
    }

    /// Find the wheel driven by the given pins, in either order.
    pub fn lookup(&self, pin1: Option<i64>, pin2: Option<i64>) -> Option<WheelId> {
        let (p1, p2) = (pin1?, pin2?);

        self.pins
            .iter()
            .find(|(_, [a, b])| (*a == p1 && *b == p2) || (*a == p2 && *b == p1))
            .map(|(wheel, _)| wheel)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Decode and execute a raw motor command.
///
/// Payloads which are not a valid command are answered with an error response and don't modify
/// the datastore.
pub fn exec(ds: &mut DataStore, raw: &[u8]) -> MotorResponse {
    match serde_json::from_slice::<MotorCmd>(raw) {
        Ok(cmd) => handle(ds, &cmd),
        Err(e) => {
            warn!("Could not decode motor command: {}", e);
            MotorResponse::invalid_message()
        }
    }
}

/// Execute a motor command.
///
/// Mutates the robot's wheel targets and the last command text.
pub fn handle(ds: &mut DataStore, cmd: &MotorCmd) -> MotorResponse {
    debug!(
        "Recieved {} command on pins ({:?}, {:?})",
        cmd.command, cmd.pin1, cmd.pin2
    );

    // Commands which act on the whole robot don't need pins
    match cmd.command.as_str() {
        "reset" => {
            ds.robot.reset();
            ds.last_command = String::from("RESET");
            return response(cmd, ResponseStatus::Ok, None, "Robot reset to start position".into());
        }
        "stop_all" => {
            ds.robot.stop();
            ds.last_command = String::from("STOP ALL");
            return response(cmd, ResponseStatus::Ok, None, "All motors stopped".into());
        }
        _ => (),
    }

    let wheel = match ds.pins.lookup(cmd.pin1, cmd.pin2) {
        Some(w) => w,
        None => {
            let pins = format!("({}, {})", pin_str(cmd.pin1), pin_str(cmd.pin2));
            ds.last_command = format!("WARNING: Unknown pins {}", pins);
            return response(
                cmd,
                ResponseStatus::Warning,
                None,
                format!("Unknown motor pins {}", pins),
            );
        }
    };

    let label = wheel.to_string().to_uppercase();

    let message = match cmd.command.as_str() {
        "move" => {
            let speed = clamp(cmd.speed(), -1.0, 1.0);
            ds.robot.set_wheel_target(wheel, speed);

            if speed.abs() < STOPPED_THRESHOLD {
                ds.last_command = format!("{}: STOP", label);
                format!("{} stopped", wheel)
            } else if speed > 0.0 {
                ds.last_command = format!("{}: fwd {:.2}", label, speed);
                format!("{} forward at {:?}", wheel, speed)
            } else {
                ds.last_command = format!("{}: bwd {:.2}", label, speed.abs());
                format!("{} backward at {:?}", wheel, speed.abs())
            }
        }
        "forward" => {
            let speed = clamp(cmd.speed(), 0.0, 1.0);
            ds.robot.set_wheel_target(wheel, speed);
            ds.last_command = format!("{}: fwd {:.2}", label, speed);
            format!("{} forward at {:?}", wheel, speed)
        }
        "backward" => {
            let speed = clamp(cmd.speed(), 0.0, 1.0);
            ds.robot.set_wheel_target(wheel, -speed);
            ds.last_command = format!("{}: bwd {:.2}", label, speed);
            format!("{} backward at {:?}", wheel, speed)
        }
        "stop" => {
            ds.robot.set_wheel_target(wheel, 0.0);
            ds.last_command = format!("{}: STOP", label);
            format!("{} stopped", wheel)
        }
        other => {
            ds.last_command = format!("ERROR: Unknown '{}'", other);
            return response(
                cmd,
                ResponseStatus::Error,
                Some(wheel),
                format!("Unknown command: {}", other),
            );
        }
    };

    response(cmd, ResponseStatus::Ok, Some(wheel), message)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn response(
    cmd: &MotorCmd,
    status: ResponseStatus,
    wheel: Option<WheelId>,
    message: String,
) -> MotorResponse {
    MotorResponse {
        status,
        command: cmd.command.clone(),
        pin1: cmd.pin1,
        pin2: cmd.pin2,
        wheel,
        message,
    }
}

fn pin_str(pin: Option<i64>) -> String {
    match pin {
        Some(p) => p.to_string(),
        None => String::from("None"),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
