//! # Motor Equipment Commands
//!
//! Wire format of the commands sent by motor clients to the simulator and of the responses the
//! simulator sends back. One request is always answered by exactly one response.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    ops::{Index, IndexMut},
    slice::Iter,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Command name reported when a request doesn't carry one.
pub const UNKNOWN_COMMAND: &str = "unknown";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A command sent from a motor client to the simulator.
///
/// Every field is optional on the wire. A missing `command` decodes as `"unknown"` and missing
/// pins decode as `None`, which the simulator reports as an unknown pin pair.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MotorCmd {
    /// The command verb, for example `"move"` or `"stop"`.
    #[serde(default = "unknown_command")]
    pub command: String,

    #[serde(default)]
    pub pin1: Option<i64>,

    #[serde(default)]
    pub pin2: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<MotorCmdParams>,
}

/// Parameters attached to a [`MotorCmd`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct MotorCmdParams {
    /// Normalised wheel speed, default 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Response from the simulator to a [`MotorCmd`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MotorResponse {
    pub status: ResponseStatus,
    pub command: String,
    pub pin1: Option<i64>,
    pub pin2: Option<i64>,

    /// The wheel the pins resolved to, or `None` if they didn't match any wheel.
    pub wheel: Option<WheelId>,

    /// Human readable description of what happened.
    pub message: String,
}

/// One value for each wheel of the robot.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelMap<T> {
    pub north: T,
    pub south: T,
    pub east: T,
    pub west: T,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Identity of a wheel on the robot, named after the pole of the body it sits on.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
#[serde(rename_all = "lowercase")]
pub enum WheelId {
    North,
    South,
    East,
    West,
}

#[derive(Serialize, Deserialize, Debug, Eq, PartialEq, Copy, Clone)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The command was executed.
    Ok,

    /// The command was understood but not executed, for example unknown pins.
    Warning,

    /// The command could not be understood.
    Error,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MotorCmd {
    /// Build a command with a speed parameter.
    pub fn new(command: &str, pin1: i64, pin2: i64, speed: Option<f64>) -> Self {
        Self {
            command: command.into(),
            pin1: Some(pin1),
            pin2: Some(pin2),
            params: speed.map(|s| MotorCmdParams { speed: Some(s) }),
        }
    }

    /// Requested speed, or 0 if none was given.
    pub fn speed(&self) -> f64 {
        self.params.and_then(|p| p.speed).unwrap_or(0.0)
    }
}

impl MotorResponse {
    /// Response for a request that couldn't be decoded at all.
    pub fn invalid_message() -> Self {
        Self {
            status: ResponseStatus::Error,
            command: unknown_command(),
            pin1: None,
            pin2: None,
            wheel: None,
            message: String::from("Invalid message"),
        }
    }
}

impl WheelId {
    /// Iterate over all wheels, in north, south, east, west order.
    pub fn iter() -> Iter<'static, WheelId> {
        static WHEELS: [WheelId; 4] = [WheelId::North, WheelId::South, WheelId::East, WheelId::West];
        WHEELS.iter()
    }
}

impl fmt::Display for WheelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WheelId::North => "north",
            WheelId::South => "south",
            WheelId::East => "east",
            WheelId::West => "west",
        };
        f.write_str(s)
    }
}

impl<T: Copy> WheelMap<T> {
    /// Create a map with the same value for every wheel.
    pub fn splat(value: T) -> Self {
        Self {
            north: value,
            south: value,
            east: value,
            west: value,
        }
    }

    /// Iterate over `(wheel, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (WheelId, T)> + '_ {
        WheelId::iter().map(move |w| (*w, self[*w]))
    }

    /// Apply `f` to every value.
    pub fn map<U, F: Fn(WheelId, T) -> U>(&self, f: F) -> WheelMap<U> {
        WheelMap {
            north: f(WheelId::North, self.north),
            south: f(WheelId::South, self.south),
            east: f(WheelId::East, self.east),
            west: f(WheelId::West, self.west),
        }
    }
}

impl<T> Index<WheelId> for WheelMap<T> {
    type Output = T;

    fn index(&self, wheel: WheelId) -> &Self::Output {
        match wheel {
            WheelId::North => &self.north,
            WheelId::South => &self.south,
            WheelId::East => &self.east,
            WheelId::West => &self.west,
        }
    }
}

impl<T> IndexMut<WheelId> for WheelMap<T> {
    fn index_mut(&mut self, wheel: WheelId) -> &mut Self::Output {
        match wheel {
            WheelId::North => &mut self.north,
            WheelId::South => &mut self.south,
            WheelId::East => &mut self.east,
            WheelId::West => &mut self.west,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn unknown_command() -> String {
    String::from(UNKNOWN_COMMAND)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_full_cmd() {
        let cmd: MotorCmd = serde_json::from_str(
            r#"{"command":"forward","pin1":17,"pin2":27,"params":{"speed":0.5}}"#,
        )
        .unwrap();

        assert_eq!(cmd.command, "forward");
        assert_eq!(cmd.pin1, Some(17));
        assert_eq!(cmd.pin2, Some(27));
        assert_eq!(cmd.speed(), 0.5);
    }

    #[test]
    fn test_decode_defaults() {
        let cmd: MotorCmd = serde_json::from_str(r#"{"pin1":1}"#).unwrap();
        assert_eq!(cmd.command, UNKNOWN_COMMAND);
        assert_eq!(cmd.pin2, None);
        assert_eq!(cmd.speed(), 0.0);

        let cmd: MotorCmd = serde_json::from_str(r#"{"command":"stop","params":{}}"#).unwrap();
        assert_eq!(cmd.speed(), 0.0);

        let cmd: MotorCmd = serde_json::from_str(r#"{"command":"stop","params":null}"#).unwrap();
        assert_eq!(cmd.speed(), 0.0);
    }

    #[test]
    fn test_decode_rejects_bad_types() {
        assert!(serde_json::from_str::<MotorCmd>(r#"{"command":"move","pin1":"a"}"#).is_err());
        assert!(serde_json::from_str::<MotorCmd>(
            r#"{"command":"move","params":{"speed":"fast"}}"#
        )
        .is_err());
        assert!(serde_json::from_str::<MotorCmd>("[1, 2]").is_err());
    }

    #[test]
    fn test_response_encoding() {
        let resp = MotorResponse {
            status: ResponseStatus::Warning,
            command: "stop".into(),
            pin1: Some(99),
            pin2: Some(100),
            wheel: None,
            message: "Unknown motor pins (99, 100)".into(),
        };

        let val: serde_json::Value = serde_json::to_value(&resp).unwrap();
        assert_eq!(val["status"], "warning");
        assert!(val["wheel"].is_null());
        assert_eq!(val["pin1"], 99);

        let resp = MotorResponse {
            status: ResponseStatus::Ok,
            wheel: Some(WheelId::North),
            ..resp
        };
        let val: serde_json::Value = serde_json::to_value(&resp).unwrap();
        assert_eq!(val["status"], "ok");
        assert_eq!(val["wheel"], "north");
    }

    #[test]
    fn test_wheel_map_index() {
        let mut map = WheelMap::splat(0.0);
        map[WheelId::East] = 0.25;

        assert_eq!(map.east, 0.25);
        assert_eq!(map[WheelId::West], 0.0);
        assert_eq!(map.iter().filter(|(_, v)| *v != 0.0).count(), 1);
    }
}
