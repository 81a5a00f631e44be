//! # TM Server
//!
//! Publishes the state of the simulation once per cycle, this is the feed used by displays.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use comms_if::{
    eqpt::motor::WheelMap,
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};

use crate::{data_store::DataStore, robot::RobotStatus};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telemetry server
pub struct TmServer {
    socket: MonitoredSocket,
}

/// Telemetry packet that is output by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TmPacket {
    pub sim_time_s: f64,

    pub num_steps: u64,

    pub robot: RobotStatus,

    /// World positions of the wheels as `[x, y]`
    pub wheel_positions: WheelMap<[f64; 2]>,

    pub last_command: String,

    pub collided: bool,

    pub maze_name: String,

    /// Arena size as `[width, height]`
    ///
    /// Units: meters
    pub arena_size_m: [f64; 2],
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TmServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send telemetry: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the telemetry: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmServer {
    /// Create a new instance of the TM Server.
    ///
    /// This function will not block until a subscriber connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, TmServerError> {
        // Create the socket options
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            bind: true,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 10,
            send_timeout: 10,
            ..Default::default()
        };

        // Bind the socket
        let socket = MonitoredSocket::new(ctx, zmq::PUB, socket_options, &params.tm_endpoint)
            .map_err(TmServerError::SocketError)?;

        Ok(Self { socket })
    }

    pub fn send(&mut self, ds: &DataStore) -> Result<(), TmServerError> {
        // Build packet
        let packet = TmPacket::from_datastore(ds);

        // Serialize packet
        let packet_string =
            serde_json::to_string(&packet).map_err(TmServerError::SerializationError)?;

        // Send the packet
        self.socket
            .send(&packet_string, 0)
            .map_err(TmServerError::SendError)
    }
}

impl TmPacket {
    pub fn from_datastore(ds: &DataStore) -> Self {
        let (width, height) = ds.collision.maze().dimensions();

        Self {
            sim_time_s: ds.sim_time_s,
            num_steps: ds.num_steps,
            robot: ds.robot.status(),
            wheel_positions: ds.robot.wheel_positions().map(|_, p| [p.x, p.y]),
            last_command: ds.last_command.clone(),
            collided: ds.collided,
            maze_name: ds.collision.maze().name().into(),
            arena_size_m: [width, height],
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{maze::Maze, params::SimExecParams};

    #[test]
    fn test_packet_from_datastore() {
        let mut ds = DataStore::new(&SimExecParams::default(), Maze::default()).unwrap();
        ds.last_command = String::from("NORTH: fwd 0.50");
        ds.step_physics(0.01);

        let packet = TmPacket::from_datastore(&ds);
        assert_eq!(packet.num_steps, 1);
        assert_eq!(packet.maze_name, "default");
        assert_eq!(packet.arena_size_m, [2.0, 2.0]);
        assert_eq!(packet.last_command, "NORTH: fwd 0.50");
        assert!(!packet.collided);

        let val = serde_json::to_value(&packet).unwrap();
        assert_eq!(val["robot"]["position"]["x"], ds.robot.position_m.x);
        assert_eq!(val["wheel_positions"]["north"][0], ds.robot.wheel_positions().north.x);
        assert_eq!(val["maze_name"], "default");
    }
}
