//! # Motor Server Module
//!
//! This module abstracts over the networking side of the motor command interface. Clients
//! connect with a REQ socket and send one [`MotorCmd`](comms_if::eqpt::motor::MotorCmd) at a
//! time, each of which must be answered with exactly one [`MotorResponse`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::motor::MotorResponse,
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};

use crate::sim_loop::CmdChannel;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Server side of the motor command interface.
pub struct MotorServer {
    /// REP socket which accepts commands from the client
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the [`MotorServer`]
#[derive(thiserror::Error, Debug)]
pub enum MotorServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not recieve a command from the client: {0}")]
    RecvError(zmq::Error),

    #[error("Could not send the response to the client: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the response: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MotorServer {
    /// Create a new instance of the motor server.
    ///
    /// This function will not wait for a connection from the client before returning.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, MotorServerError> {
        // Create the socket options
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };

        // Create the socket
        let socket = MonitoredSocket::new(ctx, zmq::REP, socket_options, &params.motor_endpoint)?;

        Ok(Self { socket })
    }
}

impl CmdChannel for MotorServer {
    type Error = MotorServerError;

    fn poll(&mut self) -> Result<Option<Vec<u8>>, Self::Error> {
        match self.socket.recv_bytes(zmq::DONTWAIT) {
            Ok(b) => Ok(Some(b)),
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(e) => Err(MotorServerError::RecvError(e)),
        }
    }

    fn reply(&mut self, response: &MotorResponse) -> Result<(), Self::Error> {
        // Serialize response
        let resp_str =
            serde_json::to_string(response).map_err(MotorServerError::SerializationError)?;

        // Send response
        self.socket
            .send(&resp_str, 0)
            .map_err(MotorServerError::SendError)
    }

    fn connected(&self) -> bool {
        self.socket.connected()
    }
}

impl From<MonitoredSocketError> for MotorServerError {
    fn from(e: MonitoredSocketError) -> Self {
        MotorServerError::SocketError(e)
    }
}
