//! Simple motor command client, sends one command to the simulator and prints the response.

use comms_if::{
    eqpt::motor::{MotorCmd, MotorResponse},
    net::{MonitoredSocket, SocketOptions},
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "test_motor_client", about = "Send a motor command to the simulator")]
struct Opt {
    /// Command to send, for example `forward`, `move`, `stop`, `stop_all` or `reset`
    command: String,

    /// First pin of the motor driver
    #[structopt(default_value = "17")]
    pin1: i64,

    /// Second pin of the motor driver
    #[structopt(default_value = "27")]
    pin2: i64,

    /// Speed in the range [-1, 1]
    #[structopt(short, long, allow_hyphen_values = true)]
    speed: Option<f64>,

    /// Endpoint of the simulator's motor server
    #[structopt(short, long, default_value = "tcp://localhost:5555")]
    endpoint: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    // Create the context for zmq
    let ctx = zmq::Context::new();

    // Set the socket options
    let socket_options = SocketOptions {
        connect_timeout: 1000,
        linger: 1,
        recv_timeout: 1000,
        send_timeout: 100,
        req_correlate: true,
        req_relaxed: true,
        ..Default::default()
    };

    // Create the socket
    let socket = match MonitoredSocket::new(&ctx, zmq::REQ, socket_options, &opt.endpoint) {
        Ok(s) => s,
        Err(e) => {
            println!("Could not connect to the simulator");
            return Err(e.into());
        }
    };

    let cmd = MotorCmd::new(&opt.command, opt.pin1, opt.pin2, opt.speed);
    let cmd_str = serde_json::to_string(&cmd)?;

    println!("Sending: {}", cmd_str);
    socket.send(&cmd_str, 0)?;

    // Recieve the response from the simulator
    let msg = socket.recv_msg(0)?;
    match msg.as_str() {
        Some(r) => {
            let response: MotorResponse = serde_json::from_str(r)?;
            println!("Response: {:#?}", response);
        }
        None => println!("Response was not valid UTF-8"),
    }

    Ok(())
}
