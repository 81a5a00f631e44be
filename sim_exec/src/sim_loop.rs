//! # Simulation loop
//!
//! Fixed timestep driver of the simulation. Each cycle the loop:
//!
//! 1. Services at most one pending motor command, replying to it immediately.
//! 2. Runs as many physics steps as the elapsed wall time allows.
//! 3. Publishes telemetry.
//!
//! The [`SimLoop::run`] function adds pacing to the configured cycle period and exits when the
//! running flag is cleared.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::motor::MotorResponse;
use log::{debug, info, warn};
use std::{
    fmt::Display,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use crate::{
    cmd_processor, data_store::DataStore, params::SimExecParams, tm_server::TmServer,
    traj_archive::TrajArchive,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Longest accepted cycle period.
///
/// Units: seconds
pub const MAX_CYCLE_PERIOD_S: f64 = 60.0;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of raw motor commands which expects one reply per command.
pub trait CmdChannel {
    type Error: Display;

    /// Get the next pending command without blocking, or `None` if there isn't one.
    fn poll(&mut self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Reply to the last command returned by [`CmdChannel::poll`].
    fn reply(&mut self, response: &MotorResponse) -> Result<(), Self::Error>;

    /// Returns true if a client is attached to the channel.
    fn connected(&self) -> bool {
        true
    }
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The simulation loop.
pub struct SimLoop<C: CmdChannel> {
    state: LoopState,

    channel: C,

    tm_server: Option<TmServer>,

    archive: Option<TrajArchive>,

    physics_dt_s: f64,

    cycle_period: Duration,

    max_steps_warn: u32,

    client_connected: bool,
}

/// Summary of what happened during a single cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// True if a command was handled this cycle
    pub cmd_handled: bool,

    /// Number of physics steps executed
    pub num_steps: u32,

    /// True if any step in this cycle resolved a collision
    pub collided: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Created but not yet started
    Idle,

    Running,

    /// Finished, the loop cannot be restarted
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum SimLoopError {
    #[error("The simulation loop is {0:?}, expected it to be {1:?}")]
    InvalidState(LoopState, LoopState),

    #[error("The physics timestep must be positive, found {0}")]
    InvalidTimestep(f64),

    #[error("The cycle period must be between 0 and 60 s, found {0}")]
    InvalidCyclePeriod(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<C: CmdChannel> SimLoop<C> {
    /// Create a new loop reading commands from the given channel.
    pub fn new(channel: C, params: &SimExecParams) -> Result<Self, SimLoopError> {
        if !(params.physics_dt_s > 0.0) {
            return Err(SimLoopError::InvalidTimestep(params.physics_dt_s));
        }
        if !(0.0..=MAX_CYCLE_PERIOD_S).contains(&params.cycle_period_s) {
            return Err(SimLoopError::InvalidCyclePeriod(params.cycle_period_s));
        }

        Ok(Self {
            state: LoopState::Idle,
            channel,
            tm_server: None,
            archive: None,
            physics_dt_s: params.physics_dt_s,
            cycle_period: Duration::from_secs_f64(params.cycle_period_s),
            max_steps_warn: params.max_steps_warn,
            client_connected: false,
        })
    }

    /// Publish telemetry through the given server every cycle.
    pub fn with_tm_server(mut self, tm_server: TmServer) -> Self {
        self.tm_server = Some(tm_server);
        self
    }

    /// Write every physics step into the given archive.
    pub fn with_archive(mut self, archive: TrajArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn archive(&self) -> Option<&TrajArchive> {
        self.archive.as_ref()
    }

    /// Whether a client was attached to the channel at the last cycle.
    pub fn client_connected(&self) -> bool {
        self.client_connected
    }

    /// Move the loop into the running state.
    pub fn start(&mut self) -> Result<(), SimLoopError> {
        match self.state {
            LoopState::Idle => {
                self.state = LoopState::Running;
                Ok(())
            }
            s => Err(SimLoopError::InvalidState(s, LoopState::Idle)),
        }
    }

    /// Stop the loop, flushing the archive.
    pub fn stop(&mut self) {
        if let Some(ref mut a) = self.archive {
            if let Err(e) = a.flush() {
                warn!("{}", e);
            }
        }

        self.state = LoopState::Stopped;
    }

    /// Execute one cycle of the loop, given the wall time elapsed since the last cycle.
    pub fn cycle(
        &mut self,
        ds: &mut DataStore,
        elapsed_s: f64,
    ) -> Result<CycleReport, SimLoopError> {
        if self.state != LoopState::Running {
            return Err(SimLoopError::InvalidState(self.state, LoopState::Running));
        }

        let mut report = CycleReport {
            cmd_handled: false,
            num_steps: 0,
            collided: false,
        };

        // ---- COMMAND PROCESSING ----

        let connected = self.channel.connected();
        if connected != self.client_connected {
            match connected {
                true => info!("Motor client connected"),
                false => info!("Motor client disconnected"),
            }
            self.client_connected = connected;
        }

        match self.channel.poll() {
            Ok(Some(raw)) => {
                let response = cmd_processor::exec(ds, &raw);
                debug!("Response: {:?} {}", response.status, response.message);

                if let Err(e) = self.channel.reply(&response) {
                    warn!("Could not respond to motor command: {}", e);
                }
                report.cmd_handled = true;
            }
            Ok(None) => (),
            Err(e) => warn!("Could not poll for motor commands: {}", e),
        }

        // ---- PHYSICS ----

        ds.accumulator_s += elapsed_s;

        while ds.accumulator_s >= self.physics_dt_s {
            report.collided |= ds.step_physics(self.physics_dt_s);
            ds.accumulator_s -= self.physics_dt_s;
            report.num_steps += 1;

            if let Some(ref mut a) = self.archive {
                if let Err(e) = a.write(ds) {
                    warn!("{}, disabling the trajectory archive", e);
                    self.archive = None;
                }
            }
        }

        if report.num_steps > self.max_steps_warn {
            warn!(
                "{} physics steps were needed to catch up in a single cycle",
                report.num_steps
            );
        }

        // ---- TELEMETRY ----

        if let Some(ref mut tm) = self.tm_server {
            if let Err(e) = tm.send(ds) {
                warn!("TmServer error: {}", e);
            }
        }

        ds.num_cycles += 1;

        Ok(report)
    }

    /// Run the loop until `running` is cleared.
    pub fn run(&mut self, ds: &mut DataStore, running: &AtomicBool) -> Result<(), SimLoopError> {
        self.start()?;

        info!("Begining main loop");

        let cycle_period = self.cycle_period;
        let mut last_cycle_instant = Instant::now();

        while running.load(Ordering::SeqCst) {
            // Get cycle start time
            let cycle_start_instant = Instant::now();
            let elapsed_s = (cycle_start_instant - last_cycle_instant).as_secs_f64();
            last_cycle_instant = cycle_start_instant;

            self.cycle(ds, elapsed_s)?;

            // ---- CYCLE MANAGEMENT ----

            let cycle_dur = Instant::now() - cycle_start_instant;

            // Get sleep duration
            match cycle_period.checked_sub(cycle_dur) {
                Some(d) => {
                    ds.num_consec_cycle_overruns = 0;
                    thread::sleep(d);
                }
                None => {
                    warn!(
                        "Cycle overran by {:.06} s",
                        cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                    );
                    ds.num_consec_cycle_overruns += 1;
                }
            }
        }

        info!(
            "Main loop stopped after {} cycles and {} physics steps ({:.3} s simulated)",
            ds.num_cycles, ds.num_steps, ds.sim_time_s
        );

        self.stop();

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
