//! # Trajectory archive
//!
//! Records the robot state after every physics step as a CSV file, one row per step.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::{fs::File, path::Path};

use crate::data_store::DataStore;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Writer for the trajectory CSV.
pub struct TrajArchive {
    writer: csv::Writer<File>,

    num_records: u64,
}

/// A single row of the trajectory archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrajRecord {
    pub sim_time_s: f64,
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
    pub vx_ms: f64,
    pub vy_ms: f64,
    pub omega_rads: f64,
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub collided: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrajArchiveError {
    #[error("Could not create the archive file: {0}")]
    CreateError(csv::Error),

    #[error("Could not write to the archive: {0}")]
    WriteError(csv::Error),

    #[error("Could not flush the archive: {0}")]
    FlushError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrajArchive {
    /// Create a new archive at the given path, truncating any existing file.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, TrajArchiveError> {
        let writer = csv::Writer::from_path(path).map_err(TrajArchiveError::CreateError)?;

        Ok(Self {
            writer,
            num_records: 0,
        })
    }

    /// Append the current state to the archive.
    pub fn write(&mut self, ds: &DataStore) -> Result<(), TrajArchiveError> {
        self.writer
            .serialize(TrajRecord::from_datastore(ds))
            .map_err(TrajArchiveError::WriteError)?;
        self.num_records += 1;

        Ok(())
    }

    /// Number of rows written so far.
    pub fn num_records(&self) -> u64 {
        self.num_records
    }

    pub fn flush(&mut self) -> Result<(), TrajArchiveError> {
        self.writer.flush().map_err(TrajArchiveError::FlushError)
    }
}

impl TrajRecord {
    pub fn from_datastore(ds: &DataStore) -> Self {
        let robot = &ds.robot;

        Self {
            sim_time_s: ds.sim_time_s,
            x_m: robot.position_m.x,
            y_m: robot.position_m.y,
            heading_rad: robot.heading_rad,
            vx_ms: robot.velocity_ms.x,
            vy_ms: robot.velocity_ms.y,
            omega_rads: robot.omega_rads,
            north: robot.wheel_actual.north,
            south: robot.wheel_actual.south,
            east: robot.wheel_actual.east,
            west: robot.wheel_actual.west,
            collided: ds.collided,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
