//! # Communications interface crate.
//!
//! Provides the wire types exchanged with the simulator and the networking layer used to carry
//! them.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command and response definitions for equipment (the robot's motors)
pub mod eqpt;

/// Network module
pub mod net;
