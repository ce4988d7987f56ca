//! ENIAC Core Simulation Primitives
//!
//! This crate provides the fundamental building blocks for pulse-level
//! simulation of the ENIAC:
//! - The 11 named pulse lines and their bitmask encoding
//! - The pulse/ack bus message and the producer-waits-for-ack handshake
//! - The 20-phase add-cycle clock table
//! - The shared scalar state read by status displays and dispatchers

pub mod phase;
pub mod pulse;
pub mod state;

pub use phase::{PHASES, PHASE_TABLE, SCG_PHASE};
pub use pulse::{ack_pair, send_pulse, wire, Ack, Pulse, PulseCode, Wire};
pub use state::{CycleMode, CycleShared, InitiateClear};

/// Prelude for common imports
pub mod prelude {
    pub use crate::phase::*;
    pub use crate::pulse::*;
    pub use crate::state::*;
}
