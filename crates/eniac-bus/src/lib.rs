//! ENIAC Pulse-Distribution Fabric
//!
//! This crate implements the pulse fabric the computing units plug into:
//! - Fanout: reliable broadcast with full ack collection
//! - Tee: bidirectional 3-way join of two buses
//! - Trunk tables: the patchable tray/line interconnect
//! - The cycling unit: 20-phase clock generation and run/step control
//! - Debug breakpoints: stop-requesting taps on any pulse channel

pub mod cycle;
pub mod debug;
pub mod fanout;
pub mod tee;
pub mod trunk;

pub use cycle::{Cycling, CyclingConfig, CyclingHandle, PhaseTap};
pub use debug::Breakpoints;
pub use fanout::Fanout;
pub use tee::{bus, tee, BusEnd};
pub use trunk::{TrunkClass, TrunkTable, LINES_PER_TRAY, TRAYS};

/// Prelude for common imports
pub mod prelude {
    pub use crate::cycle::*;
    pub use crate::debug::*;
    pub use crate::fanout::*;
    pub use crate::tee::*;
    pub use crate::trunk::*;
}
