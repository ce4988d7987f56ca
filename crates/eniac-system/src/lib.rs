//! ENIAC System Assembly
//!
//! Puts the whole machine together — cycling unit, pulse fanout, computing
//! units, trunk tables, breakpoints — and exposes the console command
//! surface that drives it.

pub mod command;
pub mod machine;

pub use command::{CommandError, Flow, Interpreter};
pub use machine::{Machine, MachineConfig};
