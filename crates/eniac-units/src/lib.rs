//! ENIAC Computing-Unit Shells
//!
//! The units plug into the pulse fabric: they own jack panels, answer
//! switch settings over string-tuple channels, consume and ack every pulse
//! offered to them, and report status lines for the front-panel dump. The
//! decimal arithmetic inside each unit lives beyond the fabric and is not
//! modeled here.

pub mod accumulator;
pub mod adapter;
pub mod constant;
pub mod divider;
pub mod ft;
pub mod initiate;
pub mod jack;
pub mod mp;
pub mod multiplier;
pub mod printer;

pub use accumulator::{Accumulator, ACCUMULATORS};
pub use adapter::{Adapters, AdapterSide};
pub use constant::Constant;
pub use divider::Divider;
pub use ft::{FunctionTable, FUNCTION_TABLES};
pub use initiate::{Button, Initiate};
pub use jack::JackPanel;
pub use mp::MasterProgrammer;
pub use multiplier::Multiplier;
pub use printer::Printer;
