//! The 20-phase add-cycle clock table
//!
//! An add cycle is 20 numbered phases; each phase carries up to two pulse
//! codes (a primary and a secondary slot). The 10P train rides the secondary
//! slot of the first ten phases while the digit trains walk the primary
//! slot; the bookkeeping pulses (1'P, CCG, RP, CPP) occupy the back half.

use crate::pulse::PulseCode;

/// Number of phases in one add cycle.
pub const PHASES: usize = 20;

/// Slots per phase.
pub const SLOTS: usize = 2;

/// Phase whose primary slot is overridden to `SCG` while an initiate clear
/// is pending.
pub const SCG_PHASE: usize = 16;

/// The clock table, indexed `phase * 2 + slot`.
pub const PHASE_TABLE: [PulseCode; PHASES * SLOTS] = [
    PulseCode::empty(), PulseCode::TENP,                        // 0
    PulseCode::ONEP.union(PulseCode::NINEP), PulseCode::TENP,   // 1
    PulseCode::TWOP.union(PulseCode::NINEP), PulseCode::TENP,   // 2
    PulseCode::TWOP.union(PulseCode::NINEP), PulseCode::TENP,   // 3
    PulseCode::TWOPP.union(PulseCode::NINEP), PulseCode::TENP,  // 4
    PulseCode::TWOPP.union(PulseCode::NINEP), PulseCode::TENP,  // 5
    PulseCode::FOURP.union(PulseCode::NINEP), PulseCode::TENP,  // 6
    PulseCode::FOURP.union(PulseCode::NINEP), PulseCode::TENP,  // 7
    PulseCode::FOURP.union(PulseCode::NINEP), PulseCode::TENP,  // 8
    PulseCode::FOURP.union(PulseCode::NINEP), PulseCode::TENP,  // 9
    PulseCode::ONEPP, PulseCode::empty(),                       // 10
    PulseCode::CCG, PulseCode::empty(),                         // 11
    PulseCode::empty(), PulseCode::empty(),                     // 12
    PulseCode::RP, PulseCode::empty(),                          // 13
    PulseCode::empty(), PulseCode::empty(),                     // 14
    PulseCode::empty(), PulseCode::empty(),                     // 15
    PulseCode::empty(), PulseCode::empty(),                     // 16
    PulseCode::CPP, PulseCode::empty(),                         // 17
    PulseCode::empty(), PulseCode::empty(),                     // 18
    PulseCode::RP, PulseCode::empty(),                          // 19
];

/// The pulse code for `phase` at `slot` (0 = primary, 1 = secondary).
pub fn slot(phase: usize, slot: usize) -> PulseCode {
    assert!(
        phase < PHASES && slot < SLOTS,
        "phase index out of range: {phase}.{slot}"
    );
    PHASE_TABLE[phase * SLOTS + slot]
}

/// Number of non-empty slots in the table: pulse emissions per add cycle.
pub fn pulses_per_cycle() -> usize {
    PHASE_TABLE.iter().filter(|c| !c.is_empty()).count()
}
