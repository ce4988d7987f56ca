//! Shared machine state: cycle mode, counters, stop and clear flip-flops
//!
//! These scalars are read by the status display and the control dispatcher
//! while the cycling unit runs. Each field is synchronized on its own;
//! status reads tolerate a momentary race on the phase counter.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::phase::PHASES;

/// Stepping mode of the cycling unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CycleMode {
    /// Pause before each phase until the operator presses the button.
    Pulse,
    /// Pause before each add cycle until the operator presses the button.
    Add,
    /// Run add cycles end to end.
    Continuous,
}

impl CycleMode {
    /// The rotation applied by the front-panel "next mode" selector.
    pub fn next(self) -> Self {
        match self {
            CycleMode::Continuous => CycleMode::Add,
            CycleMode::Add => CycleMode::Pulse,
            CycleMode::Pulse => CycleMode::Continuous,
        }
    }

    /// True when the engine will wait on the button before advancing.
    pub fn is_stepping(self) -> bool {
        !matches!(self, CycleMode::Continuous)
    }

    /// Parse the `s cy.op` switch vocabulary. The `cy` (next-mode) setting
    /// is handled by the caller because it needs the current mode.
    pub fn from_switch(v: &str) -> Option<Self> {
        match v {
            "1p" | "1P" => Some(CycleMode::Pulse),
            "1a" | "1A" => Some(CycleMode::Add),
            "co" | "CO" => Some(CycleMode::Continuous),
            _ => None,
        }
    }
}

/// Scalars shared between the cycling unit, the control dispatcher and the
/// status display.
#[derive(Debug)]
pub struct CycleShared {
    mode: Mutex<CycleMode>,
    cyc: AtomicUsize,
    acyc: AtomicU64,
    stop: AtomicBool,
}

impl CycleShared {
    pub fn new(mode: CycleMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            cyc: AtomicUsize::new(0),
            acyc: AtomicU64::new(0),
            stop: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> CycleMode {
        *self.mode.lock().unwrap()
    }

    /// Hold the mode lock across a read-modify-write, as the button-unblock
    /// protocol requires the old and new mode observed together.
    pub fn lock_mode(&self) -> MutexGuard<'_, CycleMode> {
        self.mode.lock().unwrap()
    }

    pub fn set_mode(&self, mode: CycleMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Current phase, `0..20`; equals 20 only at cycle wraparound.
    pub fn cyc(&self) -> usize {
        self.cyc.load(Ordering::SeqCst)
    }

    pub fn set_cyc(&self, phase: usize) {
        self.cyc.store(phase, Ordering::SeqCst);
    }

    /// Phase counter for the status display; shows `0` once wrapped.
    pub fn cyc_status(&self) -> String {
        let cyc = self.cyc();
        if cyc >= PHASES {
            "0".to_string()
        } else {
            cyc.to_string()
        }
    }

    /// Add cycles completed since the last counter reset.
    pub fn acyc(&self) -> u64 {
        self.acyc.load(Ordering::SeqCst)
    }

    /// Count one completed add cycle; returns the new total.
    pub fn bump_acyc(&self) -> u64 {
        self.acyc.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn reset_acyc(&self) {
        self.acyc.store(0, Ordering::SeqCst);
    }

    pub fn stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn set_stop(&self, stop: bool) {
        self.stop.store(stop, Ordering::SeqCst);
    }
}

/// The initiate unit's selective-clear flip-flops.
///
/// Any set flip-flop makes the cycling unit substitute `SCG` for the silent
/// primary slot of the override phase; the initiate unit drops them all once
/// the gate has gone out.
#[derive(Debug)]
pub struct InitiateClear {
    ffs: [AtomicBool; 6],
}

impl InitiateClear {
    pub const FLIP_FLOPS: usize = 6;

    pub fn new() -> Self {
        Self {
            ffs: std::array::from_fn(|_| AtomicBool::new(false)),
        }
    }

    pub fn any(&self) -> bool {
        self.ffs.iter().any(|ff| ff.load(Ordering::SeqCst))
    }

    pub fn get(&self, i: usize) -> bool {
        self.ffs[i].load(Ordering::SeqCst)
    }

    pub fn set(&self, i: usize) {
        self.ffs[i].store(true, Ordering::SeqCst);
    }

    pub fn set_all(&self) {
        for ff in &self.ffs {
            ff.store(true, Ordering::SeqCst);
        }
    }

    pub fn reset(&self) {
        for ff in &self.ffs {
            ff.store(false, Ordering::SeqCst);
        }
    }
}

impl Default for InitiateClear {
    fn default() -> Self {
        Self::new()
    }
}
