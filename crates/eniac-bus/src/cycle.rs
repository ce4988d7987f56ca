//! The cycling unit: 20-phase pulse generation and the run/step machinery
//!
//! A single engine task owns the shared scalars and emits the clock table
//! onto the cycle bus, one acked pulse at a time. Operator intent arrives
//! on a button channel and on a switch channel; mode changes that land
//! while the engine is parked on the button inject a synthetic press and
//! wait for the engine's consumed acknowledgement, so the ack chain stays
//! intact across the control surface.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use eniac_core::prelude::*;

/// A callback invoked with each pulse code once the bus has fully acked it.
///
/// Taps run on the engine thread and must not block; they are the direct
/// clock observers (initiate, master programmer, divider, accumulators)
/// that would otherwise need a bus subscription apiece.
pub type PhaseTap = Box<dyn Fn(PulseCode) + Send>;

/// Power-on configuration of the cycling unit.
pub struct CyclingConfig {
    /// Run exactly this many add cycles after the start gate opens, then
    /// signal completion and stop.
    pub test_cycles: Option<u64>,
    /// Mode at power-on.
    pub start_mode: CycleMode,
}

impl Default for CyclingConfig {
    fn default() -> Self {
        Self {
            test_cycles: None,
            start_mode: CycleMode::Continuous,
        }
    }
}

struct Inner {
    shared: Arc<CycleShared>,
    test_cycles: Option<u64>,
    intb_tx: Sender<()>,
    butdone_tx: Sender<()>,
    butdone_rx: Receiver<()>,
}

impl Inner {
    fn set_mode(&self, new: CycleMode) {
        // A test run owns the machine; only Continuous is meaningful.
        if self.test_cycles.is_some() && new != CycleMode::Continuous {
            return;
        }
        let waiting;
        {
            let mut mode = self.shared.lock_mode();
            waiting = mode.is_stepping();
            *mode = new;
        }
        tracing::debug!(mode = ?new, "cycle mode set");
        if waiting {
            self.release_button();
        }
    }

    fn next_mode(&self) {
        let waiting;
        {
            let mut mode = self.shared.lock_mode();
            waiting = mode.is_stepping();
            *mode = mode.next();
        }
        if waiting {
            self.release_button();
        }
    }

    /// Unblock protocol: inject a synthetic press and wait until the
    /// engine reports it consumed.
    fn release_button(&self) {
        if self.intb_tx.send(()).is_ok() {
            let _ = self.butdone_rx.recv();
        }
    }
}

/// Handle held by the control dispatcher and the status display.
#[derive(Clone)]
pub struct CyclingHandle {
    inner: Arc<Inner>,
    clear: Arc<InitiateClear>,
    sw: Sender<(String, String)>,
    button: Sender<()>,
    start: Option<Sender<()>>,
    finished: Option<Receiver<()>>,
}

impl CyclingHandle {
    /// Press the step button and wait until the engine has consumed it:
    /// one phase in pulse mode, one add cycle in add mode, a no-op while
    /// free-running.
    pub fn press_button(&self) {
        if self.button.send(()).is_ok() {
            let _ = self.inner.butdone_rx.recv();
        }
    }

    /// Route a `(switch, value)` setting to the cycling control loop.
    pub fn set_switch(&self, switch: &str, value: &str) {
        let _ = self.sw.send((switch.to_string(), value.to_string()));
    }

    /// Force Continuous, releasing any parked step wait.
    pub fn reset(&self) {
        self.inner.set_mode(CycleMode::Continuous);
    }

    /// Open the start gate of a test run.
    pub fn start_test(&self) {
        if let Some(start) = &self.start {
            let _ = start.send(());
        }
    }

    /// Block until a test run's cycle budget is spent.
    pub fn wait_finished(&self) {
        if let Some(finished) = &self.finished {
            let _ = finished.recv();
        }
    }

    pub fn shared(&self) -> &Arc<CycleShared> {
        &self.inner.shared
    }

    pub fn clear_flags(&self) -> &Arc<InitiateClear> {
        &self.clear
    }

    /// Phase counter for the status display.
    pub fn status(&self) -> String {
        self.inner.shared.cyc_status()
    }
}

/// The cycling unit. Spawns the engine, the button forwarder and the
/// switch-control loop; everything afterwards happens over the handle.
pub struct Cycling;

impl Cycling {
    pub fn spawn(
        config: CyclingConfig,
        cycout: Sender<Pulse>,
        taps: Vec<PhaseTap>,
        clear: Arc<InitiateClear>,
    ) -> CyclingHandle {
        let shared = Arc::new(CycleShared::new(config.start_mode));
        let (intb_tx, intb_rx) = bounded(0);
        let (butdone_tx, butdone_rx) = bounded(0);
        let (button_tx, button_rx) = bounded(0);
        let (sw_tx, sw_rx) = bounded(0);
        let (start, start_rx, finished_tx, finished) = if config.test_cycles.is_some() {
            let (s_tx, s_rx) = bounded(0);
            let (f_tx, f_rx) = bounded(0);
            (Some(s_tx), Some(s_rx), Some(f_tx), Some(f_rx))
        } else {
            (None, None, None, None)
        };

        let inner = Arc::new(Inner {
            shared: Arc::clone(&shared),
            test_cycles: config.test_cycles,
            intb_tx,
            butdone_tx,
            butdone_rx,
        });

        let ctl_inner = Arc::clone(&inner);
        thread::spawn(move || control(ctl_inner, sw_rx));

        let fwd_inner = Arc::clone(&inner);
        thread::spawn(move || forward_buttons(fwd_inner, button_rx));

        let engine = Engine {
            shared: Arc::clone(&shared),
            clear: Arc::clone(&clear),
            taps,
            cycout,
            intb_rx,
            butdone_tx: inner.butdone_tx.clone(),
            test_cycles: config.test_cycles,
            start: start_rx,
            finished: finished_tx,
        };
        thread::spawn(move || engine.run());

        CyclingHandle {
            inner,
            clear,
            sw: sw_tx,
            button: button_tx,
            start,
            finished,
        }
    }
}

/// Switch-control loop: the dispatcher's half of the mode state machine.
fn control(inner: Arc<Inner>, sw: Receiver<(String, String)>) {
    for (name, value) in sw.iter() {
        match name.as_str() {
            "op" => match value.as_str() {
                "cy" | "CY" => inner.next_mode(),
                _ => match CycleMode::from_switch(&value) {
                    Some(mode) => {
                        inner.set_mode(mode);
                        if mode == CycleMode::Add {
                            // A fresh stepping session starts a fresh count.
                            inner.shared.reset_acyc();
                        }
                    }
                    None => println!("cycle unit op switch value: one of 1p, 1a, co, cy"),
                },
            },
            _ => println!("cycle unit switch: s cy.op val"),
        }
    }
}

/// Button forwarder: hand presses to the engine while a step mode is
/// armed; consume them on the spot otherwise.
fn forward_buttons(inner: Arc<Inner>, button: Receiver<()>) {
    for () in button.iter() {
        if inner.shared.mode().is_stepping() {
            if inner.intb_tx.send(()).is_err() {
                return;
            }
        } else {
            let _ = inner.butdone_tx.send(());
        }
    }
}

struct Engine {
    shared: Arc<CycleShared>,
    clear: Arc<InitiateClear>,
    taps: Vec<PhaseTap>,
    cycout: Sender<Pulse>,
    intb_rx: Receiver<()>,
    butdone_tx: Sender<()>,
    test_cycles: Option<u64>,
    start: Option<Receiver<()>>,
    finished: Option<Sender<()>>,
}

impl Engine {
    fn run(self) {
        if let Some(gate) = &self.start {
            if gate.recv().is_err() {
                return;
            }
        }
        let (ack, ack_rx) = ack_pair();
        loop {
            self.shared.set_stop(false);
            let step_add = self.shared.mode() == CycleMode::Add;
            if step_add && self.intb_rx.recv().is_err() {
                return;
            }
            for phase in 0..PHASES {
                self.shared.set_cyc(phase);
                let step_pulse = self.shared.mode() == CycleMode::Pulse;
                if step_pulse && self.intb_rx.recv().is_err() {
                    return;
                }
                let first = if phase == SCG_PHASE && self.clear.any() {
                    PulseCode::SCG
                } else {
                    slot(phase, 0)
                };
                if !first.is_empty() && !self.emit(first, &ack, &ack_rx) {
                    return;
                }
                let second = slot(phase, 1);
                if !second.is_empty() && !self.emit(second, &ack, &ack_rx) {
                    return;
                }
                if step_pulse {
                    let _ = self.butdone_tx.send(());
                }
            }
            self.shared.set_cyc(PHASES);
            let completed = self.shared.bump_acyc();
            if let Some(budget) = self.test_cycles {
                if completed >= budget {
                    if let Some(finished) = &self.finished {
                        let _ = finished.send(());
                    }
                    tracing::debug!(cycles = completed, "test budget reached");
                    return;
                }
            }
            if step_add {
                let _ = self.butdone_tx.send(());
            }
            if self.shared.stop() {
                self.shared.set_mode(CycleMode::Add);
                tracing::debug!("stop latched, dropping to add stepping");
            }
        }
    }

    /// Put one code on the cycle bus, wait out the fanout's ack, then run
    /// the phase taps. Returns false once the bus is gone.
    fn emit(&self, code: PulseCode, ack: &Ack, ack_rx: &Receiver<()>) -> bool {
        if self.cycout.send(Pulse::new(code, ack.clone())).is_err() {
            return false;
        }
        if ack_rx.recv().is_err() {
            return false;
        }
        for tap in &self.taps {
            tap(code);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::Fanout;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Cycle bus served by a counting sink.
    fn harness(config: CyclingConfig, taps: Vec<PhaseTap>) -> (CyclingHandle, Arc<AtomicUsize>) {
        let (cyc_tx, cyc_rx) = bounded::<Pulse>(0);
        let w = wire();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        thread::spawn(move || {
            for p in w.rx.iter() {
                counter.fetch_add(1, Ordering::SeqCst);
                p.ack();
            }
        });
        Fanout::new([w.tx]).spawn(cyc_rx);
        let clear = Arc::new(InitiateClear::new());
        let handle = Cycling::spawn(config, cyc_tx, taps, clear);
        (handle, hits)
    }

    fn wait_for(cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_add_step_one_button_per_cycle() {
        let config = CyclingConfig {
            test_cycles: None,
            start_mode: CycleMode::Add,
        };
        let (handle, hits) = harness(config, Vec::new());
        for press in 1..=5 {
            handle.press_button();
            assert_eq!(handle.shared().acyc(), press);
            // Parked between cycles, the phase display shows 0.
            assert_eq!(handle.status(), "0");
        }
        assert_eq!(hits.load(Ordering::SeqCst), 5 * pulses_per_cycle());
    }

    #[test]
    fn test_pulse_step_one_button_per_phase() {
        let config = CyclingConfig {
            test_cycles: None,
            start_mode: CycleMode::Pulse,
        };
        let (handle, hits) = harness(config, Vec::new());
        for phase in 0..PHASES {
            // The engine parks on the button at every phase in turn.
            wait_for(|| handle.shared().cyc() == phase);
            handle.press_button();
        }
        // The final press is consumed at the last phase; the cycle count
        // lands an instant later.
        wait_for(|| handle.shared().acyc() == 1);
        assert_eq!(hits.load(Ordering::SeqCst), pulses_per_cycle());
    }

    #[test]
    fn test_test_budget_one_cycle() {
        let config = CyclingConfig {
            test_cycles: Some(1),
            start_mode: CycleMode::Continuous,
        };
        let (handle, hits) = harness(config, Vec::new());
        handle.start_test();
        handle.wait_finished();
        assert_eq!(handle.shared().acyc(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), pulses_per_cycle());
    }

    #[test]
    fn test_scg_override() {
        let seen: Arc<Mutex<Vec<PulseCode>>> = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let tap: PhaseTap = Box::new(move |code| log.lock().unwrap().push(code));
        let config = CyclingConfig {
            test_cycles: Some(1),
            start_mode: CycleMode::Continuous,
        };
        let (handle, hits) = harness(config, vec![tap]);
        handle.clear_flags().set(2);
        handle.start_test();
        handle.wait_finished();

        // The override adds one emission on the otherwise silent phase.
        assert_eq!(hits.load(Ordering::SeqCst), pulses_per_cycle() + 1);
        let codes = seen.lock().unwrap();
        assert_eq!(codes.len(), pulses_per_cycle() + 1);
        assert_eq!(
            codes.iter().filter(|c| **c == PulseCode::SCG).count(),
            1
        );
        // SCG goes out before the CPP of phase 17.
        let scg_at = codes.iter().position(|c| *c == PulseCode::SCG).unwrap();
        let cpp_at = codes.iter().position(|c| *c == PulseCode::CPP).unwrap();
        assert!(scg_at < cpp_at);
    }

    #[test]
    fn test_no_scg_without_pending_clear() {
        let config = CyclingConfig {
            test_cycles: Some(1),
            start_mode: CycleMode::Continuous,
        };
        let (handle, hits) = harness(config, Vec::new());
        handle.start_test();
        handle.wait_finished();
        assert_eq!(hits.load(Ordering::SeqCst), pulses_per_cycle());
    }

    #[test]
    fn test_stop_drops_to_add_step() {
        // A tap standing in for a breakpoint: latch stop on every CPP.
        // The engine boots parked in add stepping so the tap closure can be
        // given the shared state before any pulse goes out.
        let config = CyclingConfig {
            test_cycles: None,
            start_mode: CycleMode::Add,
        };
        let (cyc_tx, cyc_rx) = bounded::<Pulse>(0);
        let w = wire();
        thread::spawn(move || {
            for p in w.rx.iter() {
                p.ack();
            }
        });
        Fanout::new([w.tx]).spawn(cyc_rx);
        let clear = Arc::new(InitiateClear::new());
        let shared_slot: Arc<Mutex<Option<Arc<CycleShared>>>> = Arc::new(Mutex::new(None));
        let tap_slot = Arc::clone(&shared_slot);
        let tap: PhaseTap = Box::new(move |code| {
            if code == PulseCode::CPP {
                if let Some(shared) = tap_slot.lock().unwrap().as_ref() {
                    shared.set_stop(true);
                }
            }
        });
        let handle = Cycling::spawn(config, cyc_tx, vec![tap], clear);
        *shared_slot.lock().unwrap() = Some(Arc::clone(handle.shared()));

        // Release into continuous running: the first cycle latches stop,
        // so exactly one cycle completes before the engine drops back to
        // add stepping and parks.
        handle.set_switch("op", "co");
        wait_for(|| handle.shared().acyc() == 1);
        wait_for(|| handle.shared().mode() == CycleMode::Add);
        // The stop flag is consumed at the start of the next cycle, just
        // before the engine parks on the button.
        wait_for(|| !handle.shared().stop());

        handle.press_button();
        assert_eq!(handle.shared().acyc(), 2);
        assert_eq!(handle.shared().mode(), CycleMode::Add);
    }

    #[test]
    fn test_mode_change_releases_parked_engine() {
        let config = CyclingConfig {
            test_cycles: None,
            start_mode: CycleMode::Add,
        };
        let (handle, _hits) = harness(config, Vec::new());
        // Parked before the first cycle; switching to continuous injects a
        // synthetic press and waits for its consumption.
        handle.set_switch("op", "co");
        wait_for(|| handle.shared().acyc() >= 2);
        assert_eq!(handle.shared().mode(), CycleMode::Continuous);

        handle.set_switch("op", "1a");
        wait_for(|| handle.shared().mode() == CycleMode::Add);
    }

    #[test]
    fn test_next_mode_rotation_via_switch() {
        let config = CyclingConfig {
            test_cycles: None,
            start_mode: CycleMode::Add,
        };
        let (handle, _hits) = harness(config, Vec::new());
        // Add -> Pulse; the parked engine consumes the synthetic press as
        // one phase advance.
        handle.set_switch("op", "cy");
        wait_for(|| handle.shared().mode() == CycleMode::Pulse);
    }
}
