//! Master programmer shell
//!
//! The master programmer sequences programs off the central programming
//! pulse; the shell counts CPPs through its clock tap and keeps the
//! stepper switch bank.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, Sender};
use eniac_bus::cycle::PhaseTap;
use eniac_core::prelude::*;

use crate::accumulator::program_jack;
use crate::jack::JackPanel;

pub struct MasterProgrammer {
    switches: Mutex<BTreeMap<String, String>>,
    cpps: AtomicU64,
    panel: JackPanel,
}

impl MasterProgrammer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            switches: Mutex::new(BTreeMap::new()),
            cpps: AtomicU64::new(0),
            panel: JackPanel::new("p"),
        })
    }

    pub fn spawn_control(self: Arc<Self>) -> Sender<(String, String)> {
        let (tx, rx) = bounded::<(String, String)>(0);
        thread::spawn(move || {
            for (name, value) in rx.iter() {
                self.switches.lock().unwrap().insert(name, value);
            }
        });
        tx
    }

    pub fn tap(self: Arc<Self>) -> PhaseTap {
        Box::new(move |code| {
            if code.contains(PulseCode::CPP) {
                self.cpps.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    /// Program jacks `1i..20i` and `1o..20o`.
    pub fn plug(&self, jack: &str, w: &Wire) -> bool {
        match program_jack(jack) {
            Some((n, 'i')) if (1..=20).contains(&n) => {
                self.panel.plug_input(jack, w);
                true
            }
            Some((n, 'o')) if (1..=20).contains(&n) => {
                self.panel.plug_output(jack, w);
                true
            }
            _ => false,
        }
    }

    pub fn reset(&self) {
        self.switches.lock().unwrap().clear();
        self.cpps.store(0, Ordering::SeqCst);
        self.panel.unplug_all();
    }

    pub fn status(&self) -> String {
        format!("p  cpp={}", self.cpps.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_counts_cpp() {
        let mp = MasterProgrammer::new();
        let tap = Arc::clone(&mp).tap();
        tap(PulseCode::CPP);
        tap(PulseCode::TENP);
        tap(PulseCode::CPP);
        assert_eq!(mp.status(), "p  cpp=2");
    }

    #[test]
    fn test_jacks() {
        let mp = MasterProgrammer::new();
        assert!(mp.plug("1i", &wire()));
        assert!(mp.plug("20o", &wire()));
        assert!(!mp.plug("21i", &wire()));
        assert!(!mp.plug("A", &wire()));
    }
}
