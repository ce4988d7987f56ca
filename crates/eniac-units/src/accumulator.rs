//! Accumulator shells: signed ten-digit registers on the pulse fabric
//!
//! The decimal add/subtract machinery is carried by the units themselves;
//! the simulator core sees each accumulator as a register with a jack
//! panel, a switch bank and a clock tap. The selective-clear switch arms
//! the register to drop to zero when the selective-clear gate goes out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, Sender};
use eniac_bus::cycle::PhaseTap;
use eniac_core::prelude::*;

use crate::jack::JackPanel;

/// Accumulators on the machine.
pub const ACCUMULATORS: usize = 20;

/// Largest magnitude a ten-decade register holds.
pub const MAX_VALUE: i64 = 9_999_999_999;

pub struct Accumulator {
    index: usize,
    value: Mutex<i64>,
    selective_clear: AtomicBool,
    switches: Mutex<HashMap<String, String>>,
    panel: JackPanel,
}

impl Accumulator {
    pub fn new(index: usize) -> Arc<Self> {
        Arc::new(Self {
            index,
            value: Mutex::new(0),
            selective_clear: AtomicBool::new(false),
            switches: Mutex::new(HashMap::new()),
            panel: JackPanel::new(format!("a{}", index + 1)),
        })
    }

    /// Spawn the switch loop; the dispatcher feeds the returned channel.
    pub fn spawn_control(self: Arc<Self>) -> Sender<(String, String)> {
        let (tx, rx) = bounded::<(String, String)>(0);
        thread::spawn(move || {
            for (name, value) in rx.iter() {
                self.set_switch(&name, &value);
            }
        });
        tx
    }

    fn set_switch(&self, name: &str, value: &str) {
        if name == "sc" {
            self.selective_clear
                .store(matches!(value, "c" | "C"), Ordering::SeqCst);
        }
        self.switches
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    /// Attach a cord to a named jack. Outputs: `A`, `S`, `AS` and the
    /// program outputs `5o..12o`; inputs: the digit inputs `a b g d e`,
    /// the program inputs `1i..12i`.
    pub fn plug(&self, jack: &str, w: &Wire) -> bool {
        match jack {
            "A" | "S" | "AS" => {
                self.panel.plug_output(jack, w);
                true
            }
            "a" | "b" | "g" | "d" | "e" => {
                self.panel.plug_input(jack, w);
                true
            }
            _ => match program_jack(jack) {
                Some((n, 'i')) if (1..=12).contains(&n) => {
                    self.panel.plug_input(jack, w);
                    true
                }
                Some((n, 'o')) if (5..=12).contains(&n) => {
                    self.panel.plug_output(jack, w);
                    true
                }
                _ => false,
            },
        }
    }

    /// Assert a pulse on a plugged output jack.
    pub fn emit(&self, jack: &str, code: PulseCode) -> bool {
        self.panel.emit(jack, code)
    }

    /// Preset the register. Out-of-range values are rejected.
    pub fn set(&self, value: i64) -> bool {
        if value.abs() > MAX_VALUE {
            return false;
        }
        *self.value.lock().unwrap() = value;
        true
    }

    pub fn value(&self) -> i64 {
        *self.value.lock().unwrap()
    }

    /// Clock tap: drop to zero on the selective-clear gate when armed.
    pub fn tap(self: Arc<Self>) -> PhaseTap {
        Box::new(move |code| {
            if code.contains(PulseCode::SCG) && self.selective_clear.load(Ordering::SeqCst) {
                *self.value.lock().unwrap() = 0;
            }
        })
    }

    pub fn reset(&self) {
        *self.value.lock().unwrap() = 0;
        self.selective_clear.store(false, Ordering::SeqCst);
        self.switches.lock().unwrap().clear();
        self.panel.unplug_all();
    }

    /// One status line: sign, decades, selective-clear arm.
    pub fn status(&self) -> String {
        let value = self.value();
        let sign = if value < 0 { 'M' } else { 'P' };
        let sc = if self.selective_clear.load(Ordering::SeqCst) {
            'c'
        } else {
            '0'
        };
        format!("a{:<2} {} {:010} sc={}", self.index + 1, sign, value.abs(), sc)
    }
}

/// Split `5i` / `12o` style program-jack names.
pub(crate) fn program_jack(jack: &str) -> Option<(u32, char)> {
    let dir = jack.chars().last()?;
    if dir != 'i' && dir != 'o' {
        return None;
    }
    let n: u32 = jack[..jack.len() - 1].parse().ok()?;
    Some((n, dir))
}
