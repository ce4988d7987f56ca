//! Printer shell: switch bank only; the card path itself lives outside
//! the simulator core.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{bounded, Sender};

pub struct Printer {
    switches: Mutex<BTreeMap<String, String>>,
}

impl Printer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            switches: Mutex::new(BTreeMap::new()),
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

    pub fn reset(&self) {
        self.switches.lock().unwrap().clear();
    }
}
