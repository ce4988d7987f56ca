//! The initiate unit: front-panel buttons and the selective-clear latch
//!
//! The clear button sets the six clear flip-flops; the cycling unit turns
//! a pending clear into an `SCG` emission, and this unit's clock tap drops
//! the flip-flops again once the gate has gone out. The initiate and
//! readout buttons assert a program pulse on their output jacks.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use eniac_bus::cycle::PhaseTap;
use eniac_core::prelude::*;

use crate::jack::JackPanel;

/// Front-panel buttons routed to the initiate unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    Clear,
    Initiate,
    Readout,
}

pub struct Initiate {
    clear: Arc<InitiateClear>,
    panel: JackPanel,
}

impl Initiate {
    pub fn new(clear: Arc<InitiateClear>) -> Arc<Self> {
        Arc::new(Self {
            clear,
            panel: JackPanel::new("i"),
        })
    }

    /// Spawn the button loop. Every press is answered on the done channel
    /// once its action has completed, initiating pulse included.
    pub fn spawn_buttons(self: Arc<Self>) -> (Sender<Button>, Receiver<()>) {
        let (button_tx, button_rx) = bounded::<Button>(0);
        let (done_tx, done_rx) = bounded::<()>(0);
        thread::spawn(move || {
            for button in button_rx.iter() {
                match button {
                    Button::Clear => {
                        self.clear.set_all();
                        tracing::debug!("clear flip-flops set");
                    }
                    Button::Initiate => {
                        self.panel.emit("io", PulseCode::CPP);
                    }
                    Button::Readout => {
                        self.panel.emit("ro", PulseCode::CPP);
                    }
                }
                if done_tx.send(()).is_err() {
                    return;
                }
            }
        });
        (button_tx, done_rx)
    }

    /// Output jacks: `io` (initiating pulse), `ro` (readout pulse).
    pub fn plug(&self, jack: &str, w: &Wire) -> bool {
        match jack {
            "io" | "ro" => {
                self.panel.plug_output(jack, w);
                true
            }
            _ => false,
        }
    }

    /// Clock tap: once the selective-clear gate has gone out, the pending
    /// clear is serviced and the flip-flops drop.
    pub fn tap(self: Arc<Self>) -> PhaseTap {
        Box::new(move |code| {
            if code.contains(PulseCode::SCG) {
                self.clear.reset();
            }
        })
    }

    pub fn reset(&self) {
        self.clear.reset();
        self.panel.unplug_all();
    }

    pub fn status(&self) -> String {
        let ffs: String = (0..InitiateClear::FLIP_FLOPS)
            .map(|i| if self.clear.get(i) { '1' } else { '0' })
            .collect();
        format!("i  clear={ffs}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_button_sets_flip_flops() {
        let clear = Arc::new(InitiateClear::new());
        let unit = Initiate::new(Arc::clone(&clear));
        let (buttons, done) = Arc::clone(&unit).spawn_buttons();

        buttons.send(Button::Clear).unwrap();
        done.recv().unwrap();
        assert!(clear.any());
        assert_eq!(unit.status(), "i  clear=111111");
    }

    #[test]
    fn test_tap_drops_flip_flops_after_gate() {
        let clear = Arc::new(InitiateClear::new());
        let unit = Initiate::new(Arc::clone(&clear));
        clear.set_all();
        let tap = Arc::clone(&unit).tap();
        tap(PulseCode::CPP);
        assert!(clear.any());
        tap(PulseCode::SCG);
        assert!(!clear.any());
    }

    #[test]
    fn test_initiate_button_pulses_jack() {
        let clear = Arc::new(InitiateClear::new());
        let unit = Initiate::new(clear);
        let w = wire();
        assert!(unit.plug("io", &w));
        let rx = w.rx.clone();
        let sink = thread::spawn(move || {
            let p = rx.recv().unwrap();
            p.ack();
            p.code
        });

        let (buttons, done) = Arc::clone(&unit).spawn_buttons();
        buttons.send(Button::Initiate).unwrap();
        done.recv().unwrap();
        assert_eq!(sink.join().unwrap(), PulseCode::CPP);
    }

    #[test]
    fn test_unknown_jack_rejected() {
        let clear = Arc::new(InitiateClear::new());
        let unit = Initiate::new(clear);
        assert!(!unit.plug("x", &wire()));
    }
}
