//! Pulse-line encoding and the pulse/ack bus message
//!
//! The cycling unit asserts combinations of 11 named pulse lines. A pulse
//! on a bus is the asserted line combination plus a single-shot
//! acknowledgement handle: the producer sends and then blocks on the ack,
//! so no later pulse can enter the bus until every consumer has finished
//! with the current one.

use std::fmt;

use crossbeam_channel::{bounded, Receiver, Sender};

bitflags::bitflags! {
    /// A combination of the 11 named pulse lines.
    ///
    /// Multiple bits set in one code are pulses that fire simultaneously on
    /// the same phase. The empty code means "no pulse" and is suppressed at
    /// the source, never transmitted on a bus.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct PulseCode: u16 {
        /// Central programming pulse
        const CPP   = 1 << 0;
        /// 1P addition pulse
        const ONEP  = 1 << 1;
        /// 9P pulse train
        const NINEP = 1 << 2;
        /// 10P pulse train
        const TENP  = 1 << 3;
        /// Selective-clear gate
        const SCG   = 1 << 4;
        /// Reset pulse
        const RP    = 1 << 5;
        /// 1'P pulse
        const ONEPP = 1 << 6;
        /// Carry-clear gate
        const CCG   = 1 << 7;
        /// 2P pulse train
        const TWOP  = 1 << 8;
        /// 2'P pulse train
        const TWOPP = 1 << 9;
        /// 4P pulse train
        const FOURP = 1 << 10;
    }
}

/// Display names for each line, in bit order.
pub const LINE_NAMES: [(PulseCode, &str); 11] = [
    (PulseCode::CPP, "CPP"),
    (PulseCode::ONEP, "1P"),
    (PulseCode::NINEP, "9P"),
    (PulseCode::TENP, "10P"),
    (PulseCode::SCG, "SCG"),
    (PulseCode::RP, "RP"),
    (PulseCode::ONEPP, "1PP"),
    (PulseCode::CCG, "CCG"),
    (PulseCode::TWOP, "2P"),
    (PulseCode::TWOPP, "2PP"),
    (PulseCode::FOURP, "4P"),
];

impl fmt::Display for PulseCode {
    /// Renders `1P|9P` style line lists; the empty code renders as `0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("0");
        }
        let mut first = true;
        for (line, name) in LINE_NAMES {
            if self.contains(line) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Single-shot acknowledgement handle carried by every [`Pulse`].
///
/// Cloneable so that a fanout can hand the same collection point to every
/// subscriber and count the returns.
#[derive(Clone, Debug)]
pub struct Ack(Sender<()>);

impl Ack {
    /// Signal the producer that this pulse has been fully handled.
    pub fn done(&self) {
        // A disconnected producer has already torn down its bus.
        let _ = self.0.send(());
    }
}

/// Allocate the acknowledgement rendezvous for a pulse emission.
pub fn ack_pair() -> (Ack, Receiver<()>) {
    let (tx, rx) = bounded(0);
    (Ack(tx), rx)
}

/// A pulse on a bus: the asserted line combination plus its ack handle.
#[derive(Clone, Debug)]
pub struct Pulse {
    pub code: PulseCode,
    ack: Ack,
}

impl Pulse {
    pub fn new(code: PulseCode, ack: Ack) -> Self {
        Self { code, ack }
    }

    /// Acknowledge this pulse.
    ///
    /// Consumers call this exactly once, after any work that must complete
    /// before the next pulse may enter the bus. Consumers that re-drive the
    /// pulse elsewhere ack only after the chained consumers have acked.
    pub fn ack(&self) {
        self.ack.done();
    }

    /// The ack handle, for consumers that hand the pulse onward.
    pub fn ack_handle(&self) -> Ack {
        self.ack.clone()
    }
}

/// A patch cord: one rendezvous pulse channel with both halves to hand out.
///
/// Plug operations keep whichever half their jack drives or listens on, so
/// every plug function can take the same argument regardless of direction.
#[derive(Clone, Debug)]
pub struct Wire {
    pub tx: Sender<Pulse>,
    pub rx: Receiver<Pulse>,
}

/// Make a jumper wire.
pub fn wire() -> Wire {
    let (tx, rx) = bounded(0);
    Wire { tx, rx }
}

/// Send `code` on `tx` and block until the consumer acknowledges.
///
/// Empty codes are suppressed at the source and never reach the bus.
/// Returns false if the far end has disconnected.
pub fn send_pulse(tx: &Sender<Pulse>, code: PulseCode) -> bool {
    if code.is_empty() {
        return true;
    }
    let (ack, ack_rx) = ack_pair();
    if tx.send(Pulse::new(code, ack)).is_err() {
        return false;
    }
    ack_rx.recv().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    #[test]
    fn test_display() {
        assert_eq!(PulseCode::empty().to_string(), "0");
        assert_eq!(PulseCode::CPP.to_string(), "CPP");
        assert_eq!((PulseCode::ONEP | PulseCode::NINEP).to_string(), "1P|9P");
        assert_eq!((PulseCode::TWOPP | PulseCode::NINEP).to_string(), "9P|2PP");
    }

    #[test]
    fn test_send_pulse_handshake() {
        let w = wire();
        let rx = w.rx.clone();
        let handle = thread::spawn(move || {
            let p = rx.recv().unwrap();
            assert_eq!(p.code, PulseCode::RP);
            p.ack();
        });
        assert!(send_pulse(&w.tx, PulseCode::RP));
        handle.join().unwrap();
    }

    #[test]
    fn test_zero_code_suppressed() {
        let w = wire();
        // No consumer: a zero code must not block or touch the bus.
        assert!(send_pulse(&w.tx, PulseCode::empty()));
    }

    #[test]
    fn test_send_to_disconnected() {
        let w = wire();
        drop(w.rx);
        assert!(!send_pulse(&w.tx, PulseCode::CPP));
    }

    proptest! {
        #[test]
        fn prop_codes_use_defined_lines_only(bits in any::<u16>()) {
            let code = PulseCode::from_bits_truncate(bits);
            prop_assert!(code.bits() < (1 << 11));
            // Display is "0" exactly for the empty code.
            prop_assert_eq!(code.to_string() == "0", code.is_empty());
        }
    }
}
