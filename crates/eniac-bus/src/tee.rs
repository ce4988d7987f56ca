//! Bidirectional tee: 3-way join of two buses
//!
//! A tee joins two bus endpoints `A` and `B` and exposes a third endpoint
//! `T`. Pulses arriving from any present side are forwarded to the other
//! present sides with the full ack handshake. Tees compose trunks into
//! trees of fanout; the patch topology must stay acyclic, since a cycle
//! would chase its own ack forever.

use std::collections::VecDeque;
use std::thread;

use crossbeam_channel::{Receiver, Select, Sender};
use eniac_core::prelude::*;

/// One end of a bidirectional bus segment: pulses leave through `tx` and
/// arrive on `rx`.
#[derive(Clone, Debug)]
pub struct BusEnd {
    pub tx: Sender<Pulse>,
    pub rx: Receiver<Pulse>,
}

/// A bidirectional bus segment: two mirrored ends.
pub fn bus() -> (BusEnd, BusEnd) {
    let a = wire();
    let b = wire();
    (
        BusEnd { tx: a.tx, rx: b.rx },
        BusEnd { tx: b.tx, rx: a.rx },
    )
}

/// Join sides `a` and `b`, spawn the tee task, and return endpoint `T`.
///
/// A non-zero pulse from one present side reaches every other present side
/// exactly once and is acked once to the origin. Zero codes are suppressed:
/// delivered nowhere, acked immediately. A disconnected side counts as
/// absent from then on.
pub fn tee(a: Option<BusEnd>, b: Option<BusEnd>) -> BusEnd {
    let (near, far) = bus();
    let sides = vec![a, b, Some(near)];
    thread::spawn(move || run(sides));
    far
}

fn run(mut sides: Vec<Option<BusEnd>>) {
    // Pulses absorbed while a forward was in flight. Absorbing acks the
    // origin at once; the stashed code still gets its own handshake toward
    // each destination when its turn comes.
    let mut stash: VecDeque<(usize, PulseCode)> = VecDeque::new();
    loop {
        if let Some((origin, code)) = stash.pop_front() {
            forward(&mut sides, &mut stash, origin, code);
            continue;
        }
        let ev = {
            let live: Vec<(usize, &Receiver<Pulse>)> = sides
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.as_ref().map(|e| (i, &e.rx)))
                .collect();
            if live.is_empty() {
                return;
            }
            let mut sel = Select::new();
            for (_, rx) in &live {
                sel.recv(rx);
            }
            let oper = sel.select();
            let (i, rx) = live[oper.index()];
            match oper.recv(rx) {
                Ok(p) => Ok((i, p)),
                Err(_) => Err(i),
            }
        };
        match ev {
            Ok((origin, p)) => {
                if !p.code.is_empty() {
                    forward(&mut sides, &mut stash, origin, p.code);
                }
                p.ack();
            }
            Err(i) => sides[i] = None,
        }
    }
}

fn forward(
    sides: &mut Vec<Option<BusEnd>>,
    stash: &mut VecDeque<(usize, PulseCode)>,
    origin: usize,
    code: PulseCode,
) {
    for j in 0..sides.len() {
        if j != origin {
            offer(sides, stash, j, code);
        }
    }
}

/// Offer `code` to side `j` and wait out its ack, absorbing any pulse that
/// arrives from a side meanwhile. An endpoint blocked mid-send toward the
/// tee could otherwise never become ready to take the offer.
fn offer(
    sides: &mut Vec<Option<BusEnd>>,
    stash: &mut VecDeque<(usize, PulseCode)>,
    j: usize,
    code: PulseCode,
) {
    let Some(target) = sides[j].as_ref().map(|e| e.tx.clone()) else {
        return;
    };
    let (ack, ack_rx) = ack_pair();
    let mut sent = false;
    let mut acked = false;
    while !(sent && acked) {
        enum Ev {
            Sent(bool),
            Acked,
            In(usize, Option<Pulse>),
        }
        let ev = {
            let live: Vec<(usize, &Receiver<Pulse>)> = sides
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.as_ref().map(|e| (i, &e.rx)))
                .collect();
            let mut sel = Select::new();
            let mut send_op = usize::MAX;
            let mut ack_op = usize::MAX;
            if !sent {
                send_op = sel.send(&target);
            } else {
                ack_op = sel.recv(&ack_rx);
            }
            // exactly one of the two operations above is registered
            for (_, rx) in &live {
                sel.recv(rx);
            }
            let oper = sel.select();
            let k = oper.index();
            if k == send_op {
                Ev::Sent(oper.send(&target, Pulse::new(code, ack.clone())).is_ok())
            } else if k == ack_op {
                // A recv error here means the consumer tore down after
                // taking the pulse; nothing is owed either way.
                let _ = oper.recv(&ack_rx);
                Ev::Acked
            } else {
                let (i, rx) = live[k - 1];
                Ev::In(i, oper.recv(rx).ok())
            }
        };
        match ev {
            Ev::Sent(true) => sent = true,
            Ev::Sent(false) => {
                sides[j] = None;
                return;
            }
            Ev::Acked => acked = true,
            Ev::In(i, Some(p)) => {
                if !p.code.is_empty() {
                    stash.push_back((i, p.code));
                }
                p.ack();
            }
            Ev::In(i, None) => {
                sides[i] = None;
                if i == j {
                    // Target gone: any late ack lands on a dropped channel
                    // and is ignored; nothing is owed.
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn sink(rx: Receiver<Pulse>) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        thread::spawn(move || {
            for p in rx.iter() {
                counter.fetch_add(1, Ordering::SeqCst);
                p.ack();
            }
        });
        hits
    }

    fn wait_for(cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_pulse_reaches_both_other_sides() {
        let (a_mine, a_tee) = bus();
        let (b_mine, b_tee) = bus();
        let t_mine = tee(Some(a_tee), Some(b_tee));

        let a_hits = sink(a_mine.rx.clone());
        let b_hits = sink(b_mine.rx.clone());
        let t_hits = sink(t_mine.rx.clone());

        assert!(send_pulse(&a_mine.tx, PulseCode::CPP));
        assert_eq!(b_hits.load(Ordering::SeqCst), 1);
        assert_eq!(t_hits.load(Ordering::SeqCst), 1);
        assert_eq!(a_hits.load(Ordering::SeqCst), 0);

        assert!(send_pulse(&t_mine.tx, PulseCode::RP));
        assert_eq!(a_hits.load(Ordering::SeqCst), 1);
        assert_eq!(b_hits.load(Ordering::SeqCst), 2);
        assert_eq!(t_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_absent_side_skipped() {
        let (a_mine, a_tee) = bus();
        let t_mine = tee(Some(a_tee), None);

        let a_hits = sink(a_mine.rx.clone());
        let t_hits = sink(t_mine.rx.clone());

        assert!(send_pulse(&a_mine.tx, PulseCode::ONEP));
        assert_eq!(t_hits.load(Ordering::SeqCst), 1);

        assert!(send_pulse(&t_mine.tx, PulseCode::ONEP));
        assert_eq!(a_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_code_suppressed_but_acked() {
        let (a_mine, a_tee) = bus();
        let (b_mine, b_tee) = bus();
        let t_mine = tee(Some(a_tee), Some(b_tee));
        let b_hits = sink(b_mine.rx.clone());
        let t_hits = sink(t_mine.rx.clone());

        let (ack, ack_rx) = ack_pair();
        a_mine.tx.send(Pulse::new(PulseCode::empty(), ack)).unwrap();
        ack_rx.recv().unwrap();
        assert_eq!(b_hits.load(Ordering::SeqCst), 0);
        assert_eq!(t_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disconnected_side_becomes_absent() {
        let (a_mine, a_tee) = bus();
        let (b_mine, b_tee) = bus();
        let t_mine = tee(Some(a_tee), Some(b_tee));
        let t_hits = sink(t_mine.rx.clone());
        drop(b_mine);

        assert!(send_pulse(&a_mine.tx, PulseCode::CCG));
        assert_eq!(t_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_mutual_drive_does_not_deadlock() {
        // Both endpoints send before they start draining; the tee must
        // absorb one drive while delivering the other.
        let (a_mine, a_tee) = bus();
        let (b_mine, b_tee) = bus();
        let t_mine = tee(Some(a_tee), Some(b_tee));
        let t_hits = sink(t_mine.rx.clone());

        let endpoint = |end: BusEnd, code: PulseCode| {
            let hits = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&hits);
            thread::spawn(move || {
                assert!(send_pulse(&end.tx, code));
                for p in end.rx.iter() {
                    counter.fetch_add(1, Ordering::SeqCst);
                    p.ack();
                }
            });
            hits
        };
        let a_hits = endpoint(a_mine, PulseCode::ONEP);
        let b_hits = endpoint(b_mine, PulseCode::TWOP);

        wait_for(|| {
            a_hits.load(Ordering::SeqCst) == 1
                && b_hits.load(Ordering::SeqCst) == 1
                && t_hits.load(Ordering::SeqCst) == 2
        });
    }
}
