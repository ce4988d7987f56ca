//! Machine assembly
//!
//! Wires the fabric together: the cycling unit feeds a fanout whose
//! subscribers are the multiplier, the constant transmitter and the three
//! function tables; the direct clock observers ride the phase-tap list in
//! panel order. Units, trunks and breakpoints hang off the machine for the
//! command surface to reach.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender};
use eniac_bus::cycle::{Cycling, CyclingConfig, CyclingHandle, PhaseTap};
use eniac_bus::debug::Breakpoints;
use eniac_bus::fanout::Fanout;
use eniac_bus::trunk::TrunkTable;
use eniac_core::prelude::*;
use eniac_units::{
    Accumulator, Adapters, Button, Constant, Divider, FunctionTable, Initiate, MasterProgrammer,
    Multiplier, Printer, ACCUMULATORS, FUNCTION_TABLES,
};

/// Power-on configuration.
pub struct MachineConfig {
    /// Run exactly this many add cycles after the start gate, then finish.
    pub test_cycles: Option<u64>,
    /// Cycling-unit mode at power-on.
    pub start_mode: CycleMode,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            test_cycles: None,
            start_mode: CycleMode::Continuous,
        }
    }
}

type SwitchChannel = Sender<(String, String)>;

/// The assembled machine.
pub struct Machine {
    pub(crate) cycling: CyclingHandle,
    pub(crate) accumulators: Vec<Arc<Accumulator>>,
    pub(crate) acc_switches: Vec<SwitchChannel>,
    pub(crate) initiate: Arc<Initiate>,
    init_buttons: Sender<Button>,
    init_done: Receiver<()>,
    pub(crate) constant: Arc<Constant>,
    pub(crate) cons_switch: SwitchChannel,
    pub(crate) multiplier: Arc<Multiplier>,
    pub(crate) mult_switch: SwitchChannel,
    pub(crate) divider: Arc<Divider>,
    pub(crate) div_switch: SwitchChannel,
    pub(crate) fts: Vec<Arc<FunctionTable>>,
    pub(crate) ft_switches: Vec<SwitchChannel>,
    pub(crate) mp: Arc<MasterProgrammer>,
    pub(crate) mp_switch: SwitchChannel,
    pub(crate) printer: Arc<Printer>,
    pub(crate) pr_switch: SwitchChannel,
    pub(crate) adapters: Adapters,
    pub(crate) trunks: Mutex<TrunkTable>,
    pub(crate) breakpoints: Breakpoints,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        let clear = Arc::new(InitiateClear::new());

        let initiate = Initiate::new(Arc::clone(&clear));
        let (init_buttons, init_done) = Arc::clone(&initiate).spawn_buttons();
        let mp = MasterProgrammer::new();
        let mp_switch = Arc::clone(&mp).spawn_control();
        let divider = Divider::new();
        let div_switch = Arc::clone(&divider).spawn_control();
        let printer = Printer::new();
        let pr_switch = Arc::clone(&printer).spawn_control();

        let multiplier = Multiplier::new();
        let mult_switch = Arc::clone(&multiplier).spawn_control();
        let (mult_cyc_tx, mult_cyc_rx) = bounded::<Pulse>(0);
        multiplier.spawn_cycle(mult_cyc_rx);

        let constant = Constant::new();
        let cons_switch = Arc::clone(&constant).spawn_control();
        let (cons_cyc_tx, cons_cyc_rx) = bounded::<Pulse>(0);
        constant.spawn_cycle(cons_cyc_rx);

        let accumulators: Vec<Arc<Accumulator>> = (0..ACCUMULATORS).map(Accumulator::new).collect();
        let acc_switches: Vec<SwitchChannel> = accumulators
            .iter()
            .map(|a| Arc::clone(a).spawn_control())
            .collect();

        let mut cycle_feeds = vec![mult_cyc_tx, cons_cyc_tx];
        let mut fts = Vec::with_capacity(FUNCTION_TABLES);
        let mut ft_switches = Vec::with_capacity(FUNCTION_TABLES);
        for i in 0..FUNCTION_TABLES {
            let ft = FunctionTable::new(i);
            ft_switches.push(Arc::clone(&ft).spawn_control());
            let (ft_cyc_tx, ft_cyc_rx) = bounded::<Pulse>(0);
            ft.spawn_cycle(ft_cyc_rx);
            cycle_feeds.push(ft_cyc_tx);
            fts.push(ft);
        }

        let (cycout_tx, cycout_rx) = bounded::<Pulse>(0);
        Fanout::new(cycle_feeds).spawn(cycout_rx);

        // Direct clock observers, in panel order.
        let mut taps: Vec<PhaseTap> = vec![
            Arc::clone(&initiate).tap(),
            Arc::clone(&mp).tap(),
            Arc::clone(&divider).tap(),
        ];
        taps.extend(accumulators.iter().map(|a| Arc::clone(a).tap()));

        let cycling = Cycling::spawn(
            CyclingConfig {
                test_cycles: config.test_cycles,
                start_mode: config.start_mode,
            },
            cycout_tx,
            taps,
            clear,
        );
        let breakpoints = Breakpoints::new(Arc::clone(cycling.shared()));

        tracing::info!("machine assembled");
        Self {
            cycling,
            accumulators,
            acc_switches,
            initiate,
            init_buttons,
            init_done,
            constant,
            cons_switch,
            multiplier,
            mult_switch,
            divider,
            div_switch,
            fts,
            ft_switches,
            mp,
            mp_switch,
            printer,
            pr_switch,
            adapters: Adapters::new(),
            trunks: Mutex::new(TrunkTable::new()),
            breakpoints,
        }
    }

    pub fn cycling(&self) -> &CyclingHandle {
        &self.cycling
    }

    pub fn accumulator(&self, index: usize) -> Option<&Arc<Accumulator>> {
        self.accumulators.get(index)
    }

    /// Press the cycle step button and wait until the engine consumed it.
    pub fn press_cycle_button(&self) {
        self.cycling.press_button();
    }

    /// Press an initiate-panel button and wait for its action to finish.
    pub fn press_initiate_button(&self, button: Button) {
        if self.init_buttons.send(button).is_ok() {
            let _ = self.init_done.recv();
        }
    }

    /// Add cycles completed since the last counter reset.
    pub fn cycle_count(&self) -> u64 {
        self.cycling.shared().acyc()
    }

    /// Open the start gate of a test run.
    pub fn start_test(&self) {
        self.cycling.start_test();
    }

    /// Block until a test run's cycle budget is spent.
    pub fn wait_test(&self) {
        self.cycling.wait_finished();
    }

    /// Full machine reset: every unit, the cycling mode, breakpoints,
    /// adapters and trunks back to power-on state.
    pub fn reset_all(&self) {
        self.initiate.reset();
        self.cycling.reset();
        self.breakpoints.reset();
        self.mp.reset();
        for ft in &self.fts {
            ft.reset();
        }
        for acc in &self.accumulators {
            acc.reset();
        }
        self.divider.reset();
        self.multiplier.reset();
        self.constant.reset();
        self.printer.reset();
        self.adapters.reset();
        self.trunks.lock().unwrap().reset();
        tracing::info!("full machine reset");
    }

    /// Aggregate state dump in front-panel order.
    pub fn dump_all(&self) -> String {
        let mut out = String::new();
        writeln!(out).unwrap();
        writeln!(out, "{}", self.initiate.status()).unwrap();
        writeln!(out, "{}", self.mp.status()).unwrap();
        for pair in self.accumulators.chunks(2) {
            match pair {
                [left, right] => {
                    writeln!(out, "{}   {}", left.status(), right.status()).unwrap()
                }
                [left] => writeln!(out, "{}", left.status()).unwrap(),
                _ => unreachable!(),
            }
        }
        writeln!(out, "{}", self.divider.status()).unwrap();
        writeln!(out, "{}", self.multiplier.status()).unwrap();
        for ft in &self.fts {
            writeln!(out, "{}", ft.status()).unwrap();
        }
        writeln!(out, "{}", self.constant.status()).unwrap();
        writeln!(out).unwrap();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_and_dump() {
        let machine = Machine::new(MachineConfig {
            test_cycles: None,
            start_mode: CycleMode::Add,
        });
        let dump = machine.dump_all();
        assert!(dump.contains("i  clear=000000"));
        assert!(dump.contains("a1  P 0000000000"));
        assert!(dump.contains("a20 P 0000000000"));
        assert!(dump.contains("f3"));
    }

    #[test]
    fn test_test_cycles_run() {
        let machine = Machine::new(MachineConfig {
            test_cycles: Some(3),
            start_mode: CycleMode::Continuous,
        });
        machine.start_test();
        machine.wait_test();
        assert_eq!(machine.cycle_count(), 3);
    }

    #[test]
    fn test_clear_button_drives_scg_round_trip() {
        // Clear sets the flip-flops; the next cycle emits SCG once, the
        // initiate tap drops the flip-flops, and an armed accumulator
        // clears its register.
        let machine = Machine::new(MachineConfig {
            test_cycles: None,
            start_mode: CycleMode::Add,
        });
        let acc = Arc::clone(machine.accumulator(0).unwrap());
        acc.set(123);
        machine.acc_switches[0]
            .send(("sc".to_string(), "c".to_string()))
            .unwrap();
        // The switch loop applies the setting just after taking it off the
        // channel; wait until the arm is visible before cycling.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while !acc.status().ends_with("sc=c") {
            assert!(std::time::Instant::now() < deadline, "switch never applied");
            std::thread::yield_now();
        }
        machine.press_initiate_button(Button::Clear);
        assert!(machine.cycling.clear_flags().any());

        machine.press_cycle_button();
        assert_eq!(acc.value(), 0);
        assert!(!machine.cycling.clear_flags().any());
    }
}
