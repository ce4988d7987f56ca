//! Command surface: tokenizer, dispatch and the jack-addressing grammar
//!
//! Whitespace-separated tokens, `#` opens a comment. Every user-surface
//! error is printed and absorbed; the offending command is skipped and the
//! simulator keeps running.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::sync::Arc;

use eniac_bus::debug;
use eniac_bus::trunk::{TrunkClass, LINES_PER_TRAY, TRAYS};
use eniac_core::prelude::*;
use eniac_units::{AdapterSide, Button};
use thiserror::Error;

use crate::machine::Machine;

/// Whether the console keeps going after a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Error)]
pub enum CommandError {
    /// Malformed jack spec or bad command syntax.
    #[error("{0}")]
    ConfigParse(String),
    /// A unit letter that names nothing on this machine.
    #[error("unknown unit: {0}")]
    UnknownUnit(String),
    /// A card or command file that would not open.
    #[error("{context}: {source}")]
    File {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// One parsed jack position.
enum Jack<'a> {
    Adapter {
        kind: &'a str,
        unit: usize,
        param: i64,
    },
    Accumulator {
        unit: usize,
        terminal: &'a str,
    },
    Constant(&'a str),
    Divider(&'a str),
    FunctionTable {
        unit: usize,
        terminal: &'a str,
    },
    Initiate(&'a str),
    Multiplier(&'a str),
    MasterProgrammer(&'a str),
    Trunk {
        class: TrunkClass,
        index: usize,
    },
    Breakpoint(usize),
}

/// The console-side command interpreter. Holds the open card files; all
/// machine state lives in the [`Machine`].
pub struct Interpreter {
    machine: Arc<Machine>,
    reader: Option<BufReader<File>>,
    punch: Option<BufWriter<File>>,
}

impl Interpreter {
    pub fn new(machine: Arc<Machine>) -> Self {
        Self {
            machine,
            reader: None,
            punch: None,
        }
    }

    pub fn machine(&self) -> &Arc<Machine> {
        &self.machine
    }

    /// True once a card-reader file has been opened with `f r`.
    pub fn reader_open(&self) -> bool {
        self.reader.is_some()
    }

    /// True once a card-punch file has been opened with `f p`.
    pub fn punch_open(&self) -> bool {
        self.punch.is_some()
    }

    /// Run one command line, printing and absorbing any error.
    pub fn exec_line(&mut self, line: &str) -> Flow {
        match self.exec(line) {
            Ok(flow) => flow,
            Err(err) => {
                println!("{err}");
                Flow::Continue
            }
        }
    }

    fn exec(&mut self, line: &str) -> Result<Flow, CommandError> {
        let mut fields: Vec<&str> = Vec::new();
        for token in line.split_whitespace() {
            if token.starts_with('#') {
                break;
            }
            fields.push(token);
        }
        if fields.is_empty() {
            return Ok(Flow::Continue);
        }
        match fields[0] {
            "b" => {
                if fields.len() != 2 {
                    return Err(CommandError::ConfigParse("button syntax: b button".into()));
                }
                match fields[1] {
                    "c" => self.machine.press_initiate_button(Button::Clear),
                    "i" => self.machine.press_initiate_button(Button::Initiate),
                    "p" => self.machine.press_cycle_button(),
                    "r" => self.machine.press_initiate_button(Button::Readout),
                    other => {
                        return Err(CommandError::ConfigParse(format!("unknown button: {other}")))
                    }
                }
            }
            "n" => {
                self.machine.press_cycle_button();
                print!("{}", self.machine.dump_all());
            }
            "d" => {
                if fields.len() != 2 {
                    return Err(CommandError::ConfigParse("status syntax: d unit".into()));
                }
                println!("{}", self.unit_status(fields[1])?);
            }
            "D" => print!("{}", self.machine.dump_all()),
            "f" => {
                if fields.len() != 3 {
                    return Err(CommandError::ConfigParse(
                        "file syntax: f (r|p) filename".into(),
                    ));
                }
                match fields[1] {
                    "r" => {
                        let file = File::open(fields[2]).map_err(|source| CommandError::File {
                            context: format!("card reader open {}", fields[2]),
                            source,
                        })?;
                        self.reader = Some(BufReader::new(file));
                    }
                    "p" => {
                        let file = File::create(fields[2]).map_err(|source| CommandError::File {
                            context: format!("card punch open {}", fields[2]),
                            source,
                        })?;
                        self.punch = Some(BufWriter::new(file));
                    }
                    other => {
                        return Err(CommandError::ConfigParse(format!(
                            "file syntax: f (r|p) filename, not {other}"
                        )))
                    }
                }
            }
            "l" => {
                if fields.len() != 2 {
                    return Err(CommandError::ConfigParse("load syntax: l file".into()));
                }
                self.source_file(fields[1])?;
            }
            "p" => {
                if fields.len() != 3 {
                    return Err(CommandError::ConfigParse(format!(
                        "invalid jumper spec: {line}"
                    )));
                }
                self.patch(fields[1], fields[2])?;
            }
            "q" => return Ok(Flow::Quit),
            "r" => {
                if fields.len() != 2 {
                    return Err(CommandError::ConfigParse("reset syntax: r unit".into()));
                }
                self.reset_unit(fields[1])?;
            }
            "R" => self.machine.reset_all(),
            "s" => {
                if fields.len() < 3 {
                    return Err(CommandError::ConfigParse("no switch setting".into()));
                }
                self.set_switch(fields[1], fields[2])?;
            }
            "set" => {
                if fields.len() != 3 {
                    return Err(CommandError::ConfigParse(
                        "set syntax: set a13 -9876543210".into(),
                    ));
                }
                self.preset_accumulator(fields[1], fields[2])?;
            }
            // Accepted and ignored.
            "u" | "dt" | "pt" => {}
            other => {
                return Err(CommandError::ConfigParse(format!(
                    "unknown command: {other}"
                )))
            }
        }
        Ok(Flow::Continue)
    }

    /// Source a command file; `q` inside the file stops the sourcing only.
    pub fn source_file(&mut self, path: &str) -> Result<(), CommandError> {
        let file = File::open(path)
            .or_else(|_| File::open(format!("programs/{path}")))
            .map_err(|source| CommandError::File {
                context: format!("load {path}"),
                source,
            })?;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| CommandError::File {
                context: format!("read {path}"),
                source,
            })?;
            if self.exec_line(&line) == Flow::Quit {
                break;
            }
        }
        Ok(())
    }

    fn unit_status(&self, unit: &str) -> Result<String, CommandError> {
        let (letter, rest) = split_letter(unit);
        match letter {
            "a" => {
                let n = unit_number(rest, self.machine.accumulators.len(), unit)?;
                Ok(self.machine.accumulators[n - 1].status())
            }
            "b" => Ok(self.machine.breakpoints.status()),
            "c" => Ok(self.machine.constant.status()),
            "d" => Ok(self.machine.divider.status()),
            "f" => {
                let n = unit_number(rest, self.machine.fts.len(), unit)?;
                Ok(self.machine.fts[n - 1].status())
            }
            "i" => Ok(self.machine.initiate.status()),
            "m" => Ok(self.machine.multiplier.status()),
            "p" => Ok(self.machine.mp.status()),
            _ => Err(CommandError::UnknownUnit(unit.to_string())),
        }
    }

    fn reset_unit(&self, spec: &str) -> Result<(), CommandError> {
        let parts: Vec<&str> = spec.split('.').collect();
        match parts[0] {
            "a" => {
                if parts.len() != 2 {
                    return Err(CommandError::ConfigParse(
                        "accumulator reset syntax: r a.unit".into(),
                    ));
                }
                let n = unit_number(parts[1], self.machine.accumulators.len(), spec)?;
                self.machine.accumulators[n - 1].reset();
            }
            "b" => self.machine.breakpoints.reset(),
            "c" => self.machine.constant.reset(),
            "d" => self.machine.divider.reset(),
            "f" => {
                if parts.len() != 2 {
                    return Err(CommandError::ConfigParse(
                        "function table reset syntax: r f.unit".into(),
                    ));
                }
                let n = unit_number(parts[1], self.machine.fts.len(), spec)?;
                self.machine.fts[n - 1].reset();
            }
            "i" => self.machine.initiate.reset(),
            "m" => self.machine.multiplier.reset(),
            "p" => self.machine.mp.reset(),
            _ => return Err(CommandError::UnknownUnit(spec.to_string())),
        }
        Ok(())
    }

    fn set_switch(&self, target: &str, value: &str) -> Result<(), CommandError> {
        let parts: Vec<&str> = target.split('.').collect();
        if parts.len() != 2 {
            return Err(CommandError::ConfigParse(format!(
                "switch syntax: s unit.switch value, not {target}"
            )));
        }
        let (name, value) = (parts[1].to_string(), value.to_string());
        match parts[0] {
            "c" => send_switch(&self.machine.cons_switch, name, value),
            "cy" => self.machine.cycling.set_switch(&name, &value),
            "d" | "ds" => send_switch(&self.machine.div_switch, name, value),
            "m" => send_switch(&self.machine.mult_switch, name, value),
            "p" => send_switch(&self.machine.mp_switch, name, value),
            "pr" => send_switch(&self.machine.pr_switch, name, value),
            unit if unit.starts_with('a') => {
                let n = unit_number(&unit[1..], self.machine.accumulators.len(), target)?;
                send_switch(&self.machine.acc_switches[n - 1], name, value);
            }
            unit if unit.starts_with('f') => {
                let n = unit_number(&unit[1..], self.machine.fts.len(), target)?;
                send_switch(&self.machine.ft_switches[n - 1], name, value);
            }
            other => return Err(CommandError::UnknownUnit(other.to_string())),
        }
        Ok(())
    }

    fn preset_accumulator(&self, unit: &str, value: &str) -> Result<(), CommandError> {
        if !unit.starts_with('a') {
            return Err(CommandError::ConfigParse(
                "set syntax: set a13 -9876543210".into(),
            ));
        }
        let n = unit_number(&unit[1..], self.machine.accumulators.len(), unit)?;
        let value: i64 = value
            .parse()
            .map_err(|_| CommandError::ConfigParse(format!("bad decimal: {value}")))?;
        if !self.machine.accumulators[n - 1].set(value) {
            return Err(CommandError::ConfigParse(format!(
                "value out of range: {value}"
            )));
        }
        Ok(())
    }

    /// Patch a jumper. The first jack is the driving side; a trunk in
    /// first position subscribes to the trunk, in second position it feeds
    /// the trunk. `debug.bp<n>` is legal only in second position.
    fn patch(&self, first: &str, second: &str) -> Result<(), CommandError> {
        let a = parse_jack(first)?;
        let b = parse_jack(second)?;
        if matches!(a, Jack::Breakpoint(_)) {
            return Err(CommandError::ConfigParse(format!(
                "breakpoints plug in second position only: {first}"
            )));
        }
        let w = wire();
        self.apply(&a, Position::First, &w, second)?;
        self.apply(&b, Position::Second, &w, first)?;
        tracing::debug!(first, second, "jumper patched");
        Ok(())
    }

    fn apply(
        &self,
        jack: &Jack<'_>,
        position: Position,
        w: &Wire,
        label: &str,
    ) -> Result<(), CommandError> {
        let plugged = match jack {
            Jack::Adapter { kind, unit, param } => {
                let side = match position {
                    Position::First => AdapterSide::Drive,
                    Position::Second => AdapterSide::Feed,
                };
                self.machine.adapters.plug(kind, side, *unit, *param, w)
            }
            Jack::Accumulator { unit, terminal } => {
                self.machine.accumulators[*unit].plug(terminal, w)
            }
            Jack::Constant(terminal) => self.machine.constant.plug(terminal, w),
            Jack::Divider(terminal) => self.machine.divider.plug(terminal, w),
            Jack::FunctionTable { unit, terminal } => self.machine.fts[*unit].plug(terminal, w),
            Jack::Initiate(terminal) => self.machine.initiate.plug(terminal, w),
            Jack::Multiplier(terminal) => self.machine.multiplier.plug(terminal, w),
            Jack::MasterProgrammer(terminal) => self.machine.mp.plug(terminal, w),
            Jack::Trunk { class, index } => {
                let mut trunks = self.machine.trunks.lock().unwrap();
                match position {
                    Position::First => trunks.receive(*class, *index, w.tx.clone()),
                    Position::Second => trunks.transmit(*class, *index, w.rx.clone()),
                }
                true
            }
            Jack::Breakpoint(slot) => {
                self.machine.breakpoints.plug(*slot, w.rx.clone(), label);
                true
            }
        };
        if plugged {
            Ok(())
        } else {
            Err(CommandError::ConfigParse(format!(
                "invalid jack spec: {}",
                label_of(jack)
            )))
        }
    }
}

#[derive(Clone, Copy)]
enum Position {
    First,
    Second,
}

fn send_switch(ch: &crossbeam_channel::Sender<(String, String)>, name: String, value: String) {
    let _ = ch.send((name, value));
}

fn split_letter(unit: &str) -> (&str, &str) {
    let split = unit
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(unit.len());
    unit.split_at(split)
}

fn unit_number(text: &str, max: usize, context: &str) -> Result<usize, CommandError> {
    let n: usize = text
        .parse()
        .map_err(|_| CommandError::ConfigParse(format!("bad unit number: {context}")))?;
    if n == 0 || n > max {
        return Err(CommandError::ConfigParse(format!(
            "unit number out of range: {context}"
        )));
    }
    Ok(n)
}

fn parse_jack(spec: &str) -> Result<Jack<'_>, CommandError> {
    let parts: Vec<&str> = spec.split('.').collect();
    let head = parts[0];
    if head.is_empty() {
        return Err(CommandError::ConfigParse(format!("invalid jack: {spec}")));
    }
    // Trunks are bare numbers: a whole tray, or tray-line.
    if head.chars().next().unwrap().is_ascii_digit() {
        if parts.len() != 1 {
            return Err(CommandError::ConfigParse(format!("invalid trunk: {spec}")));
        }
        return parse_trunk(head);
    }
    match head {
        "ad" => {
            if parts.len() != 4 {
                return Err(CommandError::ConfigParse(
                    "adapter jumper syntax: ad.ilk.unit.param".into(),
                ));
            }
            let unit: usize = parts[2]
                .parse()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| CommandError::ConfigParse(format!("bad adapter unit: {spec}")))?;
            let param: i64 = parts[3]
                .parse()
                .map_err(|_| CommandError::ConfigParse(format!("bad adapter param: {spec}")))?;
            if !eniac_units::Adapters::is_kind(parts[1]) {
                return Err(CommandError::ConfigParse(format!(
                    "unknown adapter kind: {spec}"
                )));
            }
            Ok(Jack::Adapter {
                kind: parts[1],
                unit: unit - 1,
                param,
            })
        }
        "debug" => {
            if parts.len() != 2 || !parts[1].starts_with("bp") {
                return Err(CommandError::ConfigParse(
                    "debugger jumper syntax: debug.bpn".into(),
                ));
            }
            let slot: usize = parts[1][2..]
                .parse()
                .map_err(|_| CommandError::ConfigParse(format!("bad breakpoint slot: {spec}")))?;
            if slot >= debug::SLOTS {
                return Err(CommandError::ConfigParse(format!(
                    "breakpoint slot out of range: {spec}"
                )));
            }
            Ok(Jack::Breakpoint(slot))
        }
        "c" => two_part(spec, &parts).map(Jack::Constant),
        "d" => two_part(spec, &parts).map(Jack::Divider),
        "i" => two_part(spec, &parts).map(Jack::Initiate),
        "m" => two_part(spec, &parts).map(Jack::Multiplier),
        "p" => two_part(spec, &parts).map(Jack::MasterProgrammer),
        _ if head.starts_with('a') => {
            let unit = unit_number(&head[1..], eniac_units::ACCUMULATORS, spec)?;
            let terminal = two_part(spec, &parts)?;
            Ok(Jack::Accumulator {
                unit: unit - 1,
                terminal,
            })
        }
        _ if head.starts_with('f') => {
            let unit = unit_number(&head[1..], eniac_units::FUNCTION_TABLES, spec)?;
            let terminal = two_part(spec, &parts)?;
            Ok(Jack::FunctionTable {
                unit: unit - 1,
                terminal,
            })
        }
        _ => Err(CommandError::ConfigParse(format!("invalid jack: {spec}"))),
    }
}

fn two_part<'a>(spec: &str, parts: &[&'a str]) -> Result<&'a str, CommandError> {
    if parts.len() != 2 {
        return Err(CommandError::ConfigParse(format!("invalid jack: {spec}")));
    }
    Ok(parts[1])
}

fn parse_trunk(text: &str) -> Result<Jack<'static>, CommandError> {
    match text.split_once('-') {
        None => {
            let tray: usize = text
                .parse()
                .map_err(|_| CommandError::ConfigParse(format!("invalid data trunk: {text}")))?;
            if tray < 1 || tray > TRAYS {
                return Err(CommandError::ConfigParse(format!(
                    "invalid data trunk: {text}"
                )));
            }
            Ok(Jack::Trunk {
                class: TrunkClass::Tray,
                index: tray - 1,
            })
        }
        Some((tray, line)) => {
            let tray: usize = tray
                .parse()
                .map_err(|_| CommandError::ConfigParse(format!("invalid data trunk: {text}")))?;
            let line: usize = line
                .parse()
                .map_err(|_| CommandError::ConfigParse(format!("invalid data trunk: {text}")))?;
            if tray < 1 || tray > TRAYS || line < 1 || line > LINES_PER_TRAY {
                return Err(CommandError::ConfigParse(format!(
                    "invalid data trunk: {text}"
                )));
            }
            Ok(Jack::Trunk {
                class: TrunkClass::Line,
                index: (tray - 1) * LINES_PER_TRAY + line - 1,
            })
        }
    }
}

fn label_of(jack: &Jack<'_>) -> String {
    match jack {
        Jack::Adapter { kind, unit, .. } => format!("ad.{kind}.{}", unit + 1),
        Jack::Accumulator { unit, terminal } => format!("a{}.{terminal}", unit + 1),
        Jack::Constant(t) => format!("c.{t}"),
        Jack::Divider(t) => format!("d.{t}"),
        Jack::FunctionTable { unit, terminal } => format!("f{}.{terminal}", unit + 1),
        Jack::Initiate(t) => format!("i.{t}"),
        Jack::Multiplier(t) => format!("m.{t}"),
        Jack::MasterProgrammer(t) => format!("p.{t}"),
        Jack::Trunk { index, .. } => format!("trunk {index}"),
        Jack::Breakpoint(slot) => format!("debug.bp{slot}"),
    }
}
