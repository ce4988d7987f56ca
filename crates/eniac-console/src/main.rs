//! ENIAC simulator console

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use eniac_core::state::CycleMode;
use eniac_system::{Flow, Interpreter, Machine, MachineConfig};

#[derive(Parser)]
#[command(name = "eniac-emu")]
#[command(about = "Pulse-level ENIAC simulator")]
struct Args {
    /// Configuration file sourced before the console starts
    config: Option<String>,

    /// Run for n add cycles, dump state, and exit
    #[arg(short = 't', long)]
    test_cycles: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let machine = Arc::new(Machine::new(MachineConfig {
        test_cycles: args.test_cycles,
        start_mode: CycleMode::Continuous,
    }));
    let mut console = Interpreter::new(Arc::clone(&machine));

    if let Some(path) = &args.config {
        match console.source_file(path) {
            Ok(()) => tracing::info!("sourced configuration {path}"),
            Err(err) => println!("{err}"),
        }
    }

    if args.test_cycles.is_some() {
        machine.start_test();
        machine.wait_test();
        print!("{}", machine.dump_all());
        return;
    }

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{:04}> ", machine.cycle_count() % 10000);
        let _ = io::stdout().flush();
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if console.exec_line(&line) == Flow::Quit {
            break;
        }
    }
}
