use std::cell::RefCell;
use std::io;
use std::process::ExitCode;
use std::rc::Rc;

use arch::reg::Reg;
use clap::Parser;
use color_print::cprintln;
use fasm::Assembler;
use femu::{
    config::Config,
    error::Error,
    hooks::{dump::Dump, trace::Trace, Hook},
    syscalls::{self, Console, StdConsole},
    State, Vm,
};
use tracing::Level;

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, Parser)]
#[clap(version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Memory image, or `.fasm` source assembled on the fly
    #[clap(default_value = "main.bin")]
    input: String,

    /// YAML config
    #[clap(short, long)]
    config: Option<String>,

    /// Stop after this many steps
    #[clap(short, long)]
    tmax: Option<u64>,

    /// Print every executed instruction
    #[clap(short = 'a', long)]
    trace: bool,

    /// One of `TRACE`, `DEBUG`, `INFO`, `WARN`, or `ERROR`
    #[clap(long, default_value_t = Level::WARN)]
    log_level: Level,
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            cprintln!("<red,bold>error</>: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_program(args: &Args, cfg: &Config, vm: &mut Vm) -> Result<(), Error> {
    if args.input.ends_with(".fasm") {
        let mut asm = Assembler::slurp(&args.input)?;
        if let Err(e) = asm.assemble(&mut vm.mem_mut().loader()) {
            asm.print_diags();
            return Err(e.into());
        }
    } else {
        let bytes =
            std::fs::read(&args.input).map_err(|e| Error::FileOpen(args.input.clone(), e))?;
        vm.mem_mut().load(cfg.load, &bytes)?;
    }
    Ok(())
}

fn run(args: &Args) -> Result<(), Error> {
    let cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    println!("+-----------------------------------------------+");
    println!("| {:<45} |", args.input);
    println!("+-----------------------------------------------+");

    let mut vm = Vm::new(cfg.memory()?, cfg.syscalls);
    let console = Rc::new(RefCell::new(StdConsole));
    syscalls::install(&mut vm, console.clone());
    load_program(args, &cfg, &mut vm)?;

    let mut hooks: Vec<Box<dyn Hook>> = vec![Box::new(Dump::new(cfg.dump.clone()))];
    if args.trace {
        hooks.push(Box::new(Trace));
    }
    for hook in hooks.iter_mut() {
        hook.init(&mut vm);
    }

    vm.reset();
    if let Some(entry) = cfg.entry {
        vm.set(Reg::PC, entry);
    }

    for time in 0..args.tmax.unwrap_or(u64::MAX) {
        let Some(cycle) = vm.step() else {
            break;
        };
        for hook in hooks.iter_mut() {
            hook.exec(time, &cycle, &mut vm);
        }
    }
    console.borrow_mut().flush();

    println!();
    println!("=================================================");
    match vm.state() {
        State::Fault(fault) => Err(fault.into()),
        State::Running => {
            println!(" * Step limit reached at PC {:04X}", vm.pc());
            Ok(())
        }
        State::Halted => Ok(()),
    }
}
