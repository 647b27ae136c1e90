use std::io::{self, Write};
use std::process::ExitCode;

use arch::bus::Image;
use clap::Parser;
use color_print::cprintln;
use fasm::{
    lexer::parse_number,
    listing::{dump, listing},
    Assembler, Error,
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
    /// Input file
    #[clap(default_value = "main.fasm")]
    input: String,

    /// Output image
    #[clap(short, long, default_value = "main.bin")]
    output: String,

    /// Print the emitted listing
    #[clap(short, long)]
    listing: bool,

    /// Print the symbolic dump
    #[clap(short, long)]
    dump: bool,

    /// Option constants, override `#NAME: value` in the source (repeatable)
    #[clap(short = 'D', long, value_name = "NAME=VALUE", value_parser = parse_define)]
    define: Vec<(String, i32)>,

    /// One of `TRACE`, `DEBUG`, `INFO`, `WARN`, or `ERROR`
    #[clap(long, default_value_t = Level::WARN)]
    log_level: Level,
}

fn parse_define(s: &str) -> Result<(String, i32), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE: `{s}`"))?;
    let value = parse_number(value).map_err(|e| format!("{e}: `{value}`"))?;
    Ok((name.trim().to_string(), value))
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

fn run(args: &Args) -> Result<(), Error> {
    println!("  < {}", args.input);
    let mut asm = Assembler::slurp(&args.input)?;
    for (name, value) in &args.define {
        asm.set_option(name, *value);
    }

    let mut image = Image::new();
    if let Err(e) = asm.assemble(&mut image) {
        asm.print_diags();
        return Err(e);
    }

    if args.dump {
        println!("{}", dump(&asm, true));
        println!("-------------------+-----------------------------------------------------");
    }
    if args.listing {
        println!("{}", listing(&asm));
        println!("-------------------+-----------------------------------------------------");
    }

    println!("  > {} ({} bytes)", args.output, asm.end());
    let mut file = std::fs::File::create(&args.output)
        .map_err(|e| Error::FileCreate(args.output.clone(), e))?;
    file.write_all(image.bytes(asm.end()))
        .map_err(|e| Error::FileWrite(args.output.clone(), e))?;
    Ok(())
}
