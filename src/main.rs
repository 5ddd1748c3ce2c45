mod lib;
use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use lib::lox::Lox;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exit status when the script itself could not be read (`EX_IOERR`).
const EXIT_IO_ERROR: i32 = 74;

#[derive(ClapParser, Debug)]
#[command(name = "rlox", about = "A tree-walking interpreter for Lox")]
struct Args {
    /// Script to run. Starts an interactive prompt when omitted.
    file: Option<PathBuf>,

    /// Print each parsed program as an s-expression before running it.
    #[arg(long)]
    print_ast: bool,
}

fn main() {
    init_tracing();
    let args = Args::parse();
    let code = match args.file {
        Some(pbuf) => run_file(pbuf, args.print_ast),
        None => run_prompt(args.print_ast).map(|()| 0),
    };
    match code {
        Ok(code) => std::process::exit(code),
        Err(why) => {
            eprintln!("ERROR: {:#}", why);
            std::process::exit(EXIT_IO_ERROR);
        }
    }
}

/// Logging is off unless `RUST_LOG` asks for it, and always goes to stderr
/// so it never mixes with program output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_file(path: PathBuf, print_ast: bool) -> Result<i32> {
    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read lox source at {}", path.display()))?;
    let mut lox = Lox::new(std::io::stdout()).print_ast(print_ast);
    lox.run(&source);
    report(&mut lox);
    Ok(lox.exit_code())
}

fn print_prompt() -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(b"> ").context("Failed to write prompt to console.")?;
    handle.flush().context("Failed to flush prompt to console.")?;
    Ok(())
}

fn run_prompt(print_ast: bool) -> Result<()> {
    let mut lox = Lox::new(std::io::stdout()).print_ast(print_ast);
    let stdin = std::io::stdin();
    print_prompt()?;
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read line")?;
        lox.run(&line);
        report(&mut lox);
        lox.reset();
        print_prompt()?;
    }
    Ok(())
}

fn report<W: Write>(lox: &mut Lox<W>) {
    for diagnostic in lox.take_diagnostics() {
        eprintln!("{}", diagnostic);
    }
}
