use std::{
    io::{BufRead, Write},
    path::PathBuf,
};

use anyhow::{Context as _, bail};
use areg::{DEFAULT_TAPE_LENGTH, Program, Vm};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

/// AReg interpreter
#[derive(Parser, Debug)]
#[command(name = "areg", version)]
#[command(about = "Run AReg programs on a circular tape with an A Register")]
struct Args {
    /// Source file to run (prompted for when omitted)
    file: Option<PathBuf>,

    /// Number of registers on the tape (prompted for when omitted)
    #[arg(short, long)]
    tape_length: Option<usize>,

    /// Print the parsed program before running it
    #[arg(long)]
    dump: bool,

    /// Trace every executed instruction to stderr (implies --dump)
    #[arg(long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    // AREG_LOG takes precedence over RUST_LOG, default is warn
    let filter = if debug {
        EnvFilter::new("areg=trace")
    } else {
        EnvFilter::try_from_env("AREG_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn prompt(stdin: &mut impl BufRead, message: &str) -> anyhow::Result<String> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{message}")?;
    stdout.flush()?;
    let mut answer = String::new();
    stdin.read_line(&mut answer).context("prompt read failed")?;
    Ok(answer.trim().to_owned())
}

fn parse_tape_length(answer: &str) -> anyhow::Result<usize> {
    if answer.is_empty() {
        return Ok(DEFAULT_TAPE_LENGTH);
    }
    let tape_length: usize = answer
        .parse()
        .with_context(|| format!("invalid tape length `{answer}`"))?;
    if tape_length == 0 {
        bail!("tape length must be at least 1");
    }
    Ok(tape_length)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let stdin = std::io::stdin();
    let mut stdin = stdin.lock();

    let source_path = match args.file {
        Some(path) => path,
        None => PathBuf::from(prompt(&mut stdin, "AReg file: ")?),
    };
    let source = std::fs::read_to_string(&source_path)
        .with_context(|| format!("source read failed: {}", source_path.display()))?;
    let program = Program::parse(&source);
    if args.dump || args.debug {
        print!("{program}");
    }

    let tape_length = match args.tape_length {
        Some(tape_length) => tape_length,
        None => parse_tape_length(&prompt(
            &mut stdin,
            &format!("Tape length ({DEFAULT_TAPE_LENGTH} recommended): "),
        )?)?,
    };

    let stdout = std::io::stdout();
    let vm = Vm::new(program, tape_length, stdin, stdout.lock())?;
    vm.execute().context("execution failure")?;
    Ok(())
}

#[test]
fn test_tape_length_answer() -> anyhow::Result<()> {
    assert_eq!(parse_tape_length("")?, DEFAULT_TAPE_LENGTH);
    assert_eq!(parse_tape_length("30")?, 30);
    assert!(parse_tape_length("0").is_err());
    assert!(parse_tape_length("-4").is_err());
    assert!(parse_tape_length("many").is_err());
    Ok(())
}

#[test]
fn test_prompt_trims_answer() -> anyhow::Result<()> {
    let mut stdin = std::io::BufReader::new(&b"  prog.areg \nrest"[..]);
    assert_eq!(prompt(&mut stdin, "")?, "prog.areg");
    Ok(())
}
