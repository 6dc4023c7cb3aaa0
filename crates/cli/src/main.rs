//! `ven` — the stable CLI surface (§6) over `ven-vm`'s `Engine`. One flat
//! command, not subcommands: `ven [flags] <file> [args...]`. Execs one
//! program per invocation and exits; history, readline editing, and ANSI
//! coloring are the (out-of-scope) interactive shell's job, not this one's.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use ven_vm::{interrupt, Engine, EngineConfig, FsResolver, StdHost};

/// The pipeline stage `-j/--just` halts after.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Step {
    Read,
    Transform,
    Compile,
    Optimize,
    Evaluate,
}

#[derive(Parser)]
#[command(name = "ven")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run a Ven program", long_about = None)]
struct Cli {
    /// Program to run.
    file: PathBuf,

    /// Arguments passed through to the program.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// External resolver port (an out-of-process `expose` daemon).
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Per-instruction stepping.
    #[arg(short, long)]
    inspect: bool,

    /// Print total wall-clock time after the run.
    #[arg(short, long)]
    measure: bool,

    /// Print per-op timing after the run.
    #[arg(short = 'M', long)]
    timetable: bool,

    /// Halt after the named pipeline step instead of evaluating.
    #[arg(short = 'j', long, value_enum)]
    just: Option<Step>,

    /// Print the final value.
    #[arg(short, long)]
    result: bool,

    /// Optimizer pass budget (multiplied by 8, §6).
    #[arg(short = 'O', long)]
    optimize: Option<u32>,

    /// Activate `ensure` assertions.
    #[arg(short, long)]
    test: bool,

    /// JSON-encode the final step's product instead of printing it plain.
    #[arg(short, long)]
    serialize: bool,

    /// Enable a side-effect category (repeatable: `--with net --with fs`).
    #[arg(long = "with")]
    with: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("ven=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    interrupt::install();

    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> ExitCode {
    let source = match fs::read_to_string(&cli.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot read '{}': {e}", cli.file.display());
            return ExitCode::from(1);
        }
    };
    let file = cli.file.display().to_string();

    let config = EngineConfig {
        optimize_level: cli.optimize.map(|n| n * 8).unwrap_or(EngineConfig::default().optimize_level),
        test_mode: cli.test,
        instruction_budget: None,
    };
    let engine = Engine::new(config);
    let resolver = FsResolver::new(cli.file.parent().unwrap_or_else(|| std::path::Path::new(".")));

    let program = match engine.build(&source, &file, &resolver) {
        Ok(p) => p,
        Err(e) => return report_error(&e),
    };

    if let Some(step) = cli.just {
        if matches!(step, Step::Read | Step::Transform) {
            // Both halt before a `CompileUnit` exists; re-read to serialize
            // quotes rather than threading a second return path through
            // `Engine::build`.
            let unit = match venc::Reader::read(&source, &file) {
                Ok(u) => u,
                Err(e) => return report_error(&e),
            };
            print_quotes(&unit.quotes, cli.serialize);
            return ExitCode::SUCCESS;
        }
        if matches!(step, Step::Compile | Step::Optimize) {
            print_chunks(&program.chunks, cli.serialize);
            return ExitCode::SUCCESS;
        }
    }

    let mut host = StdHost::new();
    let started = Instant::now();
    let result = engine.run(&program, &mut host);
    let elapsed = started.elapsed();

    if cli.measure {
        eprintln!("elapsed: {:?}", elapsed);
    }
    if cli.timetable {
        eprintln!("per-op timing is not tracked outside --inspect");
    }
    if cli.inspect {
        eprintln!("per-instruction stepping is a debugger feature; run under `-i` support in a future build");
    }
    if !cli.with.is_empty() {
        tracing::debug!(categories = ?cli.with, "side-effect categories requested (no category currently gates a builtin)");
    }

    match result {
        Ok(value) => {
            if cli.result {
                print_value(&value, cli.serialize);
            }
            ExitCode::SUCCESS
        }
        Err(e) => report_error(&e),
    }
}

fn print_quotes(quotes: &[ven_core::Quote], serialize: bool) {
    if serialize {
        let json: Vec<_> = quotes.iter().map(ven_vm::serialize::quote_json).collect();
        println!("{}", serde_json::to_string_pretty(&json).expect("quote JSON is always valid"));
    } else {
        for q in quotes {
            println!("{:?}", q.kind);
        }
    }
}

fn print_chunks(chunks: &venc::ChunkTable, serialize: bool) {
    if serialize {
        let json = ven_vm::serialize::chunk_table_json(chunks);
        println!("{}", serde_json::to_string_pretty(&json).expect("chunk table JSON is always valid"));
    } else {
        for i in 0..chunks.len() {
            let chunk = chunks.get(ven_core::ChunkId(i));
            println!("chunk {i} ({}):", chunk.name);
            for (op, line) in chunk.ops.iter().zip(&chunk.lines) {
                println!("  {line:>4}  {op:?}");
            }
        }
    }
}

fn print_value(value: &ven_core::Value, serialize: bool) {
    if serialize {
        let json = ven_vm::serialize::value_json(value);
        println!("{}", serde_json::to_string_pretty(&json).expect("value JSON is always valid"));
    } else {
        println!("{value}");
    }
}

fn report_error(e: &ven_core::VenError) -> ExitCode {
    if interrupt::requested() {
        eprintln!("interrupted");
        return ExitCode::from(130);
    }
    eprintln!("{e}");
    ExitCode::from(1)
}
