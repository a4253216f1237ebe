//! Bitram CLI
//!
//! Runs the guided walkthrough of the engine or inspects a saved snapshot.

use anyhow::{bail, Context, Result};
use bitram::codec::format_bits;
use bitram::{Engine, EngineBuilder, EngineConfig, Placement, Replica, VarType};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "bitram")]
#[command(about = "Bit-addressable memory engine with triple redundancy")]
struct Cli {
    /// TOML engine configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exercise every engine operation on a fresh engine
    Demo {
        /// Number of bit cells (overrides the configuration)
        #[arg(short, long)]
        size: Option<usize>,

        /// Seed for the random source
        #[arg(long)]
        seed: Option<u64>,

        /// Where to save the snapshot taken halfway through
        #[arg(long, default_value = "bitram_state.bin")]
        state: PathBuf,

        /// First operand
        #[arg(long, default_value = "7", allow_negative_numbers = true)]
        a: i64,

        /// Second operand
        #[arg(long, default_value = "35", allow_negative_numbers = true)]
        b: i64,
    },

    /// Print a saved snapshot
    Inspect {
        /// Snapshot file
        path: PathBuf,

        /// Print the primary copy as hex bytes
        #[arg(long, conflicts_with_all = ["binary", "json"])]
        hex: bool,

        /// Print the primary copy as 8-bit groups
        #[arg(long, conflicts_with = "json")]
        binary: bool,

        /// Print the full state as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Some(
            EngineConfig::from_path(path)
                .with_context(|| format!("failed to load configuration from {:?}", path))?,
        ),
        None => None,
    };

    match cli.command {
        Command::Demo {
            size,
            seed,
            state,
            a,
            b,
        } => {
            let mut builder = EngineBuilder::new().size(512);
            if let Some(config) = config {
                builder = builder.config(config);
            }
            if let Some(size) = size {
                builder = builder.size(size);
            }
            if let Some(seed) = seed {
                builder = builder.seed(seed);
            }
            let mut engine = builder.build().context("failed to create engine")?;
            run_demo(&mut engine, &state, a, b)
        }
        Command::Inspect {
            path,
            hex,
            binary,
            json,
        } => inspect(config, &path, hex, binary, json),
    }
}

fn run_demo(engine: &mut Engine, state: &Path, a: i64, b: i64) -> Result<()> {
    info!("Running demo on {} bits", engine.size());

    engine.declare_int("a", 8, 0)?;
    engine.declare_int("b", 8, 0)?;
    engine.declare_int("result", 8, 0)?;
    engine.declare_string("echo_result", "the result is:", 1, Placement::LeftFit)?;

    engine.write_int("a", a)?;
    engine.write_int("b", b)?;
    let sum = engine.read_int("a")? + engine.read_int("b")?;
    engine
        .write_int("result", sum)
        .with_context(|| format!("{} + {} does not fit in 8 bits", a, b))?;
    println!(
        "{} {}",
        engine.read_string("echo_result")?,
        engine.read_int("result")?
    );

    engine.declare_int("c", 8, 10)?;
    engine.increment("c")?;
    engine.decrement("c")?;
    println!("c: {}", engine.read_int("c")?);

    engine.declare_string("greet", "hello", 1, Placement::LeftFit)?;
    println!("greet before: {}", engine.read_string("greet")?);
    engine.write_string("greet", "hey")?;
    println!("greet after: {:?}", engine.read_string("greet")?);

    let greet = engine.variable("greet")?.clone();
    engine.set_permissions(greet.position, greet.length, true, false)?;
    match engine.write_string("greet", "nope") {
        Err(err) => println!("write permission test passed, got error: {}", err),
        Ok(()) => bail!("write to read-only variable succeeded"),
    }

    engine.declare("aligned_int", 16, 1234, VarType::Int, 8, Placement::Aligned)?;
    println!(
        "aligned_int: {} at {}",
        engine.read_int("aligned_int")?,
        engine.location_hex("aligned_int")?
    );

    engine.declare_int("x", 8, 42)?;
    engine.declare_int("y", 8, 100)?;
    engine.free_variable("x")?;
    println!("memory usage before defragment: {:.4} %", engine.usage_percent());
    let report = engine.defragment();
    println!("memory usage after defragment: {:.4} %", engine.usage_percent());
    println!(
        "moved {} bits, relocated {} variables",
        report.moved_bits, report.relocated_variables
    );
    println!("y after defragment: {}", engine.read_int("y")?);

    println!("memory dump (binary): {}", engine.dump_binary().join(" "));
    println!("memory dump (hex): {}", engine.hex_dump());

    engine
        .save_to_path(state)
        .with_context(|| format!("failed to save state to {:?}", state))?;
    let mut loaded = Engine::from_config(engine.config().clone())?;
    loaded.load_from_path(state)?;
    println!(
        "loaded engine greet variable: {:?}",
        loaded.read_string("greet")?
    );

    let randomized = engine.randomize_unused();
    println!("randomized {} unused bits (hex): {}", randomized, engine.hex_dump());
    if let Err(err) = engine.randomize_all() {
        warn!("randomize_all refused: {}", err);
    }

    if engine.size() > 11 {
        engine.corrupt(Replica::A, 10)?;
        engine.corrupt(Replica::B, 11)?;
    }
    println!("differences before correction: {:?}", engine.compare_divergence());
    engine.correct();
    println!("differences after correction: {:?}", engine.compare_divergence());

    let pattern = [false, true, false, true];
    println!(
        "pattern {} found at: {:?}",
        format_bits(&pattern),
        engine.scan_pattern(&pattern)?
    );

    engine.configure_pages(64)?;
    let page = engine.page_of(10);
    println!("page number for address 10: {}", page);
    engine.mark_page_used(page);
    println!("pages: {:?}", engine.paging().pages());

    let stats = engine.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    info!("Demo finished");
    Ok(())
}

fn inspect(
    config: Option<EngineConfig>,
    path: &Path,
    hex: bool,
    binary: bool,
    json: bool,
) -> Result<()> {
    let blob = std::fs::read(path).with_context(|| format!("failed to read {:?}", path))?;
    let state = bitram::EngineState::decode(&blob)
        .with_context(|| format!("{:?} is not a valid snapshot", path))?;

    if let Some(config) = config {
        if config.size != state.config.size {
            warn!(
                "Snapshot holds {} bits but the configuration expects {}",
                state.config.size, config.size
            );
        }
    }

    let mut engine = Engine::from_config(state.config.clone())?;
    engine.restore(state)?;

    if json {
        println!("{}", engine.export_json()?);
    } else if hex {
        println!("{}", engine.hex_dump());
    } else if binary {
        println!("{}", engine.dump_binary().join(" "));
    } else {
        println!("{}", serde_json::to_string_pretty(&engine.stats())?);
        for (name, variable) in engine.variables() {
            println!(
                "{:<16} {:>6} {:>5} bits  {}",
                name, variable.position, variable.length, variable.var_type
            );
        }
    }
    Ok(())
}
