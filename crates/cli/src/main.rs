use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use segtrain_common::RunConfig;
use segtrain_train::{PolyLrScheduler, Statistic};

#[derive(Parser, Debug)]
#[command(name = "segtrain", about = "Inspect segtrain schedules and training metrics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the learning-rate schedule of a run config as CSV.
    Schedule(ScheduleArgs),
    /// Smooth a logged metric (one number per line) with a running statistic.
    Smooth(SmoothArgs),
}

// ── Schedule ───────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
struct ScheduleArgs {
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    /// Emit one row every N iterations (the last iteration is always emitted).
    #[arg(long, default_value = "100")]
    every: usize,
    /// Write CSV here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

// ── Smooth ─────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
struct SmoothArgs {
    #[arg(long)]
    input: PathBuf,
    /// Averaging window; 0 = cumulative mean. Defaults to the config's `log_window`.
    #[arg(long)]
    window: Option<usize>,
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Schedule(args) => cmd_schedule(args),
        Command::Smooth(args) => cmd_smooth(args),
    }
}

// ── Command implementations ────────────────────────────────────────────────────

/// Load the run config, creating a default one if the file does not exist.
fn load_or_create_config(path: &Path) -> Result<RunConfig> {
    if path.exists() {
        RunConfig::load_validated(path)
    } else {
        let default = RunConfig::default();
        default.save(path)?;
        tracing::info!(path = %path.display(), "Created default config");
        Ok(default)
    }
}

fn cmd_schedule(args: ScheduleArgs) -> Result<()> {
    let config = load_or_create_config(&args.config)?;
    let schedule = config.schedule;
    tracing::info!(
        lr = schedule.lr,
        warmup_lr = schedule.warmup_lr,
        warmup_iters = schedule.warmup_iters,
        max_iters = schedule.max_iters,
        lr_pow = schedule.lr_pow,
        "Schedule"
    );

    let mut out: Box<dyn Write> = match &args.out {
        Some(p) => Box::new(
            std::fs::File::create(p).with_context(|| format!("creating {}", p.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    writeln!(out, "iter,lr")?;

    let every = args.every.max(1);
    let mut sched = PolyLrScheduler::new(schedule);
    while sched.step() <= sched.schedule().max_iters {
        let step = sched.step();
        if step % every == 0 || step == sched.schedule().max_iters {
            writeln!(out, "{},{:.8}", step, sched.current_lr())?;
        }
        sched.advance();
    }
    out.flush()?;
    Ok(())
}

fn cmd_smooth(args: SmoothArgs) -> Result<()> {
    let window = match args.window {
        Some(w) => w,
        None => load_or_create_config(&args.config)?.log_window,
    };
    let file = std::fs::File::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;

    let mut stat = Statistic::new(window);
    let mut out = std::io::stdout().lock();
    writeln!(out, "line,value,average")?;
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let value: f64 = trimmed
            .parse()
            .with_context(|| format!("line {}: not a number: {trimmed:?}", idx + 1))?;
        stat.update(value);
        writeln!(out, "{},{},{}", idx + 1, value, stat)?;
    }
    tracing::info!(samples = stat.count(), mode = ?stat.mode(), "Smoothed");
    Ok(())
}
