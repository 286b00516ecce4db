// Skylapse daemon CLI

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use skylapse::config::Config;
use skylapse::constants::DAY_FOLDER_FORMAT;
use skylapse::scheduler::{RunLimit, Scheduler};
use skylapse::tools;

#[derive(Parser)]
#[command(name = "skylapse")]
#[command(about = "Daylight-windowed webcam time-lapse daemon", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the capture scheduler loop
    Run {
        /// Config file path
        #[arg(short, long, default_value = "skylapse.json")]
        config: PathBuf,
        /// Stop after this many loop iterations (test/debug)
        #[arg(long)]
        iterations: Option<u32>,
    },

    /// Compile the daily video for a day without waiting for the loop
    Compile {
        /// Config file path
        #[arg(short, long, default_value = "skylapse.json")]
        config: PathBuf,
        /// Day to compile (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        day: Option<String>,
    },

    /// Run the monthly aggregation pass now
    Monthly {
        /// Config file path
        #[arg(short, long, default_value = "skylapse.json")]
        config: PathBuf,
    },

    /// List the configured sources
    Sources {
        /// Config file path
        #[arg(short, long, default_value = "skylapse.json")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, iterations } => cmd_run(config, iterations),
        Commands::Compile { config, day } => cmd_compile(config, day),
        Commands::Monthly { config } => cmd_monthly(config),
        Commands::Sources { config } => cmd_sources(config),
    }
}

fn load_scheduler(config_path: &PathBuf) -> Result<Scheduler> {
    let config = Config::load(config_path)?;
    let mut scheduler = Scheduler::from_config(config)?;
    scheduler.restore();
    Ok(scheduler)
}

fn cmd_run(config_path: PathBuf, iterations: Option<u32>) -> Result<()> {
    tools::ensure_ffmpeg()?;

    let mut scheduler = load_scheduler(&config_path)?;
    let limit = match iterations {
        Some(n) => RunLimit::Iterations(n),
        None => RunLimit::Unbounded,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    scheduler.run(limit, cancel)?;
    Ok(())
}

fn cmd_compile(config_path: PathBuf, day: Option<String>) -> Result<()> {
    tools::ensure_ffmpeg()?;

    let day = day
        .map(|d| NaiveDate::parse_from_str(&d, DAY_FOLDER_FORMAT))
        .transpose()
        .map_err(|_| anyhow::anyhow!("day must be formatted as YYYY-MM-DD"))?;

    let mut scheduler = load_scheduler(&config_path)?;
    let compiled = scheduler.compile_day(day);
    println!("Compiled {compiled} daily video(s)");
    Ok(())
}

fn cmd_monthly(config_path: PathBuf) -> Result<()> {
    tools::ensure_ffmpeg()?;

    let mut scheduler = load_scheduler(&config_path)?;
    scheduler.process_monthly_summary();
    Ok(())
}

fn cmd_sources(config_path: PathBuf) -> Result<()> {
    let scheduler = load_scheduler(&config_path)?;

    let window = scheduler.window();
    println!("Day folder: {}", scheduler.day_folder());
    println!("Window:     {} .. {} UTC", window.start, window.end);
    println!();
    println!("{:>3}  {:<20}  {:>7}  {}", "#", "Name", "Stream", "URL");
    println!("{}", "-".repeat(70));

    for (i, source) in scheduler.registry().iter().enumerate() {
        println!(
            "{:>3}  {:<20}  {:>7}  {}",
            i + 1,
            source.location_name,
            if source.live_stream { "yes" } else { "no" },
            source.url
        );
    }

    Ok(())
}
