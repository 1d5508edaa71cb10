//! Roomwatch Service - Background reconciliation worker and admin commands.
//!
//! Run with: `cargo run -p roomwatch-service`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::Mutex;
use tracing::info;

use roomwatch_core::{
    CountdownAction, RetryConfig, StopwatchAction, TelemetrySink, TimerControl,
};
use roomwatch_service::{AppState, Config, StoreRepository, Worker, default_config_path};
use roomwatch_store::{Store, StoredRoom};
use roomwatch_types::{GasReadings, RoomId, RoomLiveState, TelemetryUpdate, Trigger};

/// Roomwatch Service - Background reconciliation worker for room telemetry.
#[derive(Parser, Debug)]
#[command(name = "roomwatch-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Tick interval in milliseconds (overrides config).
    #[arg(long, global = true)]
    tick_interval_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the worker in the foreground (default behavior).
    Run,

    /// Write a default configuration file, with any CLI overrides applied.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Provision a room, or update its name and volume.
    Provision {
        /// Room id.
        #[arg(long)]
        room: RoomId,
        /// Room volume.
        #[arg(long)]
        volume: u32,
        /// Display name.
        #[arg(long)]
        name: Option<String>,
    },

    /// Record a device reading for a room.
    Ingest {
        /// Room id.
        #[arg(long)]
        room: RoomId,
        /// Full reading as JSON (other reading flags are ignored).
        #[arg(long)]
        json: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        temperature: Option<f64>,
        #[arg(long)]
        humidity: Option<i32>,
        #[arg(long)]
        pressure: Option<f64>,
        #[arg(long)]
        room_on: Option<bool>,
        #[arg(long, default_value_t = 0)]
        flow_rate: u32,
        /// Trigger level (0 or 1).
        #[arg(long, default_value = "0", value_parser = parse_trigger)]
        trigger: Trigger,
    },

    /// Control a room's stopwatch or countdown.
    Timer {
        #[command(subcommand)]
        timer: TimerCommand,
    },

    /// Show every room and its live state.
    Status {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show the audit trail of admin timer actions.
    Audit {
        /// Only show this room.
        #[arg(long)]
        room: Option<RoomId>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TimerCommand {
    /// Start, stop or reset the stopwatch.
    Stopwatch {
        action: StopwatchArg,
        #[arg(long)]
        room: RoomId,
    },
    /// Start, stop, reset or adjust the countdown.
    Countdown {
        action: CountdownArg,
        #[arg(long)]
        room: RoomId,
        /// Duration for `start`, signed offset for `adjust`.
        #[arg(long, allow_hyphen_values = true)]
        minutes: Option<i64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StopwatchArg {
    Start,
    Stop,
    Reset,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CountdownArg {
    Start,
    Stop,
    Reset,
    Adjust,
}

fn parse_trigger(s: &str) -> Result<Trigger, String> {
    let level: u8 = s.parse().map_err(|e| format!("{e}"))?;
    Trigger::try_from(level).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so status output stays machine-readable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("roomwatch_service=info".parse()?)
                .add_directive("roomwatch_core=info".parse()?),
        )
        .init();

    if let Some(Command::Init { force }) = args.command {
        let path = init_config(&args, force)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let config = load_config(&args)?;

    match args.command {
        Some(Command::Run) | None => run_worker(config).await,
        // Handled before the config is loaded
        Some(Command::Init { .. }) => Ok(()),
        Some(Command::Provision { room, volume, name }) => {
            let store = open_store(&config)?;
            let stored = store.provision_room(room, name.as_deref(), volume)?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
            Ok(())
        }
        Some(Command::Ingest {
            room,
            json,
            temperature,
            humidity,
            pressure,
            room_on,
            flow_rate,
            trigger,
        }) => {
            let update = match json {
                Some(json) => serde_json::from_str(&json).context("Invalid reading JSON")?,
                None => TelemetryUpdate {
                    temperature,
                    humidity,
                    pressure,
                    room_on,
                    flow_rate,
                    trigger,
                    gases: GasReadings::default(),
                },
            };
            let repository = repository(&config)?;
            let snapshot = repository.record_telemetry(room, &update).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Some(Command::Timer { timer }) => run_timer(&config, timer).await,
        Some(Command::Status { json }) => print_status(&config, json),
        Some(Command::Audit { room, json }) => print_audit(&config, room, json),
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };
    apply_overrides(args, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(args: &Args, config: &mut Config) {
    if let Some(db_path) = &args.database {
        config.storage.path = db_path.clone();
    }
    if let Some(tick) = args.tick_interval_ms {
        config.worker.tick_interval_ms = tick;
    }
}

/// Write the defaults plus CLI overrides to `--config` or the default path.
fn init_config(args: &Args, force: bool) -> anyhow::Result<PathBuf> {
    let path = args.config.clone().unwrap_or_else(default_config_path);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let mut config = Config::default();
    apply_overrides(args, &mut config);
    config.validate()?;
    config.save(&path)?;
    Ok(path)
}

fn open_store(config: &Config) -> anyhow::Result<Store> {
    info!("Opening database at {:?}", config.storage.path);
    Store::open(&config.storage.path)
        .with_context(|| format!("Failed to open database {}", config.storage.path.display()))
}

fn repository(config: &Config) -> anyhow::Result<StoreRepository> {
    let store = open_store(config)?;
    Ok(StoreRepository::new(
        Arc::new(Mutex::new(store)),
        config.worker.store_timeout(),
    ))
}

async fn run_worker(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config)?;

    for room in &config.rooms {
        store.provision_room(room.id, room.name.as_deref(), room.volume)?;
    }
    if config.rooms.is_empty() {
        info!("No rooms configured; reconciling rooms already in the database");
    } else {
        info!("Provisioned {} configured room(s)", config.rooms.len());
    }

    let state = AppState::new(store, config);
    let worker = Worker::new(Arc::clone(&state)).await;
    let handle = worker.start().await;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, finishing current room");
    state.worker.signal_stop();
    handle.await?;

    let uptime = state
        .worker
        .started_at()
        .map_or(0, |started| (OffsetDateTime::now_utc() - started).whole_seconds());
    let stats = state.worker.stats.read().await;
    info!(
        "Worker ran {} tick(s) over {}s, updated {} room state(s)",
        stats.ticks, uptime, stats.rooms_updated
    );
    Ok(())
}

async fn run_timer(config: &Config, timer: TimerCommand) -> anyhow::Result<()> {
    let repository = Arc::new(repository(config)?);
    let retry = RetryConfig::for_timer_control().max_retries(config.worker.timer_retries);
    let control = TimerControl::new(repository.clone(), repository).with_retry_config(retry);

    let state = match timer {
        TimerCommand::Stopwatch { action, room } => {
            let action = match action {
                StopwatchArg::Start => StopwatchAction::Start,
                StopwatchArg::Stop => StopwatchAction::Stop,
                StopwatchArg::Reset => StopwatchAction::Reset,
            };
            control.stopwatch(room, action).await?
        }
        TimerCommand::Countdown {
            action,
            room,
            minutes,
        } => {
            let action = match action {
                CountdownArg::Start => CountdownAction::Start { minutes },
                CountdownArg::Stop => CountdownAction::Stop,
                CountdownArg::Reset => CountdownAction::Reset,
                CountdownArg::Adjust => CountdownAction::Adjust {
                    minutes: minutes.context("--minutes is required for adjust")?,
                },
            };
            control.countdown(room, action).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

/// One row of `status` output.
#[derive(Serialize)]
struct RoomStatus {
    room: StoredRoom,
    live: Option<RoomLiveState>,
    stopwatch_elapsed_secs: Option<u64>,
    countdown_remaining_secs: Option<i64>,
}

fn print_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let now = OffsetDateTime::now_utc();

    let rows = store
        .list_rooms()?
        .into_iter()
        .map(|room| {
            let live = store.get_live_state(room.id)?;
            let stopwatch_elapsed_secs = live.as_ref().map(|l| l.stopwatch.elapsed_secs(now));
            let countdown_remaining_secs = live
                .as_ref()
                .and_then(|l| l.countdown.remaining(now))
                .map(|d| d.whole_seconds());
            Ok(RoomStatus {
                room,
                live,
                stopwatch_elapsed_secs,
                countdown_remaining_secs,
            })
        })
        .collect::<roomwatch_store::Result<Vec<_>>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No rooms provisioned");
        return Ok(());
    }

    println!(
        "{:>5}  {:<16} {:>7} {:>10} {:>10} {:>4} {:>9} {:>9} {:>7}",
        "ROOM", "NAME", "VOLUME", "ACH THEO", "ACH EMP", "TRIG", "STOPWATCH", "COUNTDOWN", "VERSION"
    );
    for row in &rows {
        let name = row.room.name.as_deref().unwrap_or("-");
        match &row.live {
            Some(live) => println!(
                "{:>5}  {:<16} {:>7} {:>10.2} {:>10.2} {:>4} {:>9} {:>9} {:>7}",
                row.room.id,
                name,
                row.room.volume,
                live.ach_theoretical,
                live.ach_empirical,
                u8::from(live.trigger),
                format_secs(row.stopwatch_elapsed_secs.unwrap_or(0), live.stopwatch.running),
                row.countdown_remaining_secs
                    .map(|secs| format_secs(secs.max(0) as u64, live.countdown.running))
                    .unwrap_or_else(|| "-".to_string()),
                live.version
            ),
            None => println!(
                "{:>5}  {:<16} {:>7} {:>10}",
                row.room.id, name, row.room.volume, "(no live state)"
            ),
        }
    }
    Ok(())
}

fn print_audit(config: &Config, room: Option<RoomId>, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let entries = store.list_audit(room)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No timer actions recorded");
        return Ok(());
    }

    println!("{:<25} {:>5}  {:<27} DETAILS", "TIME", "ROOM", "ACTION");
    for entry in &entries {
        let time = entry
            .recorded_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| entry.recorded_at.to_string());
        println!(
            "{:<25} {:>5}  {:<27} {}",
            time, entry.room_id, entry.action, entry.details
        );
    }
    Ok(())
}

/// `hh:mm:ss`, with a trailing `*` while the timer runs.
fn format_secs(secs: u64, running: bool) -> String {
    format!(
        "{:02}:{:02}:{:02}{}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60,
        if running { "*" } else { "" }
    )
}
