use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use conductor_control::{operator_for, OperatorKind};
use conductor_core::{
    compute_metrics, notify, tick, DispatchObserver, GameOverCause, LogEntry, MetricsFileWriter,
    Severity, SessionState, TrainStatus,
};
use conductor_world::{build_initial_state, load_content, session_rng};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "conductor_cli", about = "Train Station Dispatch CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dispatch simulation headless for a fixed number of ticks.
    Run {
        #[arg(long)]
        ticks: u64,
        /// Seed for the session RNG. Random when omitted.
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        /// Print a status line every N ticks.
        #[arg(long, default_value_t = 100)]
        print_every: u64,
        /// Operator policy driving the station.
        #[arg(long, default_value = "auto")]
        operator: OperatorKind,
        /// Countdown value (seconds) at which the auto operator assigns.
        #[arg(long, default_value_t = 5)]
        react_at: u32,
        /// Restart immediately after a game over instead of stopping.
        #[arg(long)]
        auto_restart: bool,
        /// Sample metrics every N ticks (default 10, one simulated second).
        #[arg(long, default_value_t = 10)]
        metrics_every: u64,
        /// Disable automatic metrics collection to runs/ directory.
        #[arg(long)]
        no_metrics: bool,
    },
}

struct RunArgs {
    ticks: u64,
    seed: Option<u64>,
    content_dir: String,
    print_every: u64,
    operator: OperatorKind,
    react_at: u32,
    auto_restart: bool,
    metrics_every: u64,
    no_metrics: bool,
}

// ---------------------------------------------------------------------------
// Console observer
// ---------------------------------------------------------------------------

/// Echoes the dispatch log and game-over notices to stdout.
#[derive(Default)]
struct ConsolePrinter {
    game_overs: u32,
}

impl DispatchObserver for ConsolePrinter {
    fn on_log_appended(&mut self, entry: &LogEntry) {
        let level = match entry.severity {
            Severity::Info => "INFO ",
            Severity::Warning => "WARN ",
            Severity::Error => "ERROR",
            Severity::Success => "OK   ",
        };
        println!("  [{}] {level} {}", entry.timestamp, entry.message);
    }

    fn on_game_over(&mut self, cause: &GameOverCause) {
        self.game_overs += 1;
        println!("*** GAME OVER ({}): {cause} ***", cause.kind());
    }

    fn on_restart(&mut self, session: u32) {
        println!("*** SESSION {session} STARTED ***");
    }
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn generate_run_id(seed: u64) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    format!("{timestamp}_seed{seed}")
}

fn create_run_dir(run_id: &str) -> Result<std::path::PathBuf> {
    let dir = std::path::PathBuf::from("runs").join(run_id);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating run directory: {}", dir.display()))?;
    Ok(dir)
}

fn write_run_info(
    dir: &std::path::Path,
    run_id: &str,
    seed: u64,
    content_version: &str,
    args: &RunArgs,
) -> Result<()> {
    let info = serde_json::json!({
        "run_id": run_id,
        "seed": seed,
        "start_time": run_id.split('_').take(2).collect::<Vec<_>>().join("_"),
        "content_version": content_version,
        "metrics_every": args.metrics_every,
        "runner": "conductor_cli",
        "args": {
            "ticks": args.ticks,
            "print_every": args.print_every,
            "operator": args.operator,
            "react_at": args.react_at,
            "auto_restart": args.auto_restart,
        }
    });
    let path = dir.join("run_info.json");
    let file =
        std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &info)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn run(args: &RunArgs) -> Result<()> {
    let content = load_content(&args.content_dir)
        .with_context(|| format!("loading content from {}", args.content_dir))?;
    tracing::info!(
        content_version = %content.content_version,
        names = content.names.len(),
        "content loaded"
    );

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut state = build_initial_state(&content, seed);
    let mut rng = session_rng(seed);

    let mut metrics_writer: Option<MetricsFileWriter> = None;
    if !args.no_metrics {
        let run_id = generate_run_id(seed);
        let run_dir = create_run_dir(&run_id)?;
        write_run_info(&run_dir, &run_id, seed, &content.content_version, args)?;
        let writer = MetricsFileWriter::new(&run_dir)
            .with_context(|| format!("opening metrics CSV in {}", run_dir.display()))?;
        metrics_writer = Some(writer);
        println!("Run directory: {}", run_dir.display());
    }

    let mut operator = operator_for(args.operator, args.react_at);
    let mut printer = ConsolePrinter::default();
    let mut next_command_id = 0u64;
    let print_every = args.print_every.max(1);
    let metrics_every = args.metrics_every.max(1);

    println!(
        "Starting dispatch: ticks={} seed={seed} operator={:?} platforms={} content_version={}",
        args.ticks, args.operator, content.constants.platform_count, content.content_version,
    );
    println!("{}", "-".repeat(80));

    for _ in 0..args.ticks {
        let mut commands = operator.generate_commands(&state, &content, &mut next_command_id);
        if args.auto_restart && state.is_over() {
            commands.push(conductor_core::CommandEnvelope {
                id: conductor_core::CommandId(format!("cmd_{next_command_id:06}")),
                issued_tick: state.meta.tick,
                execute_at_tick: state.meta.tick,
                command: conductor_core::Command::Restart,
            });
            next_command_id += 1;
        }

        let events = tick(&mut state, &commands, &content, &mut rng);
        notify(&mut printer, &events);

        if state.meta.tick % print_every == 0 {
            print_status(&state);
        }

        if let Some(ref mut writer) = metrics_writer {
            if state.meta.tick % metrics_every == 0 {
                let snapshot = compute_metrics(&state);
                writer.write_row(&snapshot).context("writing metrics row")?;
            }
        }

        if state.is_over() && !args.auto_restart {
            tracing::warn!(tick = state.meta.tick, "session ended; stopping run");
            break;
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done. Final state at tick {}:", state.meta.tick);
    print_status(&state);
    println!(
        "Sessions lost: {}  trains managed: {}  departures: {}  near misses: {}  score: {}",
        printer.game_overs,
        state.stats.trains_managed,
        state.stats.collisions_avoided,
        state.stats.near_misses,
        state.score,
    );

    if let Some(ref mut writer) = metrics_writer {
        writer.flush().context("final metrics flush")?;
        println!("Metrics written to runs/ directory.");
    }

    Ok(())
}

fn print_status(state: &SessionState) {
    let elapsed = conductor_core::format_clock(state.meta.now_ms - state.meta.session_started_ms);
    let count = |status: TrainStatus| state.trains.iter().filter(|t| t.status == status).count();

    let platforms: Vec<String> = state
        .platforms
        .iter()
        .map(|p| {
            let occupant = p
                .occupant
                .as_ref()
                .and_then(|id| state.train(id))
                .map_or("-", |t| t.name.as_str());
            format!("{}:{occupant}", p.id.0)
        })
        .collect();
    let countdown = state
        .countdown_seconds()
        .map_or_else(|| "--".to_string(), |s| format!("{s}s"));

    println!(
        "[tick={tick:05}  session={session}  t={elapsed}]  \
         approaching={approaching} requesting={requesting} assigned={assigned}  \
         countdown={countdown}  platforms=[{platforms}]  score={score}",
        tick = state.meta.tick,
        session = state.meta.session,
        approaching = count(TrainStatus::Approaching),
        requesting = count(TrainStatus::Requesting),
        assigned = count(TrainStatus::Assigned),
        platforms = platforms.join(" "),
        score = state.score,
    );
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            ticks,
            seed,
            content_dir,
            print_every,
            operator,
            react_at,
            auto_restart,
            metrics_every,
            no_metrics,
        } => {
            run(&RunArgs {
                ticks,
                seed,
                content_dir,
                print_every,
                operator,
                react_at,
                auto_restart,
                metrics_every,
                no_metrics,
            })?;
        }
    }
    Ok(())
}
