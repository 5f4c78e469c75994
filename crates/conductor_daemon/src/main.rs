mod alerts;
mod routes;
mod state;
mod tick_loop;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use conductor_control::{operator_for, OperatorKind};
use conductor_world::{build_initial_state, load_content, session_rng};
use routes::make_router_with_cors;
use state::{AppState, SimState};
use std::sync::Arc;
use tick_loop::run_tick_loop;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conductor_daemon", about = "Train Station Dispatch HTTP daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a live dispatch session over HTTP.
    Run {
        #[arg(long, default_value = "./content")]
        content_dir: String,
        /// Seed for the session RNG. Random when omitted.
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 3001)]
        port: u16,
        /// Engine ticks per wall-clock second. Defaults to real time
        /// (1000 / tick_ms); 0 runs as fast as possible.
        #[arg(long)]
        ticks_per_sec: Option<f64>,
        /// Stop ticking after this many ticks.
        #[arg(long)]
        max_ticks: Option<u64>,
        /// Let an operator policy drive the station instead of HTTP clients.
        #[arg(long)]
        operator: Option<OperatorKind>,
        /// Countdown value (seconds) at which the auto operator assigns.
        #[arg(long, default_value_t = 5)]
        react_at: u32,
        /// Sample metrics (and evaluate alerts) every N ticks.
        #[arg(long, default_value_t = 5)]
        metrics_every: u64,
        #[arg(long, default_value = "http://localhost:5173")]
        cors_origin: String,
    },
}

struct ServeArgs {
    content_dir: String,
    seed: Option<u64>,
    port: u16,
    ticks_per_sec: Option<f64>,
    max_ticks: Option<u64>,
    operator: Option<OperatorKind>,
    react_at: u32,
    metrics_every: u64,
    cors_origin: String,
}

async fn serve(args: ServeArgs) -> Result<()> {
    let content = load_content(&args.content_dir)
        .with_context(|| format!("loading content from {}", args.content_dir))?;
    let seed = args.seed.unwrap_or_else(rand::random);
    let session = build_initial_state(&content, seed);
    let rng = session_rng(seed);
    let ticks_per_sec = args
        .ticks_per_sec
        .unwrap_or(1000.0 / content.constants.tick_ms as f64);
    let operator = args.operator.map(|kind| operator_for(kind, args.react_at));

    tracing::info!(
        seed,
        content_version = %content.content_version,
        ticks_per_sec,
        operator = ?args.operator,
        "starting dispatch session"
    );

    let sim = Arc::new(parking_lot::Mutex::new(SimState::new(
        session,
        content,
        rng,
        operator,
        args.metrics_every,
    )));
    let (event_tx, _) = broadcast::channel(256);
    let app_state = AppState {
        sim: sim.clone(),
        event_tx: event_tx.clone(),
        ticks_per_sec,
    };
    let router = make_router_with_cors(app_state, &args.cors_origin);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("binding port {}", args.port))?;
    tracing::info!("listening on {}", listener.local_addr().context("reading local address")?);

    tokio::spawn(run_tick_loop(sim, event_tx, ticks_per_sec, args.max_ticks));
    axum::serve(listener, router).await.context("serving HTTP")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            content_dir,
            seed,
            port,
            ticks_per_sec,
            max_ticks,
            operator,
            react_at,
            metrics_every,
            cors_origin,
        } => {
            serve(ServeArgs {
                content_dir,
                seed,
                port,
                ticks_per_sec,
                max_ticks,
                operator,
                react_at,
                metrics_every,
                cors_origin,
            })
            .await?;
        }
    }
    Ok(())
}
