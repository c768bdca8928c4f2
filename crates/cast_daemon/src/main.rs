mod routes;
mod state;
mod telemetry;
mod tick_loop;

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use cast_core::EventEnvelope;
use cast_world::{build_initial_state, load_content};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use routes::make_router_with_cors;
use state::{AppState, SimState, TelemetryHistory};
use telemetry::{register_overview_metrics, HistorySink, LogSink, Publisher};
use tick_loop::run_tick_loop;
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "cast_daemon", about = "Continuous casting simulator daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        /// Seed for the deterministic simulation RNG.
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        #[arg(long, default_value_t = 3001)]
        port: u16,
        /// Simulation ticks per wall-clock second. 1.0 is real time;
        /// 0 = as fast as possible.
        #[arg(long, default_value_t = 1.0)]
        ticks_per_sec: f64,
        #[arg(long)]
        max_ticks: Option<u64>,
        #[arg(long, default_value = "http://localhost:5173")]
        cors_origin: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            seed,
            content_dir,
            port,
            ticks_per_sec,
            max_ticks,
            cors_origin,
        } => {
            let content = load_content(&content_dir)?;
            let seed = seed.unwrap_or_else(rand::random);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let cast_state = build_initial_state(&content, seed, chrono::Utc::now(), &mut rng)?;

            let telemetry_history: TelemetryHistory = Arc::new(Mutex::new(VecDeque::new()));
            let mut publisher = Publisher::new();
            let section_ids: Vec<u32> = content.cooling.sections.iter().map(|s| s.id).collect();
            register_overview_metrics(&mut publisher, &section_ids);
            publisher.add_sink(Box::new(LogSink));
            publisher.add_sink(Box::new(HistorySink::new(telemetry_history.clone())));

            let (event_tx, _) = broadcast::channel::<Vec<EventEnvelope>>(256);
            let app_state = AppState {
                sim: Arc::new(Mutex::new(SimState {
                    cast_state,
                    content,
                    rng,
                    publisher,
                })),
                event_tx: event_tx.clone(),
                telemetry_history,
                ticks_per_sec,
                paused: Arc::new(AtomicBool::new(false)),
            };

            let router = make_router_with_cors(app_state.clone(), &cors_origin);
            let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
            tracing::info!(
                "cast_daemon listening on http://localhost:{port}  seed={seed}  \
                 speed={ticks_per_sec} ticks/sec"
            );
            tokio::spawn(run_tick_loop(
                app_state.sim.clone(),
                event_tx,
                ticks_per_sec,
                max_ticks,
                app_state.paused.clone(),
            ));
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await?;
        }
    }
    Ok(())
}
