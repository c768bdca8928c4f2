use anyhow::{Context, Result};
use cast_core::{compute_overview, CastState, Event, EventLevel};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "cast_cli", about = "Continuous casting simulator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sequence headless until casting finishes.
    Run {
        /// Seed for the deterministic simulation RNG.
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        /// Safety cap on simulated seconds.
        #[arg(long, default_value_t = 86_400)]
        max_ticks: u64,
        /// Print a progress line every N ticks. 0 = silent.
        #[arg(long, default_value_t = 60)]
        print_every: u64,
        #[arg(long, default_value = "normal", value_parser = ["normal", "debug"])]
        event_level: String,
        /// Also write the run summary as JSON.
        #[arg(long)]
        summary_json: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            seed,
            content_dir,
            max_ticks,
            print_every,
            event_level,
            summary_json,
        } => {
            let event_level = if event_level == "debug" {
                EventLevel::Debug
            } else {
                EventLevel::Normal
            };
            run(
                seed,
                &content_dir,
                max_ticks,
                print_every,
                event_level,
                summary_json.as_deref(),
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn run(
    seed: Option<u64>,
    content_dir: &str,
    max_ticks: u64,
    print_every: u64,
    event_level: EventLevel,
    summary_json: Option<&str>,
) -> Result<()> {
    let content = cast_world::load_content(content_dir)
        .with_context(|| format!("loading content from {content_dir}"))?;
    let seed = seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut state =
        cast_world::build_initial_state(&content, seed, chrono::Utc::now(), &mut rng)?;

    println!(
        "sequence {}  seed {}  {} heats  {} scheduled products",
        state.sequence.id,
        seed,
        state.sequence.heats.len(),
        state.sequence.schedule.len()
    );

    for _ in 0..max_ticks {
        if state.casting_finished {
            break;
        }
        let events = cast_core::tick(&mut state, &content, &mut rng, event_level);
        for envelope in &events {
            if let Some(line) = describe(&envelope.event) {
                println!("[{:>6}] {line}", envelope.tick);
            }
        }
        if print_every > 0 && state.meta.tick % print_every == 0 {
            print_progress(&state);
        }
    }

    print_summary(&state);
    if let Some(path) = summary_json {
        let summary = RunSummary::from_state(&state, seed);
        let file =
            std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
        serde_json::to_writer_pretty(file, &summary)
            .with_context(|| format!("writing {path}"))?;
    }
    if !state.casting_finished {
        anyhow::bail!("tick cap {max_ticks} reached before casting finished");
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct RunSummary {
    sequence_id: String,
    seed: u64,
    ticks: u64,
    heats_cast: usize,
    cuts: usize,
    total_cast_length_m: f64,
    total_cut_length_m: f64,
    total_cut_weight_kg: f64,
}

impl RunSummary {
    fn from_state(state: &CastState, seed: u64) -> Self {
        RunSummary {
            sequence_id: state.sequence.id.0.clone(),
            seed,
            ticks: state.meta.tick,
            heats_cast: state
                .sequence
                .heats
                .values()
                .filter(|h| h.status == cast_core::HeatStatus::Cast)
                .count(),
            cuts: state.cut_products.len(),
            total_cast_length_m: state.strand.total_cast_length_m,
            total_cut_length_m: state.cut_products.iter().map(|p| p.cut_length_m).sum(),
            total_cut_weight_kg: state.cut_products.iter().map(|p| p.weight_kg).sum(),
        }
    }
}

/// Human-readable line for the notable events; per-tick noise is skipped.
fn describe(event: &Event) -> Option<String> {
    match event {
        Event::LadleLoaded { arm, heat_id } => {
            Some(format!("heat {heat_id} mounted on arm {arm}"))
        }
        Event::TurretRotated { cast_arm, heat_id } => Some(match heat_id {
            Some(heat) => format!("turret rotated, heat {heat} now casting on arm {cast_arm}"),
            None => format!("turret rotated, arm {cast_arm} in cast position"),
        }),
        Event::WeightThresholdReached { vessel, level_mm } => {
            Some(format!("{vessel} reached its weight threshold at {level_mm:.0} mm"))
        }
        Event::HeatOut { vessel, heat_id } => {
            Some(format!("heat {heat_id} leaving the {vessel}"))
        }
        Event::VesselEmptied { vessel, heat_id } => {
            Some(format!("{vessel} emptied (last heat {heat_id})"))
        }
        Event::HeatStatusChanged { heat_id, status } => {
            Some(format!("heat {heat_id} -> {status:?}"))
        }
        Event::CutDone { product } => Some(format!(
            "cut {}: {:.2} m, {:.0} kg",
            product.product_id, product.cut_length_m, product.weight_kg
        )),
        Event::ScheduleOptimized { residual_m, queued } => Some(format!(
            "cut schedule reshaped against {residual_m:.2} m residual ({queued} products)"
        )),
        Event::CastingFinished {
            total_cast_length_m,
        } => Some(format!("casting finished at {total_cast_length_m:.2} m")),
        Event::SteelAdded { .. } | Event::SteelPoured { .. } | Event::StrandAdvanced { .. } => {
            None
        }
    }
}

fn print_progress(state: &CastState) {
    let overview = compute_overview(state);
    println!(
        "[{:>6}] tundish {:>7.0} kg ({:>4.0} mm)  mold {:>4.0} mm  speed {:.2} m/min  cast {:.2} m",
        overview.tick,
        overview.tundish_weight_kg,
        overview.tundish_level_mm,
        overview.mold_level_mm,
        overview.cast_speed_m_min,
        overview.total_cast_length_m
    );
}

fn print_summary(state: &CastState) {
    let total_weight: f64 = state.cut_products.iter().map(|p| p.weight_kg).sum();
    let total_length: f64 = state.cut_products.iter().map(|p| p.cut_length_m).sum();
    println!("--------------------------------------------------------------");
    println!("ticks simulated     {}", state.meta.tick);
    println!(
        "heats cast          {}",
        state
            .sequence
            .heats
            .values()
            .filter(|h| h.status == cast_core::HeatStatus::Cast)
            .count()
    );
    println!("cuts made           {}", state.cut_products.len());
    println!("total cast length   {:.2} m", state.strand.total_cast_length_m);
    println!("total cut length    {total_length:.2} m");
    println!("total cut weight    {total_weight:.0} kg");
}
