use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use primordium_core::config::AppConfig;
use primordium_data::context::TurnReport;
use primordium_data::species::Species;
use primordium_lib::engine::{Engine, RunError, TurnRunRequest};
use primordium_observer::{HeuristicNarrator, Narrator};

/// Runs a fixed number of simulation turns against a request file and
/// prints the resulting turn reports as JSON (§6).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file with `{"rounds": N, "pressures": [...]}`.
    #[arg(short, long)]
    request: PathBuf,

    /// TOML config file. Falls back to built-in defaults when absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON array of founder species. Required unless `--load` is given.
    #[arg(long)]
    species: Option<PathBuf>,

    /// Resume from a save-state snapshot instead of founding a fresh world.
    #[arg(long)]
    load: Option<PathBuf>,

    /// Write a save-state snapshot after the run completes.
    #[arg(long)]
    save: Option<PathBuf>,

    /// Overrides `world.seed` from the config file.
    #[arg(long)]
    seed: Option<u64>,
}

/// Exit codes per §6/§7: 0 success, 1 invalid request, 2 engine invariant
/// violation, 3 external dependency unavailable.
fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::from(0),
        Err(RunError::InvalidRequest(msg)) => {
            tracing::error!(%msg, "invalid request");
            ExitCode::from(1)
        }
        Err(RunError::InvariantViolation(msg)) => {
            tracing::error!(%msg, "engine invariant violation");
            ExitCode::from(2)
        }
        Err(RunError::DependencyUnavailable(msg)) => {
            tracing::error!(%msg, "external dependency unavailable");
            ExitCode::from(3)
        }
    }
}

fn run(args: Args) -> Result<(), RunError> {
    let config = match &args.config {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| RunError::InvalidRequest(format!("reading config {}: {e}", path.display())))?;
            AppConfig::from_toml(&content).map_err(|e| RunError::InvalidRequest(e.to_string()))?
        }
        None => AppConfig::default(),
    };
    let mut config = config;
    if let Some(seed) = args.seed {
        config.world.seed = Some(seed);
    }

    let request_content =
        std::fs::read_to_string(&args.request).map_err(|e| RunError::InvalidRequest(format!("reading request {}: {e}", args.request.display())))?;
    let request: TurnRunRequest = serde_json::from_str(&request_content).map_err(|e| RunError::InvalidRequest(e.to_string()))?;

    let mut engine = match args.load {
        Some(path) => {
            let snapshot = primordium_io::load_snapshot(&path).map_err(|e| RunError::DependencyUnavailable(e.to_string()))?;
            Engine::from_snapshot(config, snapshot)?
        }
        None => {
            let species_path = args.species.ok_or_else(|| RunError::InvalidRequest("--species is required without --load".to_string()))?;
            let species_content = std::fs::read_to_string(&species_path)
                .map_err(|e| RunError::InvalidRequest(format!("reading species {}: {e}", species_path.display())))?;
            let species: Vec<Species> = serde_json::from_str(&species_content).map_err(|e| RunError::InvalidRequest(e.to_string()))?;
            Engine::genesis(config, species)?
        }
    };

    let mut reports = engine.run_request(&request)?;
    narrate_reports(&mut reports);
    let output = serde_json::to_string_pretty(&reports).map_err(|e| RunError::InvariantViolation(e.to_string()))?;
    println!("{output}");

    if let Some(path) = args.save {
        let snapshot = engine.to_snapshot();
        primordium_io::save_snapshot(&snapshot, &path).map_err(|e| RunError::DependencyUnavailable(e.to_string()))?;
    }

    Ok(())
}

/// Fills `TurnReport.narrative` for turns with notable events, using the
/// deterministic local narrator (§4.7) rather than routing to a remote
/// model. A single current-thread runtime drives the async narrator trait
/// from this otherwise-synchronous CLI.
fn narrate_reports(reports: &mut [TurnReport]) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::warn!(%err, "narration runtime unavailable, skipping turn narration");
            return;
        }
    };
    let narrator = HeuristicNarrator;

    runtime.block_on(async {
        for report in reports.iter_mut() {
            let mut lines = Vec::new();
            for event in &report.extinction_events {
                let description = event.cause.as_deref().unwrap_or("unknown cause");
                lines.push(narrator.generate_narration(event.turn, "extinction", &format!("{} went extinct ({description})", event.lineage_code), 0.9).await);
            }
            for event in &report.speciation_events {
                lines.push(
                    narrator
                        .generate_narration(event.turn, "speciation", &format!("{} split from {}", event.child_code, event.parent_code), 0.5)
                        .await,
                );
            }
            for event in &report.tectonic_events {
                lines.push(narrator.generate_narration(event.turn, "tectonic", &format!("{:?} near plate {}", event.kind, event.plate_id), 0.4).await);
            }
            if !lines.is_empty() {
                report.narrative = Some(lines.join(" "));
            }
        }
    });
}
