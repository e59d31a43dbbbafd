use std::fs::File;

use prettytable::{row, Table};
use tracing::{info, info_span, level_filters::LevelFilter};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use podforge::assign::{Brunswikian, Brunswikian2, RoundAssigner};
use podforge::optimizer::OptimizerApi;
use podforge::simulation::{run_simulation, SimulationConfig, SimulationStats};
use podforge::DraftError;

#[tokio::main]
async fn main() {
    if let Err(e) = setup_tracing() {
        panic!("Error trying to setup tracing: {}", e);
    }

    if let Err(e) = run().await {
        panic!("Error trying to run the simulation: {}", e);
    }
}

/// Runs one simulated tournament with the strategy picked via `STRATEGY`.
async fn run() -> Result<(), DraftError> {
    let setup_span = info_span!("simulation_setup");
    let _guard = setup_span.enter();
    // Load the .env file only in the development environment (bypassed with the --release flag)
    #[cfg(debug_assertions)]
    dotenv::dotenv().ok();

    let config = config_from_env()?;
    let strategy = std::env::var("STRATEGY").unwrap_or_else(|_| "brunswikian".to_string());
    info!(
        %strategy,
        players = config.player_count,
        cubes = config.cube_count,
        drafts = config.draft_rounds,
        "configuration loaded"
    );
    drop(_guard);

    let stats = match strategy.as_str() {
        "brunswikian" => run_simulation(&Brunswikian, &config).await?,
        "brunswikian2" => run_simulation(&Brunswikian2, &config).await?,
        "optimizer" => {
            let api = OptimizerApi::from_env();
            info!(strategy = api.name(), "using external optimization service");
            run_simulation(&api, &config).await?
        }
        other => anyhow::bail!("unknown STRATEGY '{}', expected brunswikian, brunswikian2 or optimizer", other),
    };

    print_stats(&stats);

    Ok(())
}

/// Reads the simulation knobs from `SIM_*` environment variables, falling
/// back to the defaults for anything unset.
fn config_from_env() -> Result<SimulationConfig, DraftError> {
    let defaults = SimulationConfig::default();

    fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, DraftError>
    where
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match std::env::var(name) {
            Ok(raw) => Ok(raw.parse()?),
            Err(_) => Ok(default),
        }
    }

    Ok(SimulationConfig {
        player_count: parse_var("SIM_PLAYERS", defaults.player_count)?,
        cube_count: parse_var("SIM_CUBES", defaults.cube_count)?,
        draft_rounds: parse_var("SIM_DRAFTS", defaults.draft_rounds)?,
        swiss_rounds_per_draft: parse_var("SIM_SWISS_ROUNDS", defaults.swiss_rounds_per_draft)?,
        desired_rate: parse_var("SIM_DESIRED_RATE", defaults.desired_rate)?,
        avoid_rate: parse_var("SIM_AVOID_RATE", defaults.avoid_rate)?,
        seed: match std::env::var("SIM_SEED") {
            Ok(raw) => Some(raw.parse()?),
            Err(_) => None,
        },
    })
}

fn print_stats(stats: &SimulationStats) {
    let mut summary = Table::new();
    summary.set_titles(row!["Metric", "Value"]);
    summary.add_row(row!["Total pods", stats.total_pods]);
    summary.add_row(row!["DESIRED assignments", stats.desired_assignments]);
    summary.add_row(row!["NEUTRAL assignments", stats.neutral_assignments]);
    summary.add_row(row!["AVOID assignments", stats.avoid_assignments]);
    summary.add_row(row![
        "DESIRED rate",
        format!("{:.1}%", stats.desired_rate * 100.0)
    ]);
    summary.add_row(row![
        "AVOID rate",
        format!("{:.1}%", stats.avoid_rate * 100.0)
    ]);
    summary.add_row(row!["Fallbacks used", stats.fallbacks_used]);
    summary.add_row(row!["Warnings", stats.warnings.len()]);
    summary.printstd();

    for draft in &stats.draft_details {
        let mut table = Table::new();
        table.set_titles(row![
            format!("Draft {}", draft.draft_number),
            "Cube",
            "Players",
            "DESIRED",
            "NEUTRAL",
            "AVOID"
        ]);
        for pod in &draft.pods {
            table.add_row(row![
                format!("Pod {}", pod.pod_number),
                pod.cube_name,
                pod.player_count,
                pod.desired_voters,
                pod.neutral_voters,
                pod.avoid_voters
            ]);
        }
        table.printstd();
    }

    let mut standings = Table::new();
    standings.set_titles(row!["Rank", "Player", "Points", "Cubes drafted"]);
    for (i, entry) in stats.final_standings.iter().enumerate() {
        let cubes: Vec<String> = entry
            .assignments
            .iter()
            .map(|a| format!("{} ({})", a.cube_name, a.original_vote))
            .collect();
        standings.add_row(row![
            i + 1,
            entry.player_id,
            entry.match_points,
            cubes.join(", ")
        ]);
    }
    standings.printstd();

    for warning in &stats.warnings {
        println!("Warning: {}", warning);
    }
}

/// Sets up the tracing subscriber for the simulation binary.
fn setup_tracing() -> Result<(), DraftError> {
    if cfg!(debug_assertions) {
        let filter = EnvFilter::from_default_env()
            .add_directive("none".parse()?)
            .add_directive("podforge=info".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::NONE)
            .pretty()
            .init();

        return Ok(());
    }

    let log_file = File::create("debug.log")?;

    // Set up tracing with a filter that only logs errors in production
    tracing_subscriber::fmt::fmt()
        .with_span_events(FmtSpan::NONE)
        .with_max_level(LevelFilter::ERROR)
        .with_writer(log_file)
        .pretty()
        .init();

    Ok(())
}
