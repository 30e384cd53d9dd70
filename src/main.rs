use anyhow::Result;
use clap::Parser;
use tracing::info;

mod config;
mod db;
mod error;
mod features;
mod model;
mod pipeline;

use config::{Command, Config};
use db::Database;
use features::NormalizationKeys;
use model::FeedForwardNetwork;
use pipeline::export::build_corpus;
use pipeline::Orchestrator;

// Contests are scored strictly one after another; a single-threaded runtime
// is all the pipeline needs.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    match &config.command {
        Command::Predict { season } => {
            let orchestrator = load_orchestrator(&config)?;
            let summary = orchestrator.run(&db, &db, *season).await?;
            if summary.failed > 0 {
                info!(
                    "{} contest(s) failed and remain pending for the next run",
                    summary.failed
                );
            }
        }
        Command::Evaluate { game_id } => {
            let orchestrator = load_orchestrator(&config)?;
            let outcome = orchestrator.evaluate(&db, *game_id).await?;
            match (outcome.prediction, &outcome.error) {
                (Some(result), _) => println!(
                    "Contest {}: home {:.4}, away {:.4}",
                    result.contest_id,
                    result.home_probability,
                    result.away_probability()
                ),
                (None, Some(err)) => println!("Contest {}: failed ({})", game_id, err),
                (None, None) => println!(
                    "Contest {}: not eligible, a side has no non-garbage plays",
                    game_id
                ),
            }
            if let (Some(home), Some(away)) = db.get_win_probabilities(*game_id)? {
                println!("Stored: home {:.4}, away {:.4}", home, away);
            }
        }
        Command::Export {
            from_season,
            to_season,
            out_dir,
        } => {
            let export = build_corpus(&db, *from_season, *to_season).await?;
            if export.skipped > 0 {
                info!("{} ineligible contest(s) left out of the corpus", export.skipped);
            }
            export.write(out_dir)?;
        }
    }

    Ok(())
}

/// Load the model and keys once; they stay fixed for the whole run.
fn load_orchestrator(config: &Config) -> Result<Orchestrator> {
    let model = FeedForwardNetwork::load(&config.model_path)?;
    info!(
        "Model loaded: {} ({} layer(s))",
        config.model_path,
        model.layers.len()
    );
    let keys = NormalizationKeys::load(&config.keys_path)?;
    info!("Normalization keys loaded: {}", config.keys_path);
    Ok(Orchestrator::new(model, keys)?)
}
