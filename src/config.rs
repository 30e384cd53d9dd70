use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Win probability scoring from play-level efficiency metrics
#[derive(Parser, Debug, Clone)]
#[command(name = "ppa-winprob", version, about)]
pub struct Config {
    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "winprob.db", global = true)]
    pub database_path: String,

    /// Trained network artifact (JSON)
    #[arg(long, env = "MODEL_PATH", default_value = "model.json", global = true)]
    pub model_path: String,

    /// Normalization keys artifact (JSON)
    #[arg(long, env = "KEYS_PATH", default_value = "keys.json", global = true)]
    pub keys_path: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Score every finished contest that has no win probability yet
    Predict {
        /// Restrict the worklist to one season
        #[arg(long, env = "SEASON")]
        season: Option<i32>,
    },
    /// Score one contest and print the result without persisting it
    Evaluate {
        #[arg(long)]
        game_id: i64,
    },
    /// Export normalized training and evaluation corpora plus fitted keys
    Export {
        /// First season of the corpus (inclusive)
        #[arg(long, default_value = "2014")]
        from_season: i32,

        /// Last season of the corpus (inclusive)
        #[arg(long, default_value = "2018")]
        to_season: i32,

        /// Directory receiving keys.json, training.json and testing.json
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        match &self.command {
            Command::Predict { .. } | Command::Evaluate { .. } => {
                if !Path::new(&self.model_path).is_file() {
                    anyhow::bail!(
                        "Model artifact not found at {}. Set MODEL_PATH or --model-path.",
                        self.model_path
                    );
                }
                if !Path::new(&self.keys_path).is_file() {
                    anyhow::bail!(
                        "Normalization keys not found at {}. Run `export` or set KEYS_PATH.",
                        self.keys_path
                    );
                }
            }
            Command::Export {
                from_season,
                to_season,
                ..
            } => {
                if from_season > to_season {
                    anyhow::bail!(
                        "from_season ({}) must not be after to_season ({})",
                        from_season,
                        to_season
                    );
                }
            }
        }
        Ok(())
    }
}
