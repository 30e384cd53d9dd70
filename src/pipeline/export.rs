//! Offline corpus export: labeled examples for a season range, normalized
//! against keys fitted over the whole range and split by week parity.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use super::provider::ContestSource;
use crate::error::Result;
use crate::features::split::partition;
use crate::features::{contest_efficiency, FeatureVector, NormalizationKeys, TrainingExample};

pub const KEYS_FILE: &str = "keys.json";
pub const TRAINING_FILE: &str = "training.json";
pub const EVALUATION_FILE: &str = "testing.json";

/// One normalized example as consumed by the trainer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub input: Vec<f64>,
    pub output: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct CorpusExport {
    pub keys: NormalizationKeys,
    pub training: Vec<CorpusRecord>,
    pub evaluation: Vec<CorpusRecord>,
    /// Contests dropped because a side had no non-garbage plays
    pub skipped: usize,
}

impl CorpusExport {
    pub fn write(&self, out_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(out_dir)?;
        self.keys.save(out_dir.join(KEYS_FILE))?;
        std::fs::write(
            out_dir.join(TRAINING_FILE),
            serde_json::to_string_pretty(&self.training)?,
        )?;
        std::fs::write(
            out_dir.join(EVALUATION_FILE),
            serde_json::to_string_pretty(&self.evaluation)?,
        )?;
        info!(
            "Wrote {} training and {} evaluation records to {}",
            self.training.len(),
            self.evaluation.len(),
            out_dir.display()
        );
        Ok(())
    }
}

/// Build, normalize and split the corpus for an inclusive season range.
pub async fn build_corpus(
    source: &dyn ContestSource,
    from_season: i32,
    to_season: i32,
) -> Result<CorpusExport> {
    let contests = source.completed_contests(from_season, to_season).await?;
    info!(
        "Building corpus from {} completed contest(s), seasons {}-{}",
        contests.len(),
        from_season,
        to_season
    );

    let mut examples = Vec::with_capacity(contests.len());
    let mut skipped = 0;
    for contest in &contests {
        let plays = source.contest_plays(contest.id).await?;
        match contest_efficiency(contest, &plays) {
            Some(eff) => {
                let example = TrainingExample::build(contest, &eff);
                debug!(
                    "Contest {} labeled {} ({} home / {} away plays)",
                    example.contest_id, example.label, eff.home_plays, eff.away_plays
                );
                examples.push(example);
            }
            None => {
                debug!("Contest {} ineligible for the corpus", contest.id);
                skipped += 1;
            }
        }
    }

    let pairs: Vec<(FeatureVector, f64)> = examples.iter().map(|e| (e.features, e.label)).collect();
    let keys = NormalizationKeys::fit(&pairs)?;

    let to_record = |e: &TrainingExample| CorpusRecord {
        input: keys.apply(&e.features).values.to_vec(),
        output: vec![keys.apply_output(e.label)],
    };
    let (training, evaluation) = partition(examples, |e| (e.season, e.week));
    let training: Vec<CorpusRecord> = training.iter().map(to_record).collect();
    let evaluation: Vec<CorpusRecord> = evaluation.iter().map(to_record).collect();

    Ok(CorpusExport {
        keys,
        training,
        evaluation,
        skipped,
    })
}
