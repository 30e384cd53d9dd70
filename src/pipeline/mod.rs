//! Per-contest scoring loop.
//!
//! Each contest walks `Pending → Classified → Aggregated → Normalized →
//! Scored → Persisted`, or stops at `Skipped` (ineligible) or `Failed`.
//! Contests are handled one at a time in worklist order. A failure inside one
//! contest is logged and the loop moves on; a data-source failure ends the
//! run.

pub mod export;
pub mod provider;

pub use provider::{ContestSource, ResultSink};

use tracing::{debug, error, info, warn};

use crate::db::models::{Contest, PlayEvent, PredictionResult};
use crate::error::{PipelineError, Result};
use crate::features::vector::channel_names;
use crate::features::{aggregate, classify_play, FeatureVector, NormalizationKeys};
use crate::model::FeedForwardNetwork;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContestState {
    Pending,
    Classified,
    Aggregated,
    Normalized,
    Scored,
    Persisted,
    Skipped,
    Failed,
}

/// Final state of one contest after a pass through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ContestOutcome {
    pub contest_id: i64,
    pub state: ContestState,
    pub prediction: Option<PredictionResult>,
    /// Input channels that hit an empty normalization range
    pub degenerate_channels: Vec<usize>,
    pub error: Option<String>,
}

impl ContestOutcome {
    fn new(contest_id: i64) -> Self {
        ContestOutcome {
            contest_id,
            state: ContestState::Pending,
            prediction: None,
            degenerate_channels: Vec::new(),
            error: None,
        }
    }

    fn advance(&mut self, next: ContestState) {
        debug!(
            "Contest {}: {:?} -> {:?}",
            self.contest_id, self.state, next
        );
        self.state = next;
    }

    fn fail(&mut self, err: PipelineError) {
        error!("Contest {} failed: {}", self.contest_id, err);
        self.error = Some(err.to_string());
        self.advance(ContestState::Failed);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub persisted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &ContestOutcome) {
        self.processed += 1;
        match outcome.state {
            ContestState::Persisted => self.persisted += 1,
            ContestState::Skipped => self.skipped += 1,
            ContestState::Failed => self.failed += 1,
            _ => {}
        }
    }
}

/// Scores contests against a model and keys loaded once at startup.
pub struct Orchestrator {
    model: FeedForwardNetwork,
    keys: NormalizationKeys,
}

impl Orchestrator {
    /// Both artifacts must describe the same feature layout.
    pub fn new(model: FeedForwardNetwork, keys: NormalizationKeys) -> Result<Self> {
        model.validate()?;
        keys.validate()?;
        if let (Some(model_schema), Some(keys_schema)) = (&model.schema, &keys.schema) {
            if model_schema != keys_schema {
                return Err(PipelineError::SchemaMismatch {
                    expected: model_schema.to_string(),
                    found: keys_schema.to_string(),
                });
            }
        }
        Ok(Orchestrator { model, keys })
    }

    /// Score and persist every pending contest, optionally for one season.
    pub async fn run(
        &self,
        source: &dyn ContestSource,
        sink: &dyn ResultSink,
        season: Option<i32>,
    ) -> Result<RunSummary> {
        let contests = source.pending_contests(season).await?;
        info!("{} contest(s) awaiting a win probability", contests.len());

        let mut summary = RunSummary::default();
        for contest in &contests {
            let outcome = self.process_contest(source, sink, contest).await?;
            summary.record(&outcome);
        }

        info!(
            "Run complete: {} processed, {} persisted, {} skipped, {} failed",
            summary.processed, summary.persisted, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    /// Score one contest and commit both sides. Only a data-source failure is
    /// returned as an error; everything else ends up in the outcome.
    pub async fn process_contest(
        &self,
        source: &dyn ContestSource,
        sink: &dyn ResultSink,
        contest: &Contest,
    ) -> Result<ContestOutcome> {
        let plays = source.contest_plays(contest.id).await?;
        let mut outcome = self.score(contest, &plays);

        if let Some(result) = outcome.prediction {
            match sink.commit_result(contest, &result).await {
                Ok(()) => {
                    info!(
                        "Contest {}: home {:.4}, away {:.4}",
                        contest.id,
                        result.home_probability,
                        result.away_probability()
                    );
                    outcome.advance(ContestState::Persisted);
                }
                Err(err) => outcome.fail(err),
            }
        }
        Ok(outcome)
    }

    /// Score one contest by id without persisting.
    pub async fn evaluate(&self, source: &dyn ContestSource, contest_id: i64) -> Result<ContestOutcome> {
        let contest = source
            .contest(contest_id)
            .await?
            .ok_or_else(|| PipelineError::DataSource(format!("contest {} not found", contest_id)))?;
        let plays = source.contest_plays(contest.id).await?;
        Ok(self.score(&contest, &plays))
    }

    /// Classify, aggregate, normalize and run the network. Ends in `Scored`,
    /// `Skipped` or `Failed`.
    pub fn score(&self, contest: &Contest, plays: &[PlayEvent]) -> ContestOutcome {
        let mut outcome = ContestOutcome::new(contest.id);

        let classified: Vec<_> = plays
            .iter()
            .map(|p| classify_play(p, contest.home.team_id))
            .collect();
        outcome.advance(ContestState::Classified);

        let Some(efficiency) = aggregate(&classified) else {
            info!(
                "Contest {}: skipped, a side has no non-garbage plays",
                contest.id
            );
            outcome.advance(ContestState::Skipped);
            return outcome;
        };
        debug!(
            "Contest {}: {} home / {} away plays after garbage-time filter",
            contest.id, efficiency.home_plays, efficiency.away_plays
        );
        outcome.advance(ContestState::Aggregated);

        let normalized = self.keys.apply(&FeatureVector::from_efficiency(&efficiency));
        if !normalized.degenerate.is_empty() {
            let names = channel_names();
            let degenerate: Vec<&str> = normalized
                .degenerate
                .iter()
                .map(|&i| names[i].as_str())
                .collect();
            warn!(
                "Contest {}: degenerate normalization range for {:?}, using 0",
                contest.id, degenerate
            );
        }
        outcome.degenerate_channels = normalized.degenerate.clone();
        outcome.advance(ContestState::Normalized);

        let raw = match self.model.activate(&normalized.values) {
            Ok(raw) if raw.is_finite() => raw,
            Ok(raw) => {
                outcome.fail(PipelineError::NonFiniteOutput(raw));
                return outcome;
            }
            Err(err) => {
                outcome.fail(err);
                return outcome;
            }
        };

        let home_probability = raw.clamp(0.0, 1.0);
        if home_probability != raw {
            warn!(
                "Contest {}: network output {} outside [0, 1], clamped",
                contest.id, raw
            );
        }
        outcome.prediction = Some(PredictionResult {
            contest_id: contest.id,
            home_probability,
        });
        outcome.advance(ContestState::Scored);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{contest, insert_contest, insert_play, play};
    use crate::db::Database;
    use crate::features::normalize::ChannelRange;
    use crate::features::vector::{SchemaTag, FEATURE_DIM};
    use crate::model::network::tests::ppa_difference_network;
    use crate::model::network::{Activation, DenseLayer};
    use approx::assert_relative_eq;
    use async_trait::async_trait;

    const HOME: i64 = 100;
    const AWAY: i64 = 200;

    fn symmetric_keys() -> NormalizationKeys {
        NormalizationKeys {
            schema: Some(SchemaTag::current()),
            input: ChannelRange {
                mins: vec![-1.0; FEATURE_DIM],
                maxes: vec![1.0; FEATURE_DIM],
            },
            output: ChannelRange {
                mins: vec![0.0],
                maxes: vec![1.0],
            },
        }
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(ppa_difference_network(), symmetric_keys()).unwrap()
    }

    /// Home averages +0.5 ppa, away -0.5 ppa.
    fn seed_scored_contest(db: &Database, id: i64, season: i32) {
        insert_contest(db, &contest(id, season, 1, Some(true)), Some((24, 10)));
        for yards in [6, 2, 12, 0] {
            let mut p = play(HOME, 1, 10, yards, 5);
            p.ppa = 0.5;
            insert_play(db, id, &p, Some(p.ppa));
        }
        for yards in [1, 8, 3] {
            let mut p = play(AWAY, 2, 10, yards, 3);
            p.ppa = -0.5;
            insert_play(db, id, &p, Some(p.ppa));
        }
    }

    fn expected_probability() -> f64 {
        // normalized home ppa 0.75, away ppa 0.25 → z = 4 * 0.5
        1.0 / (1.0 + (-2.0f64).exp())
    }

    #[tokio::test]
    async fn run_persists_complementary_probabilities() {
        let db = Database::open(":memory:").unwrap();
        seed_scored_contest(&db, 1, 2015);

        let summary = orchestrator().run(&db, &db, None).await.unwrap();
        assert_eq!(
            summary,
            RunSummary {
                processed: 1,
                persisted: 1,
                skipped: 0,
                failed: 0
            }
        );

        let (home, away) = db.get_win_probabilities(1).unwrap();
        assert_relative_eq!(home.unwrap(), expected_probability(), epsilon = 1e-12);
        assert_relative_eq!(home.unwrap() + away.unwrap(), 1.0, epsilon = 1e-12);
    }

    #[tokio::test]
    async fn scored_contests_are_not_selected_again() {
        let db = Database::open(":memory:").unwrap();
        seed_scored_contest(&db, 1, 2015);
        let orch = orchestrator();

        orch.run(&db, &db, None).await.unwrap();
        let second = orch.run(&db, &db, None).await.unwrap();
        assert_eq!(second.processed, 0);

        // Re-evaluating reproduces the stored value.
        let outcome = orch.evaluate(&db, 1).await.unwrap();
        let stored = db.get_win_probabilities(1).unwrap().0.unwrap();
        assert_eq!(outcome.state, ContestState::Scored);
        assert_eq!(outcome.prediction.unwrap().home_probability, stored);
    }

    #[tokio::test]
    async fn contest_with_only_garbage_time_away_plays_is_skipped() {
        let db = Database::open(":memory:").unwrap();
        insert_contest(&db, &contest(2, 2015, 1, Some(true)), Some((56, 0)));
        insert_play(&db, 2, &play(HOME, 1, 10, 4, 5), Some(0.2));
        let mut blowout = play(AWAY, 1, 10, 4, 5);
        blowout.period = 4;
        blowout.home_score = 49;
        insert_play(&db, 2, &blowout, Some(0.1));

        let summary = orchestrator().run(&db, &db, Some(2015)).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.persisted, 0);
        assert_eq!(db.get_win_probabilities(2).unwrap(), (None, None));
    }

    #[tokio::test]
    async fn degenerate_channel_is_reported_and_scored() {
        let db = Database::open(":memory:").unwrap();
        seed_scored_contest(&db, 3, 2016);
        let mut keys = symmetric_keys();
        keys.input.mins[3] = 0.2;
        keys.input.maxes[3] = 0.2;
        let orch = Orchestrator::new(ppa_difference_network(), keys).unwrap();

        let contest = db.get_contest(3).unwrap().unwrap();
        let outcome = orch.process_contest(&db, &db, &contest).await.unwrap();
        assert_eq!(outcome.state, ContestState::Persisted);
        assert_eq!(outcome.degenerate_channels, vec![3]);
        assert_relative_eq!(
            outcome.prediction.unwrap().home_probability,
            expected_probability(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn raw_output_above_one_is_clamped() {
        let net = FeedForwardNetwork::new(vec![DenseLayer {
            weights: vec![vec![1.0; FEATURE_DIM]],
            biases: vec![0.0],
            activation: Activation::Identity,
        }])
        .unwrap();
        let orch = Orchestrator::new(net, symmetric_keys()).unwrap();
        let c = contest(4, 2015, 2, Some(true));
        let plays = vec![play(HOME, 1, 10, 6, 5), play(AWAY, 1, 10, 6, 5)];
        let outcome = orch.score(&c, &plays);
        assert_eq!(outcome.state, ContestState::Scored);
        assert_eq!(outcome.prediction.unwrap().home_probability, 1.0);
    }

    #[test]
    fn mismatched_artifacts_are_rejected() {
        let mut keys = symmetric_keys();
        keys.schema = Some(SchemaTag {
            version: 7,
            ..SchemaTag::current()
        });
        assert!(matches!(
            Orchestrator::new(ppa_difference_network(), keys),
            Err(PipelineError::SchemaMismatch { .. })
        ));
    }

    struct RejectingSink {
        db: Database,
        reject: i64,
    }

    #[async_trait]
    impl ResultSink for RejectingSink {
        async fn commit_result(&self, contest: &Contest, result: &PredictionResult) -> Result<()> {
            if contest.id == self.reject {
                return Err(PipelineError::Persistence {
                    contest_id: contest.id,
                    message: "disk full".into(),
                });
            }
            self.db.commit_result(contest, result).await
        }
    }

    #[tokio::test]
    async fn persistence_failure_is_isolated_to_its_contest() {
        let db = Database::open(":memory:").unwrap();
        seed_scored_contest(&db, 1, 2015);
        seed_scored_contest(&db, 2, 2015);
        let sink = RejectingSink {
            db: db.clone(),
            reject: 1,
        };

        let summary = orchestrator().run(&db, &sink, None).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.persisted, 1);
        assert_eq!(db.get_win_probabilities(1).unwrap(), (None, None));
        assert!(db.get_win_probabilities(2).unwrap().0.is_some());

        // The failed contest is picked up by the next run.
        let pending = db.list_pending_contests(None).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, 1);
    }

    struct BrokenSource;

    #[async_trait]
    impl ContestSource for BrokenSource {
        async fn pending_contests(&self, _season: Option<i32>) -> Result<Vec<Contest>> {
            Ok(vec![contest(1, 2015, 1, Some(true))])
        }

        async fn completed_contests(&self, _from: i32, _to: i32) -> Result<Vec<Contest>> {
            Ok(vec![])
        }

        async fn contest(&self, _contest_id: i64) -> Result<Option<Contest>> {
            Ok(None)
        }

        async fn contest_plays(&self, _contest_id: i64) -> Result<Vec<PlayEvent>> {
            Err(PipelineError::DataSource("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn data_source_failure_aborts_the_run() {
        let db = Database::open(":memory:").unwrap();
        let err = orchestrator().run(&BrokenSource, &db, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::DataSource(_)));

        let err = orchestrator().evaluate(&BrokenSource, 1).await.unwrap_err();
        assert!(matches!(err, PipelineError::DataSource(_)));
    }
}
