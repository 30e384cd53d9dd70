use async_trait::async_trait;

use crate::db::models::{Contest, PlayEvent, PredictionResult};
use crate::error::Result;

/// Where contests and their plays come from.
#[async_trait]
pub trait ContestSource: Send + Sync {
    /// Worklist of contests that are final but have no probability yet.
    async fn pending_contests(&self, season: Option<i32>) -> Result<Vec<Contest>>;

    /// Finished contests in an inclusive season range, for corpus export.
    async fn completed_contests(&self, from_season: i32, to_season: i32) -> Result<Vec<Contest>>;

    async fn contest(&self, contest_id: i64) -> Result<Option<Contest>>;

    /// Plays of one contest with a predicted-points-added value.
    async fn contest_plays(&self, contest_id: i64) -> Result<Vec<PlayEvent>>;
}

/// Where scored results go.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist `p` for the home side and `1 - p` for the away side as one
    /// unit. Implementations must leave both sides untouched on failure.
    async fn commit_result(&self, contest: &Contest, result: &PredictionResult) -> Result<()>;
}
