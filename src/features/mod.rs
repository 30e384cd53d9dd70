pub mod classify;
pub mod efficiency;
pub mod normalize;
pub mod split;
pub mod vector;

pub use classify::{classify_play, ClassifiedPlay};
pub use efficiency::{aggregate, ContestEfficiency};
pub use normalize::NormalizationKeys;
pub use vector::{FeatureVector, TrainingExample};

use crate::db::models::{Contest, PlayEvent};

/// Classify and aggregate one contest's plays. `None` when the contest is
/// ineligible.
pub fn contest_efficiency(contest: &Contest, plays: &[PlayEvent]) -> Option<ContestEfficiency> {
    let classified: Vec<ClassifiedPlay> = plays
        .iter()
        .map(|p| classify_play(p, contest.home.team_id))
        .collect();
    aggregate(&classified)
}
