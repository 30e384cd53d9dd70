//! Per-side efficiency metrics over the non-garbage plays of one contest.

use serde::{Deserialize, Serialize};

use super::classify::{ClassifiedPlay, DownType, PlayType};

/// Number of metrics produced per side.
pub const METRIC_DIM: usize = 15;

/// Metric names in channel order.
pub const METRIC_NAMES: [&str; METRIC_DIM] = [
    "ppa",
    "total_ppa",
    "passing_ppa",
    "rushing_ppa",
    "standard_down_ppa",
    "passing_down_ppa",
    "success_rate",
    "standard_success_rate",
    "passing_success_rate",
    "passing_success",
    "rushing_success",
    "explosiveness",
    "pass_explosiveness",
    "rush_explosiveness",
    "pass_rate",
];

/// Efficiency of one offense in one contest. Every field is finite; a
/// sub-category with no plays contributes 0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    pub ppa: f64,
    pub total_ppa: f64,
    pub passing_ppa: f64,
    pub rushing_ppa: f64,
    pub standard_down_ppa: f64,
    pub passing_down_ppa: f64,
    pub success_rate: f64,
    pub standard_success_rate: f64,
    pub passing_success_rate: f64,
    pub passing_success: f64,
    pub rushing_success: f64,
    pub explosiveness: f64,
    pub pass_explosiveness: f64,
    pub rush_explosiveness: f64,
    pub pass_rate: f64,
}

impl EfficiencyMetrics {
    /// Values in `METRIC_NAMES` order
    pub fn to_array(&self) -> [f64; METRIC_DIM] {
        [
            self.ppa,
            self.total_ppa,
            self.passing_ppa,
            self.rushing_ppa,
            self.standard_down_ppa,
            self.passing_down_ppa,
            self.success_rate,
            self.standard_success_rate,
            self.passing_success_rate,
            self.passing_success,
            self.rushing_success,
            self.explosiveness,
            self.pass_explosiveness,
            self.rush_explosiveness,
            self.pass_rate,
        ]
    }
}

/// Both sides' metrics for an eligible contest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContestEfficiency {
    pub home: EfficiencyMetrics,
    pub away: EfficiencyMetrics,
    pub home_plays: usize,
    pub away_plays: usize,
}

/// Running counts for one play filter.
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    plays: usize,
    successes: usize,
    ppa_sum: f64,
    success_ppa_sum: f64,
}

impl Tally {
    fn add(&mut self, play: &ClassifiedPlay) {
        self.plays += 1;
        self.ppa_sum += play.ppa;
        if play.success {
            self.successes += 1;
            self.success_ppa_sum += play.ppa;
        }
    }

    fn mean_ppa(&self) -> f64 {
        mean(self.ppa_sum, self.plays)
    }

    fn success_rate(&self) -> f64 {
        ratio(self.successes, self.plays)
    }

    fn explosiveness(&self) -> f64 {
        mean(self.success_ppa_sum, self.successes)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SideTally {
    all: Tally,
    pass: Tally,
    rush: Tally,
    standard_downs: Tally,
    passing_downs: Tally,
}

impl SideTally {
    fn add(&mut self, play: &ClassifiedPlay) {
        self.all.add(play);
        match play.play_type {
            PlayType::Pass => self.pass.add(play),
            PlayType::Rush => self.rush.add(play),
            PlayType::Other => {}
        }
        match play.down_type {
            DownType::Standard => self.standard_downs.add(play),
            DownType::Passing => self.passing_downs.add(play),
        }
    }

    fn metrics(&self) -> EfficiencyMetrics {
        EfficiencyMetrics {
            ppa: self.all.mean_ppa(),
            total_ppa: self.all.ppa_sum,
            passing_ppa: self.pass.mean_ppa(),
            rushing_ppa: self.rush.mean_ppa(),
            standard_down_ppa: self.standard_downs.mean_ppa(),
            passing_down_ppa: self.passing_downs.mean_ppa(),
            success_rate: self.all.success_rate(),
            standard_success_rate: self.standard_downs.success_rate(),
            passing_success_rate: self.passing_downs.success_rate(),
            passing_success: self.pass.success_rate(),
            rushing_success: self.rush.success_rate(),
            explosiveness: self.all.explosiveness(),
            pass_explosiveness: self.pass.explosiveness(),
            rush_explosiveness: self.rush.explosiveness(),
            pass_rate: ratio(self.pass.plays, self.all.plays),
        }
    }
}

/// Count ratio with the denominator floored at 1.
fn ratio(numerator: usize, denominator: usize) -> f64 {
    numerator as f64 / denominator.max(1) as f64
}

/// Mean that resolves to 0 over an empty set.
fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Aggregate classified plays into per-side metrics, dropping garbage-time
/// plays. Returns `None` when either side has no remaining plays.
pub fn aggregate(plays: &[ClassifiedPlay]) -> Option<ContestEfficiency> {
    let mut home = SideTally::default();
    let mut away = SideTally::default();

    for play in plays.iter().filter(|p| !p.garbage_time) {
        if play.is_home_offense {
            home.add(play);
        } else {
            away.add(play);
        }
    }

    if home.all.plays == 0 || away.all.plays == 0 {
        return None;
    }

    Some(ContestEfficiency {
        home: home.metrics(),
        away: away.metrics(),
        home_plays: home.all.plays,
        away_plays: away.all.plays,
    })
}
