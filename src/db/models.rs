use serde::{Deserialize, Serialize};
use std::fmt;

/// Team identifier as stored in `game_team.team_id` and `play.offense_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }
}

/// One recorded play. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    /// 1–4
    pub down: i32,
    /// Yards to go
    pub distance: i32,
    /// Signed yardage on the play
    pub yards_gained: i32,
    /// 1–4, overtime periods above that
    pub period: i32,
    pub scoring: bool,
    /// Score at play time
    pub home_score: i32,
    pub away_score: i32,
    pub play_type_id: i32,
    /// Team in possession
    pub offense_id: TeamId,
    /// Predicted points added. Plays without it never reach the pipeline.
    pub ppa: f64,
}

/// One team's participation in one contest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestSide {
    /// `game_team` row id, the unit the sink writes to
    pub id: i64,
    pub team_id: TeamId,
    pub side: Side,
    /// Unknown until the contest ends
    pub winner: Option<bool>,
}

/// A contest with both participants resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: i64,
    pub season: i32,
    pub week: i32,
    pub home: ContestSide,
    pub away: ContestSide,
}

impl Contest {
    /// Outcome label for training: 1 if the home side won, 0 otherwise
    pub fn home_label(&self) -> f64 {
        if self.home.winner.unwrap_or(false) {
            1.0
        } else {
            0.0
        }
    }
}

/// Scored probability for one contest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub contest_id: i64,
    /// In [0, 1]
    pub home_probability: f64,
}

impl PredictionResult {
    pub fn away_probability(&self) -> f64 {
        1.0 - self.home_probability
    }
}
