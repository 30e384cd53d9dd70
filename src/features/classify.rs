//! Situational labels for a single play.
//!
//! Every play maps to exactly one `(down_type, success, play_type,
//! garbage_time)` tuple. The thresholds below are part of the trained model's
//! input contract; changing any of them invalidates existing keys and weights.

use serde::{Deserialize, Serialize};

use crate::db::models::{PlayEvent, TeamId};

/// Play type codes counted as passes.
const PASS_PLAY_TYPES: [i32; 9] = [3, 4, 6, 7, 24, 26, 36, 51, 67];
/// Play type codes counted as rushes.
const RUSH_PLAY_TYPES: [i32; 5] = [5, 9, 29, 39, 68];

/// Score-margin thresholds for periods 2, 3 and 4. A play is garbage time
/// when the margin strictly exceeds the threshold for its period.
const GARBAGE_MARGIN_NON_SCORING: [i32; 3] = [38, 28, 22];
const GARBAGE_MARGIN_SCORING: [i32; 3] = [45, 35, 29];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownType {
    Standard,
    Passing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayType {
    Pass,
    Rush,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPlay {
    pub down_type: DownType,
    pub success: bool,
    pub play_type: PlayType,
    pub garbage_time: bool,
    pub is_home_offense: bool,
    pub ppa: f64,
}

/// Classify one play from the point of view of the contest's home team.
pub fn classify_play(play: &PlayEvent, home_team: TeamId) -> ClassifiedPlay {
    ClassifiedPlay {
        down_type: down_type(play.down, play.distance),
        success: is_successful(play),
        play_type: play_type(play.play_type_id),
        garbage_time: is_garbage_time(play),
        is_home_offense: play.offense_id == home_team,
        ppa: play.ppa,
    }
}

pub fn down_type(down: i32, distance: i32) -> DownType {
    match down {
        2 if distance >= 8 => DownType::Passing,
        3 | 4 if distance >= 5 => DownType::Passing,
        _ => DownType::Standard,
    }
}

pub fn is_successful(play: &PlayEvent) -> bool {
    if play.scoring {
        return true;
    }
    match play.down {
        1 => gained_fraction(play).is_some_and(|f| f >= 0.5),
        2 => gained_fraction(play).is_some_and(|f| f >= 0.7),
        3 | 4 => play.yards_gained >= play.distance,
        _ => false,
    }
}

/// Share of the distance gained; `None` when the distance is not positive.
fn gained_fraction(play: &PlayEvent) -> Option<f64> {
    if play.distance <= 0 {
        return None;
    }
    Some(play.yards_gained as f64 / play.distance as f64)
}

pub fn play_type(play_type_id: i32) -> PlayType {
    if PASS_PLAY_TYPES.contains(&play_type_id) {
        PlayType::Pass
    } else if RUSH_PLAY_TYPES.contains(&play_type_id) {
        PlayType::Rush
    } else {
        PlayType::Other
    }
}

pub fn is_garbage_time(play: &PlayEvent) -> bool {
    let thresholds = if play.scoring {
        &GARBAGE_MARGIN_SCORING
    } else {
        &GARBAGE_MARGIN_NON_SCORING
    };
    let threshold = match play.period {
        2 => thresholds[0],
        3 => thresholds[1],
        4 => thresholds[2],
        _ => return false,
    };
    (play.home_score - play.away_score).abs() > threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_play(down: i32, distance: i32, yards: i32) -> PlayEvent {
        PlayEvent {
            down,
            distance,
            yards_gained: yards,
            period: 1,
            scoring: false,
            home_score: 0,
            away_score: 0,
            play_type_id: 5,
            offense_id: TeamId(1),
            ppa: 0.0,
        }
    }

    fn with_score(period: i32, scoring: bool, home: i32, away: i32) -> PlayEvent {
        PlayEvent {
            period,
            scoring,
            home_score: home,
            away_score: away,
            ..make_play(1, 10, 0)
        }
    }

    #[test]
    fn down_type_boundaries() {
        assert_eq!(down_type(1, 20), DownType::Standard);
        assert_eq!(down_type(2, 7), DownType::Standard);
        assert_eq!(down_type(2, 8), DownType::Passing);
        assert_eq!(down_type(3, 4), DownType::Standard);
        assert_eq!(down_type(3, 5), DownType::Passing);
        assert_eq!(down_type(4, 5), DownType::Passing);
    }

    #[test]
    fn success_thresholds_per_down() {
        assert!(is_successful(&make_play(1, 10, 5)));
        assert!(!is_successful(&make_play(1, 10, 4)));
        assert!(is_successful(&make_play(2, 10, 7)));
        assert!(!is_successful(&make_play(2, 10, 6)));
        assert!(is_successful(&make_play(3, 3, 3)));
        assert!(!is_successful(&make_play(4, 3, 2)));
    }

    #[test]
    fn scoring_play_is_always_successful() {
        let play = PlayEvent {
            scoring: true,
            ..make_play(3, 10, -5)
        };
        assert!(is_successful(&play));
    }

    #[test]
    fn zero_distance_ratio_is_guarded() {
        assert!(!is_successful(&make_play(1, 0, 3)));
        assert!(!is_successful(&make_play(2, -1, 3)));
    }

    #[test]
    fn play_type_codes() {
        for code in PASS_PLAY_TYPES {
            assert_eq!(play_type(code), PlayType::Pass);
        }
        for code in RUSH_PLAY_TYPES {
            assert_eq!(play_type(code), PlayType::Rush);
        }
        assert_eq!(play_type(8), PlayType::Other);
        assert_eq!(play_type(0), PlayType::Other);
    }

    #[test]
    fn garbage_time_bands() {
        assert!(!is_garbage_time(&with_score(1, false, 70, 0)));
        assert!(!is_garbage_time(&with_score(2, false, 38, 0)));
        assert!(is_garbage_time(&with_score(2, false, 39, 0)));
        assert!(is_garbage_time(&with_score(3, false, 0, 29)));
        assert!(!is_garbage_time(&with_score(4, false, 22, 0)));
        assert!(is_garbage_time(&with_score(4, false, 23, 0)));

        assert!(!is_garbage_time(&with_score(2, true, 45, 0)));
        assert!(is_garbage_time(&with_score(2, true, 46, 0)));
        assert!(!is_garbage_time(&with_score(3, true, 35, 0)));
        assert!(is_garbage_time(&with_score(4, true, 0, 30)));

        // overtime
        assert!(!is_garbage_time(&with_score(5, false, 60, 0)));
    }

    #[test]
    fn classification_is_deterministic() {
        let play = PlayEvent {
            play_type_id: 24,
            offense_id: TeamId(9),
            ppa: 1.25,
            ..make_play(2, 8, 6)
        };
        let a = classify_play(&play, TeamId(9));
        let b = classify_play(&play, TeamId(9));
        assert_eq!(a, b);
        assert_eq!(a.down_type, DownType::Passing);
        assert!(a.success);
        assert_eq!(a.play_type, PlayType::Pass);
        assert!(!a.garbage_time);
        assert!(a.is_home_offense);
        assert!(!classify_play(&play, TeamId(3)).is_home_offense);
    }
}
