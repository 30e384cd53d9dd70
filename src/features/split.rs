use serde::{Deserialize, Serialize};

/// Which offline corpus an example belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Training,
    Evaluation,
}

/// Parity rule: training when `year` and `week` share parity.
pub fn split_for(year: i32, week: i32) -> Split {
    if year.rem_euclid(2) == week.rem_euclid(2) {
        Split::Training
    } else {
        Split::Evaluation
    }
}

/// Partition items by parity, preserving their order within each side.
pub fn partition<T>(items: Vec<T>, key: impl Fn(&T) -> (i32, i32)) -> (Vec<T>, Vec<T>) {
    items.into_iter().partition(|item| {
        let (year, week) = key(item);
        split_for(year, week) == Split::Training
    })
}
