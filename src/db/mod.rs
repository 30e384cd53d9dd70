use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{PipelineError, Result};
use crate::pipeline::provider::{ContestSource, ResultSink};

pub mod models;
use models::*;

/// Thread-safe SQLite connection (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PipelineError::DataSource("database connection lock poisoned".into()))
    }

    // ── Contests ──────────────────────────────────────────────────────────────

    /// Contests with final scores on both sides and no probability written yet
    pub fn list_pending_contests(&self, season: Option<i32>) -> Result<Vec<Contest>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{CONTEST_SELECT}
             WHERE gt.points IS NOT NULL AND gt2.points IS NOT NULL
               AND gt.win_prob IS NULL AND gt2.win_prob IS NULL
               AND (?1 IS NULL OR g.season = ?1)
             ORDER BY g.id"
        ))?;
        let contests = stmt
            .query_map(params![season], map_contest)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(contests)
    }

    /// Finished contests in an inclusive season range, in chronological order
    pub fn list_completed_contests(&self, from_season: i32, to_season: i32) -> Result<Vec<Contest>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{CONTEST_SELECT}
             WHERE gt.points IS NOT NULL AND gt2.points IS NOT NULL
               AND g.season BETWEEN ?1 AND ?2
             ORDER BY g.season, g.week, g.id"
        ))?;
        let contests = stmt
            .query_map(params![from_season, to_season], map_contest)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(contests)
    }

    pub fn get_contest(&self, contest_id: i64) -> Result<Option<Contest>> {
        let conn = self.lock()?;
        let contest = conn
            .query_row(
                &format!("{CONTEST_SELECT} WHERE g.id = ?1"),
                params![contest_id],
                map_contest,
            )
            .optional()?;
        Ok(contest)
    }

    // ── Plays ─────────────────────────────────────────────────────────────────

    /// All plays of a contest that carry a predicted-points-added value
    pub fn list_contest_plays(&self, contest_id: i64) -> Result<Vec<PlayEvent>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT p.down, p.distance, p.yards_gained, p.period, p.scoring,
                    p.home_score, p.away_score, p.play_type_id, p.offense_id, p.ppa
             FROM play AS p
                INNER JOIN drive AS d ON p.drive_id = d.id
             WHERE d.game_id = ?1 AND p.ppa IS NOT NULL
             ORDER BY p.id",
        )?;
        let plays = stmt
            .query_map(params![contest_id], map_play)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(plays)
    }

    // ── Win probabilities ─────────────────────────────────────────────────────

    /// Write both sides of a result in one transaction. Either both rows are
    /// updated or neither is.
    pub fn write_win_probabilities(&self, contest: &Contest, result: &PredictionResult) -> Result<()> {
        let contest_id = contest.id;
        let persist = |e: rusqlite::Error| PipelineError::Persistence {
            contest_id,
            message: e.to_string(),
        };

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(persist)?;
        let now = Utc::now();
        for (side, probability) in [
            (&contest.home, result.home_probability),
            (&contest.away, result.away_probability()),
        ] {
            let rows = tx
                .execute(
                    "UPDATE game_team SET win_prob = ?1, win_prob_at = ?2 WHERE id = ?3 AND game_id = ?4",
                    params![probability, now, side.id, contest_id],
                )
                .map_err(persist)?;
            if rows != 1 {
                // Dropping `tx` rolls back the partial write.
                return Err(PipelineError::Persistence {
                    contest_id,
                    message: format!(
                        "expected one {} row (game_team {}), updated {}",
                        side.side.as_str(),
                        side.id,
                        rows
                    ),
                });
            }
        }

        tx.commit().map_err(persist)?;
        Ok(())
    }

    /// Stored `(home, away)` probabilities for a contest, if any
    pub fn get_win_probabilities(&self, contest_id: i64) -> Result<(Option<f64>, Option<f64>)> {
        let conn = self.lock()?;
        let probs = conn
            .query_row(
                "SELECT gt.win_prob, gt2.win_prob
                 FROM game_team AS gt
                    INNER JOIN game_team AS gt2 ON gt.game_id = gt2.game_id AND gt.id <> gt2.id
                 WHERE gt.game_id = ?1 AND gt.home_away = 'home'",
                params![contest_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(probs.unwrap_or((None, None)))
    }
}

#[async_trait]
impl ContestSource for Database {
    async fn pending_contests(&self, season: Option<i32>) -> Result<Vec<Contest>> {
        self.list_pending_contests(season)
    }

    async fn completed_contests(&self, from_season: i32, to_season: i32) -> Result<Vec<Contest>> {
        self.list_completed_contests(from_season, to_season)
    }

    async fn contest(&self, contest_id: i64) -> Result<Option<Contest>> {
        self.get_contest(contest_id)
    }

    async fn contest_plays(&self, contest_id: i64) -> Result<Vec<PlayEvent>> {
        self.list_contest_plays(contest_id)
    }
}

#[async_trait]
impl ResultSink for Database {
    async fn commit_result(&self, contest: &Contest, result: &PredictionResult) -> Result<()> {
        self.write_win_probabilities(contest, result)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

const CONTEST_SELECT: &str = "SELECT g.id, g.season, g.week,
        gt.id, gt.team_id, gt.winner,
        gt2.id, gt2.team_id, gt2.winner
    FROM game AS g
        INNER JOIN game_team AS gt ON g.id = gt.game_id AND gt.home_away = 'home'
        INNER JOIN game_team AS gt2 ON g.id = gt2.game_id AND gt.id <> gt2.id";

fn map_contest(row: &rusqlite::Row) -> rusqlite::Result<Contest> {
    Ok(Contest {
        id: row.get(0)?,
        season: row.get(1)?,
        week: row.get(2)?,
        home: ContestSide {
            id: row.get(3)?,
            team_id: TeamId(row.get(4)?),
            side: Side::Home,
            winner: row.get(5)?,
        },
        away: ContestSide {
            id: row.get(6)?,
            team_id: TeamId(row.get(7)?),
            side: Side::Away,
            winner: row.get(8)?,
        },
    })
}

fn map_play(row: &rusqlite::Row) -> rusqlite::Result<PlayEvent> {
    Ok(PlayEvent {
        down: row.get(0)?,
        distance: row.get(1)?,
        yards_gained: row.get(2)?,
        period: row.get(3)?,
        scoring: row.get(4)?,
        home_score: row.get(5)?,
        away_score: row.get(6)?,
        play_type_id: row.get(7)?,
        offense_id: TeamId(row.get(8)?),
        ppa: row.get(9)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS game (
    id      INTEGER PRIMARY KEY,
    season  INTEGER NOT NULL,
    week    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS game_team (
    id          INTEGER PRIMARY KEY,
    game_id     INTEGER NOT NULL,
    team_id     INTEGER NOT NULL,
    home_away   TEXT    NOT NULL CHECK (home_away IN ('home', 'away')),
    points      INTEGER,
    winner      INTEGER,
    win_prob    REAL,
    win_prob_at TEXT,
    FOREIGN KEY (game_id) REFERENCES game(id)
);

CREATE TABLE IF NOT EXISTS drive (
    id       INTEGER PRIMARY KEY,
    game_id  INTEGER NOT NULL,
    FOREIGN KEY (game_id) REFERENCES game(id)
);

CREATE TABLE IF NOT EXISTS play (
    id            INTEGER PRIMARY KEY,
    drive_id      INTEGER NOT NULL,
    offense_id    INTEGER NOT NULL,
    down          INTEGER NOT NULL,
    distance      INTEGER NOT NULL,
    yards_gained  INTEGER NOT NULL,
    period        INTEGER NOT NULL,
    scoring       INTEGER NOT NULL DEFAULT 0,
    home_score    INTEGER NOT NULL,
    away_score    INTEGER NOT NULL,
    play_type_id  INTEGER NOT NULL,
    ppa           REAL,
    FOREIGN KEY (drive_id) REFERENCES drive(id)
);

CREATE INDEX IF NOT EXISTS idx_game_team_game ON game_team(game_id);
CREATE INDEX IF NOT EXISTS idx_drive_game ON drive(game_id);
CREATE INDEX IF NOT EXISTS idx_play_drive ON play(drive_id);
"#;

/// Row builders for seeding test databases.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn insert_contest(db: &Database, contest: &Contest, points: Option<(i32, i32)>) {
        let conn = db.lock().unwrap();
        conn.execute(
            "INSERT INTO game (id, season, week) VALUES (?1, ?2, ?3)",
            params![contest.id, contest.season, contest.week],
        )
        .unwrap();
        for (side, pts) in [
            (&contest.home, points.map(|p| p.0)),
            (&contest.away, points.map(|p| p.1)),
        ] {
            conn.execute(
                "INSERT INTO game_team (id, game_id, team_id, home_away, points, winner)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![side.id, contest.id, side.team_id.0, side.side.as_str(), pts, side.winner],
            )
            .unwrap();
        }
        conn.execute(
            "INSERT INTO drive (id, game_id) VALUES (?1, ?1)",
            params![contest.id],
        )
        .unwrap();
    }

    pub fn insert_play(db: &Database, contest_id: i64, play: &PlayEvent, ppa: Option<f64>) {
        let conn = db.lock().unwrap();
        conn.execute(
            "INSERT INTO play (drive_id, offense_id, down, distance, yards_gained, period,
                               scoring, home_score, away_score, play_type_id, ppa)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                contest_id,
                play.offense_id.0,
                play.down,
                play.distance,
                play.yards_gained,
                play.period,
                play.scoring,
                play.home_score,
                play.away_score,
                play.play_type_id,
                ppa,
            ],
        )
        .unwrap();
    }

    pub fn contest(id: i64, season: i32, week: i32, home_won: Option<bool>) -> Contest {
        Contest {
            id,
            season,
            week,
            home: ContestSide {
                id: id * 10 + 1,
                team_id: TeamId(100),
                side: Side::Home,
                winner: home_won,
            },
            away: ContestSide {
                id: id * 10 + 2,
                team_id: TeamId(200),
                side: Side::Away,
                winner: home_won.map(|w| !w),
            },
        }
    }

    pub fn play(offense: i64, down: i32, distance: i32, yards: i32, play_type_id: i32) -> PlayEvent {
        PlayEvent {
            down,
            distance,
            yards_gained: yards,
            period: 1,
            scoring: false,
            home_score: 0,
            away_score: 0,
            play_type_id,
            offense_id: TeamId(offense),
            ppa: 0.0,
        }
    }
}
