// SQLite output store for ranked valuations.
//
// Each format's table is replaced wholesale inside one transaction, so a
// reader sees either the previous complete run or the new one. Every run,
// successful or not, is recorded in the `pipeline_runs` ledger.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};

use crate::model::player::PlayerId;
use crate::pipeline::{FormatRun, PipelineError};
use crate::valuation::ranking::RankingRow;

/// One ledger entry from `pipeline_runs`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub format: String,
    /// "ok" or "failed".
    pub status: String,
    pub finished_at: String,
    pub row_count: usize,
    pub diagnostic_count: usize,
    /// JSON array of diagnostics.
    pub diagnostics: String,
    pub error: Option<String>,
}

pub struct MartStore {
    conn: Mutex<Connection>,
}

impl MartStore {
    /// Open (or create) the store at `path`. `":memory:"` works for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS rankings (
                format            TEXT NOT NULL,
                rank              INTEGER NOT NULL,
                player_id         TEXT NOT NULL,
                family            TEXT NOT NULL,
                name              TEXT NOT NULL,
                team              TEXT NOT NULL,
                pos               TEXT NOT NULL,
                pos_group         TEXT NOT NULL,
                playing_time      REAL NOT NULL,
                avg               REAL,
                r                 REAL,
                hr                REAL,
                rbi               REAL,
                sb                REAL,
                w                 REAL,
                sv                REAL,
                k                 REAL,
                era               REAL,
                whip              REAL,
                sgp_r             REAL,
                sgp_hr            REAL,
                sgp_rbi           REAL,
                sgp_sb            REAL,
                sgp_avg           REAL,
                sgp_w             REAL,
                sgp_sv            REAL,
                sgp_k             REAL,
                sgp_era           REAL,
                sgp_whip          REAL,
                sgp               REAL NOT NULL,
                pool              TEXT,
                replacement_level REAL,
                sgpar             REAL,
                value             REAL NOT NULL,
                adp               REAL,
                min_pick          INTEGER,
                max_pick          INTEGER,
                rank_diff         REAL,
                row_order         INTEGER NOT NULL,
                PRIMARY KEY (format, player_id, family)
            );

            CREATE TABLE IF NOT EXISTS conversion_factors (
                format       TEXT NOT NULL,
                category     TEXT NOT NULL,
                slope        REAL,
                observations INTEGER NOT NULL,
                PRIMARY KEY (format, category)
            );

            CREATE TABLE IF NOT EXISTS replacement_levels (
                format   TEXT NOT NULL,
                pool     TEXT NOT NULL,
                capacity INTEGER NOT NULL,
                filled   INTEGER NOT NULL,
                level    REAL,
                PRIMARY KEY (format, pool)
            );

            CREATE TABLE IF NOT EXISTS pipeline_runs (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                format           TEXT NOT NULL,
                status           TEXT NOT NULL,
                finished_at      TEXT NOT NULL,
                row_count        INTEGER NOT NULL,
                diagnostic_count INTEGER NOT NULL,
                diagnostics      TEXT NOT NULL,
                error            TEXT
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A poisoned lock still holds a usable connection; every write is
    /// transactional, so no half-applied state can be observed.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace a format's rankings, factors, and replacement levels, and
    /// record the run, all in a single transaction.
    pub fn replace_format(&self, run: &FormatRun) -> Result<()> {
        let diagnostics_json =
            serde_json::to_string(&run.diagnostics).context("failed to serialize diagnostics")?;

        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin replace transaction")?;

        for table in ["rankings", "conversion_factors", "replacement_levels"] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE format = ?1"),
                params![run.format],
            )
            .with_context(|| format!("failed to clear {table} for {}", run.format))?;
        }

        {
            let mut insert = tx
                .prepare(
                    "INSERT INTO rankings (
                        format, rank, player_id, family, name, team, pos, pos_group, playing_time,
                        avg, r, hr, rbi, sb, w, sv, k, era, whip,
                        sgp_r, sgp_hr, sgp_rbi, sgp_sb, sgp_avg, sgp_w, sgp_sv, sgp_k, sgp_era, sgp_whip,
                        sgp, pool, replacement_level, sgpar, value, adp, min_pick, max_pick, rank_diff,
                        row_order
                     ) VALUES (
                        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                        ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19,
                        ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29,
                        ?30, ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38,
                        ?39
                     )",
                )
                .context("failed to prepare rankings insert")?;

            for (order, row) in run.rows.iter().enumerate() {
                insert
                    .execute(params![
                        run.format,
                        row.rank,
                        row.player_id.as_str(),
                        row.family,
                        row.name,
                        row.team,
                        row.pos,
                        row.pos_group,
                        row.playing_time,
                        row.avg,
                        row.r,
                        row.hr,
                        row.rbi,
                        row.sb,
                        row.w,
                        row.sv,
                        row.k,
                        row.era,
                        row.whip,
                        row.sgp_r,
                        row.sgp_hr,
                        row.sgp_rbi,
                        row.sgp_sb,
                        row.sgp_avg,
                        row.sgp_w,
                        row.sgp_sv,
                        row.sgp_k,
                        row.sgp_era,
                        row.sgp_whip,
                        row.sgp,
                        row.pool,
                        row.replacement_level,
                        row.sgpar,
                        row.value,
                        row.adp,
                        row.min_pick,
                        row.max_pick,
                        row.rank_diff,
                        order as i64,
                    ])
                    .with_context(|| format!("failed to insert ranking for {}", row.player_id))?;
            }
        }

        for factor in run.factors.factors.values() {
            tx.execute(
                "INSERT INTO conversion_factors (format, category, slope, observations)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    run.format,
                    factor.category.code(),
                    factor.slope,
                    factor.observations as i64
                ],
            )
            .context("failed to insert conversion factor")?;
        }

        for level in &run.replacement_levels {
            tx.execute(
                "INSERT INTO replacement_levels (format, pool, capacity, filled, level)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    run.format,
                    level.pool.code(),
                    level.capacity as i64,
                    level.filled as i64,
                    level.level
                ],
            )
            .context("failed to insert replacement level")?;
        }

        insert_run(
            &tx,
            &run.format,
            "ok",
            run.rows.len(),
            run.diagnostics.len(),
            &diagnostics_json,
            None,
        )?;

        tx.commit().context("failed to commit format replacement")?;
        Ok(())
    }

    /// Record a failed run. The format's existing output is left untouched.
    pub fn record_failure(&self, error: &PipelineError) -> Result<()> {
        let message = error.to_string();
        let conn = self.conn();
        insert_run(
            &conn,
            error.format(),
            "failed",
            0,
            0,
            "[]",
            Some(message.as_str()),
        )
    }

    /// Load a format's rankings in stored output order.
    pub fn load_rankings(&self, format: &str) -> Result<Vec<RankingRow>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT rank, player_id, name, team, pos, pos_group, family, playing_time,
                        avg, r, hr, rbi, sb, w, sv, k, era, whip,
                        sgp_r, sgp_hr, sgp_rbi, sgp_sb, sgp_avg, sgp_w, sgp_sv, sgp_k, sgp_era, sgp_whip,
                        sgp, pool, replacement_level, sgpar, value, adp, min_pick, max_pick, rank_diff
                 FROM rankings WHERE format = ?1 ORDER BY row_order",
            )
            .context("failed to prepare load_rankings query")?;

        let rows = stmt
            .query_map(params![format], ranking_from_row)
            .context("failed to query rankings")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map ranking rows")?;

        Ok(rows)
    }

    /// Ledger entries for a format, oldest first.
    pub fn runs(&self, format: &str) -> Result<Vec<RunRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT format, status, finished_at, row_count, diagnostic_count, diagnostics, error
                 FROM pipeline_runs WHERE format = ?1 ORDER BY id",
            )
            .context("failed to prepare runs query")?;

        let runs = stmt
            .query_map(params![format], |row| {
                Ok(RunRecord {
                    format: row.get(0)?,
                    status: row.get(1)?,
                    finished_at: row.get(2)?,
                    row_count: row.get::<_, i64>(3)? as usize,
                    diagnostic_count: row.get::<_, i64>(4)? as usize,
                    diagnostics: row.get(5)?,
                    error: row.get(6)?,
                })
            })
            .context("failed to query pipeline runs")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map pipeline run rows")?;

        Ok(runs)
    }
}

fn insert_run(
    conn: &Connection,
    format: &str,
    status: &str,
    row_count: usize,
    diagnostic_count: usize,
    diagnostics_json: &str,
    error: Option<&str>,
) -> Result<()> {
    let finished_at = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO pipeline_runs
            (format, status, finished_at, row_count, diagnostic_count, diagnostics, error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            format,
            status,
            finished_at,
            row_count as i64,
            diagnostic_count as i64,
            diagnostics_json,
            error
        ],
    )
    .context("failed to record pipeline run")?;
    Ok(())
}

fn ranking_from_row(row: &Row<'_>) -> rusqlite::Result<RankingRow> {
    Ok(RankingRow {
        rank: row.get(0)?,
        player_id: PlayerId::new(row.get::<_, String>(1)?),
        name: row.get(2)?,
        team: row.get(3)?,
        pos: row.get(4)?,
        pos_group: row.get(5)?,
        family: row.get(6)?,
        playing_time: row.get(7)?,
        avg: row.get(8)?,
        r: row.get(9)?,
        hr: row.get(10)?,
        rbi: row.get(11)?,
        sb: row.get(12)?,
        w: row.get(13)?,
        sv: row.get(14)?,
        k: row.get(15)?,
        era: row.get(16)?,
        whip: row.get(17)?,
        sgp_r: row.get(18)?,
        sgp_hr: row.get(19)?,
        sgp_rbi: row.get(20)?,
        sgp_sb: row.get(21)?,
        sgp_avg: row.get(22)?,
        sgp_w: row.get(23)?,
        sgp_sv: row.get(24)?,
        sgp_k: row.get(25)?,
        sgp_era: row.get(26)?,
        sgp_whip: row.get(27)?,
        sgp: row.get(28)?,
        pool: row.get(29)?,
        replacement_level: row.get(30)?,
        sgpar: row.get(31)?,
        value: row.get(32)?,
        adp: row.get(33)?,
        min_pick: row.get(34)?,
        max_pick: row.get(35)?,
        rank_diff: row.get(36)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
