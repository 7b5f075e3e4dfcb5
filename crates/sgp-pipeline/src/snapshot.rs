// Input snapshot loading.
//
// Reads the five input tables from CSV: per-system hitting and pitching
// projections, the identity crosswalk, historical standings (one row per
// league/team/category), and ADP snapshots.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::warn;

use crate::config::DataPaths;
use crate::model::category::{Category, Stat, StatFamily};
use crate::model::player::{AdpEntry, IdentityMapping, PlayerId, ProjectionRecord, StandingsEntry};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Every input table for one pipeline run. Immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub hitting: Vec<ProjectionRecord>,
    pub pitching: Vec<ProjectionRecord>,
    pub id_map: Vec<IdentityMapping>,
    pub standings: Vec<StandingsEntry>,
    pub adp: Vec<AdpEntry>,
}

impl Snapshot {
    pub fn projections(&self, family: StatFamily) -> &[ProjectionRecord] {
        match family {
            StatFamily::Hitting => &self.hitting,
            StatFamily::Pitching => &self.pitching,
        }
    }

    /// Standings rows belonging to one format.
    pub fn standings_for(&self, format: &str) -> Vec<StandingsEntry> {
        self.standings
            .iter()
            .filter(|s| s.format.eq_ignore_ascii_case(format))
            .cloned()
            .collect()
    }
}

/// Which ADP snapshot to join against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdpSelector {
    /// The most recent snapshot date available for the format.
    #[default]
    Latest,
    /// The most recent snapshot on or before the given date.
    AsOf(NaiveDate),
}

impl AdpSelector {
    /// Pick the snapshot date to use among `dates`, if any qualifies.
    pub fn select<I: IntoIterator<Item = NaiveDate>>(&self, dates: I) -> Option<NaiveDate> {
        dates
            .into_iter()
            .filter(|d| match self {
                AdpSelector::Latest => true,
                AdpSelector::AsOf(limit) => d <= limit,
            })
            .max()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawHittingRow {
    system: String,
    source_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    team: String,
    #[serde(default, alias = "positions")]
    pos: String,
    PA: f64,
    AB: f64,
    H: f64,
    R: f64,
    HR: f64,
    RBI: f64,
    SB: f64,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawPitchingRow {
    system: String,
    source_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    team: String,
    #[serde(default, alias = "positions")]
    pos: String,
    IP: f64,
    W: f64,
    SV: f64,
    #[serde(alias = "SO")]
    K: f64,
    ER: f64,
    H: f64,
    BB: f64,
}

#[derive(Debug, Deserialize)]
struct RawIdRow {
    system: String,
    source_id: String,
    player_id: String,
}

#[derive(Debug, Deserialize)]
struct RawStandingsRow {
    format: String,
    league_id: String,
    team: String,
    category: String,
    total: f64,
    /// Fractional when teams tie, e.g. 2.5.
    rank: f64,
}

#[derive(Debug, Deserialize)]
struct RawAdpRow {
    format: String,
    player_id: String,
    adp: f64,
    #[serde(default)]
    min_pick: Option<u32>,
    #[serde(default)]
    max_pick: Option<u32>,
    date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn stat_map(pairs: &[(Stat, f64)]) -> BTreeMap<Stat, f64> {
    pairs.iter().copied().collect()
}

// ---------------------------------------------------------------------------
// Reader-based loaders (private, enable testing without temp files)
// ---------------------------------------------------------------------------

fn load_hitting_from_reader<R: Read>(rdr: R) -> Result<Vec<ProjectionRecord>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut records = Vec::new();
    for result in reader.deserialize::<RawHittingRow>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed hitting projection row: {}", e);
                continue;
            }
        };
        let values = [raw.PA, raw.AB, raw.H, raw.R, raw.HR, raw.RBI, raw.SB];
        if !all_finite(&values) || raw.PA < 0.0 {
            warn!(
                "skipping hitting projection {}/{}: non-finite or negative value",
                raw.system.trim(),
                raw.source_id.trim()
            );
            continue;
        }
        records.push(ProjectionRecord {
            system: raw.system.trim().to_lowercase(),
            source_id: raw.source_id.trim().to_string(),
            name: raw.name.trim().to_string(),
            team: raw.team.trim().to_string(),
            positions: raw.pos.trim().to_string(),
            family: StatFamily::Hitting,
            playing_time: raw.PA,
            stats: stat_map(&[
                (Stat::AtBats, raw.AB),
                (Stat::Hits, raw.H),
                (Stat::Runs, raw.R),
                (Stat::HomeRuns, raw.HR),
                (Stat::RunsBattedIn, raw.RBI),
                (Stat::StolenBases, raw.SB),
            ]),
        });
    }
    Ok(records)
}

fn load_pitching_from_reader<R: Read>(rdr: R) -> Result<Vec<ProjectionRecord>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut records = Vec::new();
    for result in reader.deserialize::<RawPitchingRow>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed pitching projection row: {}", e);
                continue;
            }
        };
        let values = [raw.IP, raw.W, raw.SV, raw.K, raw.ER, raw.H, raw.BB];
        if !all_finite(&values) || raw.IP < 0.0 {
            warn!(
                "skipping pitching projection {}/{}: non-finite or negative value",
                raw.system.trim(),
                raw.source_id.trim()
            );
            continue;
        }
        records.push(ProjectionRecord {
            system: raw.system.trim().to_lowercase(),
            source_id: raw.source_id.trim().to_string(),
            name: raw.name.trim().to_string(),
            team: raw.team.trim().to_string(),
            positions: raw.pos.trim().to_string(),
            family: StatFamily::Pitching,
            playing_time: raw.IP,
            stats: stat_map(&[
                (Stat::Wins, raw.W),
                (Stat::Saves, raw.SV),
                (Stat::Strikeouts, raw.K),
                (Stat::EarnedRuns, raw.ER),
                (Stat::HitsAllowed, raw.H),
                (Stat::WalksAllowed, raw.BB),
            ]),
        });
    }
    Ok(records)
}

fn load_id_map_from_reader<R: Read>(rdr: R) -> Result<Vec<IdentityMapping>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut mappings = Vec::new();
    for result in reader.deserialize::<RawIdRow>() {
        match result {
            Ok(raw) => {
                let player_id = raw.player_id.trim();
                if player_id.is_empty() {
                    warn!(
                        "skipping id mapping {}/{}: empty player id",
                        raw.system.trim(),
                        raw.source_id.trim()
                    );
                    continue;
                }
                mappings.push(IdentityMapping {
                    system: raw.system.trim().to_lowercase(),
                    source_id: raw.source_id.trim().to_string(),
                    player_id: PlayerId::new(player_id),
                });
            }
            Err(e) => warn!("skipping malformed id mapping row: {}", e),
        }
    }
    Ok(mappings)
}

/// Standings arrive one row per (league, team, category) and are grouped
/// into one entry per (format, league, team).
fn load_standings_from_reader<R: Read>(rdr: R) -> Result<Vec<StandingsEntry>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut grouped: BTreeMap<(String, String, String), StandingsEntry> = BTreeMap::new();
    for result in reader.deserialize::<RawStandingsRow>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed standings row: {}", e);
                continue;
            }
        };
        let Some(category) = Category::from_code(&raw.category) else {
            warn!("skipping standings row: unknown category '{}'", raw.category);
            continue;
        };
        if !raw.total.is_finite() || !raw.rank.is_finite() || raw.rank <= 0.0 {
            warn!(
                "skipping standings row {}/{}/{}: invalid total or rank",
                raw.league_id, raw.team, category
            );
            continue;
        }
        let format = raw.format.trim().to_lowercase();
        let league_id = raw.league_id.trim().to_string();
        let team = raw.team.trim().to_string();
        let entry = grouped
            .entry((format.clone(), league_id.clone(), team.clone()))
            .or_insert_with(|| StandingsEntry {
                format,
                league_id,
                team,
                ..Default::default()
            });
        entry.totals.insert(category, raw.total);
        entry.ranks.insert(category, raw.rank);
    }
    Ok(grouped.into_values().collect())
}

fn load_adp_from_reader<R: Read>(rdr: R) -> Result<Vec<AdpEntry>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut entries = Vec::new();
    for result in reader.deserialize::<RawAdpRow>() {
        match result {
            Ok(raw) => {
                if !raw.adp.is_finite() || raw.adp <= 0.0 {
                    warn!("skipping ADP entry for '{}': invalid value", raw.player_id.trim());
                    continue;
                }
                entries.push(AdpEntry {
                    format: raw.format.trim().to_lowercase(),
                    player_id: PlayerId::new(raw.player_id.trim()),
                    adp: raw.adp,
                    min_pick: raw.min_pick,
                    max_pick: raw.max_pick,
                    snapshot: raw.date,
                });
            }
            Err(e) => warn!("skipping malformed ADP row: {}", e),
        }
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<std::fs::File, SnapshotError> {
    std::fs::File::open(path).map_err(|e| SnapshotError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

fn csv_err(path: &Path) -> impl FnOnce(csv::Error) -> SnapshotError + '_ {
    move |e| SnapshotError::Csv {
        path: path.display().to_string(),
        source: e,
    }
}

pub fn load_hitting_projections(path: &Path) -> Result<Vec<ProjectionRecord>, SnapshotError> {
    load_hitting_from_reader(open(path)?).map_err(csv_err(path))
}

pub fn load_pitching_projections(path: &Path) -> Result<Vec<ProjectionRecord>, SnapshotError> {
    load_pitching_from_reader(open(path)?).map_err(csv_err(path))
}

pub fn load_id_map(path: &Path) -> Result<Vec<IdentityMapping>, SnapshotError> {
    load_id_map_from_reader(open(path)?).map_err(csv_err(path))
}

pub fn load_standings(path: &Path) -> Result<Vec<StandingsEntry>, SnapshotError> {
    load_standings_from_reader(open(path)?).map_err(csv_err(path))
}

pub fn load_adp(path: &Path) -> Result<Vec<AdpEntry>, SnapshotError> {
    load_adp_from_reader(open(path)?).map_err(csv_err(path))
}

/// Load every input table. Relative paths are resolved against `base_dir`.
pub fn load_snapshot(base_dir: &Path, paths: &DataPaths) -> Result<Snapshot, SnapshotError> {
    let resolve = |p: &str| base_dir.join(p);

    let snapshot = Snapshot {
        hitting: load_hitting_projections(&resolve(&paths.hitting_projections))?,
        pitching: load_pitching_projections(&resolve(&paths.pitching_projections))?,
        id_map: load_id_map(&resolve(&paths.id_map))?,
        standings: load_standings(&resolve(&paths.standings))?,
        adp: load_adp(&resolve(&paths.adp))?,
    };

    if snapshot.hitting.is_empty() {
        return Err(SnapshotError::Validation(
            "hitting projections produced zero valid rows".into(),
        ));
    }
    if snapshot.pitching.is_empty() {
        return Err(SnapshotError::Validation(
            "pitching projections produced zero valid rows".into(),
        ));
    }
    if snapshot.id_map.is_empty() {
        return Err(SnapshotError::Validation(
            "identity crosswalk produced zero valid rows".into(),
        ));
    }

    Ok(snapshot)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
