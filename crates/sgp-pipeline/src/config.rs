// Configuration loading and parsing (pipeline.toml, formats.toml).

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::category::StatFamily;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub blend: BlendConfig,
    pub data_paths: DataPaths,
    pub db_path: String,
    /// Scoring formats keyed by format id (e.g. "50s", "oc").
    pub formats: BTreeMap<String, FormatConfig>,
}

// ---------------------------------------------------------------------------
// pipeline.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct PipelineFile {
    blend: BlendConfig,
    data_paths: DataPaths,
    output: OutputSection,
}

#[derive(Debug, Clone, Deserialize)]
struct OutputSection {
    db_path: String,
}

/// Which projection systems feed the blend.
#[derive(Debug, Clone, Deserialize)]
pub struct BlendConfig {
    /// Systems whose per-unit rates are averaged.
    pub rate_systems: Vec<String>,
    /// Systems whose PA/IP estimates are averaged. May overlap `rate_systems`.
    pub playing_time_systems: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub hitting_projections: String,
    pub pitching_projections: String,
    pub id_map: String,
    pub standings: String,
    pub adp: String,
}

// ---------------------------------------------------------------------------
// formats.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct FormatsFile {
    formats: BTreeMap<String, FormatConfig>,
}

/// Everything that differs between two scoring formats.
#[derive(Debug, Clone, Deserialize)]
pub struct FormatConfig {
    /// Filled from the table key after parsing.
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub num_teams: usize,
    pub standings: StandingsConfig,
    pub budget: BudgetConfig,
    pub baseline: RateBaseline,
    /// Starting slots per team keyed by pool (C, 1B, ..., MI, CI, UT, SP, RP, P).
    pub roster: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandingsConfig {
    /// Inclusive finish-rank range used for the regression.
    pub contention_band: [u32; 2],
    /// Standings points awarded per rank step.
    pub points_per_rank: f64,
}

impl StandingsConfig {
    pub fn band_low(&self) -> u32 {
        self.contention_band[0]
    }

    pub fn band_high(&self) -> u32 {
        self.contention_band[1]
    }

    /// Fractional (tied) ranks count when they fall inside the band.
    pub fn in_band(&self, rank: f64) -> bool {
        (f64::from(self.band_low())..=f64::from(self.band_high())).contains(&rank)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BudgetConfig {
    pub per_team: f64,
    /// Fraction of each team's budget spent on hitters.
    pub hitting_split: f64,
    pub bench_min_bid: f64,
    pub hitting_bench_spots: usize,
    pub pitching_bench_spots: usize,
}

impl BudgetConfig {
    pub fn split(&self, family: StatFamily) -> f64 {
        match family {
            StatFamily::Hitting => self.hitting_split,
            StatFamily::Pitching => 1.0 - self.hitting_split,
        }
    }

    pub fn bench_spots(&self, family: StatFamily) -> usize {
        match family {
            StatFamily::Hitting => self.hitting_bench_spots,
            StatFamily::Pitching => self.pitching_bench_spots,
        }
    }
}

/// League-wide "rest of the roster" line used to weight rate categories.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateBaseline {
    pub at_bats: f64,
    pub hits: f64,
    pub innings: f64,
    pub earned_runs: f64,
    /// Hits plus walks allowed.
    pub baserunners: f64,
}

impl RateBaseline {
    pub fn average(&self) -> f64 {
        self.hits / self.at_bats
    }

    pub fn era(&self) -> f64 {
        9.0 * self.earned_runs / self.innings
    }

    pub fn whip(&self) -> f64 {
        self.baserunners / self.innings
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/pipeline.toml` and
/// `config/formats.toml`, relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let pipeline_path = config_dir.join("pipeline.toml");
    let pipeline_text = read_file(&pipeline_path)?;
    let pipeline: PipelineFile =
        toml::from_str(&pipeline_text).map_err(|e| ConfigError::ParseError {
            path: pipeline_path.clone(),
            source: e,
        })?;

    let formats_path = config_dir.join("formats.toml");
    let formats_text = read_file(&formats_path)?;
    let formats_file: FormatsFile =
        toml::from_str(&formats_text).map_err(|e| ConfigError::ParseError {
            path: formats_path.clone(),
            source: e,
        })?;

    let formats = formats_file
        .formats
        .into_iter()
        .map(|(id, mut format)| {
            format.id = id.clone();
            (id, format)
        })
        .collect();

    let config = Config {
        blend: pipeline.blend,
        data_paths: pipeline.data_paths,
        db_path: pipeline.output.db_path,
        formats,
    };

    validate(&config)?;

    Ok(config)
}

/// Copy any config file missing from `config/` out of `defaults/`.
/// Existing files are never overwritten. Returns the files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target = config_dir.join(file_name);
        if target.exists() {
            continue;
        }
        std::fs::copy(&path, &target).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to copy {} to {}: {e}", path.display(), target.display()),
        })?;
        copied.push(target);
    }
    copied.sort();

    Ok(copied)
}

/// Seed missing config files from defaults, then load from `base_dir`.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Roster keys the replacement resolver knows how to fill.
pub const ROSTER_KEYS: &[&str] = &[
    "C", "1B", "2B", "3B", "SS", "OF", "MI", "CI", "UT", "SP", "RP", "P",
];

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.blend.rate_systems.is_empty() {
        return Err(invalid("blend.rate_systems", "must list at least one system"));
    }
    if config.blend.playing_time_systems.is_empty() {
        return Err(invalid(
            "blend.playing_time_systems",
            "must list at least one system",
        ));
    }
    if config.formats.is_empty() {
        return Err(invalid("formats", "at least one format must be configured"));
    }
    for format in config.formats.values() {
        validate_format(format)?;
    }
    Ok(())
}

/// Validate a single format table. Public so callers that build formats in
/// code get the same checks as file-loaded ones.
pub fn validate_format(format: &FormatConfig) -> Result<(), ConfigError> {
    let field = |name: &str| format!("formats.{}.{}", format.id, name);

    if format.num_teams == 0 {
        return Err(invalid(field("num_teams"), "must be greater than 0"));
    }

    let standings = &format.standings;
    if standings.band_low() == 0 || standings.band_low() > standings.band_high() {
        return Err(invalid(
            field("standings.contention_band"),
            format!(
                "must be an increasing range starting at 1 or above, got {:?}",
                standings.contention_band
            ),
        ));
    }
    if standings.band_high() as usize > format.num_teams {
        return Err(invalid(
            field("standings.contention_band"),
            format!(
                "upper rank {} exceeds num_teams {}",
                standings.band_high(),
                format.num_teams
            ),
        ));
    }
    if standings.points_per_rank <= 0.0 || !standings.points_per_rank.is_finite() {
        return Err(invalid(
            field("standings.points_per_rank"),
            format!("must be > 0, got {}", standings.points_per_rank),
        ));
    }

    let budget = &format.budget;
    if budget.per_team <= 0.0 {
        return Err(invalid(
            field("budget.per_team"),
            format!("must be > 0, got {}", budget.per_team),
        ));
    }
    if !(0.0..=1.0).contains(&budget.hitting_split) {
        return Err(invalid(
            field("budget.hitting_split"),
            format!("must be between 0.0 and 1.0 inclusive, got {}", budget.hitting_split),
        ));
    }
    if budget.bench_min_bid < 0.0 {
        return Err(invalid(
            field("budget.bench_min_bid"),
            format!("must be >= 0, got {}", budget.bench_min_bid),
        ));
    }

    let b = &format.baseline;
    let baseline_fields: &[(&str, f64)] = &[
        ("baseline.at_bats", b.at_bats),
        ("baseline.hits", b.hits),
        ("baseline.innings", b.innings),
        ("baseline.earned_runs", b.earned_runs),
        ("baseline.baserunners", b.baserunners),
    ];
    for (name, val) in baseline_fields {
        if *val <= 0.0 || !val.is_finite() {
            return Err(invalid(field(name), format!("must be > 0, got {val}")));
        }
    }

    for key in format.roster.keys() {
        if !ROSTER_KEYS.contains(&key.to_uppercase().as_str()) {
            return Err(invalid(
                field("roster"),
                format!("unknown roster slot `{key}`"),
            ));
        }
    }
    if format.roster.values().all(|&n| n == 0) {
        return Err(invalid(field("roster"), "must contain at least one slot"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
