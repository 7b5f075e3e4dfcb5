// Pipeline orchestration.
//
// Stage order per format:
//   identity -> blend -> (conversion, independent) -> score -> waterfall
//   -> auction -> ranking
//
// Blending and each format's conversion factors do not depend on each other
// and run as parallel blocking tasks. Each format is then valued in its own
// task; formats share only read-only inputs and fail independently. Storing
// and exporting one format's output likewise never stops the others.

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{validate_format, BlendConfig, Config, ConfigError, FormatConfig};
use crate::db::MartStore;
use crate::export::write_rankings_csv;
use crate::model::category::StatFamily;
use crate::model::player::AdpEntry;
use crate::snapshot::{AdpSelector, Snapshot};
use crate::valuation::auction::{compute_budget, dollar_value, AuctionBudget, AuctionError};
use crate::valuation::blend::{blend_family, BlendedProjection};
use crate::valuation::conversion::{compute_factors, ConversionFactors};
use crate::valuation::identity::IdentityResolver;
use crate::valuation::ranking::{rank_players, select_adp, PlayerValuation, RankingRow};
use crate::valuation::replacement::{run_waterfall, Pool, ReplacementLevel};
use crate::valuation::sgp::{score_players, ScoreError};
use crate::valuation::Diagnostic;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Conditions that abort one format's run. No partial output is produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("[{format}] format is not configured")]
    UnknownFormat { format: String },

    #[error("[{format}] invalid format configuration: {source}")]
    InvalidFormat {
        format: String,
        #[source]
        source: ConfigError,
    },

    #[error("[{format}] no {family} players survived blending")]
    EmptyPool { format: String, family: StatFamily },

    #[error("[{format}] every {family} conversion factor is undefined")]
    NoConversionFactors { format: String, family: StatFamily },

    #[error("[{format}] scoring failed: {source}")]
    Score {
        format: String,
        #[source]
        source: ScoreError,
    },

    #[error("[{format}] dollar conversion failed: {source}")]
    Auction {
        format: String,
        #[source]
        source: AuctionError,
    },

    #[error("[{format}] pipeline task failed: {message}")]
    Task { format: String, message: String },

    #[error("[{format}] failed to persist output: {message}")]
    Persist { format: String, message: String },
}

impl PipelineError {
    pub fn format(&self) -> &str {
        match self {
            PipelineError::UnknownFormat { format }
            | PipelineError::InvalidFormat { format, .. }
            | PipelineError::EmptyPool { format, .. }
            | PipelineError::NoConversionFactors { format, .. }
            | PipelineError::Score { format, .. }
            | PipelineError::Auction { format, .. }
            | PipelineError::Task { format, .. }
            | PipelineError::Persist { format, .. } => format,
        }
    }
}

// ---------------------------------------------------------------------------
// Stage outputs
// ---------------------------------------------------------------------------

/// Format-independent blend of a snapshot.
#[derive(Debug, Clone, Default)]
pub struct BlendedSnapshot {
    pub hitting: Vec<BlendedProjection>,
    pub pitching: Vec<BlendedProjection>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BlendedSnapshot {
    pub fn family(&self, family: StatFamily) -> &[BlendedProjection] {
        match family {
            StatFamily::Hitting => &self.hitting,
            StatFamily::Pitching => &self.pitching,
        }
    }
}

/// Everything one successful format run produces.
#[derive(Debug, Clone)]
pub struct FormatRun {
    pub format: String,
    /// Ordered by dollar value descending.
    pub rows: Vec<RankingRow>,
    pub factors: ConversionFactors,
    /// Hitting pools then pitching pools, each in fill order.
    pub replacement_levels: Vec<ReplacementLevel>,
    pub budgets: Vec<AuctionBudget>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A format's result from [`run_all`].
#[derive(Debug)]
pub struct FormatOutcome {
    pub format: String,
    pub result: Result<FormatRun, PipelineError>,
}

// ---------------------------------------------------------------------------
// Synchronous stages
// ---------------------------------------------------------------------------

/// Resolve identities and blend both families.
pub fn blend_snapshot(snapshot: &Snapshot, config: &BlendConfig) -> BlendedSnapshot {
    let resolver = IdentityResolver::new(&snapshot.id_map);
    if resolver.is_empty() {
        warn!("Identity crosswalk is empty; every projection row will be unmapped");
    } else {
        info!("Resolved {} identity mappings", resolver.len());
    }
    let hitting = blend_family(&snapshot.hitting, StatFamily::Hitting, &resolver, config);
    let pitching = blend_family(&snapshot.pitching, StatFamily::Pitching, &resolver, config);

    info!(
        "Blended {} hitters and {} pitchers",
        hitting.projections.len(),
        pitching.projections.len()
    );

    let mut diagnostics = hitting.diagnostics;
    diagnostics.extend(pitching.diagnostics);
    BlendedSnapshot {
        hitting: hitting.projections,
        pitching: pitching.projections,
        diagnostics,
    }
}

/// Conversion factors for one format from the snapshot's standings.
pub fn format_factors(snapshot: &Snapshot, format: &FormatConfig) -> ConversionFactors {
    compute_factors(format, &snapshot.standings_for(&format.id))
}

/// Score, resolve replacement, price, and rank one format.
pub fn run_format(
    blended: &BlendedSnapshot,
    factors: &ConversionFactors,
    adp: &[AdpEntry],
    format: &FormatConfig,
    selector: AdpSelector,
) -> Result<FormatRun, PipelineError> {
    let id = format.id.clone();
    validate_format(format).map_err(|source| PipelineError::InvalidFormat {
        format: id.clone(),
        source,
    })?;

    let mut diagnostics = blended.diagnostics.clone();
    for category in factors.degenerate() {
        diagnostics.push(Diagnostic::DegenerateConversionFactor {
            format: id.clone(),
            category,
        });
    }

    let mut valuations = Vec::new();
    let mut replacement_levels = Vec::new();
    let mut budgets = Vec::new();

    for family in [StatFamily::Hitting, StatFamily::Pitching] {
        let projections = blended.family(family);
        if projections.is_empty() {
            return Err(PipelineError::EmptyPool {
                format: id.clone(),
                family,
            });
        }
        if !factors.any_defined(family) {
            return Err(PipelineError::NoConversionFactors {
                format: id.clone(),
                family,
            });
        }

        let scores = score_players(projections, factors, &format.baseline).map_err(|source| {
            PipelineError::Score {
                format: id.clone(),
                source,
            }
        })?;

        let waterfall = run_waterfall(
            &scores,
            family,
            Pool::default_priority(family),
            format.num_teams,
            &format.roster,
        );
        for pool in waterfall.undefined_pools() {
            warn!("[{}] replacement level undefined for pool {}", id, pool);
            diagnostics.push(Diagnostic::UndefinedReplacementLevel {
                format: id.clone(),
                pool: pool.code().to_string(),
            });
        }

        let references: Vec<Option<(Pool, f64)>> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| waterfall.reference(i, &s.projection.tags))
            .collect();
        let sgpars: Vec<Option<f64>> = scores
            .iter()
            .zip(&references)
            .map(|(s, r)| r.map(|(_, level)| s.total - level))
            .collect();

        let budget = compute_budget(&sgpars, format, family).map_err(|source| {
            PipelineError::Auction {
                format: id.clone(),
                source,
            }
        })?;
        info!(
            "[{}] {}: {} players, ${:.2} over {:.3} surplus points (${:.4}/pt)",
            id,
            family,
            scores.len(),
            budget.discretionary,
            budget.surplus,
            budget.dollars_per_point
        );

        for (i, score) in scores.into_iter().enumerate() {
            let sgpar = sgpars[i];
            valuations.push(PlayerValuation {
                assigned_pool: waterfall.assignments[i],
                reference_pool: references[i].map(|(pool, _)| pool),
                replacement_level: references[i].map(|(_, level)| level),
                sgpar,
                dollar_value: dollar_value(sgpar, &budget),
                score,
            });
        }
        replacement_levels.extend(waterfall.levels);
        budgets.push(budget);
    }

    let market = select_adp(adp, &id, selector);
    let rows = rank_players(valuations, &market);
    info!(
        "[{}] ranked {} rows ({} with ADP, {} diagnostics)",
        id,
        rows.len(),
        rows.iter().filter(|r| r.adp.is_some()).count(),
        diagnostics.len()
    );

    Ok(FormatRun {
        format: id,
        rows,
        factors: factors.clone(),
        replacement_levels,
        budgets,
        diagnostics,
    })
}

// ---------------------------------------------------------------------------
// Concurrent runner
// ---------------------------------------------------------------------------

fn task_error(format: &str, e: tokio::task::JoinError) -> PipelineError {
    PipelineError::Task {
        format: format.to_string(),
        message: e.to_string(),
    }
}

/// Run every requested format against one snapshot.
///
/// Outcomes come back in the order `formats` was given. An unknown format id
/// or a failing format yields an error outcome without affecting the rest.
pub async fn run_all(
    snapshot: Arc<Snapshot>,
    config: Arc<Config>,
    formats: &[String],
    selector: AdpSelector,
) -> Vec<FormatOutcome> {
    let blend_task = {
        let snapshot = Arc::clone(&snapshot);
        let blend_config = config.blend.clone();
        tokio::task::spawn_blocking(move || blend_snapshot(&snapshot, &blend_config))
    };

    let mut factor_tasks = Vec::with_capacity(formats.len());
    for requested in formats {
        let found = config
            .formats
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(requested))
            .map(|(_, f)| f.clone());
        let task = found.map(|format| {
            let snapshot = Arc::clone(&snapshot);
            tokio::task::spawn_blocking(move || {
                let factors = format_factors(&snapshot, &format);
                (format, factors)
            })
        });
        factor_tasks.push((requested.clone(), task));
    }

    let blended = match blend_task.await {
        Ok(b) => Arc::new(b),
        Err(e) => {
            error!("blend task failed: {}", e);
            let message = format!("blend task failed: {e}");
            return formats
                .iter()
                .map(|f| FormatOutcome {
                    format: f.clone(),
                    result: Err(PipelineError::Task {
                        format: f.clone(),
                        message: message.clone(),
                    }),
                })
                .collect();
        }
    };

    let mut value_tasks = Vec::with_capacity(factor_tasks.len());
    for (requested, task) in factor_tasks {
        let pending = match task {
            None => Err(PipelineError::UnknownFormat {
                format: requested.clone(),
            }),
            Some(task) => match task.await {
                Ok((format, factors)) => {
                    let blended = Arc::clone(&blended);
                    let snapshot = Arc::clone(&snapshot);
                    Ok(tokio::task::spawn_blocking(move || {
                        run_format(&blended, &factors, &snapshot.adp, &format, selector)
                    }))
                }
                Err(e) => Err(task_error(&requested, e)),
            },
        };
        value_tasks.push((requested, pending));
    }

    let mut outcomes = Vec::with_capacity(value_tasks.len());
    for (requested, pending) in value_tasks {
        let result = match pending {
            Ok(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(task_error(&requested, e)),
            },
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            error!("{}", e);
        }
        outcomes.push(FormatOutcome {
            format: requested,
            result,
        });
    }

    outcomes
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

fn persist_run(store: &MartStore, run: &FormatRun, csv_out: Option<&Path>) -> anyhow::Result<()> {
    store.replace_format(run)?;
    info!(
        "[{}] stored {} rows ({} diagnostics)",
        run.format,
        run.rows.len(),
        run.diagnostics.len()
    );
    if let Some(dir) = csv_out {
        let path = write_rankings_csv(dir, &run.format, &run.rows)?;
        info!("[{}] exported {}", run.format, path.display());
    }
    Ok(())
}

/// Store (and optionally export) every successful outcome and record every
/// failure in the run ledger. Returns the number of formats that failed.
///
/// A storage or export error counts against that format only; the remaining
/// outcomes are still persisted.
pub fn persist_outcomes(
    store: &MartStore,
    outcomes: Vec<FormatOutcome>,
    csv_out: Option<&Path>,
) -> usize {
    let mut failed = 0;
    for outcome in outcomes {
        let failure = match outcome.result {
            Ok(run) => match persist_run(store, &run, csv_out) {
                Ok(()) => continue,
                Err(e) => PipelineError::Persist {
                    format: run.format,
                    message: format!("{e:#}"),
                },
            },
            Err(e) => e,
        };

        failed += 1;
        error!("{}", failure);
        if let Err(e) = store.record_failure(&failure) {
            error!("[{}] failed to record failure: {:#}", outcome.format, e);
        }
    }
    failed
}
