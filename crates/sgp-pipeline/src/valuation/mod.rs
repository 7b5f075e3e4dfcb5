// Valuation engine: blending, SGP conversion, replacement levels, auction
// dollars, and final ranking.

pub mod auction;
pub mod blend;
pub mod conversion;
pub mod identity;
pub mod ranking;
pub mod replacement;
pub mod sgp;

use serde::Serialize;
use std::fmt;

use crate::model::category::{Category, StatFamily};
use crate::model::player::PlayerId;

/// A non-fatal condition observed while valuing a snapshot. Collected per
/// run and persisted with the run ledger for review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A projection row whose source id is absent from the crosswalk.
    MissingIdentityMapping { system: String, source_id: String },
    /// A category whose regression slope is zero or undefined.
    DegenerateConversionFactor { format: String, category: Category },
    /// A configured pool left empty after cascading assignment.
    UndefinedReplacementLevel { format: String, pool: String },
    /// A position tag that matched no known position.
    UnrecognizedPositionTag { player_id: PlayerId, tag: String },
    /// A player dropped from the blend for lack of rate or playing-time data.
    IncompleteProjection {
        player_id: PlayerId,
        family: StatFamily,
        reason: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingIdentityMapping { system, source_id } => {
                write!(f, "no canonical id for {system}/{source_id}")
            }
            Diagnostic::DegenerateConversionFactor { format, category } => {
                write!(f, "[{format}] conversion factor for {category} is undefined")
            }
            Diagnostic::UndefinedReplacementLevel { format, pool } => {
                write!(f, "[{format}] pool {pool} has no qualifying members")
            }
            Diagnostic::UnrecognizedPositionTag { player_id, tag } => {
                write!(f, "unrecognized position tag '{tag}' for {player_id}")
            }
            Diagnostic::IncompleteProjection {
                player_id,
                family,
                reason,
            } => write!(f, "dropped {family} projection for {player_id}: {reason}"),
        }
    }
}
