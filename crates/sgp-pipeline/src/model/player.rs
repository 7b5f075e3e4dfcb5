// Input records and player identity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::category::{Category, Stat, StatFamily};

/// Canonical player identifier shared by every pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        PlayerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display fields carried alongside the canonical id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub id: PlayerId,
    pub name: String,
    pub team: String,
    /// Raw eligibility string, e.g. "2B,SS".
    pub positions: String,
}

/// One projection system's season line for one player.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionRecord {
    pub system: String,
    pub source_id: String,
    pub name: String,
    pub team: String,
    pub positions: String,
    pub family: StatFamily,
    /// PA for hitters, IP for pitchers.
    pub playing_time: f64,
    pub stats: BTreeMap<Stat, f64>,
}

impl ProjectionRecord {
    pub fn stat(&self, stat: Stat) -> f64 {
        self.stats.get(&stat).copied().unwrap_or(0.0)
    }
}

/// Crosswalk row: a source system's id for a canonical player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMapping {
    pub system: String,
    pub source_id: String,
    pub player_id: PlayerId,
}

/// One team's final line in one historical league instance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StandingsEntry {
    pub format: String,
    pub league_id: String,
    pub team: String,
    pub totals: BTreeMap<Category, f64>,
    /// Finish rank; tied teams share a fractional rank (e.g. 2.5).
    pub ranks: BTreeMap<Category, f64>,
}

impl StandingsEntry {
    /// Total and finish rank for a category, when both are present.
    pub fn category(&self, category: Category) -> Option<(f64, f64)> {
        let total = self.totals.get(&category)?;
        let rank = self.ranks.get(&category)?;
        Some((*total, *rank))
    }
}

/// Average draft position for one player in one format on one snapshot date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdpEntry {
    pub format: String,
    pub player_id: PlayerId,
    pub adp: f64,
    pub min_pick: Option<u32>,
    pub max_pick: Option<u32>,
    pub snapshot: NaiveDate,
}
