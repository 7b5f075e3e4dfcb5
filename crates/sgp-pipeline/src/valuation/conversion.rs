// Category conversion engine.
//
// For each category, regress category totals against standings points over
// historical finishes inside the format's contention band. The slope is the
// number of category units worth one standings point. Lower-is-better
// categories are negated first so every slope comes out positive on realistic
// data.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::FormatConfig;
use crate::model::category::{Category, StatFamily};
use crate::model::player::StandingsEntry;

/// One category's conversion factor for one format. `slope` is `None` when
/// the regression is degenerate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionFactor {
    pub format: String,
    pub category: Category,
    pub slope: Option<f64>,
    /// Number of (points, total) observations inside the band.
    pub observations: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionFactors {
    pub factors: BTreeMap<Category, ConversionFactor>,
}

impl ConversionFactors {
    pub fn slope(&self, category: Category) -> Option<f64> {
        self.factors.get(&category).and_then(|f| f.slope)
    }

    /// Categories whose factor is undefined, in category order.
    pub fn degenerate(&self) -> Vec<Category> {
        self.factors
            .values()
            .filter(|f| f.slope.is_none())
            .map(|f| f.category)
            .collect()
    }

    /// True when at least one category of `family` has a usable factor.
    pub fn any_defined(&self, family: StatFamily) -> bool {
        family
            .categories()
            .iter()
            .any(|c| self.slope(*c).is_some())
    }
}

/// Standings points earned by finishing at `rank` in a league of `num_teams`.
pub fn standings_points(rank: f64, num_teams: usize, points_per_rank: f64) -> f64 {
    (num_teams as f64 + 1.0 - rank) * points_per_rank
}

/// Ordinary least-squares slope of y on x.
///
/// `(n*Sxy - Sx*Sy) / (n*Sxx - Sx^2)`. Returns `None` for a zero denominator
/// or a zero or non-finite slope.
pub fn regression_slope(points: &[(f64, f64)]) -> Option<f64> {
    let n = points.len() as f64;
    let (mut sx, mut sy, mut sxy, mut sxx) = (0.0, 0.0, 0.0, 0.0);
    for &(x, y) in points {
        sx += x;
        sy += y;
        sxy += x * y;
        sxx += x * x;
    }

    let denominator = n * sxx - sx * sx;
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }
    let slope = (n * sxy - sx * sy) / denominator;
    if slope == 0.0 || !slope.is_finite() {
        return None;
    }
    Some(slope)
}

/// Compute every category's factor for one format from its standings rows.
pub fn compute_factors(format: &FormatConfig, standings: &[StandingsEntry]) -> ConversionFactors {
    let band = &format.standings;
    let mut factors = BTreeMap::new();

    for &category in Category::ALL {
        let sign = if category.is_inverted() { -1.0 } else { 1.0 };
        let points: Vec<(f64, f64)> = standings
            .iter()
            .filter_map(|entry| entry.category(category))
            .filter(|(_, rank)| band.in_band(*rank))
            .map(|(total, rank)| {
                (
                    standings_points(rank, format.num_teams, band.points_per_rank),
                    sign * total,
                )
            })
            .collect();

        let slope = regression_slope(&points);
        match slope {
            Some(s) => debug!("[{}] {} factor {:.5} over {} rows", format.id, category, s, points.len()),
            None => warn!(
                "[{}] degenerate conversion factor for {} ({} rows in band)",
                format.id,
                category,
                points.len()
            ),
        }

        factors.insert(
            category,
            ConversionFactor {
                format: format.id.clone(),
                category,
                slope,
                observations: points.len(),
            },
        );
    }

    ConversionFactors { factors }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
