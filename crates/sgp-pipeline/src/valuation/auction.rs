// Auction dollar value conversion.
//
// Converts score above replacement (SGPAR) into auction dollars. Each stat
// family gets its share of the league budget, less the money reserved for
// minimum bids on bench spots, and that pool is distributed in proportion to
// positive SGPAR. Every player is worth at least the $1 floor.

use serde::Serialize;
use thiserror::Error;

use crate::config::FormatConfig;
use crate::model::category::StatFamily;

/// Minimum dollar value for any player.
pub const DOLLAR_FLOOR: f64 = 1.0;

#[derive(Debug, Error)]
pub enum AuctionError {
    #[error("{family} discretionary budget is not positive ({budget:.2})")]
    NonPositiveBudget { family: StatFamily, budget: f64 },

    #[error("no {family} player has positive score above replacement")]
    NoSurplus { family: StatFamily },
}

/// Dollar conversion for one family in one format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AuctionBudget {
    pub family: StatFamily,
    /// Family share of all teams' budgets, less bench minimum bids.
    pub discretionary: f64,
    /// Sum of SGPAR over players with positive SGPAR.
    pub surplus: f64,
    pub dollars_per_point: f64,
}

/// `teams * per_team * split - teams * bench_min_bid * bench_spots`.
pub fn discretionary_budget(format: &FormatConfig, family: StatFamily) -> f64 {
    let teams = format.num_teams as f64;
    let budget = &format.budget;
    teams * budget.per_team * budget.split(family)
        - teams * budget.bench_min_bid * budget.bench_spots(family) as f64
}

/// Derive dollars per point from a family's SGPAR values.
pub fn compute_budget(
    sgpars: &[Option<f64>],
    format: &FormatConfig,
    family: StatFamily,
) -> Result<AuctionBudget, AuctionError> {
    let discretionary = discretionary_budget(format, family);
    if discretionary <= 0.0 || !discretionary.is_finite() {
        return Err(AuctionError::NonPositiveBudget {
            family,
            budget: discretionary,
        });
    }

    let surplus: f64 = sgpars.iter().flatten().filter(|s| **s > 0.0).sum();
    if surplus <= 0.0 {
        return Err(AuctionError::NoSurplus { family });
    }

    Ok(AuctionBudget {
        family,
        discretionary,
        surplus,
        dollars_per_point: discretionary / surplus,
    })
}

/// `max($1, sgpar * dollars_per_point + $1)`. Missing SGPAR gets the floor.
pub fn dollar_value(sgpar: Option<f64>, budget: &AuctionBudget) -> f64 {
    match sgpar {
        Some(s) => (s * budget.dollars_per_point + DOLLAR_FLOOR).max(DOLLAR_FLOOR),
        None => DOLLAR_FLOOR,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::test_support::small_format;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn discretionary_budget_per_family() {
        let format = small_format();
        // 2 teams * $100 * 0.6 - 2 * $1 * 2 bench = 120 - 4 = 116
        assert!(approx_eq(discretionary_budget(&format, StatFamily::Hitting), 116.0, 1e-9));
        // 2 * 100 * 0.4 - 2 * 1 * 1 = 80 - 2 = 78
        assert!(approx_eq(discretionary_budget(&format, StatFamily::Pitching), 78.0, 1e-9));
    }

    #[test]
    fn dollars_per_point_uses_positive_sgpar_only() {
        let format = small_format();
        let sgpars = [Some(4.0), Some(2.0), Some(-3.0), None, Some(0.0)];
        let budget = compute_budget(&sgpars, &format, StatFamily::Hitting).unwrap();
        assert!(approx_eq(budget.surplus, 6.0, 1e-12));
        assert!(approx_eq(budget.dollars_per_point, 116.0 / 6.0, 1e-12));
    }

    #[test]
    fn floor_boundary() {
        let format = small_format();
        let budget = compute_budget(&[Some(5.0)], &format, StatFamily::Hitting).unwrap();
        assert_eq!(dollar_value(Some(0.0), &budget), 1.0);
        assert_eq!(dollar_value(Some(-2.5), &budget), 1.0);
        assert_eq!(dollar_value(None, &budget), 1.0);
        assert!(dollar_value(Some(0.01), &budget) > 1.0);
    }

    #[test]
    fn positive_values_sum_to_budget_plus_floor() {
        let format = small_format();
        let sgpars = [Some(4.0), Some(2.0), Some(1.0), Some(-1.0), None];
        let budget = compute_budget(&sgpars, &format, StatFamily::Hitting).unwrap();
        let total: f64 = sgpars.iter().map(|s| dollar_value(*s, &budget)).sum();
        let expected = budget.discretionary + sgpars.len() as f64 * DOLLAR_FLOOR;
        assert!(approx_eq(total, expected, 1e-9), "{total} vs {expected}");
    }

    #[test]
    fn no_surplus_is_an_error() {
        let format = small_format();
        let err = compute_budget(&[Some(-1.0), None], &format, StatFamily::Pitching).unwrap_err();
        assert!(matches!(err, AuctionError::NoSurplus { .. }));
    }

    #[test]
    fn non_positive_budget_is_an_error() {
        let mut format = small_format();
        format.budget.bench_min_bid = 100.0;
        let err = compute_budget(&[Some(1.0)], &format, StatFamily::Hitting).unwrap_err();
        assert!(matches!(err, AuctionError::NonPositiveBudget { .. }));
    }
}
