// Player performance converter.
//
// Turns a blended projection into standings points gained (SGP) per category.
// Counting categories divide the projected total by the category factor. Rate
// categories merge the player's line into a league baseline roster and score
// the change in the team rate, so low-volume players are not over-weighted.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::RateBaseline;
use crate::model::category::{Category, Stat, StatFamily};
use crate::model::player::PlayerId;
use crate::model::position::positional_adjustment;
use crate::valuation::blend::BlendedProjection;
use crate::valuation::conversion::ConversionFactors;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("non-finite score for {player_id} ({family})")]
    NonFiniteScore {
        player_id: PlayerId,
        family: StatFamily,
    },
}

/// A player's per-category SGP and total score.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerScore {
    pub projection: BlendedProjection,
    /// `None` where the category's conversion factor is undefined.
    pub contributions: BTreeMap<Category, Option<f64>>,
    /// Flex penalty / multi-position bonus applied to the total.
    pub adjustment: f64,
    pub total: f64,
}

impl PlayerScore {
    pub fn player_id(&self) -> &PlayerId {
        self.projection.player_id()
    }

    pub fn family(&self) -> StatFamily {
        self.projection.family
    }

    pub fn contribution(&self, category: Category) -> Option<f64> {
        self.contributions.get(&category).copied().flatten()
    }
}

/// Category value the factor divides: the projected counting total, or the
/// baseline-weighted rate delta (positive is good for every category).
pub fn category_value(p: &BlendedProjection, category: Category, b: &RateBaseline) -> f64 {
    match category {
        Category::Runs => p.stat(Stat::Runs),
        Category::HomeRuns => p.stat(Stat::HomeRuns),
        Category::RunsBattedIn => p.stat(Stat::RunsBattedIn),
        Category::StolenBases => p.stat(Stat::StolenBases),
        Category::Wins => p.stat(Stat::Wins),
        Category::Saves => p.stat(Stat::Saves),
        Category::Strikeouts => p.stat(Stat::Strikeouts),
        Category::Average => {
            let with_player = (b.hits + p.stat(Stat::Hits)) / (b.at_bats + p.stat(Stat::AtBats));
            with_player - b.average()
        }
        Category::Era => {
            let with_player =
                9.0 * (b.earned_runs + p.stat(Stat::EarnedRuns)) / (b.innings + p.playing_time);
            b.era() - with_player
        }
        Category::Whip => {
            let allowed = p.stat(Stat::HitsAllowed) + p.stat(Stat::WalksAllowed);
            let with_player = (b.baserunners + allowed) / (b.innings + p.playing_time);
            b.whip() - with_player
        }
    }
}

/// Score one player against a format's factors and baseline.
pub fn score_player(
    projection: &BlendedProjection,
    factors: &ConversionFactors,
    baseline: &RateBaseline,
) -> PlayerScore {
    let contributions: BTreeMap<Category, Option<f64>> = projection
        .family
        .categories()
        .iter()
        .map(|&cat| {
            let sgp = factors
                .slope(cat)
                .map(|slope| category_value(projection, cat, baseline) / slope);
            (cat, sgp)
        })
        .collect();

    let adjustment = positional_adjustment(&projection.identity.positions, projection.family);
    let total = contributions.values().flatten().sum::<f64>() + adjustment;

    PlayerScore {
        projection: projection.clone(),
        contributions,
        adjustment,
        total,
    }
}

/// Score a full family pool. Any non-finite total aborts the pool.
pub fn score_players(
    projections: &[BlendedProjection],
    factors: &ConversionFactors,
    baseline: &RateBaseline,
) -> Result<Vec<PlayerScore>, ScoreError> {
    projections
        .iter()
        .map(|p| {
            let score = score_player(p, factors, baseline);
            if score.total.is_finite() {
                Ok(score)
            } else {
                Err(ScoreError::NonFiniteScore {
                    player_id: p.player_id().clone(),
                    family: p.family,
                })
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::player::PlayerIdentity;
    use crate::model::position::{PositionTags, FLEX_ONLY_PENALTY, MULTI_POSITION_BONUS};
    use crate::valuation::conversion::ConversionFactor;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn baseline() -> RateBaseline {
        RateBaseline {
            at_bats: 5000.0,
            hits: 1300.0,
            innings: 1200.0,
            earned_runs: 480.0,
            baserunners: 1440.0,
        }
    }

    fn factors(slopes: &[(Category, Option<f64>)]) -> ConversionFactors {
        ConversionFactors {
            factors: slopes
                .iter()
                .map(|&(category, slope)| {
                    (
                        category,
                        ConversionFactor {
                            format: "test".into(),
                            category,
                            slope,
                            observations: 8,
                        },
                    )
                })
                .collect(),
        }
    }

    fn projection(family: StatFamily, pos: &str, pt: f64, stats: &[(Stat, f64)]) -> BlendedProjection {
        BlendedProjection {
            identity: PlayerIdentity {
                id: PlayerId::new("p1"),
                name: "Test".into(),
                team: "TST".into(),
                positions: pos.into(),
            },
            family,
            tags: PositionTags::parse(pos, family),
            playing_time: pt,
            rates: BTreeMap::new(),
            stats: stats.iter().copied().collect(),
            rate_systems: vec!["steamer".into()],
        }
    }

    #[test]
    fn counting_contribution_divides_by_slope() {
        let p = projection(StatFamily::Hitting, "1B", 600.0, &[(Stat::HomeRuns, 30.0)]);
        let f = factors(&[(Category::HomeRuns, Some(10.0))]);
        let score = score_player(&p, &f, &baseline());
        assert!(approx_eq(score.contribution(Category::HomeRuns).unwrap(), 3.0, 1e-12));
    }

    #[test]
    fn average_uses_weighted_baseline() {
        // Baseline .260 on 5000 AB; player .300 on 500 AB.
        let p = projection(
            StatFamily::Hitting,
            "OF",
            550.0,
            &[(Stat::AtBats, 500.0), (Stat::Hits, 150.0)],
        );
        let f = factors(&[(Category::Average, Some(0.002))]);
        let score = score_player(&p, &f, &baseline());
        let expected = ((1300.0 + 150.0) / 5500.0 - 0.26) / 0.002;
        assert!(approx_eq(score.contribution(Category::Average).unwrap(), expected, 1e-9));
        assert!(expected > 0.0);
    }

    #[test]
    fn zero_at_bats_average_contributes_nothing() {
        let p = projection(StatFamily::Hitting, "C", 0.0, &[]);
        let f = factors(&[(Category::Average, Some(0.002))]);
        let score = score_player(&p, &f, &baseline());
        assert!(approx_eq(score.contribution(Category::Average).unwrap(), 0.0, 1e-12));
    }

    #[test]
    fn good_era_and_whip_score_positive() {
        // 180 IP, 54 ER (2.70 ERA), 180 baserunners (1.00 WHIP) vs 3.60 / 1.20 baseline.
        let p = projection(
            StatFamily::Pitching,
            "SP",
            180.0,
            &[
                (Stat::EarnedRuns, 54.0),
                (Stat::HitsAllowed, 140.0),
                (Stat::WalksAllowed, 40.0),
            ],
        );
        let f = factors(&[(Category::Era, Some(0.1)), (Category::Whip, Some(0.02))]);
        let score = score_player(&p, &f, &baseline());

        let era_delta = 3.6 - 9.0 * (480.0 + 54.0) / 1380.0;
        let whip_delta = 1.2 - (1440.0 + 180.0) / 1380.0;
        assert!(approx_eq(score.contribution(Category::Era).unwrap(), era_delta / 0.1, 1e-9));
        assert!(approx_eq(score.contribution(Category::Whip).unwrap(), whip_delta / 0.02, 1e-9));
        assert!(score.contribution(Category::Era).unwrap() > 0.0);
        assert!(score.contribution(Category::Whip).unwrap() > 0.0);
    }

    #[test]
    fn null_factor_propagates_and_is_skipped_in_total() {
        let p = projection(
            StatFamily::Hitting,
            "1B",
            600.0,
            &[(Stat::HomeRuns, 30.0), (Stat::Runs, 90.0)],
        );
        let f = factors(&[(Category::HomeRuns, Some(10.0)), (Category::Runs, None)]);
        let score = score_player(&p, &f, &baseline());
        assert_eq!(score.contributions[&Category::Runs], None);
        assert!(approx_eq(score.total, 3.0, 1e-12));
        // Categories absent from the factor table are null too.
        assert_eq!(score.contributions[&Category::StolenBases], None);
    }

    #[test]
    fn positional_adjustment_applied_to_total() {
        let f = factors(&[(Category::HomeRuns, Some(10.0))]);
        let flex = projection(StatFamily::Hitting, "DH", 600.0, &[(Stat::HomeRuns, 30.0)]);
        let multi = projection(StatFamily::Hitting, "2B,SS", 600.0, &[(Stat::HomeRuns, 30.0)]);
        let single = projection(StatFamily::Hitting, "SS", 600.0, &[(Stat::HomeRuns, 30.0)]);

        assert!(approx_eq(score_player(&flex, &f, &baseline()).total, 3.0 + FLEX_ONLY_PENALTY, 1e-12));
        assert!(approx_eq(score_player(&multi, &f, &baseline()).total, 3.0 + MULTI_POSITION_BONUS, 1e-12));
        assert!(approx_eq(score_player(&single, &f, &baseline()).total, 3.0, 1e-12));
    }

    #[test]
    fn pitcher_flex_tag_on_a_hitter_is_not_penalized() {
        let f = factors(&[(Category::HomeRuns, Some(10.0))]);
        let hitter = projection(StatFamily::Hitting, "P", 600.0, &[(Stat::HomeRuns, 30.0)]);
        let score = score_player(&hitter, &f, &baseline());
        assert_eq!(score.adjustment, 0.0);
        assert!(approx_eq(score.total, 3.0, 1e-12));

        let pitcher = projection(StatFamily::Pitching, "P", 60.0, &[]);
        assert_eq!(score_player(&pitcher, &f, &baseline()).adjustment, FLEX_ONLY_PENALTY);
    }

    #[test]
    fn counting_categories_read_their_own_stat() {
        let pitcher = projection(
            StatFamily::Pitching,
            "RP",
            65.0,
            &[(Stat::Wins, 4.0), (Stat::Saves, 32.0), (Stat::Strikeouts, 80.0)],
        );
        let b = baseline();
        assert_eq!(category_value(&pitcher, Category::Wins, &b), 4.0);
        assert_eq!(category_value(&pitcher, Category::Saves, &b), 32.0);
        assert_eq!(category_value(&pitcher, Category::Strikeouts, &b), 80.0);
        assert_eq!(category_value(&pitcher, Category::Runs, &b), 0.0);
    }

    #[test]
    fn non_finite_total_is_an_error() {
        let p = projection(StatFamily::Hitting, "1B", 600.0, &[(Stat::HomeRuns, f64::INFINITY)]);
        let f = factors(&[(Category::HomeRuns, Some(10.0))]);
        let err = score_players(&[p], &f, &baseline()).unwrap_err();
        assert!(matches!(err, ScoreError::NonFiniteScore { .. }));
    }
}
