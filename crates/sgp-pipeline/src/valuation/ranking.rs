// Final ranking and ADP signal merge.
//
// Hitters and pitchers of one format are ranked together by dollar value
// (dense rank, so equal values share a rank). ADP from the selected snapshot
// is joined by canonical id and compared with the model rank.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::category::{Category, Stat, StatFamily};
use crate::model::player::{AdpEntry, PlayerId};
use crate::snapshot::AdpSelector;
use crate::valuation::replacement::Pool;
use crate::valuation::sgp::PlayerScore;

/// A scored player with replacement level and dollars attached.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerValuation {
    pub score: PlayerScore,
    /// Pool the waterfall placed the player in, if any.
    pub assigned_pool: Option<Pool>,
    /// Pool whose replacement level SGPAR is measured against.
    pub reference_pool: Option<Pool>,
    pub replacement_level: Option<f64>,
    pub sgpar: Option<f64>,
    pub dollar_value: f64,
}

/// One row of a format's output table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRow {
    pub rank: u32,
    pub player_id: PlayerId,
    pub name: String,
    pub team: String,
    pub pos: String,
    pub pos_group: String,
    pub family: String,
    pub playing_time: f64,
    pub avg: Option<f64>,
    pub r: Option<f64>,
    pub hr: Option<f64>,
    pub rbi: Option<f64>,
    pub sb: Option<f64>,
    pub w: Option<f64>,
    pub sv: Option<f64>,
    pub k: Option<f64>,
    pub era: Option<f64>,
    pub whip: Option<f64>,
    pub sgp_r: Option<f64>,
    pub sgp_hr: Option<f64>,
    pub sgp_rbi: Option<f64>,
    pub sgp_sb: Option<f64>,
    pub sgp_avg: Option<f64>,
    pub sgp_w: Option<f64>,
    pub sgp_sv: Option<f64>,
    pub sgp_k: Option<f64>,
    pub sgp_era: Option<f64>,
    pub sgp_whip: Option<f64>,
    pub sgp: f64,
    pub pool: Option<String>,
    pub replacement_level: Option<f64>,
    pub sgpar: Option<f64>,
    pub value: f64,
    pub adp: Option<f64>,
    pub min_pick: Option<u32>,
    pub max_pick: Option<u32>,
    /// ADP minus rank: positive when the market drafts later than the model.
    pub rank_diff: Option<f64>,
}

/// Output column names, in [`RankingRow`] field order.
pub const RANKING_COLUMNS: &[&str] = &[
    "rank",
    "player_id",
    "name",
    "team",
    "pos",
    "pos_group",
    "family",
    "playing_time",
    "avg",
    "r",
    "hr",
    "rbi",
    "sb",
    "w",
    "sv",
    "k",
    "era",
    "whip",
    "sgp_r",
    "sgp_hr",
    "sgp_rbi",
    "sgp_sb",
    "sgp_avg",
    "sgp_w",
    "sgp_sv",
    "sgp_k",
    "sgp_era",
    "sgp_whip",
    "sgp",
    "pool",
    "replacement_level",
    "sgpar",
    "value",
    "adp",
    "min_pick",
    "max_pick",
    "rank_diff",
];

fn ratio(num: f64, den: f64) -> Option<f64> {
    if den > 0.0 {
        Some(num / den)
    } else {
        None
    }
}

/// ADP rows for `format` from the snapshot chosen by `selector`, by player.
pub fn select_adp(
    adp: &[AdpEntry],
    format: &str,
    selector: AdpSelector,
) -> HashMap<PlayerId, AdpEntry> {
    let in_format: Vec<&AdpEntry> = adp
        .iter()
        .filter(|e| e.format.eq_ignore_ascii_case(format))
        .collect();
    let Some(date) = selector.select(in_format.iter().map(|e| e.snapshot)) else {
        return HashMap::new();
    };
    in_format
        .into_iter()
        .filter(|e| e.snapshot == date)
        .map(|e| (e.player_id.clone(), e.clone()))
        .collect()
}

fn stat_line(v: &PlayerValuation, row: &mut RankingRow) {
    let p = &v.score.projection;
    let family_stat = |cat: Category| cat.counting_stat().map(|s| p.stat(s));
    match p.family {
        StatFamily::Hitting => {
            row.avg = ratio(p.stat(Stat::Hits), p.stat(Stat::AtBats));
            row.r = family_stat(Category::Runs);
            row.hr = family_stat(Category::HomeRuns);
            row.rbi = family_stat(Category::RunsBattedIn);
            row.sb = family_stat(Category::StolenBases);
        }
        StatFamily::Pitching => {
            row.w = family_stat(Category::Wins);
            row.sv = family_stat(Category::Saves);
            row.k = family_stat(Category::Strikeouts);
            row.era = ratio(9.0 * p.stat(Stat::EarnedRuns), p.playing_time);
            row.whip = ratio(
                p.stat(Stat::HitsAllowed) + p.stat(Stat::WalksAllowed),
                p.playing_time,
            );
        }
    }
    let s = &v.score;
    row.sgp_r = s.contribution(Category::Runs);
    row.sgp_hr = s.contribution(Category::HomeRuns);
    row.sgp_rbi = s.contribution(Category::RunsBattedIn);
    row.sgp_sb = s.contribution(Category::StolenBases);
    row.sgp_avg = s.contribution(Category::Average);
    row.sgp_w = s.contribution(Category::Wins);
    row.sgp_sv = s.contribution(Category::Saves);
    row.sgp_k = s.contribution(Category::Strikeouts);
    row.sgp_era = s.contribution(Category::Era);
    row.sgp_whip = s.contribution(Category::Whip);
}

fn output_order(a: &PlayerValuation, b: &PlayerValuation) -> Ordering {
    b.dollar_value
        .partial_cmp(&a.dollar_value)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.score
                .total
                .partial_cmp(&a.score.total)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.score.player_id().cmp(b.score.player_id()))
        .then_with(|| a.score.family().cmp(&b.score.family()))
}

/// Order, dense-rank, and join ADP onto a format's valuations.
pub fn rank_players(
    mut valuations: Vec<PlayerValuation>,
    adp: &HashMap<PlayerId, AdpEntry>,
) -> Vec<RankingRow> {
    valuations.sort_by(output_order);

    let mut rows = Vec::with_capacity(valuations.len());
    let mut rank = 0u32;
    let mut previous: Option<f64> = None;

    for v in &valuations {
        if previous != Some(v.dollar_value) {
            rank += 1;
            previous = Some(v.dollar_value);
        }

        let p = &v.score.projection;
        let pos_group = v
            .assigned_pool
            .or(v.reference_pool)
            .map(|pool| pool.code().to_string())
            .unwrap_or_else(|| p.tags.primary(p.family).display_str().to_string());
        let market = adp.get(p.player_id());

        let mut row = RankingRow {
            rank,
            player_id: p.player_id().clone(),
            name: p.identity.name.clone(),
            team: p.identity.team.clone(),
            pos: p.identity.positions.clone(),
            pos_group,
            family: p.family.code().to_string(),
            playing_time: p.playing_time,
            avg: None,
            r: None,
            hr: None,
            rbi: None,
            sb: None,
            w: None,
            sv: None,
            k: None,
            era: None,
            whip: None,
            sgp_r: None,
            sgp_hr: None,
            sgp_rbi: None,
            sgp_sb: None,
            sgp_avg: None,
            sgp_w: None,
            sgp_sv: None,
            sgp_k: None,
            sgp_era: None,
            sgp_whip: None,
            sgp: v.score.total,
            pool: v.assigned_pool.map(|pool| pool.code().to_string()),
            replacement_level: v.replacement_level,
            sgpar: v.sgpar,
            value: v.dollar_value,
            adp: market.map(|m| m.adp),
            min_pick: market.and_then(|m| m.min_pick),
            max_pick: market.and_then(|m| m.max_pick),
            rank_diff: market.map(|m| m.adp - rank as f64),
        };
        stat_line(v, &mut row);
        rows.push(row);
    }

    rows
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::player::PlayerIdentity;
    use crate::model::position::PositionTags;
    use crate::valuation::blend::BlendedProjection;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn valuation(id: &str, family: StatFamily, total: f64, dollars: f64) -> PlayerValuation {
        let pos = match family {
            StatFamily::Hitting => "OF",
            StatFamily::Pitching => "SP",
        };
        let stats: BTreeMap<Stat, f64> = match family {
            StatFamily::Hitting => [(Stat::AtBats, 500.0), (Stat::Hits, 140.0), (Stat::HomeRuns, 25.0)]
                .into_iter()
                .collect(),
            StatFamily::Pitching => [(Stat::EarnedRuns, 60.0), (Stat::HitsAllowed, 150.0), (Stat::WalksAllowed, 30.0)]
                .into_iter()
                .collect(),
        };
        PlayerValuation {
            score: PlayerScore {
                projection: BlendedProjection {
                    identity: PlayerIdentity {
                        id: PlayerId::new(id),
                        name: id.to_uppercase(),
                        team: "TST".into(),
                        positions: pos.into(),
                    },
                    family,
                    tags: PositionTags::parse(pos, family),
                    playing_time: if family == StatFamily::Hitting { 560.0 } else { 180.0 },
                    rates: BTreeMap::new(),
                    stats,
                    rate_systems: vec![],
                },
                contributions: [(Category::HomeRuns, Some(2.5)), (Category::Runs, None)]
                    .into_iter()
                    .collect(),
                adjustment: 0.0,
                total,
            },
            assigned_pool: None,
            reference_pool: None,
            replacement_level: Some(0.0),
            sgpar: Some(total),
            dollar_value: dollars,
        }
    }

    fn adp(format: &str, id: &str, value: f64, snapshot: NaiveDate) -> AdpEntry {
        AdpEntry {
            format: format.into(),
            player_id: PlayerId::new(id),
            adp: value,
            min_pick: Some(1),
            max_pick: Some(20),
            snapshot,
        }
    }

    #[test]
    fn dense_rank_by_dollar_value() {
        let rows = rank_players(
            vec![
                valuation("c", StatFamily::Hitting, 3.0, 10.0),
                valuation("a", StatFamily::Pitching, 9.0, 30.0),
                valuation("b", StatFamily::Hitting, 5.0, 10.0),
                valuation("d", StatFamily::Hitting, 0.0, 1.0),
            ],
            &HashMap::new(),
        );
        let order: Vec<(&str, u32)> = rows.iter().map(|r| (r.player_id.as_str(), r.rank)).collect();
        // b before c on score at equal dollars.
        assert_eq!(order, vec![("a", 1), ("b", 2), ("c", 2), ("d", 3)]);
    }

    #[test]
    fn equal_value_and_score_break_on_player_id() {
        let rows = rank_players(
            vec![
                valuation("z", StatFamily::Hitting, 1.0, 5.0),
                valuation("m", StatFamily::Hitting, 1.0, 5.0),
            ],
            &HashMap::new(),
        );
        assert_eq!(rows[0].player_id.as_str(), "m");
        assert_eq!(rows[1].player_id.as_str(), "z");
    }

    #[test]
    fn select_adp_latest_and_as_of() {
        let entries = vec![
            adp("50s", "a", 10.0, date(2026, 3, 1)),
            adp("50s", "a", 12.0, date(2026, 3, 8)),
            adp("oc", "a", 40.0, date(2026, 3, 9)),
        ];
        let latest = select_adp(&entries, "50s", AdpSelector::Latest);
        assert_eq!(latest[&PlayerId::new("a")].adp, 12.0);

        let early = select_adp(&entries, "50s", AdpSelector::AsOf(date(2026, 3, 5)));
        assert_eq!(early[&PlayerId::new("a")].adp, 10.0);

        assert!(select_adp(&entries, "50s", AdpSelector::AsOf(date(2026, 1, 1))).is_empty());
        assert!(select_adp(&entries, "other", AdpSelector::Latest).is_empty());
    }

    #[test]
    fn rank_diff_is_adp_minus_rank() {
        let entries = vec![adp("50s", "b", 1.5, date(2026, 3, 1))];
        let market = select_adp(&entries, "50s", AdpSelector::Latest);
        let rows = rank_players(
            vec![
                valuation("a", StatFamily::Hitting, 9.0, 30.0),
                valuation("b", StatFamily::Hitting, 5.0, 20.0),
            ],
            &market,
        );
        assert_eq!(rows[0].adp, None);
        assert_eq!(rows[0].rank_diff, None);
        assert_eq!(rows[1].adp, Some(1.5));
        assert_eq!(rows[1].rank_diff, Some(-0.5));
        assert_eq!(rows[1].min_pick, Some(1));
    }

    #[test]
    fn stat_columns_follow_family() {
        let rows = rank_players(
            vec![
                valuation("h", StatFamily::Hitting, 5.0, 20.0),
                valuation("p", StatFamily::Pitching, 4.0, 10.0),
            ],
            &HashMap::new(),
        );
        let hitter = &rows[0];
        assert_eq!(hitter.family, "H");
        assert!((hitter.avg.unwrap() - 0.28).abs() < 1e-12);
        assert_eq!(hitter.hr, Some(25.0));
        assert_eq!(hitter.era, None);
        assert_eq!(hitter.sgp_hr, Some(2.5));
        assert_eq!(hitter.sgp_r, None);
        assert_eq!(hitter.pos_group, "OF");

        let pitcher = &rows[1];
        assert_eq!(pitcher.family, "P");
        assert!((pitcher.era.unwrap() - 3.0).abs() < 1e-12);
        assert!((pitcher.whip.unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(pitcher.avg, None);
        assert_eq!(pitcher.pos_group, "SP");
    }

    #[test]
    fn two_way_player_appears_once_per_family() {
        let rows = rank_players(
            vec![
                valuation("ohtani", StatFamily::Pitching, 4.0, 15.0),
                valuation("ohtani", StatFamily::Hitting, 4.0, 15.0),
            ],
            &HashMap::new(),
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].family, "H");
        assert_eq!(rows[1].family, "P");
        assert_eq!(rows[0].rank, rows[1].rank);
    }

    #[test]
    fn column_list_matches_serialized_header() {
        let rows = rank_players(
            vec![valuation("a", StatFamily::Hitting, 1.0, 5.0)],
            &HashMap::new(),
        );
        let mut buf = Vec::new();
        {
            let mut writer = csv::Writer::from_writer(&mut buf);
            writer.serialize(&rows[0]).unwrap();
            writer.flush().unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().next().unwrap(), RANKING_COLUMNS.join(","));
    }
}
