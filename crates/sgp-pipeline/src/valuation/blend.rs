// Projection normalizer and blender.
//
// Each system's counting stats are turned into per-unit rates (per PA for
// hitters, per IP for pitchers). Rates are averaged over the allow-listed
// skill-rate systems that project the player; playing time is averaged over a
// second, independent allow-list. Blended counting stats are rate x blended
// playing time. The same code path serves both stat families.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::config::BlendConfig;
use crate::model::category::{Stat, StatFamily};
use crate::model::player::{PlayerId, PlayerIdentity, ProjectionRecord};
use crate::model::position::PositionTags;
use crate::valuation::identity::IdentityResolver;
use crate::valuation::Diagnostic;

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// One system's projection expressed as per-unit rates.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLine {
    pub system: String,
    pub playing_time: f64,
    pub rates: BTreeMap<Stat, f64>,
}

/// Divide each of the family's counting stats by playing time.
///
/// Returns `None` when playing time is zero, since no rate can be formed.
pub fn normalize(record: &ProjectionRecord) -> Option<RateLine> {
    if record.playing_time <= 0.0 {
        return None;
    }
    let rates = record
        .family
        .counting_stats()
        .iter()
        .map(|&stat| (stat, record.stat(stat) / record.playing_time))
        .collect();
    Some(RateLine {
        system: record.system.clone(),
        playing_time: record.playing_time,
        rates,
    })
}

// ---------------------------------------------------------------------------
// Blended projection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BlendedProjection {
    pub identity: PlayerIdentity,
    pub family: StatFamily,
    pub tags: PositionTags,
    /// Mean PA (hitters) or IP (pitchers) across playing-time systems.
    pub playing_time: f64,
    /// Mean per-unit rate across skill-rate systems.
    pub rates: BTreeMap<Stat, f64>,
    /// Reconstituted counting stats: rate x playing time.
    pub stats: BTreeMap<Stat, f64>,
    /// Skill-rate systems that contributed, in allow-list order.
    pub rate_systems: Vec<String>,
}

impl BlendedProjection {
    pub fn stat(&self, stat: Stat) -> f64 {
        self.stats.get(&stat).copied().unwrap_or(0.0)
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.identity.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlendOutput {
    /// Ordered by canonical player id.
    pub projections: Vec<BlendedProjection>,
    pub diagnostics: Vec<Diagnostic>,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Blend every projection row of one family into one record per player.
pub fn blend_family(
    records: &[ProjectionRecord],
    family: StatFamily,
    resolver: &IdentityResolver,
    config: &BlendConfig,
) -> BlendOutput {
    let rate_systems: Vec<String> = config.rate_systems.iter().map(|s| s.to_lowercase()).collect();
    let pt_systems: Vec<String> = config
        .playing_time_systems
        .iter()
        .map(|s| s.to_lowercase())
        .collect();

    let mut diagnostics = Vec::new();
    let mut unmapped: BTreeSet<(String, String)> = BTreeSet::new();
    let mut by_player: BTreeMap<PlayerId, Vec<&ProjectionRecord>> = BTreeMap::new();

    for record in records.iter().filter(|r| r.family == family) {
        let system = record.system.to_lowercase();
        if !rate_systems.contains(&system) && !pt_systems.contains(&system) {
            debug!("ignoring {} row from non-allow-listed system {}", family, system);
            continue;
        }
        match resolver.resolve(&system, &record.source_id) {
            Some(id) => by_player.entry(id.clone()).or_default().push(record),
            None => {
                unmapped.insert((system, record.source_id.clone()));
            }
        }
    }

    for (system, source_id) in unmapped {
        diagnostics.push(Diagnostic::MissingIdentityMapping { system, source_id });
    }

    let mut projections = Vec::with_capacity(by_player.len());
    for (player_id, rows) in by_player {
        let find = |system: &str| rows.iter().copied().find(|r| r.system.eq_ignore_ascii_case(system));

        let rate_lines: Vec<RateLine> = rate_systems
            .iter()
            .filter_map(|s| find(s))
            .filter_map(normalize)
            .collect();
        let playing_times: Vec<f64> = pt_systems
            .iter()
            .filter_map(|s| find(s))
            .map(|r| r.playing_time)
            .collect();

        if rate_lines.is_empty() {
            diagnostics.push(Diagnostic::IncompleteProjection {
                player_id,
                family,
                reason: format!(
                    "no skill-rate system with {} > 0",
                    family.playing_time_label()
                ),
            });
            continue;
        }
        if playing_times.is_empty() {
            diagnostics.push(Diagnostic::IncompleteProjection {
                player_id,
                family,
                reason: format!("no {} system", family.playing_time_label()),
            });
            continue;
        }

        let playing_time = mean(&playing_times);
        let mut rates = BTreeMap::new();
        let mut stats = BTreeMap::new();
        for &stat in family.counting_stats() {
            let per_system: Vec<f64> = rate_lines
                .iter()
                .map(|l| l.rates.get(&stat).copied().unwrap_or(0.0))
                .collect();
            let rate = mean(&per_system);
            rates.insert(stat, rate);
            stats.insert(stat, rate * playing_time);
        }

        // Display fields follow allow-list priority: rate systems first.
        let Some(source) = rate_systems
            .iter()
            .chain(pt_systems.iter())
            .find_map(|s| find(s))
        else {
            continue;
        };

        let tags = PositionTags::parse(&source.positions, family);
        for tag in &tags.unrecognized {
            diagnostics.push(Diagnostic::UnrecognizedPositionTag {
                player_id: player_id.clone(),
                tag: tag.clone(),
            });
        }

        projections.push(BlendedProjection {
            identity: PlayerIdentity {
                id: player_id,
                name: source.name.clone(),
                team: source.team.clone(),
                positions: source.positions.clone(),
            },
            family,
            tags,
            playing_time,
            rates,
            stats,
            rate_systems: rate_lines.into_iter().map(|l| l.system).collect(),
        });
    }

    if !diagnostics.is_empty() {
        warn!(
            "{} blend produced {} diagnostics ({} players kept)",
            family,
            diagnostics.len(),
            projections.len()
        );
    }

    BlendOutput {
        projections,
        diagnostics,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::player::IdentityMapping;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn hitter(system: &str, source: &str, pos: &str, pa: f64, ab: f64, h: f64, hr: f64) -> ProjectionRecord {
        ProjectionRecord {
            system: system.into(),
            source_id: source.into(),
            name: format!("{system} name"),
            team: "NYY".into(),
            positions: pos.into(),
            family: StatFamily::Hitting,
            playing_time: pa,
            stats: [
                (Stat::AtBats, ab),
                (Stat::Hits, h),
                (Stat::Runs, 0.0),
                (Stat::HomeRuns, hr),
                (Stat::RunsBattedIn, 0.0),
                (Stat::StolenBases, 0.0),
            ]
            .into_iter()
            .collect(),
        }
    }

    fn resolver(rows: &[(&str, &str, &str)]) -> IdentityResolver {
        let mappings: Vec<IdentityMapping> = rows
            .iter()
            .map(|(s, src, id)| IdentityMapping {
                system: s.to_string(),
                source_id: src.to_string(),
                player_id: PlayerId::new(*id),
            })
            .collect();
        IdentityResolver::new(&mappings)
    }

    fn config(rate: &[&str], pt: &[&str]) -> BlendConfig {
        BlendConfig {
            rate_systems: rate.iter().map(|s| s.to_string()).collect(),
            playing_time_systems: pt.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn normalize_divides_by_playing_time() {
        let line = normalize(&hitter("steamer", "1", "C", 500.0, 450.0, 120.0, 25.0)).unwrap();
        assert!(approx_eq(line.rates[&Stat::HomeRuns], 0.05, 1e-12));
        assert!(approx_eq(line.rates[&Stat::AtBats], 0.9, 1e-12));
        assert!(normalize(&hitter("steamer", "1", "C", 0.0, 0.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn rates_average_over_present_systems_only() {
        let records = vec![
            hitter("steamer", "s1", "1B", 600.0, 540.0, 150.0, 30.0),
            hitter("zips", "z1", "1B", 500.0, 450.0, 120.0, 20.0),
            hitter("depthcharts", "d1", "1B", 550.0, 0.0, 0.0, 0.0),
        ];
        let res = resolver(&[("steamer", "s1", "p1"), ("zips", "z1", "p1"), ("depthcharts", "d1", "p1")]);
        let out = blend_family(
            &records,
            StatFamily::Hitting,
            &res,
            &config(&["steamer", "zips", "thebat"], &["depthcharts"]),
        );

        assert!(out.diagnostics.is_empty());
        assert_eq!(out.projections.len(), 1);
        let p = &out.projections[0];
        // HR rate = mean(30/600, 20/500) = mean(0.05, 0.04) = 0.045
        assert!(approx_eq(p.rates[&Stat::HomeRuns], 0.045, 1e-12));
        assert!(approx_eq(p.playing_time, 550.0, 1e-12));
        assert!(approx_eq(p.stat(Stat::HomeRuns), 0.045 * 550.0, 1e-9));
        assert_eq!(p.rate_systems, vec!["steamer", "zips"]);
        assert_eq!(p.identity.name, "steamer name");
    }

    #[test]
    fn playing_time_systems_may_overlap_rate_systems() {
        let records = vec![
            hitter("steamer", "s1", "OF", 600.0, 540.0, 150.0, 30.0),
            hitter("depthcharts", "d1", "OF", 400.0, 0.0, 0.0, 0.0),
        ];
        let res = resolver(&[("steamer", "s1", "p1"), ("depthcharts", "d1", "p1")]);
        let out = blend_family(
            &records,
            StatFamily::Hitting,
            &res,
            &config(&["steamer"], &["depthcharts", "steamer"]),
        );
        assert!(approx_eq(out.projections[0].playing_time, 500.0, 1e-12));
    }

    #[test]
    fn unmapped_rows_are_dropped_with_diagnostic() {
        let records = vec![
            hitter("steamer", "s1", "C", 500.0, 450.0, 120.0, 10.0),
            hitter("steamer", "s2", "C", 500.0, 450.0, 120.0, 10.0),
        ];
        let res = resolver(&[("steamer", "s1", "p1")]);
        let out = blend_family(
            &records,
            StatFamily::Hitting,
            &res,
            &config(&["steamer"], &["steamer"]),
        );
        assert_eq!(out.projections.len(), 1);
        assert_eq!(
            out.diagnostics,
            vec![Diagnostic::MissingIdentityMapping {
                system: "steamer".into(),
                source_id: "s2".into()
            }]
        );
    }

    #[test]
    fn players_without_playing_time_system_are_dropped() {
        let records = vec![hitter("steamer", "s1", "C", 500.0, 450.0, 120.0, 10.0)];
        let res = resolver(&[("steamer", "s1", "p1")]);
        let out = blend_family(
            &records,
            StatFamily::Hitting,
            &res,
            &config(&["steamer"], &["depthcharts"]),
        );
        assert!(out.projections.is_empty());
        assert!(matches!(
            &out.diagnostics[0],
            Diagnostic::IncompleteProjection { reason, .. } if reason == "no PA system"
        ));
    }

    #[test]
    fn zero_playing_time_rate_line_is_not_a_skill_source() {
        let records = vec![hitter("steamer", "s1", "C", 0.0, 0.0, 0.0, 0.0)];
        let res = resolver(&[("steamer", "s1", "p1")]);
        let out = blend_family(
            &records,
            StatFamily::Hitting,
            &res,
            &config(&["steamer"], &["steamer"]),
        );
        assert!(out.projections.is_empty());
        assert!(matches!(
            &out.diagnostics[0],
            Diagnostic::IncompleteProjection { reason, .. }
                if reason == "no skill-rate system with PA > 0"
        ));
    }

    #[test]
    fn non_allow_listed_systems_are_ignored() {
        let records = vec![
            hitter("steamer", "s1", "C", 500.0, 450.0, 120.0, 10.0),
            hitter("marcel", "m1", "C", 500.0, 450.0, 200.0, 50.0),
        ];
        let res = resolver(&[("steamer", "s1", "p1")]);
        let out = blend_family(
            &records,
            StatFamily::Hitting,
            &res,
            &config(&["steamer"], &["steamer"]),
        );
        assert!(out.diagnostics.is_empty(), "marcel rows never reach identity resolution");
        assert!(approx_eq(out.projections[0].stat(Stat::HomeRuns), 10.0, 1e-9));
    }

    #[test]
    fn unrecognized_tags_reported() {
        let records = vec![hitter("steamer", "s1", "XX", 500.0, 450.0, 120.0, 10.0)];
        let res = resolver(&[("steamer", "s1", "p1")]);
        let out = blend_family(
            &records,
            StatFamily::Hitting,
            &res,
            &config(&["steamer"], &["steamer"]),
        );
        assert_eq!(out.projections.len(), 1);
        assert_eq!(
            out.diagnostics,
            vec![Diagnostic::UnrecognizedPositionTag {
                player_id: PlayerId::new("p1"),
                tag: "XX".into()
            }]
        );
    }

    #[test]
    fn output_ordered_by_player_id() {
        let records = vec![
            hitter("steamer", "b", "C", 500.0, 450.0, 120.0, 10.0),
            hitter("steamer", "a", "C", 500.0, 450.0, 120.0, 10.0),
        ];
        let res = resolver(&[("steamer", "b", "p-b"), ("steamer", "a", "p-a")]);
        let out = blend_family(
            &records,
            StatFamily::Hitting,
            &res,
            &config(&["steamer"], &["steamer"]),
        );
        let ids: Vec<&str> = out.projections.iter().map(|p| p.player_id().as_str()).collect();
        assert_eq!(ids, vec!["p-a", "p-b"]);
    }
}
