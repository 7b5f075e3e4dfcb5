// Replacement-level resolver.
//
// Positional pools are filled by a priority-ordered waterfall: each pool takes
// the best remaining eligible players (by total score) up to its capacity,
// and those players are removed before the next pool is filled. A pool's
// replacement level is the lowest score among its members. Hitters and
// pitchers run separate waterfalls.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::model::category::StatFamily;
use crate::model::position::{Position, PositionTags};
use crate::valuation::sgp::PlayerScore;

// ---------------------------------------------------------------------------
// Pools
// ---------------------------------------------------------------------------

/// A positional draft pool. Mirrors the roster slot keys in `formats.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Pool {
    Catcher,
    FirstBase,
    SecondBase,
    ThirdBase,
    ShortStop,
    Outfield,
    MiddleInfield,
    CornerInfield,
    Utility,
    StartingPitcher,
    ReliefPitcher,
    Pitcher,
}

/// Hitter waterfall: primary positions, then middle/corner overflow, then UT.
pub const HITTING_PRIORITY: &[Pool] = &[
    Pool::Catcher,
    Pool::FirstBase,
    Pool::SecondBase,
    Pool::ThirdBase,
    Pool::ShortStop,
    Pool::Outfield,
    Pool::MiddleInfield,
    Pool::CornerInfield,
    Pool::Utility,
];

/// Pitcher waterfall: starters, relievers, then any pitcher.
pub const PITCHING_PRIORITY: &[Pool] = &[Pool::StartingPitcher, Pool::ReliefPitcher, Pool::Pitcher];

impl Pool {
    pub fn default_priority(family: StatFamily) -> &'static [Pool] {
        match family {
            StatFamily::Hitting => HITTING_PRIORITY,
            StatFamily::Pitching => PITCHING_PRIORITY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Pool::Catcher => "C",
            Pool::FirstBase => "1B",
            Pool::SecondBase => "2B",
            Pool::ThirdBase => "3B",
            Pool::ShortStop => "SS",
            Pool::Outfield => "OF",
            Pool::MiddleInfield => "MI",
            Pool::CornerInfield => "CI",
            Pool::Utility => "UT",
            Pool::StartingPitcher => "SP",
            Pool::ReliefPitcher => "RP",
            Pool::Pitcher => "P",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        let upper = s.trim().to_uppercase();
        HITTING_PRIORITY
            .iter()
            .chain(PITCHING_PRIORITY)
            .copied()
            .find(|p| p.code() == upper)
    }

    pub fn family(&self) -> StatFamily {
        match self {
            Pool::StartingPitcher | Pool::ReliefPitcher | Pool::Pitcher => StatFamily::Pitching,
            _ => StatFamily::Hitting,
        }
    }

    /// The lowest-priority pool that accepts every player of the family.
    pub fn catch_all(family: StatFamily) -> Self {
        match family {
            StatFamily::Hitting => Pool::Utility,
            StatFamily::Pitching => Pool::Pitcher,
        }
    }

    /// The dedicated pool for a single position.
    pub fn for_position(pos: Position) -> Self {
        match pos {
            Position::Catcher => Pool::Catcher,
            Position::FirstBase => Pool::FirstBase,
            Position::SecondBase => Pool::SecondBase,
            Position::ThirdBase => Pool::ThirdBase,
            Position::ShortStop => Pool::ShortStop,
            Position::Outfield => Pool::Outfield,
            Position::Utility => Pool::Utility,
            Position::StartingPitcher => Pool::StartingPitcher,
            Position::ReliefPitcher => Pool::ReliefPitcher,
            Position::Pitcher => Pool::Pitcher,
        }
    }

    /// Eligibility check. Catch-all pools accept anyone, including players
    /// whose tags were all unrecognized.
    pub fn accepts(&self, tags: &PositionTags) -> bool {
        match self {
            Pool::Utility | Pool::Pitcher => true,
            Pool::MiddleInfield => {
                tags.contains(Position::SecondBase) || tags.contains(Position::ShortStop)
            }
            Pool::CornerInfield => {
                tags.contains(Position::FirstBase) || tags.contains(Position::ThirdBase)
            }
            Pool::Catcher => tags.contains(Position::Catcher),
            Pool::FirstBase => tags.contains(Position::FirstBase),
            Pool::SecondBase => tags.contains(Position::SecondBase),
            Pool::ThirdBase => tags.contains(Position::ThirdBase),
            Pool::ShortStop => tags.contains(Position::ShortStop),
            Pool::Outfield => tags.contains(Position::Outfield),
            Pool::StartingPitcher => tags.contains(Position::StartingPitcher),
            Pool::ReliefPitcher => tags.contains(Position::ReliefPitcher),
        }
    }

    /// Slots per team for this pool in a roster table (keys case-insensitive).
    pub fn slots(&self, roster: &BTreeMap<String, usize>) -> usize {
        roster
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(self.code()))
            .map(|(_, &n)| n)
            .unwrap_or(0)
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// Waterfall
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplacementLevel {
    pub pool: Pool,
    pub capacity: usize,
    pub filled: usize,
    /// Lowest member score. `None` when the pool ended up empty.
    pub level: Option<f64>,
}

/// Result of one family's waterfall.
#[derive(Debug, Clone, PartialEq)]
pub struct Waterfall {
    pub family: StatFamily,
    /// One entry per configured pool, in fill order.
    pub levels: Vec<ReplacementLevel>,
    /// Assigned pool per input player, index-aligned with the scores slice.
    pub assignments: Vec<Option<Pool>>,
}

impl Waterfall {
    pub fn level(&self, pool: Pool) -> Option<f64> {
        self.levels
            .iter()
            .find(|l| l.pool == pool)
            .and_then(|l| l.level)
    }

    /// Indices of the players assigned to `pool`.
    pub fn members(&self, pool: Pool) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, a)| **a == Some(pool))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn undefined_pools(&self) -> Vec<Pool> {
        self.levels
            .iter()
            .filter(|l| l.level.is_none())
            .map(|l| l.pool)
            .collect()
    }

    /// The pool and level a player's SGPAR is measured against.
    ///
    /// Assigned players use their own pool. Unassigned players use their
    /// primary position's pool, falling back to the family catch-all.
    pub fn reference(&self, index: usize, tags: &PositionTags) -> Option<(Pool, f64)> {
        if let Some(Some(pool)) = self.assignments.get(index) {
            return self.level(*pool).map(|level| (*pool, level));
        }
        let primary = Pool::for_position(tags.primary(self.family));
        let catch_all = Pool::catch_all(self.family);
        [primary, catch_all]
            .into_iter()
            .find_map(|pool| self.level(pool).map(|level| (pool, level)))
    }
}

/// Fill `order`'s pools from `scores` (all one family).
///
/// Pools of the other family and pools with no roster slots are skipped.
/// Players are taken in descending score order; equal scores keep input
/// order, which is canonical player id order coming out of the blend.
pub fn run_waterfall(
    scores: &[PlayerScore],
    family: StatFamily,
    order: &[Pool],
    num_teams: usize,
    roster: &BTreeMap<String, usize>,
) -> Waterfall {
    let mut remaining: Vec<usize> = (0..scores.len())
        .filter(|&i| scores[i].family() == family)
        .collect();
    remaining.sort_by(|&a, &b| {
        scores[b]
            .total
            .partial_cmp(&scores[a].total)
            .unwrap_or(Ordering::Equal)
    });

    let mut assignments: Vec<Option<Pool>> = vec![None; scores.len()];
    let mut levels = Vec::new();

    for &pool in order.iter().filter(|p| p.family() == family) {
        let capacity = num_teams * pool.slots(roster);
        if capacity == 0 {
            continue;
        }

        let mut members: Vec<usize> = Vec::with_capacity(capacity);
        remaining.retain(|&idx| {
            if members.len() < capacity && pool.accepts(&scores[idx].projection.tags) {
                members.push(idx);
                false
            } else {
                true
            }
        });

        for &idx in &members {
            assignments[idx] = Some(pool);
        }
        let level = members
            .iter()
            .map(|&idx| scores[idx].total)
            .reduce(f64::min);

        levels.push(ReplacementLevel {
            pool,
            capacity,
            filled: members.len(),
            level,
        });
    }

    Waterfall {
        family,
        levels,
        assignments,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
