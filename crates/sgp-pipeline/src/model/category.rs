// Statistical categories, raw projection stats, and stat families.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Stat families
// ---------------------------------------------------------------------------

/// Hitting or pitching. Each family has its own playing-time unit and its
/// own set of counting stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatFamily {
    Hitting,
    Pitching,
}

impl StatFamily {
    /// Counting stats that the normalizer converts into per-unit rates.
    pub fn counting_stats(&self) -> &'static [Stat] {
        match self {
            StatFamily::Hitting => HITTING_STATS,
            StatFamily::Pitching => PITCHING_STATS,
        }
    }

    /// Scoring categories that belong to this family.
    pub fn categories(&self) -> &'static [Category] {
        match self {
            StatFamily::Hitting => Category::HITTING,
            StatFamily::Pitching => Category::PITCHING,
        }
    }

    /// Label for the playing-time denominator (PA for hitters, IP for pitchers).
    pub fn playing_time_label(&self) -> &'static str {
        match self {
            StatFamily::Hitting => "PA",
            StatFamily::Pitching => "IP",
        }
    }

    /// Short code used in output tables.
    pub fn code(&self) -> &'static str {
        match self {
            StatFamily::Hitting => "H",
            StatFamily::Pitching => "P",
        }
    }
}

impl fmt::Display for StatFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatFamily::Hitting => write!(f, "hitting"),
            StatFamily::Pitching => write!(f, "pitching"),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw counting stats
// ---------------------------------------------------------------------------

/// A raw counting stat carried by a projection system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stat {
    AtBats,
    Hits,
    Runs,
    HomeRuns,
    RunsBattedIn,
    StolenBases,
    Wins,
    Saves,
    Strikeouts,
    EarnedRuns,
    HitsAllowed,
    WalksAllowed,
}

const HITTING_STATS: &[Stat] = &[
    Stat::AtBats,
    Stat::Hits,
    Stat::Runs,
    Stat::HomeRuns,
    Stat::RunsBattedIn,
    Stat::StolenBases,
];

const PITCHING_STATS: &[Stat] = &[
    Stat::Wins,
    Stat::Saves,
    Stat::Strikeouts,
    Stat::EarnedRuns,
    Stat::HitsAllowed,
    Stat::WalksAllowed,
];

// ---------------------------------------------------------------------------
// Scoring categories
// ---------------------------------------------------------------------------

/// A rotisserie scoring category (standard 5x5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Runs,
    HomeRuns,
    RunsBattedIn,
    StolenBases,
    Average,
    Wins,
    Saves,
    Strikeouts,
    Era,
    Whip,
}

impl Category {
    pub const ALL: &'static [Category] = &[
        Category::Runs,
        Category::HomeRuns,
        Category::RunsBattedIn,
        Category::StolenBases,
        Category::Average,
        Category::Wins,
        Category::Saves,
        Category::Strikeouts,
        Category::Era,
        Category::Whip,
    ];

    pub const HITTING: &'static [Category] = &[
        Category::Runs,
        Category::HomeRuns,
        Category::RunsBattedIn,
        Category::StolenBases,
        Category::Average,
    ];

    pub const PITCHING: &'static [Category] = &[
        Category::Wins,
        Category::Saves,
        Category::Strikeouts,
        Category::Era,
        Category::Whip,
    ];

    /// Parse a category code as it appears in standings files.
    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "R" => Some(Category::Runs),
            "HR" => Some(Category::HomeRuns),
            "RBI" => Some(Category::RunsBattedIn),
            "SB" => Some(Category::StolenBases),
            "AVG" | "BA" => Some(Category::Average),
            "W" => Some(Category::Wins),
            "SV" => Some(Category::Saves),
            "K" | "SO" => Some(Category::Strikeouts),
            "ERA" => Some(Category::Era),
            "WHIP" => Some(Category::Whip),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Category::Runs => "R",
            Category::HomeRuns => "HR",
            Category::RunsBattedIn => "RBI",
            Category::StolenBases => "SB",
            Category::Average => "AVG",
            Category::Wins => "W",
            Category::Saves => "SV",
            Category::Strikeouts => "K",
            Category::Era => "ERA",
            Category::Whip => "WHIP",
        }
    }

    /// Lower-is-better categories. Their totals are negated before regression.
    pub fn is_inverted(&self) -> bool {
        matches!(self, Category::Era | Category::Whip)
    }

    /// The raw stat backing a counting category. `None` for rate categories.
    pub fn counting_stat(&self) -> Option<Stat> {
        match self {
            Category::Runs => Some(Stat::Runs),
            Category::HomeRuns => Some(Stat::HomeRuns),
            Category::RunsBattedIn => Some(Stat::RunsBattedIn),
            Category::StolenBases => Some(Stat::StolenBases),
            Category::Wins => Some(Stat::Wins),
            Category::Saves => Some(Stat::Saves),
            Category::Strikeouts => Some(Stat::Strikeouts),
            Category::Average | Category::Era | Category::Whip => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
