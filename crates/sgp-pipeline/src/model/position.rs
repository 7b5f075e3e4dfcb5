// Position eligibility tags and their parsing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::category::StatFamily;

/// Score penalty for a player whose only eligibility is a generic flex tag.
pub const FLEX_ONLY_PENALTY: f64 = -0.25;

/// Score bonus for a player listed at more than one position.
pub const MULTI_POSITION_BONUS: f64 = 0.25;

/// Raw tags that denote a generic flex slot rather than a fielding position.
const HITTING_FLEX_TAGS: &[&str] = &["UT", "UTIL", "DH"];
const PITCHING_FLEX_TAGS: &[&str] = &["P"];

/// Baseball positions used for eligibility and positional grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Position {
    Catcher,
    FirstBase,
    SecondBase,
    ThirdBase,
    ShortStop,
    Outfield,
    Utility,
    StartingPitcher,
    ReliefPitcher,
    Pitcher,
}

impl Position {
    /// Parse a single position tag.
    ///
    /// LF/CF/RF collapse into `Outfield`; DH and UTIL collapse into `Utility`.
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "C" => Some(Position::Catcher),
            "1B" => Some(Position::FirstBase),
            "2B" => Some(Position::SecondBase),
            "3B" => Some(Position::ThirdBase),
            "SS" => Some(Position::ShortStop),
            "OF" | "LF" | "CF" | "RF" => Some(Position::Outfield),
            "UT" | "UTIL" | "DH" => Some(Position::Utility),
            "SP" => Some(Position::StartingPitcher),
            "RP" => Some(Position::ReliefPitcher),
            "P" => Some(Position::Pitcher),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Catcher => "C",
            Position::FirstBase => "1B",
            Position::SecondBase => "2B",
            Position::ThirdBase => "3B",
            Position::ShortStop => "SS",
            Position::Outfield => "OF",
            Position::Utility => "UT",
            Position::StartingPitcher => "SP",
            Position::ReliefPitcher => "RP",
            Position::Pitcher => "P",
        }
    }

    pub fn family(&self) -> StatFamily {
        match self {
            Position::StartingPitcher | Position::ReliefPitcher | Position::Pitcher => {
                StatFamily::Pitching
            }
            _ => StatFamily::Hitting,
        }
    }

    /// The generic position every player of a family falls back to.
    pub fn catch_all(family: StatFamily) -> Self {
        match family {
            StatFamily::Hitting => Position::Utility,
            StatFamily::Pitching => Position::Pitcher,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

// ---------------------------------------------------------------------------
// Parsed eligibility
// ---------------------------------------------------------------------------

/// A player's eligibility string, split into recognized positions (in listed
/// order, deduplicated) and tags that matched nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionTags {
    pub raw: String,
    pub positions: Vec<Position>,
    pub unrecognized: Vec<String>,
}

impl PositionTags {
    /// Parse a comma-separated eligibility string for a player of `family`.
    ///
    /// Tags belonging to the other family (e.g. "SP" on a hitting row) are
    /// treated as unrecognized.
    pub fn parse(raw: &str, family: StatFamily) -> Self {
        let mut positions = Vec::new();
        let mut unrecognized = Vec::new();
        for tag in split_tags(raw) {
            match Position::from_str_pos(tag) {
                Some(pos) if pos.family() == family => {
                    if !positions.contains(&pos) {
                        positions.push(pos);
                    }
                }
                _ => unrecognized.push(tag.to_string()),
            }
        }
        PositionTags {
            raw: raw.trim().to_string(),
            positions,
            unrecognized,
        }
    }

    /// First listed recognized position; the family catch-all when none.
    pub fn primary(&self, family: StatFamily) -> Position {
        self.positions
            .first()
            .copied()
            .unwrap_or_else(|| Position::catch_all(family))
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.positions.contains(&pos)
    }

    /// Comma-joined display of the recognized positions.
    pub fn display(&self) -> String {
        self.positions
            .iter()
            .map(|p| p.display_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn split_tags(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// Score adjustment keyed off the raw eligibility string.
///
/// More than one comma-separated tag earns the multi-position bonus. A single
/// flex tag of the player's own family (UT/UTIL/DH for hitters, P for
/// pitchers) takes the flex penalty. Anything else is 0.
pub fn positional_adjustment(raw: &str, family: StatFamily) -> f64 {
    let flex = match family {
        StatFamily::Hitting => HITTING_FLEX_TAGS,
        StatFamily::Pitching => PITCHING_FLEX_TAGS,
    };
    let tags: Vec<&str> = split_tags(raw).collect();
    match tags.as_slice() {
        [] => 0.0,
        [single] => {
            let upper = single.to_uppercase();
            if flex.contains(&upper.as_str()) {
                FLEX_ONLY_PENALTY
            } else {
                0.0
            }
        }
        _ => MULTI_POSITION_BONUS,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
