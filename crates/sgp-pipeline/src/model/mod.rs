// Domain types shared by every pipeline stage.

pub mod category;
pub mod player;
pub mod position;

pub use category::{Category, Stat, StatFamily};
pub use player::{AdpEntry, IdentityMapping, PlayerId, PlayerIdentity, ProjectionRecord, StandingsEntry};
pub use position::{Position, PositionTags};
