// Identity resolution: (source system, source id) -> canonical player id.

use std::collections::HashMap;
use tracing::warn;

use crate::model::player::{IdentityMapping, PlayerId};

/// Lookup table built once from the crosswalk.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    map: HashMap<(String, String), PlayerId>,
}

impl IdentityResolver {
    /// Build from crosswalk rows. System names are matched case-insensitively.
    /// When a (system, source id) pair appears twice with different targets the
    /// first mapping wins.
    pub fn new(mappings: &[IdentityMapping]) -> Self {
        let mut map = HashMap::with_capacity(mappings.len());
        for m in mappings {
            let key = (m.system.to_lowercase(), m.source_id.clone());
            match map.get(&key) {
                Some(existing) if existing != &m.player_id => {
                    warn!(
                        "conflicting id mapping for {}/{}: keeping {}, ignoring {}",
                        m.system, m.source_id, existing, m.player_id
                    );
                }
                Some(_) => {}
                None => {
                    map.insert(key, m.player_id.clone());
                }
            }
        }
        IdentityResolver { map }
    }

    pub fn resolve(&self, system: &str, source_id: &str) -> Option<&PlayerId> {
        self.map
            .get(&(system.to_lowercase(), source_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
