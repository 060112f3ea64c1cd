//! City-wide building aggregate and construction log.
//!
//! Every change to a player's building portfolio goes through this module so
//! the aggregate always equals the sum over players.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::buildings::Category;
use crate::catalog::Catalog;
use crate::player::{Player, PlayerId};

/// How a building entered the city.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructionKind {
    Purchase,
    FlashSale,
    /// Granted by an item card or another free source.
    Grant,
    Upgrade { from: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionRecord {
    pub seq: u64,
    pub building_id: String,
    pub owner_id: PlayerId,
    pub owner_name: String,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub is_upgrade: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgraded_from: Option<String>,
    #[serde(default)]
    pub is_flash_sale: bool,
    #[serde(default)]
    pub is_free: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityAggregate {
    counts: BTreeMap<String, u32>,
    log: Vec<ConstructionRecord>,
    next_seq: u64,
}

impl CityAggregate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn count(&self, building_id: &str) -> u32 {
        self.counts.get(building_id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    #[must_use]
    pub const fn counts(&self) -> &BTreeMap<String, u32> {
        &self.counts
    }

    #[must_use]
    pub fn log(&self) -> &[ConstructionRecord] {
        &self.log
    }

    /// Add one building to the player and the city and log it.
    pub(crate) fn record_construction(
        &mut self,
        player: &mut Player,
        building_id: &str,
        kind: ConstructionKind,
        now_ms: u64,
    ) {
        player.add_building(building_id, 1);
        player.last_built = Some(building_id.to_string());
        *self.counts.entry(building_id.to_string()).or_insert(0) += 1;

        let seq = self.next_seq;
        self.next_seq += 1;
        let (is_upgrade, upgraded_from) = match &kind {
            ConstructionKind::Upgrade { from } => (true, Some(from.clone())),
            _ => (false, None),
        };
        self.log.push(ConstructionRecord {
            seq,
            building_id: building_id.to_string(),
            owner_id: player.id.clone(),
            owner_name: player.name.clone(),
            timestamp_ms: now_ms,
            is_upgrade,
            upgraded_from,
            is_flash_sale: kind == ConstructionKind::FlashSale,
            is_free: kind == ConstructionKind::Grant,
        });
    }

    /// Remove `count` copies of `building_id` from the player and the city,
    /// dropping the player's matching non-upgrade log entries. Returns false
    /// and changes nothing if the player owns fewer than `count`.
    pub(crate) fn consume_for_merge(
        &mut self,
        player: &mut Player,
        building_id: &str,
        count: u32,
    ) -> bool {
        if !player.remove_buildings(building_id, count) {
            return false;
        }
        let city_count = self.count(building_id);
        let remaining = city_count.saturating_sub(count);
        if remaining == 0 {
            self.counts.remove(building_id);
        } else {
            self.counts.insert(building_id.to_string(), remaining);
        }

        let mut to_drop = count;
        self.log.retain(|entry| {
            let matches = to_drop > 0
                && entry.owner_id == player.id
                && entry.building_id == building_id
                && !entry.is_upgrade;
            if matches {
                to_drop -= 1;
            }
            !matches
        });
        true
    }

    /// Count of buildings in a category across the city.
    #[must_use]
    pub fn category_count(&self, catalog: &Catalog, category: Category) -> u32 {
        self.counts
            .iter()
            .filter(|(id, _)| catalog.category_of(id) == Some(category))
            .map(|(_, count)| *count)
            .sum()
    }

    /// Per-category counts with every category present.
    #[must_use]
    pub fn category_breakdown(&self, catalog: &Catalog) -> BTreeMap<Category, u32> {
        let mut breakdown: BTreeMap<Category, u32> =
            Category::ALL.iter().map(|c| (*c, 0)).collect();
        for (id, count) in &self.counts {
            if let Some(category) = catalog.category_of(id) {
                *breakdown.entry(category).or_insert(0) += count;
            }
        }
        breakdown
    }

    /// True when every city count equals the sum of the players' counts.
    #[must_use]
    pub fn is_consistent_with<'a>(&self, players: impl IntoIterator<Item = &'a Player>) -> bool {
        let mut summed: BTreeMap<&str, u32> = BTreeMap::new();
        for player in players {
            for (id, count) in &player.buildings {
                *summed.entry(id.as_str()).or_insert(0) += count;
            }
        }
        summed.retain(|_, count| *count > 0);
        summed.len() == self.counts.len()
            && summed
                .iter()
                .all(|(id, count)| self.counts.get(*id) == Some(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::RoleId;

    fn player(id: &str) -> Player {
        Player::new(PlayerId::new(id), id, None, RoleId::Lucky, 500, 0, 0)
    }

    #[test]
    fn construction_updates_player_city_and_log() {
        let mut city = CityAggregate::new();
        let mut p = player("p1");
        city.record_construction(&mut p, "HOUSE", ConstructionKind::Purchase, 10);
        city.record_construction(&mut p, "HOUSE", ConstructionKind::FlashSale, 20);
        assert_eq!(p.owned("HOUSE"), 2);
        assert_eq!(city.count("HOUSE"), 2);
        assert_eq!(city.log().len(), 2);
        assert!(city.log()[1].is_flash_sale);
        assert_eq!(p.last_built.as_deref(), Some("HOUSE"));
        assert!(city.is_consistent_with([&p]));
    }

    #[test]
    fn merge_consumes_only_owner_entries() {
        let mut city = CityAggregate::new();
        let mut a = player("a");
        let mut b = player("b");
        for _ in 0..3 {
            city.record_construction(&mut a, "HOUSE", ConstructionKind::Purchase, 0);
        }
        city.record_construction(&mut b, "HOUSE", ConstructionKind::Purchase, 0);
        assert!(city.consume_for_merge(&mut a, "HOUSE", 3));
        city.record_construction(
            &mut a,
            "APARTMENT",
            ConstructionKind::Upgrade {
                from: "HOUSE".into(),
            },
            5,
        );
        assert_eq!(city.count("HOUSE"), 1);
        assert_eq!(city.count("APARTMENT"), 1);
        assert_eq!(city.log().len(), 2);
        assert_eq!(city.log()[0].owner_id, b.id);
        assert!(city.log()[1].is_upgrade);
        assert!(city.is_consistent_with([&a, &b]));
    }

    #[test]
    fn merge_rejects_short_portfolio() {
        let mut city = CityAggregate::new();
        let mut a = player("a");
        city.record_construction(&mut a, "LANDMARK", ConstructionKind::Purchase, 0);
        assert!(!city.consume_for_merge(&mut a, "LANDMARK", 2));
        assert_eq!(city.count("LANDMARK"), 1);
        assert_eq!(a.owned("LANDMARK"), 1);
    }

    #[test]
    fn inconsistency_is_detected() {
        let mut city = CityAggregate::new();
        let mut a = player("a");
        city.record_construction(&mut a, "SHOP", ConstructionKind::Purchase, 0);
        a.add_building("SHOP", 1);
        assert!(!city.is_consistent_with([&a]));
    }
}
