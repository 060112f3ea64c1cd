//! Achievement Engine.
//!
//! Evaluates every achievement a player has not yet unlocked against the
//! player's portfolio and the action that triggered the check. Achievements
//! flagged `global_unique` can be won by one player per session; the
//! [`AchievementRegistry`] remembers who got there first.

use std::collections::{BTreeMap, BTreeSet};

use log::info;
use serde::{Deserialize, Serialize};

use crate::buildings::Category;
use crate::catalog::Catalog;
use crate::city::CityAggregate;
use crate::player::{Player, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Building,
    Specialization,
    Income,
    Special,
    GlobalFirst,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Total owned buildings at least `count`.
    BuildingCount { count: u32 },
    CategoryCount { category: Category, count: u32 },
    TotalIncome { amount: i64 },
    /// Distinct categories with at least one building.
    CategoryDiversity { count: usize },
    /// Only checked on a purchase costing at least `amount`.
    SinglePurchase { amount: i64 },
    SpecificBuilding { building_id: String },
    /// Only checked on a purchase of `building_id`; true when that purchase
    /// is the only one of its kind in the city.
    FirstBuilding { building_id: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    #[serde(default)]
    pub coins: i64,
    #[serde(default)]
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    #[serde(default)]
    pub description: String,
    pub category: AchievementCategory,
    #[serde(default)]
    pub global_unique: bool,
    pub condition: Condition,
    #[serde(default)]
    pub reward: Reward,
}

/// The action that triggered an achievement check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementContext<'a> {
    BuildingPurchase { building_id: &'a str, cost: i64 },
    BuildingUpgrade { building_id: &'a str },
    IncomeReceived { amount: i64 },
}

/// Session-wide record of global-first winners. Entries are never replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementRegistry {
    winners: BTreeMap<String, PlayerId>,
}

impl AchievementRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn winner(&self, achievement_id: &str) -> Option<&PlayerId> {
        self.winners.get(achievement_id)
    }

    #[must_use]
    pub fn is_claimed(&self, achievement_id: &str) -> bool {
        self.winners.contains_key(achievement_id)
    }

    /// Record the first winner. Returns false if someone already holds it.
    pub(crate) fn claim(&mut self, achievement_id: &str, player: &PlayerId) -> bool {
        if self.is_claimed(achievement_id) {
            return false;
        }
        self.winners
            .insert(achievement_id.to_string(), player.clone());
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PlayerId)> {
        self.winners.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.winners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.winners.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockedAchievement {
    pub achievement_id: String,
    pub name: String,
    pub emoji: String,
    pub reward: Reward,
    pub global_first: bool,
}

/// Distinct categories in which the player owns at least one building.
#[must_use]
pub fn owned_categories(player: &Player, catalog: &Catalog) -> BTreeSet<Category> {
    player
        .buildings
        .iter()
        .filter(|(_, count)| **count > 0)
        .filter_map(|(id, _)| catalog.category_of(id))
        .collect()
}

fn category_total(player: &Player, catalog: &Catalog, category: Category) -> u32 {
    player
        .buildings
        .iter()
        .filter(|(id, _)| catalog.category_of(id) == Some(category))
        .map(|(_, count)| *count)
        .sum()
}

/// Evaluate one condition.
#[must_use]
pub fn condition_met(
    condition: &Condition,
    player: &Player,
    city: &CityAggregate,
    catalog: &Catalog,
    ctx: AchievementContext<'_>,
) -> bool {
    match condition {
        Condition::BuildingCount { count } => player.building_count() >= *count,
        Condition::CategoryCount { category, count } => {
            category_total(player, catalog, *category) >= *count
        }
        Condition::TotalIncome { amount } => player.total_income >= *amount,
        Condition::CategoryDiversity { count } => owned_categories(player, catalog).len() >= *count,
        Condition::SinglePurchase { amount } => matches!(
            ctx,
            AchievementContext::BuildingPurchase { cost, .. } if cost >= *amount
        ),
        Condition::SpecificBuilding { building_id } => player.owned(building_id) > 0,
        Condition::FirstBuilding { building_id } => matches!(
            ctx,
            AchievementContext::BuildingPurchase { building_id: built, .. }
                if built == building_id.as_str() && city.count(building_id) == 1
        ),
    }
}

/// Unlock every newly satisfied achievement for `player`, credit rewards,
/// and claim global-first entries. Returns the unlocks in catalog order.
pub fn check_achievements(
    catalog: &Catalog,
    registry: &mut AchievementRegistry,
    player: &mut Player,
    city: &CityAggregate,
    ctx: AchievementContext<'_>,
) -> Vec<UnlockedAchievement> {
    let mut unlocked = Vec::new();
    for def in catalog.achievements() {
        if player.achievements.contains(&def.id) {
            continue;
        }
        if def.global_unique && registry.is_claimed(&def.id) {
            continue;
        }
        if !condition_met(&def.condition, player, city, catalog, ctx) {
            continue;
        }
        if def.global_unique && !registry.claim(&def.id, &player.id) {
            continue;
        }
        player.achievements.insert(def.id.clone());
        player.credit(def.reward.coins, def.reward.score);
        info!(
            "achievement {} unlocked by {}{}",
            def.id,
            player.id,
            if def.global_unique { " (global first)" } else { "" }
        );
        unlocked.push(UnlockedAchievement {
            achievement_id: def.id.clone(),
            name: def.name.clone(),
            emoji: def.emoji.clone(),
            reward: def.reward,
            global_first: def.global_unique,
        });
    }
    unlocked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::ConstructionKind;
    use crate::roles::RoleId;

    fn player(id: &str) -> Player {
        Player::new(PlayerId::new(id), id, None, RoleId::Lucky, 0, 0, 0)
    }

    #[test]
    fn first_building_unlocks_once_with_reward() {
        let catalog = Catalog::load_from_static().unwrap();
        let mut registry = AchievementRegistry::new();
        let mut city = CityAggregate::new();
        let mut p = player("a");
        city.record_construction(&mut p, "HOUSE", ConstructionKind::Purchase, 0);
        let ctx = AchievementContext::BuildingPurchase {
            building_id: "HOUSE",
            cost: 100,
        };
        let unlocked = check_achievements(&catalog, &mut registry, &mut p, &city, ctx);
        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].achievement_id, "FIRST_BUILDING");
        assert_eq!((p.coins, p.score), (50, 10));
        assert!(check_achievements(&catalog, &mut registry, &mut p, &city, ctx).is_empty());
    }

    #[test]
    fn global_first_goes_to_one_player_only() {
        let catalog = Catalog::load_from_static().unwrap();
        let mut registry = AchievementRegistry::new();
        let ctx = AchievementContext::BuildingPurchase {
            building_id: "TECHPARK",
            cost: 1200,
        };
        let mut city = CityAggregate::new();
        let mut a = player("a");
        city.record_construction(&mut a, "TECHPARK", ConstructionKind::Purchase, 0);
        let first = check_achievements(&catalog, &mut registry, &mut a, &city, ctx);
        assert!(first.iter().any(|u| u.achievement_id == "FIRST_TECHPARK" && u.global_first));

        let mut b = player("b");
        b.buildings.insert("TECHPARK".into(), 1);
        let second = check_achievements(&catalog, &mut registry, &mut b, &city, ctx);
        assert!(second.iter().all(|u| u.achievement_id != "FIRST_TECHPARK"));
        assert_eq!(registry.winner("FIRST_TECHPARK"), Some(&a.id));
    }

    #[test]
    fn single_purchase_needs_purchase_context() {
        let catalog = Catalog::load_from_static().unwrap();
        let p = player("a");
        let city = CityAggregate::new();
        let cond = Condition::SinglePurchase { amount: 1000 };
        assert!(condition_met(
            &cond,
            &p,
            &city,
            &catalog,
            AchievementContext::BuildingPurchase {
                building_id: "MALL",
                cost: 1000
            }
        ));
        assert!(!condition_met(
            &cond,
            &p,
            &city,
            &catalog,
            AchievementContext::IncomeReceived { amount: 5000 }
        ));
    }

    #[test]
    fn first_building_needs_purchase_and_single_copy_in_city() {
        let catalog = Catalog::load_from_static().unwrap();
        let mut city = CityAggregate::new();
        let mut p = player("a");
        city.record_construction(&mut p, "LANDMARK", ConstructionKind::Purchase, 0);
        let cond = Condition::FirstBuilding {
            building_id: "LANDMARK".into(),
        };
        let purchase = AchievementContext::BuildingPurchase {
            building_id: "LANDMARK",
            cost: 1500,
        };
        assert!(condition_met(&cond, &p, &city, &catalog, purchase));
        assert!(!condition_met(
            &cond,
            &p,
            &city,
            &catalog,
            AchievementContext::BuildingUpgrade {
                building_id: "LANDMARK"
            }
        ));
        city.record_construction(&mut p, "LANDMARK", ConstructionKind::Purchase, 1);
        assert!(!condition_met(&cond, &p, &city, &catalog, purchase));
    }

    #[test]
    fn diversity_counts_distinct_categories() {
        let catalog = Catalog::load_from_static().unwrap();
        let mut p = player("a");
        for id in ["HOUSE", "APARTMENT", "SHOP", "PARK"] {
            p.buildings.insert(id.into(), 1);
        }
        assert_eq!(owned_categories(&p, &catalog).len(), 3);
        assert!(condition_met(
            &Condition::CategoryDiversity { count: 3 },
            &p,
            &CityAggregate::new(),
            &catalog,
            AchievementContext::IncomeReceived { amount: 0 }
        ));
    }
}
