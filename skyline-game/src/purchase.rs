//! Purchase Engine: buildings, upgrades and item cards.
//!
//! Each command validates first and mutates after, so a rejected command
//! leaves the session exactly as it found it.

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::achievements::{AchievementContext, UnlockedAchievement, check_achievements};
use crate::buildings::BuildingDef;
use crate::city::ConstructionKind;
use crate::constants::{CHEAP_ITEM_MAX_COST, ITEM_DROP_CHANCE, MINI_EVENT_CHANCE};
use crate::error::{GameError, GameResult};
use crate::goals::CompletedGoal;
use crate::items::{ItemDef, ItemUse, apply_item_effect};
use crate::mini_events::{MiniEventOutcome, apply_mini_event, draw_mini_event};
use crate::modifiers::{CostQuote, compute_effective_cost};
use crate::notify::Notification;
use crate::player::PlayerId;
use crate::rng::{pick_index, roll_chance};
use crate::round::GamePhase;
use crate::session::GameSession;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDrop {
    pub item_id: String,
    pub name: String,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub player_id: PlayerId,
    pub building: BuildingDef,
    pub quote: CostQuote,
    /// Coins left after the purchase and everything it triggered.
    pub coins_left: i64,
    pub achievements: Vec<UnlockedAchievement>,
    pub item_drop: Option<ItemDrop>,
    pub mini_event: Option<MiniEventOutcome>,
    pub completed_goals: Vec<CompletedGoal>,
}

impl PurchaseReceipt {
    #[must_use]
    pub const fn cost(&self) -> i64 {
        self.quote.final_cost
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeOption {
    pub from: String,
    pub to: String,
    pub merge_count: u32,
    pub owned: u32,
    pub times_can_upgrade: u32,
    pub bonus_score: i64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeReceipt {
    pub player_id: PlayerId,
    pub from: String,
    pub to: BuildingDef,
    pub merge_count: u32,
    pub bonus_score: i64,
    pub achievements: Vec<UnlockedAchievement>,
    pub completed_goals: Vec<CompletedGoal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemReceipt {
    pub player_id: PlayerId,
    pub item: ItemDef,
    pub outcome: ItemUse,
    pub completed_goals: Vec<CompletedGoal>,
}

impl GameSession {
    /// Buy one building at the resolved price.
    ///
    /// After the commit, in order: achievement check, item drop roll, mini
    /// event roll, city goal check.
    ///
    /// # Errors
    ///
    /// Rejects unknown players, purchases after the game ended, unknown
    /// buildings and purchases the player cannot afford.
    pub fn buy_building(
        &mut self,
        player_id: &PlayerId,
        building_id: &str,
    ) -> GameResult<PurchaseReceipt> {
        let catalog = Arc::clone(&self.catalog);
        let now = self.now_ms();
        let player = self
            .players
            .get_mut(player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.clone()))?;
        if self.phase == GamePhase::Ended {
            return Err(GameError::GameEnded);
        }
        let building = catalog
            .building(building_id)
            .ok_or_else(|| GameError::UnknownBuilding(building_id.to_string()))?;

        let quote = compute_effective_cost(player, building, catalog.role(player.role), self.rng.luck());
        if player.coins < quote.final_cost {
            debug!(
                "{player_id} cannot afford {building_id}: {} < {}",
                player.coins, quote.final_cost
            );
            return Err(GameError::InsufficientCoins {
                needed: quote.final_cost,
                available: player.coins,
            });
        }

        player.coins -= quote.final_cost;
        player.remove_effects(&quote.consumed_effects());
        self.city
            .record_construction(player, &building.id, ConstructionKind::Purchase, now);
        info!(
            "{player_id} bought {} for {} (base {})",
            building.id, quote.final_cost, quote.base_cost
        );

        let achievements = check_achievements(
            &catalog,
            &mut self.registry,
            player,
            &self.city,
            AchievementContext::BuildingPurchase {
                building_id: &building.id,
                cost: quote.final_cost,
            },
        );

        let mut item_drop = None;
        if roll_chance(self.rng.loot(), ITEM_DROP_CHANCE) {
            let pool = catalog.cheap_items(CHEAP_ITEM_MAX_COST);
            if let Some(item) = pick_index(self.rng.loot(), pool.len()).and_then(|idx| pool.get(idx)) {
                player.items.push(item.id.clone());
                debug!("{player_id} found item {}", item.id);
                item_drop = Some(ItemDrop {
                    item_id: item.id.clone(),
                    name: item.name.clone(),
                    emoji: item.emoji.clone(),
                });
            }
        }

        let mut mini_event = None;
        if roll_chance(self.rng.mini_event(), MINI_EVENT_CHANCE) {
            if let Some(def) = draw_mini_event(catalog.mini_events(), self.rng.mini_event()) {
                let outcome = apply_mini_event(def, player, &catalog, self.rng.mini_event());
                debug!("{player_id} hit mini event {}", outcome.event_id);
                mini_event = Some(outcome);
            }
        }
        let coins_left = player.coins;

        self.notify(Notification::BuildingPurchased {
            player_id: player_id.clone(),
            building_id: building.id.clone(),
            cost: quote.final_cost,
        });
        self.announce_unlocks(player_id, &achievements);
        if let Some(drop) = &item_drop {
            self.notify(Notification::ItemDropped {
                player_id: player_id.clone(),
                item_id: drop.item_id.clone(),
            });
        }
        if let Some(outcome) = &mini_event {
            self.notify(Notification::MiniEventTriggered {
                player_id: player_id.clone(),
                event_id: outcome.event_id.clone(),
                result: outcome.result.clone(),
            });
        }
        let completed_goals = self.check_city_goals();

        Ok(PurchaseReceipt {
            player_id: player_id.clone(),
            building: building.clone(),
            quote,
            coins_left,
            achievements,
            item_drop,
            mini_event,
            completed_goals,
        })
    }

    /// Merge options for the player's current holdings.
    ///
    /// # Errors
    ///
    /// Fails for unknown players.
    pub fn upgradeable_buildings(&self, player_id: &PlayerId) -> GameResult<Vec<UpgradeOption>> {
        let player = self.require_player(player_id)?;
        Ok(self
            .catalog
            .upgrades()
            .iter()
            .filter_map(|path| {
                let owned = player.owned(&path.from);
                (owned >= path.merge_count && path.merge_count > 0).then(|| UpgradeOption {
                    from: path.from.clone(),
                    to: path.to.clone(),
                    merge_count: path.merge_count,
                    owned,
                    times_can_upgrade: owned / path.merge_count,
                    bonus_score: path.bonus_score,
                    description: path.description.clone(),
                })
            })
            .collect())
    }

    /// Merge `merge_count` copies of `building_id` into its upgrade target.
    ///
    /// # Errors
    ///
    /// Rejects unknown players, upgrades after the game ended, buildings
    /// with no upgrade path and players holding too few copies.
    pub fn upgrade_building(
        &mut self,
        player_id: &PlayerId,
        building_id: &str,
    ) -> GameResult<UpgradeReceipt> {
        let catalog = Arc::clone(&self.catalog);
        let now = self.now_ms();
        let player = self
            .players
            .get_mut(player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.clone()))?;
        if self.phase == GamePhase::Ended {
            return Err(GameError::GameEnded);
        }
        let path = catalog
            .upgrade_from(building_id)
            .ok_or_else(|| GameError::NotUpgradeable(building_id.to_string()))?;
        let target = catalog.building(&path.to).ok_or_else(|| {
            GameError::CatalogInconsistency(format!("upgrade target `{}` is not a building", path.to))
        })?;
        let owned = player.owned(building_id);
        if owned < path.merge_count
            || !self.city.consume_for_merge(player, building_id, path.merge_count)
        {
            return Err(GameError::NotEnoughToMerge {
                building_id: building_id.to_string(),
                required: path.merge_count,
                owned,
            });
        }
        self.city.record_construction(
            player,
            &target.id,
            ConstructionKind::Upgrade {
                from: path.from.clone(),
            },
            now,
        );
        player.credit(0, path.bonus_score);
        info!(
            "{player_id} merged {}x {} into {} (+{} score)",
            path.merge_count, path.from, target.id, path.bonus_score
        );

        let achievements = check_achievements(
            &catalog,
            &mut self.registry,
            player,
            &self.city,
            AchievementContext::BuildingUpgrade {
                building_id: &target.id,
            },
        );
        self.notify(Notification::BuildingUpgraded {
            player_id: player_id.clone(),
            from: path.from.clone(),
            to: target.id.clone(),
            merge_count: path.merge_count,
            bonus_score: path.bonus_score,
        });
        self.announce_unlocks(player_id, &achievements);
        let completed_goals = self.check_city_goals();

        Ok(UpgradeReceipt {
            player_id: player_id.clone(),
            from: path.from.clone(),
            to: target.clone(),
            merge_count: path.merge_count,
            bonus_score: path.bonus_score,
            achievements,
            completed_goals,
        })
    }

    /// Buy an item card into the player's hand.
    ///
    /// # Errors
    ///
    /// Rejects unknown players, unknown items and purchases the player
    /// cannot afford.
    pub fn buy_item(&mut self, player_id: &PlayerId, item_id: &str) -> GameResult<ItemDef> {
        let catalog = Arc::clone(&self.catalog);
        let item = catalog
            .item(item_id)
            .ok_or_else(|| GameError::UnknownItem(item_id.to_string()))?;
        let player = self.player_mut(player_id)?;
        if player.coins < item.cost {
            return Err(GameError::InsufficientCoins {
                needed: item.cost,
                available: player.coins,
            });
        }
        player.coins -= item.cost;
        player.items.push(item.id.clone());
        info!("{player_id} bought item {} for {}", item.id, item.cost);
        self.notify(Notification::ItemPurchased {
            player_id: player_id.clone(),
            item_id: item.id.clone(),
        });
        Ok(item.clone())
    }

    /// Play one owned card. The card leaves the hand only if its effect
    /// applied; buildings it grants re-run the city goals.
    ///
    /// # Errors
    ///
    /// Rejects unknown players and items, cards the player does not hold,
    /// and effects that cannot apply (e.g. copying with nothing built yet).
    pub fn use_item(&mut self, player_id: &PlayerId, item_id: &str) -> GameResult<ItemReceipt> {
        let catalog = Arc::clone(&self.catalog);
        let now = self.now_ms();
        let item = catalog
            .item(item_id)
            .ok_or_else(|| GameError::UnknownItem(item_id.to_string()))?;
        let player = self
            .players
            .get_mut(player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.clone()))?;
        if !player.has_item(item_id) {
            return Err(GameError::ItemNotOwned(item_id.to_string()));
        }
        let outcome = apply_item_effect(item, player, &mut self.city, &catalog, self.rng.luck(), now)?;
        player.take_item(item_id);
        info!("{player_id} used item {item_id}");

        self.notify(Notification::ItemUsed {
            player_id: player_id.clone(),
            item_id: item.id.clone(),
        });
        let completed_goals = if outcome.built() {
            self.check_city_goals()
        } else {
            Vec::new()
        };
        Ok(ItemReceipt {
            player_id: player_id.clone(),
            item: item.clone(),
            outcome,
            completed_goals,
        })
    }

    /// Host grant of an item card.
    ///
    /// # Errors
    ///
    /// Rejects unknown players and items.
    pub fn give_item(&mut self, player_id: &PlayerId, item_id: &str, reason: &str) -> GameResult<ItemDef> {
        let catalog = Arc::clone(&self.catalog);
        let item = catalog
            .item(item_id)
            .ok_or_else(|| GameError::UnknownItem(item_id.to_string()))?;
        self.player_mut(player_id)?.items.push(item.id.clone());
        self.notify(Notification::ItemReceived {
            player_id: player_id.clone(),
            item_id: item.id.clone(),
            reason: reason.to_string(),
        });
        Ok(item.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::SessionConfig;
    use crate::player::EffectKind;
    use crate::rng::RngBundle;
    use crate::roles::RoleId;
    use rand::rngs::mock::StepRng;

    /// Rolls never succeed and index picks land on the last entry.
    fn quiet_session(coins: i64) -> (GameSession, PlayerId) {
        let mut s = GameSession::new(
            Catalog::embedded().unwrap(),
            SessionConfig {
                starting_coins: coins,
                ..SessionConfig::default()
            },
        )
        .unwrap()
        .with_rng(RngBundle::uniform(StepRng::new(u64::MAX, 0)));
        let id = s.join_player("Ada", None);
        s.assign_role(&id, RoleId::Lucky).unwrap();
        (s, id)
    }

    #[test]
    fn purchase_debits_exact_cost_and_updates_city() {
        let (mut s, id) = quiet_session(500);
        let receipt = s.buy_building(&id, "SHOP").unwrap();
        assert_eq!(receipt.cost(), 150);
        let p = s.player(&id).unwrap();
        // FIRST_BUILDING pays 50 coins on top.
        assert_eq!(p.coins, 500 - 150 + 50);
        assert_eq!(p.owned("SHOP"), 1);
        assert_eq!(p.last_built.as_deref(), Some("SHOP"));
        assert_eq!(s.city().count("SHOP"), 1);
        assert_eq!(s.city().log().len(), 1);
        assert!(receipt.item_drop.is_none());
        assert!(receipt.mini_event.is_none());
    }

    #[test]
    fn coupon_is_consumed_by_the_purchase() {
        let (mut s, id) = quiet_session(500);
        s.give_item(&id, "DISCOUNT_30", "test").unwrap();
        s.use_item(&id, "DISCOUNT_30").unwrap();
        assert!(s.player(&id).unwrap().has_effect(EffectKind::PurchaseDiscount));
        let receipt = s.buy_building(&id, "HOUSE").unwrap();
        assert_eq!(receipt.cost(), 70);
        assert!(!s.player(&id).unwrap().has_effect(EffectKind::PurchaseDiscount));
        assert!(!s.player(&id).unwrap().has_item("DISCOUNT_30"));
    }

    #[test]
    fn rejected_purchase_changes_nothing() {
        let (mut s, id) = quiet_session(50);
        let before = s.snapshot();
        let err = s.buy_building(&id, "HOUSE").unwrap_err();
        assert_eq!(
            err,
            GameError::InsufficientCoins {
                needed: 100,
                available: 50
            }
        );
        assert_eq!(s.snapshot(), before);
        assert_eq!(
            s.buy_building(&id, "CASTLE").unwrap_err(),
            GameError::UnknownBuilding("CASTLE".into())
        );
        let ghost = PlayerId::new("ghost");
        assert_eq!(
            s.buy_building(&ghost, "HOUSE").unwrap_err(),
            GameError::PlayerNotFound(ghost)
        );
    }

    #[test]
    fn purchases_are_allowed_in_every_phase_but_ended() {
        let (mut s, id) = quiet_session(5_000);
        s.buy_building(&id, "HOUSE").unwrap();
        s.start_game().unwrap();
        s.buy_building(&id, "HOUSE").unwrap();
        s.trigger_event(Some("BOOM_TECH")).unwrap();
        s.buy_building(&id, "HOUSE").unwrap();
        s.end_game();
        assert_eq!(s.buy_building(&id, "HOUSE").unwrap_err(), GameError::GameEnded);
        assert_eq!(s.upgrade_building(&id, "HOUSE").unwrap_err(), GameError::GameEnded);
    }

    #[test]
    fn lucky_rolls_drop_an_item_and_trigger_a_mini_event() {
        let mut s = GameSession::new(Catalog::embedded().unwrap(), SessionConfig::default())
            .unwrap()
            .with_rng(RngBundle::uniform(StepRng::new(0, 0)));
        let id = s.join_player("Ada", None);
        let receipt = s.buy_building(&id, "HOUSE").unwrap();
        let drop = receipt.item_drop.unwrap();
        let first_cheap = s.catalog().cheap_items(CHEAP_ITEM_MAX_COST)[0].id.clone();
        assert_eq!(drop.item_id, first_cheap);
        assert!(receipt.mini_event.is_some());
        assert!(s.player(&id).unwrap().has_item(&first_cheap));
    }

    #[test]
    fn upgrade_merges_holdings_into_target() {
        let (mut s, id) = quiet_session(5_000);
        for _ in 0..4 {
            s.buy_building(&id, "HOUSE").unwrap();
        }
        let options = s.upgradeable_buildings(&id).unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].times_can_upgrade, 1);
        let score_before = s.player(&id).unwrap().score;

        let receipt = s.upgrade_building(&id, "HOUSE").unwrap();
        assert_eq!(receipt.to.id, "APARTMENT");
        let p = s.player(&id).unwrap();
        assert_eq!(p.owned("HOUSE"), 1);
        assert_eq!(p.owned("APARTMENT"), 1);
        assert_eq!(p.last_built.as_deref(), Some("APARTMENT"));
        let rewards: i64 = receipt.achievements.iter().map(|a| a.reward.score).sum();
        assert_eq!(p.score, score_before + 30 + rewards);
        assert_eq!(s.city().count("HOUSE"), 1);
        assert_eq!(s.city().count("APARTMENT"), 1);
        // Three purchase entries were folded into one upgrade entry.
        assert_eq!(s.city().log().len(), 2);
        assert!(s.city().is_consistent_with(s.players()));
    }

    #[test]
    fn upgrade_requires_path_and_copies() {
        let (mut s, id) = quiet_session(5_000);
        s.buy_building(&id, "HOUSE").unwrap();
        assert_eq!(
            s.upgrade_building(&id, "HOUSE").unwrap_err(),
            GameError::NotEnoughToMerge {
                building_id: "HOUSE".into(),
                required: 3,
                owned: 1
            }
        );
        assert_eq!(
            s.upgrade_building(&id, "SPACEPORT").unwrap_err(),
            GameError::NotUpgradeable("SPACEPORT".into())
        );
        assert_eq!(s.player(&id).unwrap().owned("HOUSE"), 1);
    }

    #[test]
    fn failed_item_use_keeps_the_card() {
        let (mut s, id) = quiet_session(500);
        s.give_item(&id, "COPY_CARD", "test").unwrap();
        assert_eq!(s.use_item(&id, "COPY_CARD").unwrap_err(), GameError::NoLastBuilding);
        assert!(s.player(&id).unwrap().has_item("COPY_CARD"));
        assert_eq!(
            s.use_item(&id, "SHIELD_CARD").unwrap_err(),
            GameError::ItemNotOwned("SHIELD_CARD".into())
        );
    }

    #[test]
    fn free_building_card_updates_city_and_goals() {
        let (mut s, id) = quiet_session(500);
        s.give_item(&id, "FREE_HOUSE", "test").unwrap();
        let receipt = s.use_item(&id, "FREE_HOUSE").unwrap();
        assert!(receipt.outcome.built());
        assert_eq!(s.city().count("HOUSE"), 1);
        assert!(s.city().log()[0].is_free);
        assert_eq!(s.player(&id).unwrap().coins, 500);
    }

    #[test]
    fn buy_item_checks_wallet() {
        let (mut s, id) = quiet_session(90);
        s.buy_item(&id, "BONUS_100").unwrap();
        assert_eq!(s.player(&id).unwrap().coins, 10);
        assert!(matches!(
            s.buy_item(&id, "BONUS_100"),
            Err(GameError::InsufficientCoins { needed: 80, available: 10 })
        ));
        assert_eq!(
            s.buy_item(&id, "NOPE").unwrap_err(),
            GameError::UnknownItem("NOPE".into())
        );
    }
}
