//! Item cards: catalog shape and the per-effect apply functions.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::city::{CityAggregate, ConstructionKind};
use crate::error::{GameError, GameResult};
use crate::player::{EffectKind, Player};
use crate::rng::roll_inclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Discount,
    Income,
    Building,
    Defense,
    Instant,
    Special,
}

/// What using an item does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemEffect {
    PurchaseDiscount { value: f64 },
    PurchaseIncrease { value: f64 },
    IncomeMultiplier { value: f64 },
    InstantCoins { value: i64 },
    InstantScore { value: i64 },
    CopyLastBuilding,
    FreeBuilding { building_id: String },
    EventShield,
    RandomCoins { min: i64, max: i64 },
}

impl ItemEffect {
    /// The pending effect this card queues when used, if it queues one.
    #[must_use]
    pub fn pending(&self) -> Option<(EffectKind, f64)> {
        match self {
            Self::PurchaseDiscount { value } => Some((EffectKind::PurchaseDiscount, *value)),
            Self::PurchaseIncrease { value } => Some((EffectKind::PurchaseIncrease, *value)),
            Self::IncomeMultiplier { value } => Some((EffectKind::IncomeMultiplier, *value)),
            Self::EventShield => Some((EffectKind::EventShield, 1.0)),
            Self::InstantCoins { .. }
            | Self::InstantScore { .. }
            | Self::CopyLastBuilding
            | Self::FreeBuilding { .. }
            | Self::RandomCoins { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    #[serde(default)]
    pub description: String,
    pub cost: i64,
    pub category: ItemCategory,
    pub effect: ItemEffect,
}

/// Outcome of using an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemUse {
    EffectQueued { kind: EffectKind, value: f64 },
    CoinsGained { amount: i64 },
    ScoreGained { amount: i64 },
    BuildingGained { building_id: String },
}

impl ItemUse {
    /// Whether the player's portfolio changed.
    #[must_use]
    pub const fn built(&self) -> bool {
        matches!(self, Self::BuildingGained { .. })
    }
}

/// Apply an item's effect to its owner. On error nothing has changed.
pub(crate) fn apply_item_effect<R: Rng + ?Sized>(
    item: &ItemDef,
    player: &mut Player,
    city: &mut CityAggregate,
    catalog: &Catalog,
    rng: &mut R,
    now_ms: u64,
) -> GameResult<ItemUse> {
    if let Some((kind, value)) = item.effect.pending() {
        return Ok(queue_effect(item, player, kind, value));
    }
    match &item.effect {
        ItemEffect::InstantCoins { value } => {
            player.credit(*value, 0);
            Ok(ItemUse::CoinsGained { amount: *value })
        }
        ItemEffect::InstantScore { value } => {
            player.credit(0, *value);
            Ok(ItemUse::ScoreGained { amount: *value })
        }
        ItemEffect::CopyLastBuilding => {
            let last = player.last_built.clone().ok_or(GameError::NoLastBuilding)?;
            grant_building(&last, player, city, catalog, now_ms)
        }
        ItemEffect::FreeBuilding { building_id } => {
            grant_building(building_id, player, city, catalog, now_ms)
        }
        ItemEffect::RandomCoins { min, max } => {
            let amount = roll_inclusive(rng, *min, *max);
            player.credit(amount, 0);
            Ok(ItemUse::CoinsGained { amount })
        }
        ItemEffect::PurchaseDiscount { .. }
        | ItemEffect::PurchaseIncrease { .. }
        | ItemEffect::IncomeMultiplier { .. }
        | ItemEffect::EventShield => Err(GameError::CatalogInconsistency(format!(
            "{} queues an effect but was applied instantly",
            item.id
        ))),
    }
}

fn queue_effect(item: &ItemDef, player: &mut Player, kind: EffectKind, value: f64) -> ItemUse {
    player.push_effect(item.id.clone(), kind, value, item.name.clone());
    ItemUse::EffectQueued { kind, value }
}

fn grant_building(
    building_id: &str,
    player: &mut Player,
    city: &mut CityAggregate,
    catalog: &Catalog,
    now_ms: u64,
) -> GameResult<ItemUse> {
    if catalog.building(building_id).is_none() {
        return Err(GameError::UnknownBuilding(building_id.to_string()));
    }
    city.record_construction(player, building_id, ConstructionKind::Grant, now_ms);
    Ok(ItemUse::BuildingGained {
        building_id: building_id.to_string(),
    })
}
