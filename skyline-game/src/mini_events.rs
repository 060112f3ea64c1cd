//! Mini events: small weighted surprises rolled after a purchase.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::constants::MINI_EFFECT_PREFIX;
use crate::player::{EffectKind, Player};
use crate::rng::{pick_index, pick_weighted};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MiniEventTone {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MiniEventEffect {
    NextPurchaseDiscount { discount: f64 },
    InstantCoins { amount: i64 },
    NextIncomeMultiplier { multiplier: f64 },
    InstantScore { amount: i64 },
    RandomItem,
    LoseCoins { amount: i64 },
    NextPurchaseIncrease { increase: f64 },
    None,
}

const fn default_weight() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiniEventDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    #[serde(default)]
    pub description: String,
    pub tone: MiniEventTone,
    #[serde(default = "default_weight")]
    pub weight: u32,
    pub effect: MiniEventEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MiniEventResult {
    DiscountQueued { discount: f64 },
    CoinsGained { amount: i64 },
    IncomeMultiplierQueued { multiplier: f64 },
    ScoreGained { amount: i64 },
    ItemGained { item_id: String, item_name: String },
    /// `amount` is what was actually taken after clamping at zero.
    CoinsLost { amount: i64 },
    IncreaseQueued { increase: f64 },
    NoEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiniEventOutcome {
    pub event_id: String,
    pub name: String,
    pub emoji: String,
    pub tone: MiniEventTone,
    pub result: MiniEventResult,
}

/// Weighted draw over the mini-event table.
pub fn draw_mini_event<'a, R: Rng + ?Sized>(
    defs: &'a [MiniEventDef],
    rng: &mut R,
) -> Option<&'a MiniEventDef> {
    let weights: Vec<u32> = defs.iter().map(|d| d.weight).collect();
    pick_weighted(rng, &weights).and_then(|idx| defs.get(idx))
}

/// Apply a drawn mini event to the player who triggered it.
pub(crate) fn apply_mini_event<R: Rng + ?Sized>(
    def: &MiniEventDef,
    player: &mut Player,
    catalog: &Catalog,
    rng: &mut R,
) -> MiniEventOutcome {
    let effect_id = format!("{MINI_EFFECT_PREFIX}{}", def.id);
    let result = match &def.effect {
        MiniEventEffect::NextPurchaseDiscount { discount } => {
            player.push_effect(effect_id, EffectKind::PurchaseDiscount, *discount, def.name.clone());
            MiniEventResult::DiscountQueued {
                discount: *discount,
            }
        }
        MiniEventEffect::InstantCoins { amount } => {
            player.credit(*amount, 0);
            MiniEventResult::CoinsGained { amount: *amount }
        }
        MiniEventEffect::NextIncomeMultiplier { multiplier } => {
            player.push_effect(effect_id, EffectKind::IncomeMultiplier, *multiplier, def.name.clone());
            MiniEventResult::IncomeMultiplierQueued {
                multiplier: *multiplier,
            }
        }
        MiniEventEffect::InstantScore { amount } => {
            player.credit(0, *amount);
            MiniEventResult::ScoreGained { amount: *amount }
        }
        MiniEventEffect::RandomItem => {
            let items = catalog.items();
            match pick_index(rng, items.len()).and_then(|idx| items.get(idx)) {
                Some(item) => {
                    player.items.push(item.id.clone());
                    MiniEventResult::ItemGained {
                        item_id: item.id.clone(),
                        item_name: item.name.clone(),
                    }
                }
                None => MiniEventResult::NoEffect,
            }
        }
        MiniEventEffect::LoseCoins { amount } => {
            let taken = (*amount).min(player.coins).max(0);
            player.coins -= taken;
            MiniEventResult::CoinsLost { amount: taken }
        }
        MiniEventEffect::NextPurchaseIncrease { increase } => {
            player.push_effect(effect_id, EffectKind::PurchaseIncrease, *increase, def.name.clone());
            MiniEventResult::IncreaseQueued {
                increase: *increase,
            }
        }
        MiniEventEffect::None => MiniEventResult::NoEffect,
    };
    MiniEventOutcome {
        event_id: def.id.clone(),
        name: def.name.clone(),
        emoji: def.emoji.clone(),
        tone: def.tone,
        result,
    }
}
