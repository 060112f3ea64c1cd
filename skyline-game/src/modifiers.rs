//! Modifier Resolver.
//!
//! Pure cost and income math. Nothing here mutates a player: the resolver
//! reports which pending effects a purchase or round would consume and the
//! caller removes them once the operation commits.

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::buildings::{BuildingDef, Category};
use crate::catalog::Catalog;
use crate::events::EventMultipliers;
use crate::numbers::{floor_f64_to_i64, i64_to_f64, round_f64_to_i64, u32_to_f64};
use crate::player::{EffectKind, Player};
use crate::rng::roll_chance;
use crate::roles::Role;

/// Where the winning discount came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DiscountSource {
    /// A pending item or mini-event discount; `label` is its display source.
    Item { label: String },
    RoleSkill { role_name: String },
    LuckyRoll { role_name: String },
}

impl DiscountSource {
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Item { label } => label.clone(),
            Self::RoleSkill { role_name } => format!("{role_name} skill"),
            Self::LuckyRoll { role_name } => format!("{role_name} lucky roll"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostQuote {
    /// Catalog cost.
    pub base_cost: i64,
    /// Cost after any pending price increase.
    pub inflated_cost: i64,
    pub final_cost: i64,
    /// Winning discount fraction, 0.0 when none applied.
    pub discount: f64,
    pub discount_source: Option<DiscountSource>,
    /// Index of the item discount effect to consume, if an item won.
    pub discount_effect: Option<usize>,
    /// Index of the price increase effect to consume.
    pub increase_effect: Option<usize>,
}

impl CostQuote {
    /// Effect indices to remove when the purchase commits.
    #[must_use]
    pub fn consumed_effects(&self) -> Vec<usize> {
        self.discount_effect
            .into_iter()
            .chain(self.increase_effect)
            .collect()
    }
}

fn apply_fraction(cost: i64, discount: f64) -> i64 {
    floor_f64_to_i64(i64_to_f64(cost) * (1.0 - discount))
}

/// Resolve what `player` pays for `building`.
///
/// Order: first pending price increase inflates the base; the largest item
/// discount is selected; a strictly larger category cost reduction from the
/// role replaces it; a triggered random discount that is strictly larger
/// replaces both. Role-sourced discounts never consume an item effect. The
/// random-discount roll happens on every call for roles that have the skill.
pub fn compute_effective_cost<R: Rng + ?Sized>(
    player: &Player,
    building: &BuildingDef,
    role: Option<&Role>,
    rng: &mut R,
) -> CostQuote {
    let base_cost = building.cost;
    let mut increase_effect = None;
    let mut inflated_cost = base_cost;
    if let Some((idx, effect)) = player.first_effect(EffectKind::PurchaseIncrease) {
        inflated_cost = floor_f64_to_i64(i64_to_f64(base_cost) * (1.0 + effect.value));
        increase_effect = Some(idx);
    }

    let mut final_cost = inflated_cost;
    let mut discount = 0.0_f64;
    let mut discount_source = None;
    let mut discount_effect = None;

    for (idx, effect) in player.active_effects.iter().enumerate() {
        if effect.kind == EffectKind::PurchaseDiscount && effect.value > discount {
            discount = effect.value;
            final_cost = apply_fraction(inflated_cost, discount);
            discount_source = Some(DiscountSource::Item {
                label: effect.source.clone(),
            });
            discount_effect = Some(idx);
        }
    }

    if let Some(role) = role {
        if let Some(value) = role.cost_reduction_for(building.category) {
            if value > discount {
                discount = value;
                final_cost = apply_fraction(inflated_cost, discount);
                discount_source = Some(DiscountSource::RoleSkill {
                    role_name: role.name.clone(),
                });
                discount_effect = None;
            }
        }
        if let Some((chance, lucky_discount)) = role.random_discount() {
            if roll_chance(rng, chance) && lucky_discount > discount {
                discount = lucky_discount;
                final_cost = apply_fraction(inflated_cost, discount);
                discount_source = Some(DiscountSource::LuckyRoll {
                    role_name: role.name.clone(),
                });
                discount_effect = None;
            }
        }
    }

    debug!(
        "cost {} for {}: base {base_cost}, inflated {inflated_cost}, discount {discount}, final {final_cost}",
        building.id, player.id
    );
    CostQuote {
        base_cost,
        inflated_cost,
        final_cost,
        discount,
        discount_source,
        discount_effect,
        increase_effect,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeLine {
    pub building_id: String,
    pub name: String,
    pub emoji: String,
    pub count: u32,
    /// `income * count` before multipliers.
    pub base_income: i64,
    pub multiplier: f64,
    pub final_income: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleBonus {
    pub category: Category,
    pub value: f64,
    pub role_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeQuote {
    pub total_income: i64,
    pub breakdown: Vec<IncomeLine>,
    /// The last category bonus that applied to any line.
    pub role_bonus: Option<RoleBonus>,
    pub lucky_triggered: bool,
    pub item_bonus_applied: bool,
    /// Index of the income multiplier effect consumed by this round.
    pub item_effect: Option<usize>,
}

/// Resolve a player's round income under `multipliers`.
///
/// Each line is `round(income * count * event * (1 + role bonus))`. The
/// first pending income multiplier scales the total; then a lucky role roll
/// may scale it again. Both stack.
pub fn compute_round_income<R: Rng + ?Sized>(
    player: &Player,
    catalog: &Catalog,
    multipliers: &EventMultipliers,
    role: Option<&Role>,
    rng: &mut R,
) -> IncomeQuote {
    let mut total_income = 0_i64;
    let mut breakdown = Vec::with_capacity(player.buildings.len());
    let mut role_bonus = None;

    for (building_id, count) in &player.buildings {
        let Some(building) = catalog.building(building_id) else {
            continue;
        };
        let base_income = building.income.saturating_mul(i64::from(*count));
        let mut multiplier = multipliers.for_building(building_id);
        if let Some(value) = role.and_then(|r| r.income_bonus_for(building.category)) {
            multiplier *= 1.0 + value;
            role_bonus = role.map(|r| RoleBonus {
                category: building.category,
                value,
                role_name: r.name.clone(),
            });
        }
        let final_income =
            round_f64_to_i64(i64_to_f64(building.income) * u32_to_f64(*count) * multiplier);
        total_income = total_income.saturating_add(final_income);
        breakdown.push(IncomeLine {
            building_id: building_id.clone(),
            name: building.name.clone(),
            emoji: building.emoji.clone(),
            count: *count,
            base_income,
            multiplier,
            final_income,
        });
    }

    let mut item_effect = None;
    if let Some((idx, effect)) = player.first_effect(EffectKind::IncomeMultiplier) {
        total_income = round_f64_to_i64(i64_to_f64(total_income) * effect.value);
        item_effect = Some(idx);
    }

    let mut lucky_triggered = false;
    if let Some((chance, factor)) = role.and_then(Role::random_income_bonus) {
        if roll_chance(rng, chance) {
            total_income = round_f64_to_i64(i64_to_f64(total_income) * factor);
            lucky_triggered = true;
        }
    }

    debug!(
        "income for {}: {total_income} (item bonus {}, lucky {lucky_triggered})",
        player.id,
        item_effect.is_some()
    );
    IncomeQuote {
        total_income,
        breakdown,
        role_bonus,
        lucky_triggered,
        item_bonus_applied: item_effect.is_some(),
        item_effect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventCard, EventEffect, EventKind, Mood};
    use crate::player::PlayerId;
    use crate::roles::RoleId;
    use rand::rngs::mock::StepRng;

    fn catalog() -> Catalog {
        Catalog::load_from_static().unwrap()
    }

    fn player(role: RoleId) -> Player {
        Player::new(PlayerId::new("p"), "P", None, role, 500, 0, 0)
    }

    fn never() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn always() -> StepRng {
        StepRng::new(0, 0)
    }

    #[test]
    fn item_discount_applies_and_is_marked_for_consumption() {
        let catalog = catalog();
        let mut p = player(RoleId::Lucky);
        p.push_effect("DISCOUNT_30", EffectKind::PurchaseDiscount, 0.3, "30% Off Coupon");
        let house = catalog.building("HOUSE").unwrap();
        let quote = compute_effective_cost(&p, house, catalog.role(p.role), &mut never());
        assert_eq!(quote.final_cost, 70);
        assert_eq!(quote.discount_effect, Some(0));
        assert_eq!(quote.consumed_effects(), vec![0]);
    }

    #[test]
    fn larger_role_discount_keeps_item() {
        let catalog = catalog();
        let mut p = player(RoleId::Architect);
        p.push_effect("X", EffectKind::PurchaseDiscount, 0.1, "coupon");
        let house = catalog.building("HOUSE").unwrap();
        let quote = compute_effective_cost(&p, house, catalog.role(p.role), &mut never());
        assert_eq!(quote.final_cost, 80);
        assert_eq!(quote.discount_effect, None);
        assert_eq!(
            quote.discount_source,
            Some(DiscountSource::RoleSkill {
                role_name: "Architect".into()
            })
        );
    }

    #[test]
    fn larger_item_discount_beats_role() {
        let catalog = catalog();
        let mut p = player(RoleId::Architect);
        p.push_effect("DISCOUNT_50", EffectKind::PurchaseDiscount, 0.5, "Half Price Coupon");
        let house = catalog.building("HOUSE").unwrap();
        let quote = compute_effective_cost(&p, house, catalog.role(p.role), &mut never());
        assert_eq!(quote.final_cost, 50);
        assert_eq!(quote.discount_effect, Some(0));
    }

    #[test]
    fn best_item_discount_wins_with_ties_to_first() {
        let catalog = catalog();
        let mut p = player(RoleId::Lucky);
        p.push_effect("A", EffectKind::PurchaseDiscount, 0.3, "a");
        p.push_effect("B", EffectKind::PurchaseDiscount, 0.5, "b");
        p.push_effect("C", EffectKind::PurchaseDiscount, 0.5, "c");
        let shop = catalog.building("SHOP").unwrap();
        let quote = compute_effective_cost(&p, shop, catalog.role(p.role), &mut never());
        assert_eq!(quote.discount_effect, Some(1));
        assert_eq!(quote.final_cost, 75);
    }

    #[test]
    fn increase_inflates_base_before_discount() {
        let catalog = catalog();
        let mut p = player(RoleId::Lucky);
        p.push_effect("mini_MATERIAL_SHORTAGE", EffectKind::PurchaseIncrease, 0.2, "Material Shortage");
        p.push_effect("DISCOUNT_50", EffectKind::PurchaseDiscount, 0.5, "Half Price Coupon");
        let house = catalog.building("HOUSE").unwrap();
        let quote = compute_effective_cost(&p, house, catalog.role(p.role), &mut never());
        assert_eq!(quote.inflated_cost, 120);
        assert_eq!(quote.final_cost, 60);
        let mut consumed = quote.consumed_effects();
        consumed.sort_unstable();
        assert_eq!(consumed, vec![0, 1]);
    }

    #[test]
    fn adventurer_roll_overrides_everything_when_triggered() {
        let catalog = catalog();
        let mut p = player(RoleId::Adventurer);
        p.push_effect("DISCOUNT_30", EffectKind::PurchaseDiscount, 0.3, "coupon");
        let mall = catalog.building("MALL").unwrap();
        let hit = compute_effective_cost(&p, mall, catalog.role(p.role), &mut always());
        assert_eq!(hit.final_cost, 500);
        assert_eq!(hit.discount_effect, None);
        assert!(matches!(hit.discount_source, Some(DiscountSource::LuckyRoll { .. })));
        let miss = compute_effective_cost(&p, mall, catalog.role(p.role), &mut never());
        assert_eq!(miss.final_cost, 700);
    }

    #[test]
    fn income_composes_event_and_role_multipliers() {
        let catalog = catalog();
        let mut p = player(RoleId::Landlord);
        p.buildings.insert("HOUSE".into(), 3);
        let event = EventCard {
            id: "E".into(),
            kind: EventKind::Boom,
            title: "E".into(),
            description: String::new(),
            icon: String::new(),
            mood: Mood::Positive,
            effects: vec![
                EventEffect::BuildingMultiplier {
                    building_id: "HOUSE".into(),
                    multiplier: 2.0,
                },
                EventEffect::AllMultiplier { multiplier: 1.3 },
            ],
        };
        let m = EventMultipliers::from_event(&event);
        let quote = compute_round_income(&p, &catalog, &m, catalog.role(p.role), &mut never());
        // 3 * 15 * 2.0 * 1.3 * 1.25 = 146.25
        assert_eq!(quote.total_income, 146);
        assert_eq!(quote.breakdown[0].base_income, 45);
        assert!(quote.role_bonus.is_some());
    }

    #[test]
    fn item_multiplier_and_lucky_roll_stack() {
        let catalog = catalog();
        let mut p = player(RoleId::Lucky);
        p.buildings.insert("SHOP".into(), 1);
        p.push_effect("DOUBLE_INCOME", EffectKind::IncomeMultiplier, 2.0, "Double Income Card");
        let quote = compute_round_income(
            &p,
            &catalog,
            &EventMultipliers::default(),
            catalog.role(p.role),
            &mut always(),
        );
        assert_eq!(quote.total_income, 100);
        assert!(quote.lucky_triggered);
        assert!(quote.item_bonus_applied);
        assert_eq!(quote.item_effect, Some(0));
    }

    #[test]
    fn empty_portfolio_earns_nothing() {
        let catalog = catalog();
        let p = player(RoleId::Lucky);
        let quote = compute_round_income(
            &p,
            &catalog,
            &EventMultipliers::default(),
            catalog.role(p.role),
            &mut always(),
        );
        assert_eq!(quote.total_income, 0);
        assert!(quote.breakdown.is_empty());
    }
}
