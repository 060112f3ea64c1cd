use std::fmt;

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use skyline_game::{Catalog, Player, UpgradeOption};

/// What a bot wants to do on its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotAction {
    Build(String),
    Upgrade(String),
    BuyItem(String),
    UseItem(String),
    Pass,
}

impl BotAction {
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Build(id) => format!("build {id}"),
            Self::Upgrade(id) => format!("upgrade {id}"),
            Self::BuyItem(id) => format!("buy item {id}"),
            Self::UseItem(id) => format!("use item {id}"),
            Self::Pass => "pass".to_string(),
        }
    }
}

/// Built-in play styles for automated tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BotStrategy {
    /// Merges whenever possible, otherwise buys the priciest affordable building.
    Builder,
    /// Only buys cheap buildings with a comfortable cushion left over.
    Saver,
    /// Spends on item cards first and plays them at random.
    ItemHoarder,
}

impl BotStrategy {
    pub const ALL: [Self; 3] = [Self::Builder, Self::Saver, Self::ItemHoarder];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Builder => "Builder",
            Self::Saver => "Saver",
            Self::ItemHoarder => "Item Hoarder",
        }
    }

    /// Strategies are dealt to tables in rotation.
    #[must_use]
    pub const fn for_table(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn decide(
        self,
        player: &Player,
        catalog: &Catalog,
        upgrades: &[UpgradeOption],
        rng: &mut ChaCha20Rng,
    ) -> BotAction {
        match self {
            Self::Builder => builder_turn(player, catalog, upgrades),
            Self::Saver => saver_turn(player, catalog, rng),
            Self::ItemHoarder => hoarder_turn(player, catalog, rng),
        }
    }
}

impl fmt::Display for BotStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn builder_turn(player: &Player, catalog: &Catalog, upgrades: &[UpgradeOption]) -> BotAction {
    if let Some(option) = upgrades.first() {
        return BotAction::Upgrade(option.from.clone());
    }
    catalog
        .buildings()
        .iter()
        .filter(|b| b.cost <= player.coins)
        .max_by_key(|b| b.cost)
        .map_or(BotAction::Pass, |b| BotAction::Build(b.id.clone()))
}

fn saver_turn(player: &Player, catalog: &Catalog, rng: &mut ChaCha20Rng) -> BotAction {
    let cheap: Vec<_> = catalog
        .buildings()
        .iter()
        .filter(|b| b.cost.saturating_mul(2) <= player.coins)
        .collect();
    if cheap.is_empty() || rng.gen_bool(0.3) {
        return BotAction::Pass;
    }
    let idx = rng.gen_range(0..cheap.len());
    BotAction::Build(cheap[idx].id.clone())
}

fn hoarder_turn(player: &Player, catalog: &Catalog, rng: &mut ChaCha20Rng) -> BotAction {
    if !player.items.is_empty() && rng.gen_bool(0.5) {
        let idx = rng.gen_range(0..player.items.len());
        return BotAction::UseItem(player.items[idx].clone());
    }
    let affordable: Vec<_> = catalog
        .items()
        .iter()
        .filter(|item| item.cost <= player.coins)
        .collect();
    if !affordable.is_empty() && rng.gen_bool(0.6) {
        let idx = rng.gen_range(0..affordable.len());
        return BotAction::BuyItem(affordable[idx].id.clone());
    }
    let buildings: Vec<_> = catalog
        .buildings()
        .iter()
        .filter(|b| b.cost <= player.coins)
        .collect();
    if buildings.is_empty() {
        return BotAction::Pass;
    }
    let idx = rng.gen_range(0..buildings.len());
    BotAction::Build(buildings[idx].id.clone())
}
