//! Player Ledger: per-player wallets, portfolios, inventories and effects.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::PLAYER_ID_PREFIX;
use crate::roles::RoleId;

/// Stable player identifier handed out by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Kind of a pending one-shot modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    PurchaseDiscount,
    PurchaseIncrease,
    IncomeMultiplier,
    EventShield,
}

/// One-shot modifier waiting for the next purchase, round or event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    /// Item id, or a `mini_`-prefixed mini-event id.
    pub effect_id: String,
    pub kind: EffectKind,
    pub value: f64,
    /// Display label of whatever produced the effect.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub table_number: Option<u32>,
    pub coins: i64,
    pub score: i64,
    /// Building type id -> owned count. Zero entries are dropped.
    pub buildings: BTreeMap<String, u32>,
    pub total_income: i64,
    pub last_built: Option<String>,
    /// Owned item cards, duplicates allowed.
    pub items: Vec<String>,
    /// Pending effects in the order they were gained.
    pub active_effects: Vec<ActiveEffect>,
    pub achievements: BTreeSet<String>,
    #[serde(default)]
    pub achievement_progress: BTreeMap<String, i64>,
    pub role: RoleId,
    pub connected: bool,
    pub joined_at_ms: u64,
}

impl Player {
    #[must_use]
    pub fn new(
        id: PlayerId,
        name: impl Into<String>,
        table_number: Option<u32>,
        role: RoleId,
        coins: i64,
        score: i64,
        joined_at_ms: u64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            table_number,
            coins,
            score,
            buildings: BTreeMap::new(),
            total_income: 0,
            last_built: None,
            items: Vec::new(),
            active_effects: Vec::new(),
            achievements: BTreeSet::new(),
            achievement_progress: BTreeMap::new(),
            role,
            connected: true,
            joined_at_ms,
        }
    }

    /// Total number of owned buildings.
    #[must_use]
    pub fn building_count(&self) -> u32 {
        self.buildings.values().sum()
    }

    #[must_use]
    pub fn owned(&self, building_id: &str) -> u32 {
        self.buildings.get(building_id).copied().unwrap_or(0)
    }

    pub(crate) fn add_building(&mut self, building_id: &str, count: u32) {
        if count == 0 {
            return;
        }
        *self.buildings.entry(building_id.to_string()).or_insert(0) += count;
    }

    /// Remove `count` copies; returns false (and changes nothing) if not enough are owned.
    pub(crate) fn remove_buildings(&mut self, building_id: &str, count: u32) -> bool {
        let owned = self.owned(building_id);
        if owned < count {
            return false;
        }
        if owned == count {
            self.buildings.remove(building_id);
        } else {
            self.buildings.insert(building_id.to_string(), owned - count);
        }
        true
    }

    /// First pending effect of `kind`, with its index.
    #[must_use]
    pub fn first_effect(&self, kind: EffectKind) -> Option<(usize, &ActiveEffect)> {
        self.active_effects
            .iter()
            .enumerate()
            .find(|(_, effect)| effect.kind == kind)
    }

    #[must_use]
    pub fn has_effect(&self, kind: EffectKind) -> bool {
        self.first_effect(kind).is_some()
    }

    pub(crate) fn push_effect(
        &mut self,
        effect_id: impl Into<String>,
        kind: EffectKind,
        value: f64,
        source: impl Into<String>,
    ) {
        self.active_effects.push(ActiveEffect {
            effect_id: effect_id.into(),
            kind,
            value,
            source: source.into(),
        });
    }

    /// Remove effects by index. Indices are removed highest first so earlier
    /// removals never shift later ones.
    pub(crate) fn remove_effects(&mut self, indices: &[usize]) {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        for idx in sorted {
            if idx < self.active_effects.len() {
                self.active_effects.remove(idx);
            }
        }
    }

    #[must_use]
    pub fn has_item(&self, item_id: &str) -> bool {
        self.items.iter().any(|owned| owned == item_id)
    }

    /// Remove the first copy of an item card.
    pub(crate) fn take_item(&mut self, item_id: &str) -> bool {
        if let Some(pos) = self.items.iter().position(|owned| owned == item_id) {
            self.items.remove(pos);
            true
        } else {
            false
        }
    }

    pub(crate) fn credit(&mut self, coins: i64, score: i64) {
        self.coins = self.coins.saturating_add(coins);
        self.score = self.score.saturating_add(score);
    }
}

/// Ordered collection of players keyed by id. Join order is preserved so
/// round resolution and leaderboards are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerLedger {
    players: Vec<Player>,
    next_serial: u64,
}

impl PlayerLedger {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            players: Vec::new(),
            next_serial: 1,
        }
    }

    /// Allocate the next player id.
    pub(crate) fn next_id(&mut self) -> PlayerId {
        let serial = self.next_serial.max(1);
        self.next_serial = serial + 1;
        PlayerId::new(format!("{PLAYER_ID_PREFIX}{serial:04}"))
    }

    pub(crate) fn insert(&mut self, player: Player) {
        if let Some(existing) = self.players.iter_mut().find(|p| p.id == player.id) {
            *existing = player;
        } else {
            self.players.push(player);
        }
    }

    #[must_use]
    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Player> {
        self.players.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Player> {
        self.players.iter_mut()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id.clone()).collect()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.players.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Sum of every player's building count.
    #[must_use]
    pub fn total_buildings(&self) -> u32 {
        self.players.iter().map(Player::building_count).sum()
    }
}

impl<'a> IntoIterator for &'a PlayerLedger {
    type Item = &'a Player;
    type IntoIter = std::slice::Iter<'a, Player>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
