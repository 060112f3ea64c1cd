//! Centralized tuning constants for the Skyline resolution engine.
//!
//! Catalog content (costs, incomes, rewards) lives in the JSON assets. The
//! values here are the rules that sit around the catalog: probabilities,
//! session defaults and reserved keys. Changing them changes game balance.

// Session defaults ----------------------------------------------------------
pub const DEFAULT_STARTING_COINS: i64 = 500;
pub const DEFAULT_STARTING_SCORE: i64 = 0;
pub const DEFAULT_FLASH_SALE_SECONDS: u64 = 60;
pub const DEFAULT_SESSION_SEED: u64 = 0x5EED_C17E;

// Purchase side effects -----------------------------------------------------
/// Chance that a successful building purchase drops a free cheap item.
pub const ITEM_DROP_CHANCE: f64 = 0.10;
/// Only items at or below this cost are eligible for purchase drops.
pub const CHEAP_ITEM_MAX_COST: i64 = 150;
/// Chance that a successful building purchase triggers a mini event.
pub const MINI_EVENT_CHANCE: f64 = 0.15;

// Effect bookkeeping --------------------------------------------------------
/// Reserved multiplier key meaning "applies to every building".
pub const ALL_BUILDINGS_KEY: &str = "_all";
pub(crate) const MINI_EFFECT_PREFIX: &str = "mini_";

// Stream tags used to derive per-purpose RNG seeds ---------------------------
pub(crate) const RNG_TAG_LOOT: &[u8] = b"loot";
pub(crate) const RNG_TAG_MINI_EVENT: &[u8] = b"mini_event";
pub(crate) const RNG_TAG_LUCK: &[u8] = b"luck";
pub(crate) const RNG_TAG_DECK: &[u8] = b"deck";

// Ledger --------------------------------------------------------------------
pub(crate) const PLAYER_ID_PREFIX: &str = "player-";
