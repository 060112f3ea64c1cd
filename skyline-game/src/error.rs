//! Error type shared by every session operation.

use thiserror::Error;

use crate::player::PlayerId;

/// Reasons a session operation can be rejected. A rejected operation leaves
/// the session untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("player `{0}` not found")]
    PlayerNotFound(PlayerId),
    #[error("the game has ended")]
    GameEnded,
    #[error("the game has already started")]
    AlreadyStarted,
    #[error("unknown building `{0}`")]
    UnknownBuilding(String),
    #[error("unknown item `{0}`")]
    UnknownItem(String),
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
    #[error("unknown city goal `{0}`")]
    UnknownGoal(String),
    #[error("insufficient coins: need {needed}, have {available}")]
    InsufficientCoins { needed: i64, available: i64 },
    #[error("building `{0}` cannot be upgraded")]
    NotUpgradeable(String),
    #[error("upgrading `{building_id}` needs {required} copies, only {owned} owned")]
    NotEnoughToMerge {
        building_id: String,
        required: u32,
        owned: u32,
    },
    #[error("item `{0}` is not in the player's inventory")]
    ItemNotOwned(String),
    #[error("no building has been built yet")]
    NoLastBuilding,
    #[error("city goal `{0}` is already active")]
    GoalAlreadyActive(String),
    #[error("city goal `{0}` is already completed")]
    GoalAlreadyCompleted(String),
    #[error("city goal `{0}` is not active")]
    GoalNotActive(String),
    #[error("a flash sale is already running")]
    SaleAlreadyActive,
    #[error("flash sale is over or sold out")]
    SoldOut,
    #[error("flash sale window has passed")]
    SaleExpired,
    #[error("player already bought from this flash sale")]
    AlreadyPurchased,
    #[error("invalid flash sale: {0}")]
    InvalidSale(&'static str),
    #[error("catalog inconsistency: {0}")]
    CatalogInconsistency(String),
}

pub type GameResult<T> = Result<T, GameError>;
