//! Skyline Game Engine
//!
//! Platform-agnostic resolution core for the Skyline live city-building
//! party game: purchases and their modifiers, round events, achievements,
//! city goals and flash sales. No transport, UI or database code lives here.

pub mod achievements;
pub mod buildings;
pub mod catalog;
pub mod city;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod flash_sale;
pub mod goals;
pub mod items;
pub mod mini_events;
pub mod modifiers;
pub mod notify;
pub mod numbers;
pub mod player;
pub mod purchase;
pub mod rng;
pub mod roles;
pub mod round;
pub mod session;
#[cfg(feature = "async")]
pub mod shared;

use std::sync::Arc;

// Re-export commonly used types
pub use achievements::{
    AchievementContext, AchievementDef, AchievementRegistry, Condition, Reward,
    UnlockedAchievement, check_achievements,
};
pub use buildings::{BuildingDef, Category, UpgradePath};
pub use catalog::{Catalog, CatalogError, CatalogSources};
pub use city::{CityAggregate, ConstructionRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, SessionConfig};
pub use error::{GameError, GameResult};
pub use events::{EventCard, EventKind, EventMultipliers};
pub use flash_sale::{
    FlashSale, FlashSaleManager, FlashSalePurchase, FlashSaleStart, FlashSaleStatus,
    FlashSaleSummary, ScheduledClose,
};
pub use goals::{CityGoalDef, CityGoalTracker, CompletedGoal, GoalProgress, GoalStatus};
pub use items::{ItemDef, ItemEffect, ItemUse};
pub use mini_events::{MiniEventDef, MiniEventOutcome, MiniEventResult};
pub use modifiers::{CostQuote, DiscountSource, IncomeQuote, compute_effective_cost, compute_round_income};
pub use notify::{Envelope, Notification};
pub use player::{ActiveEffect, EffectKind, Player, PlayerId, PlayerLedger};
pub use purchase::{ItemDrop, ItemReceipt, PurchaseReceipt, UpgradeOption, UpgradeReceipt};
pub use rng::{RngBundle, RngDraws};
pub use roles::{Role, RoleId, RoleSkill, RolesList};
pub use round::{EventRecord, FinalStandings, GamePhase, PlayerRoundResult, RoundReport};
pub use session::{
    AchievementBoardEntry, Balance, GameSession, LeaderboardEntry, RestoreError, SessionSnapshot,
};
#[cfg(feature = "async")]
pub use shared::SharedSession;

/// Source of catalog data for new sessions.
/// Hosts with their own content provide an implementation.
pub trait CatalogLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a validated catalog
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or fails validation.
    fn load_catalog(&self) -> Result<Arc<Catalog>, Self::Error>;
}

/// Loader for the catalog compiled into this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedCatalog;

impl CatalogLoader for EmbeddedCatalog {
    type Error = CatalogError;

    fn load_catalog(&self) -> Result<Arc<Catalog>, Self::Error> {
        Catalog::embedded()
    }
}

/// Trait for abstracting snapshot persistence
/// Platform-specific implementations should provide this
pub trait GameStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save a session snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be saved.
    fn save_session(&self, save_name: &str, snapshot: &SessionSnapshot) -> Result<(), Self::Error>;

    /// Load a session snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded.
    fn load_session(&self, save_name: &str) -> Result<Option<SessionSnapshot>, Self::Error>;

    /// Delete a saved snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    fn delete_session(&self, save_name: &str) -> Result<(), Self::Error>;
}

/// Creates, saves and restores game sessions
pub struct GameEngine<L, S>
where
    L: CatalogLoader,
    S: GameStorage,
{
    catalog_loader: L,
    storage: S,
}

impl<L, S> GameEngine<L, S>
where
    L: CatalogLoader,
    S: GameStorage,
{
    /// Create a new engine with the provided catalog loader and storage
    pub const fn new(catalog_loader: L, storage: S) -> Self {
        Self {
            catalog_loader,
            storage,
        }
    }

    /// Open a fresh session
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or the config is invalid.
    pub fn create_session(&self, config: SessionConfig) -> anyhow::Result<GameSession> {
        let catalog = self.catalog_loader.load_catalog()?;
        Ok(GameSession::new(catalog, config)?)
    }

    /// Save a session snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be saved.
    pub fn save_session(&self, save_name: &str, session: &GameSession) -> Result<(), S::Error> {
        self.storage.save_session(save_name, &session.snapshot())
    }

    /// Load and rehydrate a saved session
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded, the catalog cannot
    /// be loaded, or the snapshot does not fit the catalog.
    pub fn load_session(&self, save_name: &str) -> anyhow::Result<Option<GameSession>> {
        let Some(snapshot) = self.storage.load_session(save_name)? else {
            return Ok(None);
        };
        let catalog = self.catalog_loader.load_catalog()?;
        Ok(Some(GameSession::restore(catalog, snapshot)?))
    }

    /// Delete a saved session
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    pub fn delete_session(&self, save_name: &str) -> Result<(), S::Error> {
        self.storage.delete_session(save_name)
    }
}
