//! Session configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_FLASH_SALE_SECONDS, DEFAULT_SESSION_SEED, DEFAULT_STARTING_COINS,
    DEFAULT_STARTING_SCORE,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("starting coins must not be negative (got {0})")]
    NegativeStartingCoins(i64),
    #[error("default flash sale duration must be at least one second")]
    ZeroFlashSaleDuration,
    #[error("invalid session config JSON: {0}")]
    Parse(String),
}

/// Knobs the host can set when opening a session. Everything has a default,
/// so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub starting_coins: i64,
    pub starting_score: i64,
    pub flash_sale_default_seconds: u64,
    /// Draw a random role for each joining player. When off, players join
    /// with the first catalog role until the host assigns one.
    pub auto_assign_roles: bool,
    pub seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            starting_coins: DEFAULT_STARTING_COINS,
            starting_score: DEFAULT_STARTING_SCORE,
            flash_sale_default_seconds: DEFAULT_FLASH_SALE_SECONDS,
            auto_assign_roles: true,
            seed: DEFAULT_SESSION_SEED,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Parse and validate a config from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the values fail [`Self::validate`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    ///
    /// Returns an error when starting coins are negative or the default sale
    /// duration is zero.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.starting_coins < 0 {
            return Err(ConfigError::NegativeStartingCoins(self.starting_coins));
        }
        if self.flash_sale_default_seconds == 0 {
            return Err(ConfigError::ZeroFlashSaleDuration);
        }
        Ok(())
    }
}
