//! The game session: one owner for every piece of mutable game state.
//!
//! All commands take `&mut self` and run to completion, which is what keeps
//! effect consumption, sale stock and the global-first registry race free.
//! Hosts that need shared access wrap the session in a single mutex.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::achievements::{AchievementCategory, AchievementRegistry, Reward, UnlockedAchievement};
use crate::catalog::Catalog;
use crate::city::CityAggregate;
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, SessionConfig};
use crate::error::{GameError, GameResult};
use crate::flash_sale::FlashSaleManager;
use crate::goals::{CityGoalDef, CityGoalTracker, CompletedGoal, GoalStatus};
use crate::notify::{Envelope, Notification, Outbox};
use crate::player::{Player, PlayerId, PlayerLedger};
use crate::rng::{RngBundle, RngDraws, pick_index};
use crate::roles::RoleId;
use crate::round::{EventRecord, GamePhase};

/// Public standing of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player_id: PlayerId,
    pub name: String,
    pub table_number: Option<u32>,
    pub score: i64,
    pub coins: i64,
    pub building_count: u32,
    pub role: RoleId,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementBoardEntry {
    pub achievement_id: String,
    pub name: String,
    pub emoji: String,
    pub description: String,
    pub category: AchievementCategory,
    pub global_unique: bool,
    pub reward: Reward,
    pub unlocked: bool,
    /// Winner of a global-first achievement, if anyone has claimed it.
    pub claimed_by: Option<PlayerId>,
    pub claimed_by_name: Option<String>,
}

/// Wallet after a host credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub player_id: PlayerId,
    pub coins: i64,
    pub score: i64,
}

/// Persistable state of a session. Flash sales are not included; a sale
/// lost across a restart is recovered by the host starting a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub config: SessionConfig,
    pub phase: GamePhase,
    pub players: PlayerLedger,
    pub city: CityAggregate,
    pub registry: AchievementRegistry,
    pub goals: CityGoalTracker,
    pub current_event: Option<String>,
    pub event_history: Vec<EventRecord>,
    pub started_at_ms: Option<u64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RestoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("snapshot references unknown building `{0}`")]
    UnknownBuilding(String),
    #[error("snapshot city counts do not match player holdings")]
    Inconsistent,
}

#[derive(Debug)]
pub struct GameSession {
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) config: SessionConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) rng: RngBundle,
    pub(crate) phase: GamePhase,
    pub(crate) players: PlayerLedger,
    pub(crate) city: CityAggregate,
    pub(crate) registry: AchievementRegistry,
    pub(crate) goals: CityGoalTracker,
    pub(crate) flash_sale: FlashSaleManager,
    pub(crate) current_event: Option<String>,
    pub(crate) event_history: Vec<EventRecord>,
    pub(crate) started_at_ms: Option<u64>,
    pub(crate) outbox: Outbox,
}

impl GameSession {
    /// Open a fresh session in the WAITING phase.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(catalog: Arc<Catalog>, config: SessionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            catalog,
            rng: RngBundle::from_user_seed(config.seed),
            config,
            clock: Arc::new(SystemClock),
            phase: GamePhase::Waiting,
            players: PlayerLedger::new(),
            city: CityAggregate::new(),
            registry: AchievementRegistry::new(),
            goals: CityGoalTracker::new(),
            flash_sale: FlashSaleManager::new(),
            current_event: None,
            event_history: Vec::new(),
            started_at_ms: None,
            outbox: Outbox::new(),
        })
    }

    /// Rebuild a session from a snapshot. Streams are reseeded from the
    /// snapshot's config seed.
    ///
    /// # Errors
    ///
    /// Fails when the config is invalid, a building is unknown to `catalog`,
    /// or the city counts disagree with the players.
    pub fn restore(catalog: Arc<Catalog>, snapshot: SessionSnapshot) -> Result<Self, RestoreError> {
        let SessionSnapshot {
            config,
            phase,
            players,
            city,
            registry,
            goals,
            current_event,
            event_history,
            started_at_ms,
        } = snapshot;
        if let Some(unknown) = city.counts().keys().find(|id| catalog.building(id).is_none()) {
            return Err(RestoreError::UnknownBuilding(unknown.clone()));
        }
        if !city.is_consistent_with(&players) {
            return Err(RestoreError::Inconsistent);
        }
        let mut session = Self::new(catalog, config)?;
        session.phase = phase;
        session.players = players;
        session.city = city;
        session.registry = registry;
        session.goals = goals;
        session.current_event = current_event;
        session.event_history = event_history;
        session.started_at_ms = started_at_ms;
        info!(
            "session restored: {} players, phase {}",
            session.players.len(),
            session.phase
        );
        Ok(session)
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_rng(mut self, rng: RngBundle) -> Self {
        self.rng = rng;
        self
    }

    /// Deterministically reseed every stream.
    pub fn reseed(&mut self, seed: u64) {
        self.config.seed = seed;
        self.rng = RngBundle::from_user_seed(seed);
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            config: self.config.clone(),
            phase: self.phase,
            players: self.players.clone(),
            city: self.city.clone(),
            registry: self.registry.clone(),
            goals: self.goals.clone(),
            current_event: self.current_event.clone(),
            event_history: self.event_history.clone(),
            started_at_ms: self.started_at_ms,
        }
    }

    /// Return to a fresh WAITING state. Catalog, config, clock and RNG
    /// streams are kept; sale ids and the notification sequence keep
    /// counting so stale timers and consumers never see a reused number.
    pub fn reset(&mut self) {
        self.phase = GamePhase::Waiting;
        self.players = PlayerLedger::new();
        self.city = CityAggregate::new();
        self.registry = AchievementRegistry::new();
        self.goals = CityGoalTracker::new();
        if let Some(summary) = self.flash_sale.close() {
            self.notify(Notification::FlashSaleEnded { summary });
        }
        self.current_event = None;
        self.event_history.clear();
        self.started_at_ms = None;
        info!("session reset");
        self.notify(Notification::GameReset);
    }

    // Accessors -------------------------------------------------------------

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub const fn phase(&self) -> GamePhase {
        self.phase
    }

    #[must_use]
    pub const fn players(&self) -> &PlayerLedger {
        &self.players
    }

    #[must_use]
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    #[must_use]
    pub const fn city(&self) -> &CityAggregate {
        &self.city
    }

    #[must_use]
    pub const fn registry(&self) -> &AchievementRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn goals(&self) -> &CityGoalTracker {
        &self.goals
    }

    #[must_use]
    pub fn current_event(&self) -> Option<&str> {
        self.current_event.as_deref()
    }

    #[must_use]
    pub fn event_history(&self) -> &[EventRecord] {
        &self.event_history
    }

    #[must_use]
    pub const fn started_at_ms(&self) -> Option<u64> {
        self.started_at_ms
    }

    #[must_use]
    pub const fn rng_draws(&self) -> RngDraws {
        self.rng.draws()
    }

    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Take every pending notification.
    pub fn drain_notifications(&mut self) -> Vec<Envelope> {
        self.outbox.drain()
    }

    #[must_use]
    pub fn pending_notifications(&self) -> &[Envelope] {
        self.outbox.pending()
    }

    // Player ledger ---------------------------------------------------------

    /// Register a new player with the configured starting wallet.
    pub fn join_player(&mut self, name: impl Into<String>, table_number: Option<u32>) -> PlayerId {
        let role = if self.config.auto_assign_roles {
            pick_index(self.rng.deck(), RoleId::ALL.len())
                .and_then(|idx| RoleId::ALL.get(idx).copied())
                .unwrap_or(RoleId::ALL[0])
        } else {
            RoleId::ALL[0]
        };
        let id = self.players.next_id();
        let player = Player::new(
            id.clone(),
            name,
            table_number,
            role,
            self.config.starting_coins,
            self.config.starting_score,
            self.now_ms(),
        );
        info!("{} joined as {} ({})", player.name, id, role);
        let notification = Notification::PlayerJoined {
            player_id: id.clone(),
            name: player.name.clone(),
            role,
        };
        self.players.insert(player);
        self.notify(notification);
        id
    }

    /// Mark a player connected or disconnected. State is never dropped.
    ///
    /// # Errors
    ///
    /// Fails for unknown players.
    pub fn set_connected(&mut self, id: &PlayerId, connected: bool) -> GameResult<()> {
        let player = self.player_mut(id)?;
        player.connected = connected;
        debug!("{id} connected={connected}");
        Ok(())
    }

    /// Shuffle the roles and deal them round-robin in join order.
    pub fn assign_roles(&mut self) -> Vec<(PlayerId, RoleId)> {
        let mut deck = RoleId::ALL.to_vec();
        for i in (1..deck.len()).rev() {
            if let Some(j) = pick_index(self.rng.deck(), i + 1) {
                deck.swap(i, j);
            }
        }
        let mut assignments = Vec::with_capacity(self.players.len());
        for (idx, player) in self.players.iter_mut().enumerate() {
            let role = deck[idx % deck.len()];
            player.role = role;
            assignments.push((player.id.clone(), role));
        }
        info!("roles dealt to {} players", assignments.len());
        for (player_id, role) in &assignments {
            self.notify(Notification::RoleAssigned {
                player_id: player_id.clone(),
                role: *role,
            });
        }
        assignments
    }

    /// # Errors
    ///
    /// Fails for unknown players.
    pub fn assign_role(&mut self, id: &PlayerId, role: RoleId) -> GameResult<()> {
        self.player_mut(id)?.role = role;
        info!("{id} assigned role {role}");
        self.notify(Notification::RoleAssigned {
            player_id: id.clone(),
            role,
        });
        Ok(())
    }

    /// Host reward from an off-engine mini game. Credits score and coins.
    ///
    /// # Errors
    ///
    /// Fails for unknown players.
    pub fn add_score(&mut self, id: &PlayerId, amount: i64, reason: &str) -> GameResult<Balance> {
        let player = self.player_mut(id)?;
        player.credit(amount, amount);
        let balance = Balance {
            player_id: id.clone(),
            coins: player.coins,
            score: player.score,
        };
        self.notify(Notification::ScoreAdded {
            player_id: id.clone(),
            amount,
            reason: reason.to_string(),
        });
        Ok(balance)
    }

    /// [`Self::add_score`] for several players; one outcome per input id.
    pub fn add_score_batch(
        &mut self,
        ids: &[PlayerId],
        amount: i64,
        reason: &str,
    ) -> Vec<GameResult<Balance>> {
        ids.iter().map(|id| self.add_score(id, amount, reason)).collect()
    }

    /// Credit coins only; one outcome per input id.
    pub fn add_coins_batch(
        &mut self,
        ids: &[PlayerId],
        amount: i64,
        reason: &str,
    ) -> Vec<GameResult<Balance>> {
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let outcome = self.player_mut(id).map(|player| {
                player.credit(amount, 0);
                Balance {
                    player_id: id.clone(),
                    coins: player.coins,
                    score: player.score,
                }
            });
            if outcome.is_ok() {
                self.notify(Notification::CoinsAdded {
                    player_id: id.clone(),
                    amount,
                    reason: reason.to_string(),
                });
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Players by score, highest first. Ties keep join order.
    #[must_use]
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut ranked: Vec<&Player> = self.players.iter().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
            .into_iter()
            .enumerate()
            .map(|(idx, p)| LeaderboardEntry {
                rank: idx + 1,
                player_id: p.id.clone(),
                name: p.name.clone(),
                table_number: p.table_number,
                score: p.score,
                coins: p.coins,
                building_count: p.building_count(),
                role: p.role,
                connected: p.connected,
            })
            .collect()
    }

    /// Every achievement with this player's unlock state and the global
    /// claimant, if any.
    ///
    /// # Errors
    ///
    /// Fails for unknown players.
    pub fn achievement_board(&self, id: &PlayerId) -> GameResult<Vec<AchievementBoardEntry>> {
        let player = self.require_player(id)?;
        Ok(self
            .catalog
            .achievements()
            .iter()
            .map(|def| {
                let claimed_by = self.registry.winner(&def.id).cloned();
                let claimed_by_name = claimed_by
                    .as_ref()
                    .and_then(|winner| self.players.get(winner))
                    .map(|winner| winner.name.clone());
                AchievementBoardEntry {
                    achievement_id: def.id.clone(),
                    name: def.name.clone(),
                    emoji: def.emoji.clone(),
                    description: def.description.clone(),
                    category: def.category,
                    global_unique: def.global_unique,
                    reward: def.reward,
                    unlocked: player.achievements.contains(&def.id),
                    claimed_by,
                    claimed_by_name,
                }
            })
            .collect())
    }

    // City goals ------------------------------------------------------------

    /// Make a catalog goal live. It is evaluated on the next construction.
    ///
    /// # Errors
    ///
    /// Fails for unknown goals and goals already active or completed.
    pub fn activate_city_goal(&mut self, goal_id: &str) -> GameResult<CityGoalDef> {
        let catalog = Arc::clone(&self.catalog);
        let def = self.goals.activate(&catalog, goal_id)?.clone();
        self.notify(Notification::CityGoalActivated {
            goal_id: def.id.clone(),
        });
        Ok(def)
    }

    /// # Errors
    ///
    /// Fails if the goal is not active.
    pub fn deactivate_city_goal(&mut self, goal_id: &str) -> GameResult<()> {
        self.goals.deactivate(goal_id)?;
        self.notify(Notification::CityGoalDeactivated {
            goal_id: goal_id.to_string(),
        });
        Ok(())
    }

    #[must_use]
    pub fn city_goal_statuses(&self) -> Vec<GoalStatus> {
        self.goals.statuses(&self.catalog, &self.city)
    }

    // Internal helpers ------------------------------------------------------

    pub(crate) fn notify(&mut self, notification: Notification) {
        let now = self.now_ms();
        self.outbox.push(notification, now);
    }

    pub(crate) fn require_player(&self, id: &PlayerId) -> GameResult<&Player> {
        self.players
            .get(id)
            .ok_or_else(|| GameError::PlayerNotFound(id.clone()))
    }

    pub(crate) fn player_mut(&mut self, id: &PlayerId) -> GameResult<&mut Player> {
        self.players
            .get_mut(id)
            .ok_or_else(|| GameError::PlayerNotFound(id.clone()))
    }

    pub(crate) fn ensure_not_ended(&self) -> GameResult<()> {
        if self.phase == GamePhase::Ended {
            warn!("command rejected: game has ended");
            return Err(GameError::GameEnded);
        }
        Ok(())
    }

    /// Run the goal tracker over the live city and announce completions.
    pub(crate) fn check_city_goals(&mut self) -> Vec<CompletedGoal> {
        let completed = self
            .goals
            .check(&self.catalog, &self.city, &mut self.players);
        for goal in &completed {
            self.notify(Notification::CityGoalCompleted {
                goal_id: goal.goal_id.clone(),
                progress: goal.progress.clone(),
            });
        }
        completed
    }

    pub(crate) fn announce_unlocks(&mut self, player_id: &PlayerId, unlocked: &[UnlockedAchievement]) {
        for achievement in unlocked {
            self.notify(Notification::AchievementUnlocked {
                player_id: player_id.clone(),
                achievement_id: achievement.achievement_id.clone(),
                global_first: achievement.global_first,
            });
        }
    }
}
