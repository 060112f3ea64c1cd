use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use skyline_game::{
    Catalog, FinalStandings, FlashSaleSummary, GameSession, ManualClock, PlayerId, SessionConfig,
    SessionSnapshot, SharedSession,
};

use crate::logic::policy::{BotAction, BotStrategy};

/// Simulated time between two event rounds.
pub const ROUND_MS: u64 = 90_000;
/// Simulated time a bot spends on one turn.
pub const TURN_MS: u64 = 1_500;
pub const SALE_SECONDS: u64 = 30;

/// Configuration for a simulation session.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub seed: u64,
    pub players: usize,
    pub session: SessionConfig,
}

/// One bot turn and how the engine answered it.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub round: usize,
    pub table: usize,
    pub strategy: BotStrategy,
    pub action: BotAction,
    pub rejection: Option<String>,
}

/// One flash sale as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    pub summary: FlashSaleSummary,
    /// Purchases the engine accepted for this sale.
    pub accepted: usize,
    pub attempts: usize,
}

/// Bot-driven table of players sharing one session.
pub struct SimulationSession {
    shared: SharedSession,
    catalog: Arc<Catalog>,
    clock: Arc<ManualClock>,
    rng: ChaCha20Rng,
    tables: Vec<(PlayerId, BotStrategy)>,
    turns: Vec<TurnRecord>,
    sales: Vec<SaleRecord>,
    rounds_played: usize,
}

impl SimulationSession {
    /// Open a session, seat the bots and start the game.
    ///
    /// # Errors
    ///
    /// Fails if the session config is invalid or a goal id is unknown.
    pub fn new(catalog: Arc<Catalog>, config: SimulationConfig, goals: &[&str]) -> Result<Self> {
        let clock = Arc::new(ManualClock::new(0));
        let mut session = GameSession::new(
            Arc::clone(&catalog),
            config.session.clone().with_seed(config.seed),
        )
        .context("invalid session config")?
        .with_clock(clock.clone());

        let tables = (0..config.players)
            .map(|idx| {
                let table = u32::try_from(idx + 1).unwrap_or(u32::MAX);
                let id = session.join_player(format!("Table {table}"), Some(table));
                (id, BotStrategy::for_table(idx))
            })
            .collect();
        session.assign_roles();
        for goal in goals {
            session
                .activate_city_goal(goal)
                .with_context(|| format!("activating goal {goal}"))?;
        }
        session.start_game()?;

        Ok(Self {
            shared: SharedSession::new(session),
            catalog,
            clock,
            rng: ChaCha20Rng::seed_from_u64(config.seed),
            tables,
            turns: Vec::new(),
            sales: Vec::new(),
            rounds_played: 0,
        })
    }

    #[must_use]
    pub fn turns(&self) -> &[TurnRecord] {
        &self.turns
    }

    #[must_use]
    pub fn sales(&self) -> &[SaleRecord] {
        &self.sales
    }

    #[must_use]
    pub const fn rounds_played(&self) -> usize {
        self.rounds_played
    }

    /// Every bot takes one turn, then the host resolves a random event.
    ///
    /// # Errors
    ///
    /// Fails only when a host command the script relies on is rejected.
    pub fn play_round(&mut self) -> Result<()> {
        let round = self.rounds_played;
        for table in 0..self.tables.len() {
            self.take_turn(round, table);
        }
        self.clock.advance(ROUND_MS);
        if let Some(summary) = self.shared.with(GameSession::poll_timers) {
            self.record_closed(summary);
        }
        self.shared
            .with(|s| s.trigger_event(None))
            .with_context(|| format!("resolving round {round}"))?;
        self.shared.with(GameSession::start_building_phase)?;
        self.rounds_played += 1;
        Ok(())
    }

    fn take_turn(&mut self, round: usize, table: usize) {
        let (id, strategy) = self.tables[table].clone();
        let Some(player) = self.shared.with(|s| s.player(&id).cloned()) else {
            return;
        };
        let upgrades = self
            .shared
            .with(|s| s.upgradeable_buildings(&id))
            .unwrap_or_default();
        let action = strategy.decide(&player, &self.catalog, &upgrades, &mut self.rng);

        let outcome = self.shared.with(|s| match &action {
            BotAction::Build(building) => s.buy_building(&id, building).map(|_| ()),
            BotAction::Upgrade(building) => s.upgrade_building(&id, building).map(|_| ()),
            BotAction::BuyItem(item) => s.buy_item(&id, item).map(|_| ()),
            BotAction::UseItem(item) => s.use_item(&id, item).map(|_| ()),
            BotAction::Pass => Ok(()),
        });
        self.clock.advance(TURN_MS);
        let rejection = outcome.err().map(|err| err.to_string());
        if let Some(reason) = &rejection {
            log::debug!("round {round} table {table} {}: {reason}", action.label());
        }
        self.turns.push(TurnRecord {
            round,
            table,
            strategy,
            action,
            rejection,
        });
    }

    /// Host opens a sale on a random building at half price for half the
    /// tables, and every bot tries to grab one.
    ///
    /// With `concurrent` the buyers race from separate threads; otherwise
    /// they queue in a seeded random order.
    ///
    /// # Errors
    ///
    /// Fails if the sale cannot be started.
    pub fn run_flash_sale(&mut self, concurrent: bool) -> Result<()> {
        let buildings = self.catalog.buildings();
        let building = &buildings[self.rng.gen_range(0..buildings.len())];
        let quantity = u32::try_from((self.tables.len() / 2).max(1)).unwrap_or(1);
        let start = self
            .shared
            .with(|s| s.start_flash_sale(&building.id, building.cost / 2, quantity, Some(SALE_SECONDS)))
            .with_context(|| format!("starting flash sale on {}", building.id))?;

        let mut buyers: Vec<PlayerId> = self.tables.iter().map(|(id, _)| id.clone()).collect();
        buyers.shuffle(&mut self.rng);

        let outcomes: Vec<_> = if concurrent {
            let shared = &self.shared;
            thread::scope(|scope| {
                let handles: Vec<_> = buyers
                    .iter()
                    .map(|id| scope.spawn(move || shared.buy_flash_sale(id)))
                    .collect();
                handles
                    .into_iter()
                    .filter_map(|handle| handle.join().ok())
                    .collect()
            })
        } else {
            buyers
                .iter()
                .map(|id| self.shared.buy_flash_sale(id))
                .collect()
        };

        let accepted = outcomes.iter().filter(|o| o.is_ok()).count();
        let closed = outcomes
            .iter()
            .filter_map(|o| o.as_ref().ok().and_then(|p| p.sale_closed.clone()))
            .next()
            .or_else(|| self.shared.close_flash_sale());
        log::debug!(
            "sale {} on {}: {accepted}/{} accepted",
            start.sale.sale_id,
            building.id,
            outcomes.len()
        );
        if let Some(summary) = closed {
            debug_assert_eq!(summary.sale_id, start.sale.sale_id);
            self.sales.push(SaleRecord {
                summary,
                accepted,
                attempts: outcomes.len(),
            });
        }
        Ok(())
    }

    fn record_closed(&mut self, summary: FlashSaleSummary) {
        self.sales.push(SaleRecord {
            summary,
            accepted: 0,
            attempts: 0,
        });
    }

    /// End the game and hand back the final state.
    #[must_use]
    pub fn finish(mut self) -> FinishedSimulation {
        let standings = self.shared.with(GameSession::end_game);
        if let Some(summary) = standings.closed_sale.clone() {
            self.record_closed(summary);
        }
        let snapshot = self.shared.with(|s| s.snapshot());
        let notifications = self.shared.with(|s| s.drain_notifications().len());
        FinishedSimulation {
            standings,
            snapshot,
            notifications,
            turns: self.turns,
            sales: self.sales,
            rounds_played: self.rounds_played,
        }
    }
}

/// Everything left over once a simulated game has ended.
#[derive(Debug, Clone)]
pub struct FinishedSimulation {
    pub standings: FinalStandings,
    pub snapshot: SessionSnapshot,
    pub notifications: usize,
    pub turns: Vec<TurnRecord>,
    pub sales: Vec<SaleRecord>,
    pub rounds_played: usize,
}
