//! Round Resolution Engine and the host-driven phase machine.
//!
//! `WAITING -> BUILDING -> EVENT -> BUILDING -> ... -> ENDED`. Every
//! transition is a host command; nothing here runs on a timer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::achievements::{AchievementContext, UnlockedAchievement, check_achievements};
use crate::buildings::Category;
use crate::city::ConstructionRecord;
use crate::error::{GameError, GameResult};
use crate::events::{EventCard, EventKind, EventMultipliers, draw_event};
use crate::flash_sale::FlashSaleSummary;
use crate::modifiers::{IncomeLine, RoleBonus, compute_round_income};
use crate::notify::Notification;
use crate::player::{EffectKind, PlayerId};
use crate::session::{GameSession, LeaderboardEntry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    #[default]
    Waiting,
    Building,
    Event,
    Ended,
}

impl GamePhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Building => "BUILDING",
            Self::Event => "EVENT",
            Self::Ended => "ENDED",
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: String,
    pub title: String,
    pub kind: EventKind,
    pub triggered_at_ms: u64,
}

/// One player's share of a resolved round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRoundResult {
    pub player_id: PlayerId,
    pub name: String,
    /// Multiplier-based income, credited to both coins and score.
    pub income: i64,
    pub bonus_coins: i64,
    pub bonus_score: i64,
    pub breakdown: Vec<IncomeLine>,
    pub role_bonus: Option<RoleBonus>,
    pub lucky_triggered: bool,
    pub item_bonus_applied: bool,
    /// An event shield absorbed this round's penalties.
    pub shield_used: bool,
    pub coins: i64,
    pub score: i64,
    pub achievements: Vec<UnlockedAchievement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    pub event: EventCard,
    /// Building id -> factor, with the global factor under `_all`.
    pub multipliers: BTreeMap<String, f64>,
    pub results: Vec<PlayerRoundResult>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalStandings {
    pub leaderboard: Vec<LeaderboardEntry>,
    pub city_counts: BTreeMap<String, u32>,
    pub category_counts: BTreeMap<Category, u32>,
    pub construction_log: Vec<ConstructionRecord>,
    pub event_history: Vec<EventRecord>,
    pub total_buildings: u32,
    /// Summary of a sale that was still open when the game ended.
    pub closed_sale: Option<FlashSaleSummary>,
}

impl GameSession {
    /// # Errors
    ///
    /// Fails with [`GameError::AlreadyStarted`] unless the session is waiting.
    pub fn start_game(&mut self) -> GameResult<()> {
        if self.phase != GamePhase::Waiting {
            warn!("start_game rejected in phase {}", self.phase);
            return Err(GameError::AlreadyStarted);
        }
        let now = self.now_ms();
        self.phase = GamePhase::Building;
        self.started_at_ms = Some(now);
        info!("game started with {} players", self.players.len());
        self.notify(Notification::GameStarted {
            player_count: self.players.len(),
        });
        Ok(())
    }

    /// Return to the building phase and clear the current event.
    ///
    /// # Errors
    ///
    /// Fails once the game has ended.
    pub fn start_building_phase(&mut self) -> GameResult<()> {
        self.ensure_not_ended()?;
        self.phase = GamePhase::Building;
        self.current_event = None;
        self.notify(Notification::BuildingPhaseStarted);
        Ok(())
    }

    /// Resolve a round under `event_id`, or a uniformly drawn event.
    ///
    /// Each player earns `compute_round_income` plus the event's flat
    /// bonuses. Income goes to coins, score and lifetime income; flat
    /// bonuses bypass role and item modifiers.
    ///
    /// # Errors
    ///
    /// Fails once the game has ended, or for an unknown event id.
    pub fn trigger_event(&mut self, event_id: Option<&str>) -> GameResult<RoundReport> {
        self.ensure_not_ended()?;
        let catalog = Arc::clone(&self.catalog);
        let card = match event_id {
            Some(id) => catalog
                .event(id)
                .ok_or_else(|| GameError::UnknownEvent(id.to_string()))?,
            None => draw_event(catalog.events(), self.rng.deck())
                .ok_or_else(|| GameError::CatalogInconsistency("event deck is empty".into()))?,
        };
        let now = self.now_ms();
        let multipliers = EventMultipliers::from_event(card);
        let shielded = multipliers.shielded();
        let bonus_coins = card.bonus_coins();
        let bonus_score = card.bonus_score();

        let mut results = Vec::with_capacity(self.players.len());
        for player in self.players.iter_mut() {
            let shield = if multipliers.has_penalty() {
                player.first_effect(EffectKind::EventShield).map(|(idx, _)| idx)
            } else {
                None
            };
            let effective = if shield.is_some() { &shielded } else { &multipliers };
            let role = catalog.role(player.role);
            let quote = compute_round_income(player, &catalog, effective, role, self.rng.luck());

            let consumed: Vec<usize> = quote.item_effect.into_iter().chain(shield).collect();
            player.remove_effects(&consumed);
            player.credit(quote.total_income + bonus_coins, quote.total_income + bonus_score);
            player.total_income = player.total_income.saturating_add(quote.total_income);

            let achievements = check_achievements(
                &catalog,
                &mut self.registry,
                player,
                &self.city,
                AchievementContext::IncomeReceived {
                    amount: quote.total_income,
                },
            );
            results.push(PlayerRoundResult {
                player_id: player.id.clone(),
                name: player.name.clone(),
                income: quote.total_income,
                bonus_coins,
                bonus_score,
                breakdown: quote.breakdown,
                role_bonus: quote.role_bonus,
                lucky_triggered: quote.lucky_triggered,
                item_bonus_applied: quote.item_bonus_applied,
                shield_used: shield.is_some(),
                coins: player.coins,
                score: player.score,
                achievements,
            });
        }

        self.phase = GamePhase::Event;
        self.current_event = Some(card.id.clone());
        self.event_history.push(EventRecord {
            event_id: card.id.clone(),
            title: card.title.clone(),
            kind: card.kind,
            triggered_at_ms: now,
        });
        info!(
            "event {} resolved for {} players",
            card.id,
            results.len()
        );
        self.notify(Notification::EventTriggered {
            event_id: card.id.clone(),
            title: card.title.clone(),
        });
        for result in &results {
            self.announce_unlocks(&result.player_id, &result.achievements);
        }

        Ok(RoundReport {
            event: card.clone(),
            multipliers: multipliers.as_map(),
            results,
            leaderboard: self.leaderboard(),
        })
    }

    /// Move to ENDED from any phase, closing any running flash sale.
    /// Ending an ended game only reports the standings again.
    pub fn end_game(&mut self) -> FinalStandings {
        let total_buildings = self.city.total();
        let mut closed_sale = None;
        if self.phase != GamePhase::Ended {
            closed_sale = self.flash_sale.close();
            if let Some(summary) = &closed_sale {
                self.notify(Notification::FlashSaleEnded {
                    summary: summary.clone(),
                });
            }
            self.phase = GamePhase::Ended;
            info!("game ended with {total_buildings} buildings in the city");
            self.notify(Notification::GameEnded { total_buildings });
        }

        FinalStandings {
            leaderboard: self.leaderboard(),
            city_counts: self.city.counts().clone(),
            category_counts: self.city.category_breakdown(&self.catalog),
            construction_log: self.city.log().to_vec(),
            event_history: self.event_history.clone(),
            total_buildings,
            closed_sale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::SessionConfig;
    use crate::rng::RngBundle;
    use rand::rngs::mock::StepRng;

    fn session() -> GameSession {
        GameSession::new(Catalog::embedded().unwrap(), SessionConfig::default())
            .unwrap()
            .with_rng(RngBundle::uniform(StepRng::new(u64::MAX, 0)))
    }

    #[test]
    fn phase_machine_follows_host_commands() {
        let mut s = session();
        assert_eq!(s.phase(), GamePhase::Waiting);
        s.start_game().unwrap();
        assert_eq!(s.start_game(), Err(GameError::AlreadyStarted));
        s.trigger_event(Some("BOOM_TECH")).unwrap();
        assert_eq!(s.phase(), GamePhase::Event);
        assert_eq!(s.current_event(), Some("BOOM_TECH"));
        s.start_building_phase().unwrap();
        assert_eq!(s.phase(), GamePhase::Building);
        assert_eq!(s.current_event(), None);
        s.end_game();
        assert_eq!(s.phase(), GamePhase::Ended);
        assert_eq!(s.trigger_event(None).unwrap_err(), GameError::GameEnded);
        assert_eq!(s.start_building_phase(), Err(GameError::GameEnded));
    }

    #[test]
    fn income_is_credited_to_coins_score_and_lifetime_income() {
        let mut s = session();
        let id = s.join_player("Ada", None);
        s.assign_role(&id, crate::roles::RoleId::Lucky).unwrap();
        s.buy_building(&id, "HOUSE").unwrap();
        let before = s.player(&id).unwrap().clone();

        let report = s.trigger_event(Some("BOOM_TECH")).unwrap();
        let result = &report.results[0];
        let house = s.catalog().building("HOUSE").unwrap().income;
        assert_eq!(result.income, house);
        let reward_coins: i64 = result.achievements.iter().map(|a| a.reward.coins).sum();
        let reward_score: i64 = result.achievements.iter().map(|a| a.reward.score).sum();
        assert!(result.achievements.iter().any(|a| a.achievement_id == "FIRST_INCOME"));
        let after = s.player(&id).unwrap();
        assert_eq!(after.coins, before.coins + house + reward_coins);
        assert_eq!(after.score, before.score + house + reward_score);
        assert_eq!(after.total_income, house);
        assert_eq!(s.event_history().len(), 1);
    }

    #[test]
    fn unknown_event_is_rejected_without_side_effects() {
        let mut s = session();
        s.join_player("Ada", None);
        let err = s.trigger_event(Some("NOPE")).unwrap_err();
        assert_eq!(err, GameError::UnknownEvent("NOPE".into()));
        assert!(s.event_history().is_empty());
        assert_eq!(s.phase(), GamePhase::Waiting);
    }

    #[test]
    fn end_game_reports_city_and_closes_sale() {
        let mut s = session();
        let id = s.join_player("Ada", None);
        s.buy_building(&id, "HOUSE").unwrap();
        s.start_flash_sale("SHOP", 10, 2, Some(30)).unwrap();
        let standings = s.end_game();
        assert_eq!(standings.total_buildings, 1);
        assert_eq!(standings.city_counts.get("HOUSE"), Some(&1));
        assert_eq!(standings.construction_log.len(), 1);
        assert!(standings.closed_sale.is_some());
        assert!(s.flash_sale_status().is_none());
    }

    #[test]
    fn ending_twice_announces_once() {
        let mut s = session();
        let id = s.join_player("Ada", None);
        s.buy_building(&id, "HOUSE").unwrap();
        let first = s.end_game();
        let again = s.end_game();
        assert_eq!(again.total_buildings, first.total_buildings);
        assert!(again.closed_sale.is_none());
        let ended = s
            .drain_notifications()
            .into_iter()
            .filter(|e| matches!(e.notification, Notification::GameEnded { .. }))
            .count();
        assert_eq!(ended, 1);
    }
}
