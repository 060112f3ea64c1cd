//! City Goal Tracker.
//!
//! Goals are city-wide targets the host activates during the game. Progress
//! is read from the city aggregate; completing a goal rewards every
//! registered player.

use std::collections::BTreeMap;

use log::info;
use serde::{Deserialize, Serialize};

use crate::buildings::Category;
use crate::catalog::Catalog;
use crate::city::CityAggregate;
use crate::error::{GameError, GameResult};
use crate::player::PlayerLedger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoalTarget {
    CategoryCount { category: Category, count: u32 },
    TotalCount { count: u32 },
    SpecificBuilding { building_id: String, count: u32 },
    /// Every category reaches `count`.
    AllCategoriesMin { count: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GoalReward {
    AllCoins { amount: i64 },
    AllScore { amount: i64 },
}

impl GoalReward {
    /// `(coins, score)` credited to each player.
    #[must_use]
    pub const fn split(self) -> (i64, i64) {
        match self {
            Self::AllCoins { amount } => (amount, 0),
            Self::AllScore { amount } => (0, amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityGoalDef {
    pub id: String,
    pub name: String,
    pub emoji: String,
    #[serde(default)]
    pub description: String,
    pub target: GoalTarget,
    pub reward: GoalReward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalState {
    Inactive,
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub current: u32,
    pub target: u32,
    /// Per-category counts, only for `all_categories_min` targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<BTreeMap<Category, u32>>,
}

impl GoalProgress {
    #[must_use]
    pub const fn is_met(&self) -> bool {
        self.current >= self.target
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedGoal {
    pub goal_id: String,
    pub name: String,
    pub reward: GoalReward,
    pub progress: GoalProgress,
    pub rewarded_players: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalStatus {
    pub goal_id: String,
    pub name: String,
    pub emoji: String,
    pub state: GoalState,
    pub progress: GoalProgress,
    pub reward: GoalReward,
}

/// Live progress of a goal against the city aggregate.
#[must_use]
pub fn goal_progress(def: &CityGoalDef, city: &CityAggregate, catalog: &Catalog) -> GoalProgress {
    match &def.target {
        GoalTarget::CategoryCount { category, count } => GoalProgress {
            current: city.category_count(catalog, *category),
            target: *count,
            breakdown: None,
        },
        GoalTarget::TotalCount { count } => GoalProgress {
            current: city.total(),
            target: *count,
            breakdown: None,
        },
        GoalTarget::SpecificBuilding { building_id, count } => GoalProgress {
            current: city.count(building_id),
            target: *count,
            breakdown: None,
        },
        GoalTarget::AllCategoriesMin { count } => {
            let breakdown = city.category_breakdown(catalog);
            let current = breakdown.values().copied().min().unwrap_or(0);
            GoalProgress {
                current,
                target: *count,
                breakdown: Some(breakdown),
            }
        }
    }
}

/// Active and completed goal ids. A goal is in at most one of the two lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityGoalTracker {
    active: Vec<String>,
    completed: Vec<String>,
}

impl CityGoalTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self, goal_id: &str) -> GoalState {
        if self.completed.iter().any(|id| id == goal_id) {
            GoalState::Completed
        } else if self.active.iter().any(|id| id == goal_id) {
            GoalState::Active
        } else {
            GoalState::Inactive
        }
    }

    #[must_use]
    pub fn active(&self) -> &[String] {
        &self.active
    }

    #[must_use]
    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    /// # Errors
    ///
    /// Fails for unknown goals and goals that are already active or completed.
    pub fn activate<'c>(&mut self, catalog: &'c Catalog, goal_id: &str) -> GameResult<&'c CityGoalDef> {
        let def = catalog
            .city_goal(goal_id)
            .ok_or_else(|| GameError::UnknownGoal(goal_id.to_string()))?;
        match self.state(goal_id) {
            GoalState::Active => Err(GameError::GoalAlreadyActive(goal_id.to_string())),
            GoalState::Completed => Err(GameError::GoalAlreadyCompleted(goal_id.to_string())),
            GoalState::Inactive => {
                self.active.push(def.id.clone());
                info!("city goal {goal_id} activated");
                Ok(def)
            }
        }
    }

    /// # Errors
    ///
    /// Fails if the goal is not currently active.
    pub fn deactivate(&mut self, goal_id: &str) -> GameResult<()> {
        let before = self.active.len();
        self.active.retain(|id| id != goal_id);
        if self.active.len() == before {
            return Err(GameError::GoalNotActive(goal_id.to_string()));
        }
        info!("city goal {goal_id} deactivated");
        Ok(())
    }

    /// Complete every active goal whose target is met, rewarding all players.
    pub fn check(
        &mut self,
        catalog: &Catalog,
        city: &CityAggregate,
        players: &mut PlayerLedger,
    ) -> Vec<CompletedGoal> {
        let mut completed = Vec::new();
        let candidates = self.active.clone();
        for goal_id in candidates {
            let Some(def) = catalog.city_goal(&goal_id) else {
                continue;
            };
            let progress = goal_progress(def, city, catalog);
            if !progress.is_met() {
                continue;
            }
            self.active.retain(|id| id != &goal_id);
            self.completed.push(goal_id.clone());
            let (coins, score) = def.reward.split();
            let mut rewarded = 0;
            for player in players.iter_mut() {
                player.credit(coins, score);
                rewarded += 1;
            }
            info!("city goal {goal_id} completed, {rewarded} players rewarded");
            completed.push(CompletedGoal {
                goal_id,
                name: def.name.clone(),
                reward: def.reward,
                progress,
                rewarded_players: rewarded,
            });
        }
        completed
    }

    /// Status of every catalog goal.
    #[must_use]
    pub fn statuses(&self, catalog: &Catalog, city: &CityAggregate) -> Vec<GoalStatus> {
        catalog
            .city_goals()
            .iter()
            .map(|def| GoalStatus {
                goal_id: def.id.clone(),
                name: def.name.clone(),
                emoji: def.emoji.clone(),
                state: self.state(&def.id),
                progress: goal_progress(def, city, catalog),
                reward: def.reward,
            })
            .collect()
    }
}
