use anyhow::{Result, ensure};
use skyline_game::GamePhase;

use crate::logic::game_tester::{DEFAULT_PLAYERS, DEFAULT_ROUNDS};
use crate::logic::{SimulationPlan, SimulationSummary};

/// A named simulation plan.
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, plan: SimulationPlan) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            plan,
        }
    }
}

const SCENARIOS: [(&str, &str); 4] = [
    ("smoke", "Two tables, one round: the engine starts, resolves and ends"),
    (
        "full-game",
        "Mixed bots over several rounds with city goals and periodic flash sales",
    ),
    (
        "flash-rush",
        "Every table races for scarce flash-sale stock from separate threads",
    ),
    ("replay", "The same seed played twice must end in an identical snapshot"),
];

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    SCENARIOS.to_vec()
}

/// Expand `all` into every registered scenario, keeping other names in order.
pub fn expand_scenarios(names: &[String]) -> Vec<String> {
    let mut expanded = Vec::new();
    for name in names {
        if name.eq_ignore_ascii_case("all") {
            expanded.extend(SCENARIOS.iter().map(|(key, _)| (*key).to_string()));
        } else {
            expanded.push(name.clone());
        }
    }
    let mut seen = std::collections::HashSet::new();
    expanded.retain(|name| seen.insert(name.clone()));
    expanded
}

pub fn get_scenario(name: &str, players: Option<usize>, rounds: Option<usize>) -> Option<TestScenario> {
    let key = name.to_lowercase();
    let (_, description) = SCENARIOS.iter().find(|(k, _)| *k == key)?;
    let plan = match key.as_str() {
        "smoke" => SimulationPlan::new(2, 1).with_expectation(smoke_expectation),
        "full-game" => SimulationPlan::new(DEFAULT_PLAYERS, DEFAULT_ROUNDS)
            .with_overrides(players, rounds)
            .with_goals(&["HOUSING_10", "COMMERCIAL_10", "TOTAL_30", "FIRST_LANDMARK"])
            .with_flash_sales(3, false)
            .with_expectation(full_game_expectation),
        "flash-rush" => SimulationPlan::new(DEFAULT_PLAYERS.max(8), 4)
            .with_overrides(players, rounds)
            .with_flash_sales(1, true)
            .with_expectation(flash_rush_expectation),
        "replay" => SimulationPlan::new(DEFAULT_PLAYERS, DEFAULT_ROUNDS)
            .with_overrides(players, rounds)
            .with_goals(&["TOTAL_30", "BALANCED_CITY"])
            .with_flash_sales(2, false)
            .with_replay()
            .with_expectation(replay_expectation),
        _ => return None,
    };
    Some(TestScenario::new(key, *description, plan))
}

fn smoke_expectation(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.snapshot.phase == GamePhase::Ended,
        "game should end, phase is {}",
        summary.snapshot.phase
    );
    ensure!(
        summary.snapshot.players.len() == summary.players,
        "expected {} players, found {}",
        summary.players,
        summary.snapshot.players.len()
    );
    ensure!(summary.notifications > 0, "no notifications were emitted");
    Ok(())
}

fn full_game_expectation(summary: &SimulationSummary) -> Result<()> {
    smoke_expectation(summary)?;
    ensure!(
        summary.snapshot.event_history.len() == summary.rounds_played,
        "{} events for {} rounds",
        summary.snapshot.event_history.len(),
        summary.rounds_played
    );
    ensure!(
        summary.rounds_played == 0 || summary.accepted_turns() > 0,
        "no bot action was ever accepted"
    );
    ensure!(
        summary.standings.leaderboard.windows(2).all(|w| w[0].score >= w[1].score),
        "leaderboard is not sorted by score"
    );
    Ok(())
}

fn flash_rush_expectation(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.rounds_played == 0 || !summary.sales.is_empty(),
        "no flash sale was held"
    );
    for sale in &summary.sales {
        ensure!(
            sale.accepted <= sale.attempts,
            "sale {} accepted more purchases than attempts",
            sale.summary.sale_id
        );
        ensure!(
            sale.summary.buyers == usize::try_from(sale.summary.total_sold).unwrap_or(usize::MAX),
            "sale {} buyer list does not match units sold",
            sale.summary.sale_id
        );
    }
    Ok(())
}

fn replay_expectation(summary: &SimulationSummary) -> Result<()> {
    let replayed = summary.replay_digest;
    ensure!(replayed.is_some(), "replay did not run");
    ensure!(
        replayed == Some(summary.digest),
        "replay digest mismatch for seed {}",
        summary.seed
    );
    Ok(())
}
