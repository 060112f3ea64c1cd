use std::hash::Hasher;
use std::sync::Arc;

use anyhow::{Context, Result};
use skyline_game::{Catalog, FinalStandings, SessionConfig, SessionSnapshot};
use twox_hash::XxHash64;

use crate::logic::simulation::{
    FinishedSimulation, SaleRecord, SimulationConfig, SimulationSession, TurnRecord,
};

pub const DEFAULT_PLAYERS: usize = 6;
pub const DEFAULT_ROUNDS: usize = 8;

/// Declarative plan for one simulated game.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub players: usize,
    pub rounds: usize,
    /// Open a flash sale on every n-th round.
    pub flash_sale_every: Option<usize>,
    /// Buyers race from separate threads.
    pub concurrent_sales: bool,
    pub goals: Vec<&'static str>,
    /// Play the same seed twice and keep the second digest.
    pub replay: bool,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    #[must_use]
    pub const fn new(players: usize, rounds: usize) -> Self {
        Self {
            players,
            rounds,
            flash_sale_every: None,
            concurrent_sales: false,
            goals: Vec::new(),
            replay: false,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_flash_sales(mut self, every: usize, concurrent: bool) -> Self {
        self.flash_sale_every = Some(every);
        self.concurrent_sales = concurrent;
        self
    }

    #[must_use]
    pub fn with_goals(mut self, goals: &[&'static str]) -> Self {
        self.goals.extend_from_slice(goals);
        self
    }

    #[must_use]
    pub const fn with_replay(mut self) -> Self {
        self.replay = true;
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }

    /// Apply `--players` / `--rounds` overrides.
    #[must_use]
    pub fn with_overrides(mut self, players: Option<usize>, rounds: Option<usize>) -> Self {
        if let Some(players) = players {
            self.players = players.max(1);
        }
        if let Some(rounds) = rounds {
            self.rounds = rounds;
        }
        self
    }
}

/// Assertion hook run after a simulation completes.
type SimulationExpectationFn = Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl std::fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationExpectation").finish()
    }
}

impl SimulationExpectation {
    pub fn evaluate(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// Complete record of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub players: usize,
    pub rounds_played: usize,
    pub turns: Vec<TurnRecord>,
    pub sales: Vec<SaleRecord>,
    pub standings: FinalStandings,
    pub snapshot: SessionSnapshot,
    pub notifications: usize,
    pub digest: u64,
    pub replay_digest: Option<u64>,
}

impl SimulationSummary {
    #[must_use]
    pub fn accepted_turns(&self) -> usize {
        self.turns.iter().filter(|t| t.rejection.is_none()).count()
    }
}

/// Stable digest of a snapshot's JSON form.
///
/// # Errors
///
/// Fails if the snapshot cannot be serialized.
pub fn snapshot_digest(snapshot: &SessionSnapshot) -> Result<u64> {
    let bytes = serde_json::to_vec(snapshot).context("serializing snapshot")?;
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&bytes);
    Ok(hasher.finish())
}

/// Engine-wide properties every finished game must satisfy.
#[must_use]
pub fn check_invariants(summary: &SimulationSummary, catalog: &Catalog) -> Vec<String> {
    let mut violations = Vec::new();
    let snapshot = &summary.snapshot;

    if !snapshot.city.is_consistent_with(&snapshot.players) {
        violations.push("city aggregate disagrees with player holdings".to_string());
    }

    for def in catalog.achievements().iter().filter(|a| a.global_unique) {
        let holders: Vec<_> = snapshot
            .players
            .iter()
            .filter(|p| p.achievements.contains(&def.id))
            .collect();
        if holders.len() > 1 {
            violations.push(format!("{} has {} holders", def.id, holders.len()));
        }
        match (snapshot.registry.winner(&def.id), holders.first()) {
            (Some(winner), Some(holder)) if winner != &holder.id => {
                violations.push(format!("{} registry names {winner}, held by {}", def.id, holder.id));
            }
            (Some(winner), None) => {
                violations.push(format!("{} registry names {winner} but nobody holds it", def.id));
            }
            (None, Some(holder)) => {
                violations.push(format!("{} held by {} without a registry entry", def.id, holder.id));
            }
            _ => {}
        }
    }

    for sale in &summary.sales {
        let s = &sale.summary;
        if s.total_sold > s.total_quantity {
            violations.push(format!(
                "flash sale {} sold {} of {}",
                s.sale_id, s.total_sold, s.total_quantity
            ));
        }
        if sale.attempts > 0 && u32::try_from(sale.accepted).ok() != Some(s.total_sold) {
            violations.push(format!(
                "flash sale {} accepted {} purchases but reports {} sold",
                s.sale_id, sale.accepted, s.total_sold
            ));
        }
    }

    for player in &snapshot.players {
        if player.coins < 0 {
            violations.push(format!("{} has negative coins ({})", player.id, player.coins));
        }
    }

    if let Some(replayed) = summary.replay_digest
        && replayed != summary.digest
    {
        violations.push(format!(
            "replay digest {replayed:016x} differs from {:016x}",
            summary.digest
        ));
    }

    violations
}

/// Runs simulation plans against the embedded catalog.
#[derive(Debug, Clone)]
pub struct GameTester {
    catalog: Arc<Catalog>,
    session_config: SessionConfig,
    verbose: bool,
}

impl GameTester {
    /// # Errors
    ///
    /// Fails if the embedded catalog does not validate.
    pub fn try_new(session_config: SessionConfig, verbose: bool) -> Result<Self> {
        let catalog = Catalog::embedded().context("loading embedded catalog")?;
        Ok(Self {
            catalog,
            session_config,
            verbose,
        })
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    /// Play `plan` once with `seed`, twice when the plan asks for a replay.
    ///
    /// # Errors
    ///
    /// Fails when a scripted host command is rejected.
    pub fn run_plan(&self, plan: &SimulationPlan, seed: u64) -> Result<SimulationSummary> {
        let finished = self.play(plan, seed)?;
        let digest = snapshot_digest(&finished.snapshot)?;
        let replay_digest = if plan.replay {
            Some(snapshot_digest(&self.play(plan, seed)?.snapshot)?)
        } else {
            None
        };
        if self.verbose {
            println!(
                "     seed {seed}: {} rounds, {} turns, {} sales, digest {digest:016x}",
                finished.rounds_played,
                finished.turns.len(),
                finished.sales.len()
            );
        }
        Ok(SimulationSummary {
            seed,
            players: plan.players,
            rounds_played: finished.rounds_played,
            turns: finished.turns,
            sales: finished.sales,
            standings: finished.standings,
            snapshot: finished.snapshot,
            notifications: finished.notifications,
            digest,
            replay_digest,
        })
    }

    fn play(&self, plan: &SimulationPlan, seed: u64) -> Result<FinishedSimulation> {
        let config = SimulationConfig {
            seed,
            players: plan.players,
            session: self.session_config.clone(),
        };
        let mut sim = SimulationSession::new(Arc::clone(&self.catalog), config, &plan.goals)?;
        for round in 0..plan.rounds {
            if let Some(every) = plan.flash_sale_every
                && every > 0
                && round % every == 0
            {
                sim.run_flash_sale(plan.concurrent_sales)?;
            }
            sim.play_round()?;
        }
        Ok(sim.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyline_game::FlashSaleSummary;

    fn tester() -> GameTester {
        GameTester::try_new(SessionConfig::default(), false).unwrap()
    }

    #[test]
    fn clean_run_has_no_violations() {
        let tester = tester();
        let plan = SimulationPlan::new(4, 5)
            .with_flash_sales(2, false)
            .with_goals(&["TOTAL_30", "HOUSING_10"]);
        let summary = tester.run_plan(&plan, 1337).unwrap();
        assert_eq!(summary.rounds_played, 5);
        assert_eq!(summary.snapshot.event_history.len(), 5);
        assert_eq!(summary.sales.len(), 3);
        assert!(check_invariants(&summary, tester.catalog()).is_empty());
    }

    #[test]
    fn replay_produces_the_same_digest() {
        let tester = tester();
        let plan = SimulationPlan::new(5, 4).with_flash_sales(3, false).with_replay();
        let summary = tester.run_plan(&plan, 42).unwrap();
        assert_eq!(summary.replay_digest, Some(summary.digest));
    }

    #[test]
    fn oversold_sale_and_replay_drift_are_reported() {
        let tester = tester();
        let mut summary = tester.run_plan(&SimulationPlan::new(2, 2), 7).unwrap();
        summary.sales.push(SaleRecord {
            summary: FlashSaleSummary {
                sale_id: 99,
                building_id: "SHOP".into(),
                total_sold: 4,
                total_quantity: 3,
                buyers: 4,
            },
            accepted: 4,
            attempts: 6,
        });
        summary.replay_digest = Some(summary.digest ^ 1);
        let violations = check_invariants(&summary, tester.catalog());
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.contains("sold 4 of 3")));
        assert!(violations.iter().any(|v| v.contains("replay digest")));
    }

    #[test]
    fn overrides_replace_table_and_round_counts() {
        let plan = SimulationPlan::new(DEFAULT_PLAYERS, DEFAULT_ROUNDS).with_overrides(Some(0), Some(3));
        assert_eq!(plan.players, 1);
        assert_eq!(plan.rounds, 3);
    }
}
