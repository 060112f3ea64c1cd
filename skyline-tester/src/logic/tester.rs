use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::logic::game_tester::{GameTester, SimulationPlan, SimulationSummary, check_invariants};
use crate::scenarios::TestScenario;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

pub struct LogicTester {
    tester: GameTester,
}

impl LogicTester {
    pub const fn new(tester: GameTester) -> Self {
        Self { tester }
    }

    pub fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        seeds
            .iter()
            .map(|&seed| {
                if self.tester.verbose() {
                    println!(
                        "🧪 Testing scenario: {} (players: {} rounds: {} seed: {})",
                        scenario.name.bright_white(),
                        scenario.plan.players,
                        scenario.plan.rounds,
                        seed
                    );
                }
                self.run_single_scenario(scenario, seed, iterations)
            })
            .collect()
    }

    fn run_single_scenario(
        &self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let (successes, failures, performance_data) =
            self.run_simulation_iterations(&scenario.plan, seed, iterations);

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.name.clone(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
        }
    }

    fn run_simulation_iterations(
        &self,
        plan: &SimulationPlan,
        seed: u64,
        iterations: usize,
    ) -> (usize, Vec<String>, Vec<Duration>) {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));

            let problems = match self.tester.run_plan(plan, iteration_seed) {
                Ok(summary) => evaluate(plan, &summary, &self.tester)
                    .into_iter()
                    .map(|p| format!("{p} | {}", summarize_turns(&summary)))
                    .collect(),
                Err(err) => vec![format!("{err:#}")],
            };

            if problems.is_empty() {
                successes += 1;
                let duration = start_time.elapsed();
                performance_data.push(duration);
                if self.tester.verbose() {
                    println!(
                        "  ✅ Iteration {}/{} passed ({duration:?})",
                        i + 1,
                        iterations
                    );
                }
            } else {
                for problem in problems {
                    if self.tester.verbose() {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            iterations,
                            problem.clone().red()
                        );
                    }
                    failures.push(format!(
                        "Iteration {} (seed {iteration_seed}): {problem}",
                        i + 1
                    ));
                }
            }
        }

        (successes, failures, performance_data)
    }
}

fn evaluate(plan: &SimulationPlan, summary: &SimulationSummary, tester: &GameTester) -> Vec<String> {
    let mut problems = check_invariants(summary, tester.catalog());
    for expectation in &plan.expectations {
        if let Err(err) = expectation.evaluate(summary) {
            problems.push(err.to_string());
        }
    }
    problems
}

fn summarize_turns(summary: &SimulationSummary) -> String {
    if summary.turns.is_empty() {
        return "no turns recorded".to_string();
    }
    summary
        .turns
        .iter()
        .rev()
        .take(3)
        .map(|turn| {
            format!(
                "round {} table {} ({}): {} -> {}",
                turn.round,
                turn.table + 1,
                turn.strategy,
                turn.action.label(),
                turn.rejection.as_deref().unwrap_or("ok")
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use skyline_game::SessionConfig;

    fn always_unhappy(_: &SimulationSummary) -> anyhow::Result<()> {
        bail!("always unhappy")
    }

    fn logic_tester() -> LogicTester {
        LogicTester::new(GameTester::try_new(SessionConfig::default(), false).unwrap())
    }

    #[test]
    fn passing_scenario_counts_every_iteration() {
        let scenario = TestScenario::new("tiny", "two tables", SimulationPlan::new(2, 2));
        let results = logic_tester().run_scenario(&scenario, &[1, 2], 2);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.passed && r.successful_iterations == 2));
        assert_eq!(results[1].seed, 2);
    }

    #[test]
    fn failing_expectation_is_recorded_per_iteration() {
        let plan = SimulationPlan::new(2, 1).with_expectation(always_unhappy);
        let scenario = TestScenario::new("grumpy", "never passes", plan);
        let results = logic_tester().run_scenario(&scenario, &[9], 3);
        assert!(!results[0].passed);
        assert_eq!(results[0].successful_iterations, 0);
        assert_eq!(results[0].failures.len(), 3);
        assert!(results[0].failures[0].contains("always unhappy"));
    }

    #[test]
    fn results_serialize_durations_as_millis() {
        let result = ScenarioResult {
            scenario_name: "smoke".into(),
            seed: 1,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            average_duration: Duration::from_millis(12),
            performance_data: vec![Duration::from_millis(12)],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["average_duration"], 12);
        assert_eq!(json["performance_data"][0], 12);
    }
}
