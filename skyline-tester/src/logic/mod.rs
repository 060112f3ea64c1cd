pub mod game_tester;
pub mod policy;
pub mod reports;
pub mod simulation;
pub mod tester;

pub use game_tester::{GameTester, SimulationPlan, SimulationSummary};
pub use policy::BotStrategy;
pub use tester::*;
