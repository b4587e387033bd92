pub mod catalog;
pub mod loader;
pub mod types;

pub use loader::ScenarioLoader;
pub use types::{Scenario, ScenarioError, Step, StepId, select, validate_all};
