pub mod executor;
pub mod reporter;
pub mod types;

pub use executor::ContractRunner;
pub use reporter::{ContractReporter, scenario_table};
pub use types::{
    Failure, FailureKind, ScenarioResult, StepOutcome, StepResult, SuiteResult, SuiteSummary,
};
