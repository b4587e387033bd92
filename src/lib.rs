pub mod assertion;
pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod runner;
pub mod scenario;
pub mod utils;
pub mod variable;

// Re-export commonly used types
pub use error::{Result, RucontractError};
