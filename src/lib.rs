// Core modules
pub mod backtest;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use config::AppConfig;
pub use engine::{Engine, EngineEvent, EngineStats};
pub use error::EngineError;
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, EngineError>;
