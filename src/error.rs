use thiserror::Error;

use crate::execution::BrokerError;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Order execution errors
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    // Market data errors
    #[error("Invalid market data: {0}")]
    InvalidMarketData(String),

    #[error("Invalid economic calendar entry: {0}")]
    InvalidCalendar(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
