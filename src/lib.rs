// Core modules
pub mod backtest;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod logging;
pub mod models;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use execution::{CandleReport, Engine, EngineEvent, EngineHandle, PairEvaluator};
pub use models::*;
pub use strategy::Strategy;
