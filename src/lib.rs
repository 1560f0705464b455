//! Statistical-arbitrage pairs-trading backtest engine.
//!
//! Given two aligned price series, [`engine::run_backtest`] fits (or
//! accepts a forced) hedge ratio via Engle-Granger cointegration, simulates
//! a Z-score-driven entry/exit strategy bar by bar, and reports trades, an
//! equity curve, and risk-adjusted performance metrics.

pub mod cointegration;
pub mod engine;
pub mod error;
pub mod execution;
pub mod interval;
pub mod metrics;
pub mod models;
pub mod spread;

pub use engine::run_backtest;
pub use error::BacktestError;
pub use models::*;
