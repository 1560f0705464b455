use thiserror::Error;

/// Failure modes surfaced by the backtest engine.
///
/// `InvalidInput` and `Degenerate` are raised during up-front validation and
/// parameter estimation, before the simulation loop starts; `Internal` guards
/// against state-machine invariants that a correct implementation can never
/// actually trip.
#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("degenerate input: {0}")]
    Degenerate(String),

    #[error("internal error: {0}")]
    Internal(String),
}
