use serde::{Deserialize, Serialize};

fn default_entry_threshold() -> f64 {
    2.0
}
fn default_exit_threshold() -> f64 {
    0.0
}
fn default_stop_loss() -> f64 {
    3.0
}
fn default_commission_pct() -> f64 {
    0.0004
}
fn default_slippage_bps() -> f64 {
    3.0
}
fn default_lookback_hours() -> Option<f64> {
    Some(24.0)
}

/// Configuration for a pairs-trading backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Absolute Z-score required to open a position.
    #[serde(default = "default_entry_threshold")]
    pub entry_threshold: f64,
    /// Z level at which an open position is considered mean-reverted.
    #[serde(default = "default_exit_threshold")]
    pub exit_threshold: f64,
    /// Absolute Z-score beyond which a position may be stopped out.
    #[serde(default = "default_stop_loss")]
    pub stop_loss: f64,
    #[serde(default = "default_commission_pct")]
    pub commission_pct: f64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: f64,
    /// Rolling Z-score lookback window expressed in hours. `None` falls
    /// back to a fixed 20-bar window.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: Option<f64>,
    /// Overrides the fitted hedge ratio. Only honored together with
    /// `force_intercept` — a lone override is treated as no override.
    #[serde(default)]
    pub force_hedge_ratio: Option<f64>,
    /// Overrides the fitted intercept. Only honored together with
    /// `force_hedge_ratio`.
    #[serde(default)]
    pub force_intercept: Option<f64>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            entry_threshold: default_entry_threshold(),
            exit_threshold: default_exit_threshold(),
            stop_loss: default_stop_loss(),
            commission_pct: default_commission_pct(),
            slippage_bps: default_slippage_bps(),
            lookback_hours: default_lookback_hours(),
            force_hedge_ratio: None,
            force_intercept: None,
        }
    }
}

/// Which leg of the pair is held long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    LongSpread,
    ShortSpread,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    MeanReversion,
    StopLoss,
    EndOfData,
}

/// A single closed pair trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub entry_bar: usize,
    pub exit_bar: usize,
    pub side: Side,
    pub entry_z_score: f64,
    pub exit_z_score: f64,
    pub entry_price_y: f64,
    pub entry_price_x: f64,
    pub exit_price_y: f64,
    pub exit_price_x: f64,
    pub pnl_gross: f64,
    pub pnl_net: f64,
    pub holding_period: usize,
    pub exit_reason: ExitReason,
}

/// Risk-adjusted performance metrics derived from the trade list and
/// per-bar return stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub total_return: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub max_win: f64,
    pub max_loss: f64,
    pub avg_holding_period: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
}

/// Full backtest output: trades, equity curve, per-bar returns, metrics, and
/// the hedge-ratio parameters actually used for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    /// Starts at 1.0; `equity_curve.len() == daily_returns.len() + 1`.
    pub equity_curve: Vec<f64>,
    pub daily_returns: Vec<f64>,
    pub metrics: BacktestMetrics,
    pub hedge_ratio: f64,
    pub intercept: f64,
    pub config: BacktestConfig,
}
