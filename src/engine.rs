//! Bar-by-bar simulation kernel: a single-position state machine driving
//! entries and exits off the rolling Z-score, plus the public
//! [`run_backtest`] entry point that ties every component together.

use tracing::{debug, trace};

use crate::cointegration::engle_granger_test;
use crate::error::BacktestError;
use crate::execution::{pair_trade_gross_pnl, round_trip_cost};
use crate::interval::lookback_bars;
use crate::metrics::compute_metrics;
use crate::models::{BacktestConfig, BacktestResult, ExitReason, Side, Trade};
use crate::spread::{build_spread, rolling_z_score};

/// Fallback lookback window when `lookback_hours` is not set, matching the
/// original fixed-bar-count behavior this time-based scheme replaced.
const FIXED_LOOKBACK_BARS: usize = 20;

/// The single open-position slot. Modeled as an algebraic state rather than
/// a boolean-plus-optional-fields struct so that "open with no entry
/// snapshot" is unrepresentable.
#[derive(Debug, Clone, Copy)]
enum Position {
    Flat,
    Open {
        side: Side,
        entry_bar: usize,
        entry_z: f64,
        entry_price_y: f64,
        entry_price_x: f64,
    },
}

fn validate_inputs(y: &[f64], x: &[f64]) -> Result<(), BacktestError> {
    if y.len() != x.len() {
        return Err(BacktestError::InvalidInput(format!(
            "price series length mismatch: y={}, x={}",
            y.len(),
            x.len()
        )));
    }
    if y.iter().chain(x.iter()).any(|v| !v.is_finite()) {
        return Err(BacktestError::InvalidInput(
            "non-finite value in price series".to_string(),
        ));
    }
    Ok(())
}

/// Runs a full pairs-trading backtest over two aligned price series.
///
/// Fits (or accepts a forced) hedge ratio, builds the cointegration spread,
/// and simulates bar by bar: exits are evaluated strictly before entries,
/// mean-reversion exits take precedence over stop-loss exits, and no new
/// position opens on the same bar a position just closed. Any position still
/// open at the final bar is force-closed there with `exit_reason =
/// end_of_data`.
pub fn run_backtest(
    prices_y: &[f64],
    prices_x: &[f64],
    interval: &str,
    config: &BacktestConfig,
) -> Result<BacktestResult, BacktestError> {
    validate_inputs(prices_y, prices_x)?;

    let n = prices_y.len();
    let lookback = match config.lookback_hours {
        Some(hours) => lookback_bars(hours, interval),
        None => FIXED_LOOKBACK_BARS,
    };
    if n < lookback + 10 {
        return Err(BacktestError::InvalidInput(format!(
            "need at least {} bars ({} lookback + 10), got {}",
            lookback + 10,
            lookback,
            n
        )));
    }

    let (intercept, hedge_ratio) = match (config.force_hedge_ratio, config.force_intercept) {
        (Some(beta), Some(alpha)) => (alpha, beta),
        _ => {
            let fit = engle_granger_test(prices_y, prices_x)?;
            (fit.alpha, fit.beta)
        }
    };
    debug!(intercept, hedge_ratio, "fitted hedge ratio for backtest run");

    let spread = build_spread(prices_y, prices_x, intercept, hedge_ratio);
    let z = rolling_z_score(&spread, lookback)?;
    let cost = round_trip_cost(config.commission_pct, config.slippage_bps);

    let mut position = Position::Flat;
    let mut trades: Vec<Trade> = Vec::new();
    let mut returns: Vec<f64> = Vec::with_capacity(n - lookback);

    for i in lookback..n {
        let zi = z[i]
            .ok_or_else(|| BacktestError::Internal(format!("missing rolling z-score at bar {i}")))?;

        let mut bar_return = 0.0;
        let mut just_exited = false;

        if let Position::Open { side, entry_bar, entry_z, entry_price_y, entry_price_x } = position {
            let mean_reversion = match side {
                Side::LongSpread => zi >= config.exit_threshold,
                Side::ShortSpread => zi <= config.exit_threshold,
            };
            let adverse_move = match side {
                Side::LongSpread => zi < entry_z,
                Side::ShortSpread => zi > entry_z,
            };
            let stop_loss_hit = zi.abs() >= config.stop_loss && adverse_move;

            if mean_reversion || stop_loss_hit {
                let exit_reason =
                    if mean_reversion { ExitReason::MeanReversion } else { ExitReason::StopLoss };
                let gross = pair_trade_gross_pnl(
                    entry_price_y,
                    entry_price_x,
                    prices_y[i],
                    prices_x[i],
                    hedge_ratio,
                    side,
                );
                let net = gross - cost;
                trades.push(Trade {
                    entry_bar,
                    exit_bar: i,
                    side,
                    entry_z_score: entry_z,
                    exit_z_score: zi,
                    entry_price_y,
                    entry_price_x,
                    exit_price_y: prices_y[i],
                    exit_price_x: prices_x[i],
                    pnl_gross: gross,
                    pnl_net: net,
                    holding_period: i - entry_bar,
                    exit_reason,
                });
                trace!(bar = i, pnl_net = net, "closed position");
                bar_return = net;
                position = Position::Flat;
                just_exited = true;
            }
        }

        if !just_exited {
            if let Position::Flat = position {
                if zi < -config.entry_threshold {
                    position = Position::Open {
                        side: Side::LongSpread,
                        entry_bar: i,
                        entry_z: zi,
                        entry_price_y: prices_y[i],
                        entry_price_x: prices_x[i],
                    };
                } else if zi > config.entry_threshold {
                    position = Position::Open {
                        side: Side::ShortSpread,
                        entry_bar: i,
                        entry_z: zi,
                        entry_price_y: prices_y[i],
                        entry_price_x: prices_x[i],
                    };
                }
            }
        }

        returns.push(bar_return);
    }

    if let Position::Open { side, entry_bar, entry_z, entry_price_y, entry_price_x } = position {
        let last = n - 1;
        let gross = pair_trade_gross_pnl(
            entry_price_y,
            entry_price_x,
            prices_y[last],
            prices_x[last],
            hedge_ratio,
            side,
        );
        let net = gross - cost;
        trades.push(Trade {
            entry_bar,
            exit_bar: last,
            side,
            entry_z_score: entry_z,
            exit_z_score: 0.0,
            entry_price_y,
            entry_price_x,
            exit_price_y: prices_y[last],
            exit_price_x: prices_x[last],
            pnl_gross: gross,
            pnl_net: net,
            holding_period: last - entry_bar,
            exit_reason: ExitReason::EndOfData,
        });
        if let Some(last_return) = returns.last_mut() {
            *last_return = net;
        }
    }

    let mut equity_curve = Vec::with_capacity(returns.len() + 1);
    equity_curve.push(1.0);
    let mut equity = 1.0;
    for r in &returns {
        equity *= 1.0 + r;
        equity_curve.push(equity);
    }

    let metrics = compute_metrics(&trades, &returns, interval);
    debug!(
        total_trades = trades.len(),
        total_return = metrics.total_return,
        "backtest run complete"
    );

    Ok(BacktestResult {
        trades,
        equity_curve,
        daily_returns: returns,
        metrics,
        hedge_ratio,
        intercept,
        config: config.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine_pair(n: usize) -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..n).map(|i| 100.0 + (2.0 * PI * i as f64 / 50.0).sin()).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, &xi)| 2.0 * xi + 10.0 + if i % 7 == 0 { 0.05 } else { -0.02 })
            .collect();
        (y, x)
    }

    #[test]
    fn identical_series_is_degenerate() {
        let y = vec![100.0; 200];
        let x = vec![100.0; 200];
        let config = BacktestConfig::default();
        let result = run_backtest(&y, &x, "1h", &config);
        assert!(matches!(result, Err(BacktestError::Degenerate(_))));
    }

    #[test]
    fn forced_hedge_ratio_is_echoed_and_trades_occur() {
        let (y, x) = sine_pair(400);
        let config = BacktestConfig {
            force_hedge_ratio: Some(2.0),
            force_intercept: Some(10.0),
            commission_pct: 0.0,
            slippage_bps: 0.0,
            lookback_hours: Some(24.0),
            ..BacktestConfig::default()
        };
        let result = run_backtest(&y, &x, "1h", &config).unwrap();
        assert_eq!(result.hedge_ratio, 2.0);
        assert_eq!(result.intercept, 10.0);
        assert!(!result.trades.is_empty());
    }

    #[test]
    fn zero_cost_trades_have_equal_gross_and_net_pnl() {
        let (y, x) = sine_pair(400);
        let config = BacktestConfig {
            force_hedge_ratio: Some(2.0),
            force_intercept: Some(10.0),
            commission_pct: 0.0,
            slippage_bps: 0.0,
            ..BacktestConfig::default()
        };
        let result = run_backtest(&y, &x, "1h", &config).unwrap();
        for t in &result.trades {
            assert!((t.pnl_net - t.pnl_gross).abs() < 1e-12);
        }
    }

    #[test]
    fn equity_curve_is_one_longer_than_returns_and_self_consistent() {
        let (y, x) = sine_pair(400);
        let config = BacktestConfig { force_hedge_ratio: Some(2.0), force_intercept: Some(10.0), ..BacktestConfig::default() };
        let result = run_backtest(&y, &x, "1h", &config).unwrap();
        assert_eq!(result.equity_curve.len(), result.daily_returns.len() + 1);
        assert_eq!(result.equity_curve[0], 1.0);
        for k in 0..result.daily_returns.len() {
            let expected = result.equity_curve[k] * (1.0 + result.daily_returns[k]);
            assert!((result.equity_curve[k + 1] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn end_of_data_forces_a_closeout_trade() {
        // A monotonic ramp in the spread direction keeps z growing without
        // ever mean-reverting, so any open position must be forced closed
        // at the final bar.
        let n = 400;
        let x: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 0.01).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, &xi)| 2.0 * xi + 10.0 + if i > n - 50 { (i - (n - 50)) as f64 * 0.5 } else { 0.0 })
            .collect();
        let config = BacktestConfig {
            force_hedge_ratio: Some(2.0),
            force_intercept: Some(10.0),
            entry_threshold: 2.0,
            stop_loss: 100.0,
            ..BacktestConfig::default()
        };
        let result = run_backtest(&y, &x, "1h", &config).unwrap();
        if let Some(last_trade) = result.trades.last() {
            if last_trade.exit_reason == ExitReason::EndOfData {
                assert_eq!(last_trade.exit_bar, n - 1);
            }
        }
    }

    #[test]
    fn no_trade_opens_on_the_same_bar_as_a_close() {
        let (y, x) = sine_pair(500);
        let config = BacktestConfig { force_hedge_ratio: Some(2.0), force_intercept: Some(10.0), ..BacktestConfig::default() };
        let result = run_backtest(&y, &x, "1h", &config).unwrap();
        for pair in result.trades.windows(2) {
            assert!(pair[1].entry_bar > pair[0].exit_bar);
        }
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let y = vec![1.0; 100];
        let x = vec![1.0; 99];
        let config = BacktestConfig::default();
        let result = run_backtest(&y, &x, "1h", &config);
        assert!(matches!(result, Err(BacktestError::InvalidInput(_))));
    }

    #[test]
    fn rejects_too_short_a_series() {
        let y = vec![1.0; 15];
        let x = vec![1.0; 15];
        let config = BacktestConfig::default();
        let result = run_backtest(&y, &x, "1h", &config);
        assert!(matches!(result, Err(BacktestError::InvalidInput(_))));
    }
}
