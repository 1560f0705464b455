//! Performance-metrics calculator: total return, win rate, profit factor,
//! Sharpe, Sortino, Calmar, and drawdown statistics.

use crate::interval::ann_factor;
use crate::models::{BacktestMetrics, Trade};

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation with `ddof = 1`. Returns 0 for fewer than 2
/// samples.
fn sample_stdev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

fn total_return(returns: &[f64]) -> f64 {
    returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
}

fn sharpe_ratio(returns: &[f64], ann: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = sample_stdev(returns);
    if std == 0.0 {
        return 0.0;
    }
    (mean(returns) * ann) / (std * ann.sqrt())
}

fn sortino_ratio(returns: &[f64], ann: f64) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if downside.is_empty() {
        return if mean(returns) > 0.0 { f64::INFINITY } else { 0.0 };
    }
    let downside_std = sample_stdev(&downside);
    if downside_std == 0.0 {
        return 0.0;
    }
    (mean(returns) * ann) / (downside_std * ann.sqrt())
}

/// Cumulative-product equity curve, running-maximum drawdown, and the
/// longest run of strictly negative drawdown.
fn drawdown_stats(returns: &[f64]) -> (f64, usize) {
    if returns.is_empty() {
        return (0.0, 0);
    }
    let mut equity = 1.0;
    let mut running_max = 1.0;
    let mut worst_drawdown = 0.0_f64;
    let mut current_run = 0usize;
    let mut longest_run = 0usize;

    for r in returns {
        equity *= 1.0 + r;
        if equity > running_max {
            running_max = equity;
        }
        let drawdown = if running_max.abs() < 1e-15 { 0.0 } else { (equity - running_max) / running_max };
        if drawdown < worst_drawdown {
            worst_drawdown = drawdown;
        }
        if drawdown < 0.0 {
            current_run += 1;
            longest_run = longest_run.max(current_run);
        } else {
            current_run = 0;
        }
    }

    (worst_drawdown.abs(), longest_run)
}

fn calmar_ratio(total_return: f64, max_drawdown: f64, ann: f64, n_bars: usize) -> f64 {
    if max_drawdown == 0.0 || n_bars == 0 {
        return 0.0;
    }
    let annualized_return = (1.0 + total_return).powf(ann / n_bars as f64) - 1.0;
    annualized_return / max_drawdown
}

/// Computes the full metrics record from the trade list and per-bar net
/// return stream produced by the simulation kernel.
pub fn compute_metrics(trades: &[Trade], returns: &[f64], interval: &str) -> BacktestMetrics {
    let ann = ann_factor(interval);

    let total_trades = trades.len();
    let wins: Vec<f64> = trades.iter().map(|t| t.pnl_net).filter(|&p| p > 0.0).collect();
    let losses: Vec<f64> = trades.iter().map(|t| t.pnl_net).filter(|&p| p < 0.0).collect();

    let winning_trades = wins.len();
    let losing_trades = losses.len();
    let win_rate = if total_trades == 0 { 0.0 } else { winning_trades as f64 / total_trades as f64 };

    let gross_profit: f64 = wins.iter().sum();
    let gross_loss: f64 = losses.iter().sum::<f64>().abs();
    let profit_factor = if total_trades == 0 {
        0.0
    } else if gross_loss == 0.0 {
        f64::INFINITY
    } else {
        gross_profit / gross_loss
    };

    let avg_win = if wins.is_empty() { 0.0 } else { mean(&wins) };
    let avg_loss = if losses.is_empty() { 0.0 } else { mean(&losses) };
    let max_win = wins.iter().cloned().fold(0.0_f64, f64::max);
    let max_loss = losses.iter().cloned().fold(0.0_f64, f64::min);

    let avg_holding_period = if trades.is_empty() {
        0.0
    } else {
        trades.iter().map(|t| t.holding_period as f64).sum::<f64>() / trades.len() as f64
    };

    let (max_drawdown, max_drawdown_duration) = drawdown_stats(returns);
    let ret = total_return(returns);

    BacktestMetrics {
        total_return: ret,
        total_trades,
        winning_trades,
        losing_trades,
        win_rate,
        profit_factor,
        avg_win,
        avg_loss,
        max_win,
        max_loss,
        avg_holding_period,
        sharpe_ratio: sharpe_ratio(returns, ann),
        sortino_ratio: sortino_ratio(returns, ann),
        calmar_ratio: calmar_ratio(ret, max_drawdown, ann, returns.len()),
        max_drawdown,
        max_drawdown_duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExitReason, Side};

    fn trade(net: f64, holding: usize) -> Trade {
        Trade {
            entry_bar: 0,
            exit_bar: holding,
            side: Side::LongSpread,
            entry_z_score: -2.0,
            exit_z_score: 0.0,
            entry_price_y: 100.0,
            entry_price_x: 50.0,
            exit_price_y: 100.0,
            exit_price_x: 50.0,
            pnl_gross: net,
            pnl_net: net,
            holding_period: holding,
            exit_reason: ExitReason::MeanReversion,
        }
    }

    #[test]
    fn zero_trades_yields_zeroed_metrics() {
        let m = compute_metrics(&[], &[], "1h");
        assert_eq!(m.total_trades, 0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
    }

    #[test]
    fn profit_factor_is_infinite_with_no_losses() {
        let trades = vec![trade(0.01, 3), trade(0.02, 5)];
        let returns = vec![0.0, 0.0, 0.01, 0.0, 0.0, 0.02];
        let m = compute_metrics(&trades, &returns, "1h");
        assert!(m.profit_factor.is_infinite());
    }

    #[test]
    fn sharpe_is_zero_for_zero_variance_returns() {
        let returns = vec![0.001; 100];
        let m = compute_metrics(&[], &returns, "1h");
        assert_eq!(m.sharpe_ratio, 0.0);
    }

    #[test]
    fn sharpe_matches_hand_computed_value_for_perturbed_returns() {
        let mut returns = vec![0.001; 100];
        returns[0] = 0.0011;
        returns[1] = 0.0009;
        let ann = ann_factor("1h");
        let std = sample_stdev(&returns);
        let expected = (mean(&returns) * ann) / (std * ann.sqrt());
        let m = compute_metrics(&[], &returns, "1h");
        assert!((m.sharpe_ratio - expected).abs() < 1e-9);
    }

    #[test]
    fn max_drawdown_tracks_a_losing_streak() {
        let returns = vec![0.05, -0.1, -0.1, 0.02, 0.2];
        let (dd, dur) = drawdown_stats(&returns);
        assert!(dd > 0.0);
        assert_eq!(dur, 2);
    }
}
