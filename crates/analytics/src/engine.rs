use crate::types::{EquityPoint, PerformanceReport, TradeRecord};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

/// The engine responsible for calculating performance metrics from trade data.
#[derive(Debug, Default)]
pub struct AnalyticsEngine;

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates a full performance report from a set of closed trades.
    ///
    /// Trades are ordered by close time before the drawdown walk, so callers
    /// may pass them in any order.
    pub fn calculate(&self, initial_capital: Decimal, trades: &[TradeRecord]) -> PerformanceReport {
        let mut report = PerformanceReport::new();
        if trades.is_empty() {
            return report; // Return a default report if there are no trades.
        }

        let mut ordered: Vec<&TradeRecord> = trades.iter().collect();
        ordered.sort_by_key(|t| (t.close_time, t.id));

        // --- Counts & Totals ---

        report.total_trades = ordered.len() as u32;
        let winners: Vec<Decimal> = ordered.iter().map(|t| t.profit).filter(|p| *p > dec!(0)).collect();
        let losers: Vec<Decimal> = ordered.iter().map(|t| t.profit).filter(|p| *p < dec!(0)).collect();
        report.winning_trades = winners.len() as u32;
        report.losing_trades = losers.len() as u32;

        report.net_profit = ordered.iter().map(|t| t.profit).sum();
        report.gross_profit = winners.iter().sum();
        report.gross_loss = losers.iter().sum::<Decimal>().abs();
        report.total_commission = ordered.iter().map(|t| t.commission).sum();
        report.total_swap = ordered.iter().map(|t| t.swap).sum();
        if initial_capital > dec!(0) {
            report.net_profit_pct = to_f64(report.net_profit / initial_capital) * 100.0;
        }

        // --- Win Rate & Profit Factor ---

        report.win_rate = (report.winning_trades as f64 / report.total_trades as f64) * 100.0;
        report.profit_factor = if losers.is_empty() {
            None
        } else {
            Some(to_f64(report.gross_profit / report.gross_loss))
        };

        // --- Per-Trade Averages ---

        report.average_win = mean(&winners);
        report.average_loss = mean(&losers);
        report.largest_win = winners.iter().copied().max().unwrap_or(dec!(0));
        report.largest_loss = losers.iter().copied().min().unwrap_or(dec!(0));
        report.expectancy = report.net_profit / Decimal::from(ordered.len());

        let total_duration_secs: i64 = ordered.iter().map(|t| t.duration_secs).sum();
        report.avg_trade_duration_secs = total_duration_secs as f64 / ordered.len() as f64;

        // --- Max Drawdown on cumulative realized P&L ---

        let mut cumulative = dec!(0);
        let mut peak = dec!(0);
        let mut max_drawdown = dec!(0);
        let mut peak_at_max = dec!(0);
        for trade in &ordered {
            cumulative += trade.profit;
            peak = peak.max(cumulative);
            let drawdown = peak - cumulative;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
                peak_at_max = peak;
            }
        }
        report.max_drawdown = max_drawdown;
        let peak_equity = initial_capital + peak_at_max;
        if peak_equity > dec!(0) {
            report.max_drawdown_pct = to_f64(max_drawdown / peak_equity) * 100.0;
        }

        // --- Sharpe-like Ratio over per-trade profit ---

        if ordered.len() > 1 {
            let profits: Vec<f64> = ordered.iter().map(|t| to_f64(t.profit)).collect();
            let mean_profit = profits.iter().sum::<f64>() / profits.len() as f64;
            let std_dev = {
                let variance = profits.iter().map(|p| (*p - mean_profit).powi(2)).sum::<f64>() / profits.len() as f64;
                variance.sqrt()
            };
            report.sharpe_ratio = if std_dev > 0.0 { mean_profit / std_dev } else { 0.0 };
        }

        report
    }

    /// Balance after each closed trade, starting from `initial_capital` at `start`.
    pub fn equity_curve(
        &self,
        initial_capital: Decimal,
        start: DateTime<Utc>,
        trades: &[TradeRecord],
    ) -> Vec<EquityPoint> {
        let mut ordered: Vec<&TradeRecord> = trades.iter().collect();
        ordered.sort_by_key(|t| (t.close_time, t.id));

        let mut value = initial_capital;
        let mut curve = Vec::with_capacity(ordered.len() + 1);
        curve.push(EquityPoint { timestamp: start, value });
        for trade in ordered {
            value += trade.profit;
            curve.push(EquityPoint {
                timestamp: trade.close_time,
                value,
            });
        }
        curve
    }
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return dec!(0);
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len())
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
