// In crates/analytics/src/leaderboard.rs

use crate::types::TradeRecord;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardPeriod {
    Day,
    Week,
    Month,
    AllTime,
}

impl LeaderboardPeriod {
    /// Start of the trailing window ending at `now`; `None` for all-time.
    pub fn window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            LeaderboardPeriod::Day => Some(now - Duration::days(1)),
            LeaderboardPeriod::Week => Some(now - Duration::weeks(1)),
            LeaderboardPeriod::Month => Some(now - Duration::days(30)),
            LeaderboardPeriod::AllTime => None,
        }
    }
}

impl fmt::Display for LeaderboardPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaderboardPeriod::Day => write!(f, "day"),
            LeaderboardPeriod::Week => write!(f, "week"),
            LeaderboardPeriod::Month => write!(f, "month"),
            LeaderboardPeriod::AllTime => write!(f, "all_time"),
        }
    }
}

impl FromStr for LeaderboardPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(LeaderboardPeriod::Day),
            "week" => Ok(LeaderboardPeriod::Week),
            "month" => Ok(LeaderboardPeriod::Month),
            "all" | "all_time" | "all-time" => Ok(LeaderboardPeriod::AllTime),
            other => Err(format!("unknown leaderboard period '{}'", other)),
        }
    }
}

/// One trader's results over a period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodStanding {
    pub profit_pct: f64,
    pub win_rate: f64,
    pub trades: u32,
}

impl PeriodStanding {
    /// Derives a standing from closed trades. Profit is relative to
    /// `initial_balance`.
    pub fn from_trades(trades: &[TradeRecord], initial_balance: Decimal) -> Self {
        if trades.is_empty() {
            return Self::default();
        }
        let net: Decimal = trades.iter().map(|t| t.profit).sum();
        let wins = trades.iter().filter(|t| t.profit > Decimal::ZERO).count();
        let profit_pct = if initial_balance > Decimal::ZERO {
            (net / initial_balance).to_f64().unwrap_or(0.0) * 100.0
        } else {
            0.0
        };
        Self {
            profit_pct,
            win_rate: wins as f64 / trades.len() as f64 * 100.0,
            trades: trades.len() as u32,
        }
    }
}

/// A simulated rival with fixed results for each period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    #[serde(default)]
    pub day: PeriodStanding,
    #[serde(default)]
    pub week: PeriodStanding,
    #[serde(default)]
    pub month: PeriodStanding,
    #[serde(default)]
    pub all_time: PeriodStanding,
}

impl Participant {
    pub fn standing(&self, period: LeaderboardPeriod) -> &PeriodStanding {
        match period {
            LeaderboardPeriod::Day => &self.day,
            LeaderboardPeriod::Week => &self.week,
            LeaderboardPeriod::Month => &self.month,
            LeaderboardPeriod::AllTime => &self.all_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based.
    pub rank: usize,
    pub name: String,
    pub profit_pct: f64,
    pub win_rate: f64,
    pub trades: u32,
    /// Marks the live session's own row.
    pub is_self: bool,
}

/// The static roster of simulated traders.
#[derive(Debug, Clone, Default)]
pub struct Leaderboard {
    participants: Vec<Participant>,
}

impl Leaderboard {
    pub fn new(participants: Vec<Participant>) -> Self {
        Self { participants }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Ranks the roster for `period`, optionally merging in the caller's own
    /// standing under `own.0`.
    pub fn rank(&self, period: LeaderboardPeriod, own: Option<(&str, PeriodStanding)>) -> Vec<LeaderboardEntry> {
        let mut rows: Vec<LeaderboardEntry> = self
            .participants
            .iter()
            .map(|p| entry(&p.name, p.standing(period), false))
            .collect();
        if let Some((name, standing)) = own {
            rows.push(entry(name, &standing, true));
        }

        rows.sort_by(compare);
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = i + 1;
        }
        rows
    }
}

fn entry(name: &str, standing: &PeriodStanding, is_self: bool) -> LeaderboardEntry {
    LeaderboardEntry {
        rank: 0,
        name: name.to_string(),
        profit_pct: standing.profit_pct,
        win_rate: standing.win_rate,
        trades: standing.trades,
        is_self,
    }
}

/// Profit % descending, then win rate descending, then fewer trades, then name.
fn compare(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.profit_pct
        .total_cmp(&a.profit_pct)
        .then_with(|| b.win_rate.total_cmp(&a.win_rate))
        .then_with(|| a.trades.cmp(&b.trades))
        .then_with(|| a.name.cmp(&b.name))
}
