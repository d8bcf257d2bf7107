// In crates/analytics/src/lib.rs

pub mod engine;
pub mod leaderboard;
pub mod types;

pub use engine::AnalyticsEngine;
pub use leaderboard::{Leaderboard, LeaderboardEntry, LeaderboardPeriod, Participant, PeriodStanding};
pub use types::{EquityPoint, Outcome, PerformanceReport, TradeFilter, TradeRecord};
