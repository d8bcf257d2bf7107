// --- Session event structures broadcast to subscribers ---

use chrono::{DateTime, Utc};
use core_types::{Position, Quote};
use execution::PendingOrder;
use risk::PortfolioSnapshot;
use serde::Serialize;

/// A log line forwarded from the tracing subscriber.
#[derive(Debug, Clone, Serialize)]
pub struct LogMessage {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

/// Everything the session announces to presentation-layer listeners.
/// `tag` and `content` are used by serde for clean JSON representation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum SessionEvent {
    Quote(Quote),
    PositionOpened(Position),
    /// A position left the book, by command or by a protective level.
    PositionClosed(Position),
    PositionModified(Position),
    /// A pending order was accepted into the book.
    OrderPending(PendingOrder),
    OrderCancelled(PendingOrder),
    /// A pending order triggered but could not be filled: either margin ran
    /// short or the fill price gapped past its protective levels.
    OrderDropped(PendingOrder),
    PortfolioUpdate(PortfolioSnapshot),
    Log(LogMessage),
}

impl SessionEvent {
    /// Short name used in log output.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Quote(_) => "quote",
            SessionEvent::PositionOpened(_) => "position_opened",
            SessionEvent::PositionClosed(_) => "position_closed",
            SessionEvent::PositionModified(_) => "position_modified",
            SessionEvent::OrderPending(_) => "order_pending",
            SessionEvent::OrderCancelled(_) => "order_cancelled",
            SessionEvent::OrderDropped(_) => "order_dropped",
            SessionEvent::PortfolioUpdate(_) => "portfolio_update",
            SessionEvent::Log(_) => "log",
        }
    }
}
