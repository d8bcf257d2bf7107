// In crates/engine/src/lib.rs

pub mod error;
pub mod session;
pub mod task;

pub use error::{Error, Result};
pub use session::{QuoteCallback, Session, SessionConfig, SubscriptionId, TickSummary};
pub use task::{QuoteStream, SessionHandle, SessionTask};

use app_config::Settings;
use events::SessionEvent;
use tokio::sync::broadcast;

/// Builds a session from loaded settings, broadcasting on `events`, and wraps
/// it in a task driven at the configured tick interval.
pub fn session_from_settings(
    settings: &Settings,
    events: broadcast::Sender<SessionEvent>,
) -> (SessionTask, SessionHandle) {
    let session = Session::with_event_sender(
        settings.instrument_catalog(),
        SessionConfig::from_settings(settings),
        events,
    );
    SessionTask::new(session, settings.simulation.tick_interval())
}
