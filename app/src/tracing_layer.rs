// In app/src/tracing_layer.rs

use chrono::Utc;
use events::{LogMessage, SessionEvent};
use tokio::sync::broadcast;
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;

/// Forwards log events onto the session's broadcast channel so presentation
/// listeners see them next to quotes and fills.
pub struct EventLogLayer {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventLogLayer {
    pub fn new(tx: broadcast::Sender<SessionEvent>) -> Self {
        Self { tx }
    }
}

impl<S> Layer<S> for EventLogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        // Nobody is listening; skip formatting.
        if self.tx.receiver_count() == 0 {
            return;
        }
        // Create a visitor to extract the message from the event's fields.
        let mut visitor = LogMessageVisitor::default();
        event.record(&mut visitor);
        let log_message = LogMessage {
            timestamp: Utc::now(),
            level: event.metadata().level().to_string(),
            message: visitor.finish(),
        };
        let _ = self.tx.send(SessionEvent::Log(log_message));
    }
}

// Captures the `message` field plus any structured fields as `key=value`.
#[derive(Default)]
struct LogMessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl LogMessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl tracing::field::Visit for LogMessageVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::prelude::*;

    #[test]
    fn test_forwards_message_and_fields() {
        let (tx, mut rx) = broadcast::channel(8);
        let subscriber = tracing_subscriber::registry().with(EventLogLayer::new(tx));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(symbol = "EURUSD", "Tick sweep failed.");
        });

        match rx.try_recv() {
            Ok(SessionEvent::Log(log)) => {
                assert_eq!(log.level, "WARN");
                assert_eq!(log.message, "Tick sweep failed. symbol=EURUSD");
            }
            other => panic!("expected a log event, got {:?}", other),
        }
    }
}
