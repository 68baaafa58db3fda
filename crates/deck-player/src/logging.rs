//! Tracing setup: events are formatted into one-line strings and sent to the UI log
//! panel, since stdout belongs to the terminal UI.

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "info,deck_player=info,audio_player=info,deck_core=info";

/// Install the global subscriber and return the receiving end of the log channel.
pub fn init() -> Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(LogLayer::new(tx))
        .try_init()?;
    Ok(rx)
}

/// Forwards formatted events into a channel.
pub struct LogLayer {
    tx: Sender<String>,
}

impl LogLayer {
    pub fn new(tx: Sender<String>) -> Self {
        Self { tx }
    }
}

impl<S> Layer<S> for LogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LogVisitor::default();
        event.record(&mut visitor);
        let meta = event.metadata();
        let line = format_line(meta.level(), meta.target(), visitor);
        // Receiver gone means the UI has exited.
        let _ = self.tx.send(line);
    }
}

fn format_line(level: &tracing::Level, target: &str, visitor: LogVisitor) -> String {
    let mut message = visitor.message.unwrap_or_else(|| "log event".to_string());
    if !visitor.fields.is_empty() {
        message = format!("{message} {}", visitor.fields.join(" "));
    }
    format!("{level:>5} {target}: {message}")
}

#[derive(Default)]
struct LogVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl Visit for LogVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let formatted = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(formatted.trim_matches('"').to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), formatted));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(f: impl FnOnce()) -> Vec<String> {
        let (tx, rx) = unbounded();
        let subscriber = tracing_subscriber::registry().with(LogLayer::new(tx));
        tracing::subscriber::with_default(subscriber, f);
        rx.try_iter().collect()
    }

    #[test]
    fn message_and_fields_are_formatted() {
        let lines = capture(|| tracing::info!(rate_hz = 48_000u32, "stream opened"));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("INFO"), "{}", lines[0]);
        assert!(lines[0].ends_with("stream opened rate_hz=48000"), "{}", lines[0]);
    }

    #[test]
    fn string_fields_are_unquoted() {
        let lines = capture(|| tracing::warn!(path = "a.flac", "open failed"));
        assert!(lines[0].ends_with("open failed path=a.flac"), "{}", lines[0]);
    }

    #[test]
    fn closed_receiver_is_ignored() {
        let (tx, rx) = unbounded();
        drop(rx);
        let subscriber = tracing_subscriber::registry().with(LogLayer::new(tx));
        tracing::subscriber::with_default(subscriber, || tracing::error!("nobody listening"));
    }
}
