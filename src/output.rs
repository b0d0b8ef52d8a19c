//! # Event Output
//!
//! Renders decoded and lifecycle events as JSON lines or human-readable text.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::config::OutputFormat;
use crate::device::LifecycleEvent;
use crate::event::DecodedEvent;

/// Render a decoded event as one line (without trailing newline)
///
/// # Examples
///
/// ```
/// use input_event::config::OutputFormat;
/// use input_event::event::{DecodedEvent, EventCategory};
/// use input_event::output::format_event;
///
/// let event = DecodedEvent {
///     timestamp_seconds: 0,
///     timestamp_microseconds: 0,
///     raw_type: 1,
///     raw_code: 30,
///     raw_value: 1,
///     category: EventCategory::KeyDown,
///     symbolic_name: Some("KEY_A"),
///     source_device: None,
/// };
///
/// let line = format_event(&event, OutputFormat::Text);
/// assert!(line.ends_with("- keydown KEY_A code=30 value=1"));
/// ```
pub fn format_event(event: &DecodedEvent, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string(event).unwrap_or_else(|e| {
            json!({ "error": format!("failed to serialize event: {}", e) }).to_string()
        }),
        OutputFormat::Text => {
            let mut line = format!(
                "[{}] {} {}",
                format_timestamp(event.timestamp_seconds, event.timestamp_microseconds),
                event.source_device.as_deref().unwrap_or("-"),
                event.category
            );
            if let Some(name) = event.symbolic_name {
                line.push(' ');
                line.push_str(name);
            }
            line.push_str(&format!(" code={} value={}", event.raw_code, event.raw_value));
            line
        }
    }
}

/// Render a lifecycle event as one line
pub fn format_lifecycle(event: &LifecycleEvent, format: OutputFormat) -> String {
    match (format, event) {
        (OutputFormat::Json, LifecycleEvent::Opened { device }) => {
            json!({ "event": "opened", "device": device }).to_string()
        }
        (OutputFormat::Json, LifecycleEvent::Error { device, error }) => {
            json!({ "event": "error", "device": device, "error": error.to_string() }).to_string()
        }
        (OutputFormat::Text, LifecycleEvent::Opened { device }) => format!("{} opened", device),
        (OutputFormat::Text, LifecycleEvent::Error { device, error }) => {
            format!("{} error: {}", device, error)
        }
    }
}

/// Kernel timestamp as UTC time with microsecond precision
fn format_timestamp(seconds: u64, microseconds: u64) -> String {
    let nanos = u32::try_from(microseconds.saturating_mul(1000)).unwrap_or(0);
    i64::try_from(seconds)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, nanos))
        .map(|time| time.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
        .unwrap_or_else(|| format!("{}.{:06}", seconds, microseconds))
}
