//! # Input Event Protocol Constants and Types
//!
//! Core definitions for the kernel's `struct input_event` stream.

use serde::Serialize;
use std::fmt;

/// Synchronization marker between batches of events
pub const EV_SYN: u16 = 0x00;

/// Key and button state changes
pub const EV_KEY: u16 = 0x01;

/// Relative axis motion
pub const EV_REL: u16 = 0x02;

/// Absolute axis position
pub const EV_ABS: u16 = 0x03;

/// `EV_KEY` value for a released key
pub const KEY_VALUE_RELEASE: i32 = 0;

/// `EV_KEY` value for a pressed key
pub const KEY_VALUE_PRESS: i32 = 1;

/// `EV_KEY` value for an autorepeated key
pub const KEY_VALUE_REPEAT: i32 = 2;

/// Symbolic classification of a decoded sample.
///
/// Serializes (and displays) as the lowercase event name subscribers key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    /// Key or button released
    KeyUp,
    /// Key or button pressed
    KeyDown,
    /// Key held down (autorepeat)
    KeyPress,
    /// Relative axis motion
    Rel,
    /// Absolute axis position
    Abs,
    /// Synchronization marker
    Syn,
}

impl EventCategory {
    /// Map an `EV_KEY` value to its category.
    ///
    /// Returns `None` for anything other than release, press or repeat.
    pub fn from_key_value(value: i32) -> Option<Self> {
        match value {
            KEY_VALUE_RELEASE => Some(EventCategory::KeyUp),
            KEY_VALUE_PRESS => Some(EventCategory::KeyDown),
            KEY_VALUE_REPEAT => Some(EventCategory::KeyPress),
            _ => None,
        }
    }

    /// Event name, e.g. `"keydown"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::KeyUp => "keyup",
            EventCategory::KeyDown => "keydown",
            EventCategory::KeyPress => "keypress",
            EventCategory::Rel => "rel",
            EventCategory::Abs => "abs",
            EventCategory::Syn => "syn",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded `struct input_event`.
///
/// `symbolic_name` is the key name for `EV_KEY`, the axis name looked up by
/// code for `EV_REL`, and the axis name looked up by *value* for `EV_ABS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedEvent {
    /// Kernel timestamp, seconds part
    pub timestamp_seconds: u64,
    /// Kernel timestamp, microseconds part
    pub timestamp_microseconds: u64,
    /// `EV_*` type
    pub raw_type: u16,
    /// Type-specific code (scancode, axis id)
    pub raw_code: u16,
    /// Type-specific value (key state, axis delta or position)
    pub raw_value: i32,
    /// Derived classification
    pub category: EventCategory,
    /// Resolved key or axis name
    pub symbolic_name: Option<&'static str>,
    /// Device the sample was read from, attached by the reader
    pub source_device: Option<String>,
}
