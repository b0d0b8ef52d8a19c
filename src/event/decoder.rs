//! # Input Event Decoder
//!
//! Decodes raw `struct input_event` samples into [`DecodedEvent`]s.

use bytes::Buf;
use std::sync::Arc;

use super::layout::EventLayout;
use super::protocol::*;
use crate::codes::CodeTables;
use crate::error::{InputEventError, Result};

/// Decoder for one sample layout.
///
/// The layout is fixed at construction; [`EventDecoder::native`] picks the
/// layout of the compilation target.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    layout: EventLayout,
    tables: Arc<CodeTables>,
}

impl EventDecoder {
    /// Create a decoder for an explicit layout
    pub fn new(layout: EventLayout, tables: Arc<CodeTables>) -> Self {
        Self { layout, tables }
    }

    /// Create a decoder for the native layout
    pub fn native(tables: Arc<CodeTables>) -> Self {
        Self::new(EventLayout::NATIVE, tables)
    }

    /// Layout this decoder reads
    pub fn layout(&self) -> EventLayout {
        self.layout
    }

    /// Code tables used for name resolution
    pub fn tables(&self) -> &Arc<CodeTables> {
        &self.tables
    }

    /// Decode one sample
    ///
    /// See [`decode`].
    pub fn decode(&self, sample: &[u8]) -> Result<Option<DecodedEvent>> {
        decode(self.layout, &self.tables, sample)
    }
}

/// Decode one raw sample
///
/// # Arguments
///
/// * `layout` - Sample layout the bytes were produced with
/// * `tables` - Code tables for key and axis names
/// * `sample` - Exactly one sample (`layout.sample_size()` bytes)
///
/// # Returns
///
/// * `Ok(Some(event))` - A `SYN`, `KEY`, `REL` or `ABS` sample
/// * `Ok(None)` - Any other event type; not reportable
///
/// # Errors
///
/// Returns error if:
/// - The buffer is not exactly one sample long
/// - An `EV_KEY` sample carries a value other than 0, 1 or 2
pub fn decode(
    layout: EventLayout,
    tables: &CodeTables,
    sample: &[u8],
) -> Result<Option<DecodedEvent>> {
    if sample.len() != layout.sample_size() {
        return Err(InputEventError::SampleSize {
            expected: layout.sample_size(),
            actual: sample.len(),
        });
    }

    let mut buf = sample;
    let (timestamp_seconds, timestamp_microseconds) = match layout {
        EventLayout::Wide => (buf.get_u64_le(), buf.get_u64_le()),
        EventLayout::Narrow => (u64::from(buf.get_u32_le()), u64::from(buf.get_u32_le())),
    };
    let raw_type = buf.get_u16_le();
    let raw_code = buf.get_u16_le();
    let raw_value = buf.get_i32_le();

    let (category, symbolic_name) = match raw_type {
        EV_KEY => {
            let category = EventCategory::from_key_value(raw_value)
                .ok_or(InputEventError::InvalidKeyValue { value: raw_value })?;
            (category, Some(tables.keys.code_to_name(raw_code)))
        }
        EV_REL => (EventCategory::Rel, Some(tables.rel_axes.code_to_name(raw_code))),
        // The axis name is looked up by value, not by code
        EV_ABS => (EventCategory::Abs, Some(abs_axis_name(tables, raw_value))),
        EV_SYN => (EventCategory::Syn, None),
        _ => return Ok(None),
    };

    Ok(Some(DecodedEvent {
        timestamp_seconds,
        timestamp_microseconds,
        raw_type,
        raw_code,
        raw_value,
        category,
        symbolic_name,
        source_device: None,
    }))
}

fn abs_axis_name(tables: &CodeTables, value: i32) -> &'static str {
    match u16::try_from(value) {
        Ok(key) => tables.rel_axes.code_to_name(key),
        Err(_) => crate::codes::UNKNOWN_NAME,
    }
}

/// Encode a sample in the given layout
#[cfg(test)]
pub(crate) fn encode_sample(
    layout: EventLayout,
    seconds: u64,
    microseconds: u64,
    event_type: u16,
    code: u16,
    value: i32,
) -> Vec<u8> {
    use bytes::BufMut;

    let mut buf = Vec::with_capacity(layout.sample_size());
    match layout {
        EventLayout::Wide => {
            buf.put_u64_le(seconds);
            buf.put_u64_le(microseconds);
        }
        EventLayout::Narrow => {
            buf.put_u32_le(seconds as u32);
            buf.put_u32_le(microseconds as u32);
        }
    }
    buf.put_u16_le(event_type);
    buf.put_u16_le(code);
    buf.put_i32_le(value);
    buf
}
