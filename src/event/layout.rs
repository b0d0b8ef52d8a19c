//! # Sample Layout
//!
//! Byte layout of `struct input_event`:
//!
//! ```text
//! struct input_event {
//!     struct timeval time;   // tv_sec, tv_usec: long each
//!     __u16 type;
//!     __u16 code;
//!     __s32 value;
//! };
//! ```
//!
//! `long` follows the pointer width, so the timestamp fields are 8 bytes wide
//! on 64-bit targets and 4 bytes wide otherwise.
//!
//! | Layout | Size | sec | usec | type | code | value |
//! |--------|------|-----|------|------|------|-------|
//! | Wide   | 24   | 0   | 8    | 16   | 18   | 20    |
//! | Narrow | 16   | 0   | 4    | 8    | 10   | 12    |

/// Sample size on 64-bit targets
pub const WIDE_SAMPLE_SIZE: usize = 24;

/// Sample size on 32-bit targets
pub const NARROW_SAMPLE_SIZE: usize = 16;

/// Largest sample size of any layout
pub const MAX_SAMPLE_SIZE: usize = WIDE_SAMPLE_SIZE;

/// Width of the timestamp fields in a raw sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventLayout {
    /// 8-byte `tv_sec` / `tv_usec` (x86_64, aarch64, ...)
    Wide,
    /// 4-byte `tv_sec` / `tv_usec` (i686, armv7, ...)
    Narrow,
}

impl EventLayout {
    /// Layout of the target this crate was compiled for.
    #[cfg(target_pointer_width = "64")]
    pub const NATIVE: EventLayout = EventLayout::Wide;

    /// Layout of the target this crate was compiled for.
    #[cfg(not(target_pointer_width = "64"))]
    pub const NATIVE: EventLayout = EventLayout::Narrow;

    /// Bytes per sample.
    pub const fn sample_size(self) -> usize {
        match self {
            EventLayout::Wide => WIDE_SAMPLE_SIZE,
            EventLayout::Narrow => NARROW_SAMPLE_SIZE,
        }
    }

    /// Bytes per timestamp field.
    pub const fn time_field_size(self) -> usize {
        match self {
            EventLayout::Wide => 8,
            EventLayout::Narrow => 4,
        }
    }

    /// Offset of the `type` field.
    pub const fn type_offset(self) -> usize {
        2 * self.time_field_size()
    }

    /// Offset of the `code` field.
    pub const fn code_offset(self) -> usize {
        self.type_offset() + 2
    }

    /// Offset of the `value` field.
    pub const fn value_offset(self) -> usize {
        self.code_offset() + 2
    }
}

impl Default for EventLayout {
    fn default() -> Self {
        Self::NATIVE
    }
}
