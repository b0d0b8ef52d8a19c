//! # Input Event Module
//!
//! Decoding of the Linux `struct input_event` stream.
//!
//! This module handles:
//! - Sample layout selection (64-bit vs 32-bit timestamp fields)
//! - Fixed-offset little-endian field extraction
//! - Classification into key, relative, absolute and sync events
//! - Key and axis name resolution through the code tables

pub mod decoder;
pub mod layout;
pub mod protocol;

pub use decoder::{decode, EventDecoder};
pub use layout::EventLayout;
pub use protocol::{DecodedEvent, EventCategory};
