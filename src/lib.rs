//! # input-event Library
//!
//! Read Linux input devices (keyboard, mouse, joystick) and republish their
//! raw `struct input_event` samples as named events.
//!
//! This library provides the decoding and device-lifecycle engine: the
//! key/axis code tables, the sample decoder for the 64-bit and 32-bit
//! layouts, and a connection manager that opens `/dev/input/<device>`,
//! retries until it exists, and publishes events to subscribers.

#[cfg(not(target_os = "linux"))]
compile_error!("input-event reads Linux evdev device nodes and only builds on Linux");

pub mod codes;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod output;
