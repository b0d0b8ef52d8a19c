//! # Device Module
//!
//! Linux input device connection handling.
//!
//! This module handles:
//! - Resolving device names to `/dev/input` nodes
//! - Opening the node, retrying while it does not exist yet
//! - Continuous sample reading with one read in flight
//! - Publishing decoded events and lifecycle events to subscribers
//! - Enumerating available event devices

pub mod connection;
pub mod publisher;
pub mod reader;
pub mod source;

pub use connection::{
    ConnectionManager, ConnectionOptions, ConnectionState, InputDevice, DEFAULT_RETRY_INTERVAL,
};
pub use publisher::{CategoryReceiver, EventPublisher, LifecycleEvent};

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{InputEventError, Result};

/// Directory holding the input device nodes
pub const INPUT_DIR: &str = "/dev/input";

/// Resolve a device name to its node path
///
/// `event0` becomes `/dev/input/event0`; absolute paths are kept as is.
///
/// # Examples
///
/// ```
/// use input_event::device::device_path;
/// use std::path::Path;
///
/// assert_eq!(device_path("event0"), Path::new("/dev/input/event0"));
/// assert_eq!(device_path("/dev/input/by-id/kbd"), Path::new("/dev/input/by-id/kbd"));
/// ```
pub fn device_path(device: &str) -> PathBuf {
    let path = Path::new(device);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        Path::new(INPUT_DIR).join(device)
    }
}

/// An event device found on the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Node path, e.g. `/dev/input/event3`
    pub path: PathBuf,
    /// Kernel device name, e.g. `AT Translated Set 2 keyboard`
    pub name: Option<String>,
    /// USB/Bluetooth vendor ID
    pub vendor: u16,
    /// USB/Bluetooth product ID
    pub product: u16,
}

impl DeviceInfo {
    /// Device identifier accepted by [`ConnectionManager::new`] (`event3`)
    pub fn device(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}

/// List the `/dev/input/event*` devices the current user can open
///
/// Devices that cannot be opened (usually permission denied) are skipped.
///
/// # Errors
///
/// Returns `Io` if `/dev/input` does not exist.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let input_dir = Path::new(INPUT_DIR);
    if !input_dir.exists() {
        return Err(InputEventError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} directory not found", INPUT_DIR),
        )));
    }

    let mut devices: Vec<DeviceInfo> = evdev::enumerate()
        .map(|(path, device)| {
            let id = device.input_id();
            debug!(
                "Found input device: {} (vendor: 0x{:04x}, product: 0x{:04x})",
                path.display(),
                id.vendor(),
                id.product()
            );

            DeviceInfo {
                path,
                name: device.name().map(str::to_string),
                vendor: id.vendor(),
                product: id.product(),
            }
        })
        .collect();

    // Sort entries for deterministic output
    devices.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(devices)
}
