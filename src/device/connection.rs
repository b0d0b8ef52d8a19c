//! # Connection Manager
//!
//! Owns the lifecycle of one device connection:
//!
//! ```text
//! Opening ──open ok──▶ Open ──read error / close()──▶ Closed
//!    │  ▲                                               ▲
//!    │  └── open failed: wait retry_interval ──┐        │
//!    └─────────────────────────────────────────┴─close()┘
//! ```
//!
//! Open failures are retried forever at a fixed interval and are only
//! logged. A read failure is published as an `error` lifecycle event and ends
//! the connection; it is not reopened.
//!
//! ## Usage
//!
//! ```no_run
//! use input_event::device::{ConnectionManager, ConnectionOptions, LifecycleEvent};
//! use input_event::event::EventCategory;
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = ConnectionManager::new("event0", ConnectionOptions::default());
//!     let mut keys = manager.subscribe_category(EventCategory::KeyDown);
//!     let mut lifecycle = manager.subscribe_lifecycle();
//!     let mut device = manager.spawn();
//!
//!     if let Ok(LifecycleEvent::Opened { device }) = lifecycle.recv().await {
//!         println!("opened {}", device);
//!     }
//!     while let Ok(event) = keys.recv().await {
//!         println!("{:?}", event.symbolic_name);
//!     }
//!     device.close().await;
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::publisher::{CategoryReceiver, EventPublisher, LifecycleEvent, DEFAULT_CHANNEL_CAPACITY};
use super::reader::{shutdown_pending, shutdown_requested, DeviceReader};
use super::source::{DeviceOpener, FileOpener, SampleReader};
use super::device_path;
use crate::codes::CodeTables;
use crate::error::InputEventError;
use crate::event::{DecodedEvent, EventCategory, EventDecoder, EventLayout};

/// Delay between open attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(5000);

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Trying to open the device node
    Opening,
    /// Device open, reader running
    Open,
    /// Closed by `close()` or by a read failure
    Closed,
}

/// Connection settings
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Fixed delay between open attempts
    pub retry_interval: Duration,
    /// Capacity of the event and lifecycle broadcast channels
    pub channel_capacity: usize,
    /// Sample layout of the device
    pub layout: EventLayout,
    /// Code tables for name resolution
    pub tables: Arc<CodeTables>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            layout: EventLayout::NATIVE,
            tables: CodeTables::shared(),
        }
    }
}

/// A connection that has not been started yet
///
/// Subscribe here to be guaranteed to see the `opened` event, then call
/// [`ConnectionManager::spawn`].
pub struct ConnectionManager {
    device: String,
    path: PathBuf,
    options: ConnectionOptions,
    opener: Arc<dyn DeviceOpener>,
    publisher: EventPublisher,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("device", &self.device)
            .field("path", &self.path)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Prepare a connection to `/dev/input/<device>`
    ///
    /// # Arguments
    ///
    /// * `device` - Device name (e.g. `event0`) or an absolute node path
    /// * `options` - Retry interval, channel capacity, layout and tables
    pub fn new(device: impl Into<String>, options: ConnectionOptions) -> Self {
        let device = device.into();
        let path = device_path(&device);
        let publisher = EventPublisher::new(options.channel_capacity);

        Self {
            device,
            path,
            options,
            opener: Arc::new(FileOpener),
            publisher,
        }
    }

    /// Replace the device opener
    pub fn with_opener(mut self, opener: Arc<dyn DeviceOpener>) -> Self {
        self.opener = opener;
        self
    }

    /// Device node path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subscribe to all decoded events
    pub fn subscribe(&self) -> broadcast::Receiver<DecodedEvent> {
        self.publisher.subscribe()
    }

    /// Subscribe to decoded events of one category
    pub fn subscribe_category(&self, category: EventCategory) -> CategoryReceiver {
        self.publisher.subscribe_category(category)
    }

    /// Subscribe to `opened` / `error` events
    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.publisher.subscribe_lifecycle()
    }

    /// Start opening the device on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(self) -> InputDevice {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Opening);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = ConnectionTask {
            device: self.device.clone(),
            path: self.path.clone(),
            options: self.options,
            opener: self.opener,
            publisher: self.publisher.clone(),
            state: state_tx,
            shutdown: shutdown_rx,
        };
        let handle = tokio::spawn(task.run());

        InputDevice {
            device: self.device,
            path: self.path,
            publisher: self.publisher,
            state: state_rx,
            shutdown: shutdown_tx,
            task: Some(handle),
        }
    }
}

/// Handle to a running device connection
///
/// Dropping the handle requests shutdown without waiting for it.
#[derive(Debug)]
pub struct InputDevice {
    device: String,
    path: PathBuf,
    publisher: EventPublisher,
    state: watch::Receiver<ConnectionState>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl InputDevice {
    /// Open `/dev/input/<device>` with the given options
    ///
    /// Subscriptions made on the returned handle may miss the `opened` event
    /// if the device opens immediately; use [`ConnectionManager`] to
    /// subscribe first.
    pub fn open(device: impl Into<String>, options: ConnectionOptions) -> Self {
        ConnectionManager::new(device, options).spawn()
    }

    /// Device identifier (e.g. `event0`)
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Device node path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Subscribe to all decoded events
    pub fn subscribe(&self) -> broadcast::Receiver<DecodedEvent> {
        self.publisher.subscribe()
    }

    /// Subscribe to decoded events of one category
    pub fn subscribe_category(&self, category: EventCategory) -> CategoryReceiver {
        self.publisher.subscribe_category(category)
    }

    /// Subscribe to `opened` / `error` events
    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.publisher.subscribe_lifecycle()
    }

    /// Close the connection
    ///
    /// Cancels a pending open retry or an in-flight read, releases the
    /// device and waits for the connection task to finish.
    pub async fn close(&mut self) {
        self.shutdown.send_replace(true);

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Connection task for {} failed: {}", self.device, e);
            }
        }
    }
}

impl Drop for InputDevice {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

struct ConnectionTask {
    device: String,
    path: PathBuf,
    options: ConnectionOptions,
    opener: Arc<dyn DeviceOpener>,
    publisher: EventPublisher,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Receiver<bool>,
}

impl ConnectionTask {
    async fn run(mut self) {
        let Some(source) = self.open_with_retry().await else {
            debug!("Closed {} before it opened", self.path.display());
            self.state.send_replace(ConnectionState::Closed);
            return;
        };

        self.state.send_replace(ConnectionState::Open);
        info!("Opened input device at {}", self.path.display());

        let decoder = EventDecoder::new(self.options.layout, self.options.tables.clone());
        let mut reader = DeviceReader::new(source, decoder, self.device.clone(), self.path.clone());
        self.publisher.publish_opened(&self.device);

        let exit = reader.run(&self.publisher, &mut self.shutdown).await;
        info!(
            "Closed input device at {} ({:?}, {} samples read)",
            self.path.display(),
            exit,
            reader.samples_read()
        );

        drop(reader);
        self.state.send_replace(ConnectionState::Closed);
    }

    /// Open the device, retrying every `retry_interval` until it succeeds
    ///
    /// Returns `None` if shutdown is requested first.
    async fn open_with_retry(&mut self) -> Option<Box<dyn SampleReader>> {
        let interval = self.options.retry_interval;
        let mut attempt: u64 = 0;

        loop {
            if shutdown_pending(&self.shutdown) {
                return None;
            }

            attempt += 1;
            match self.opener.open(&self.path).await {
                Ok(source) => return Some(source),
                Err(source) => {
                    let error = InputEventError::Open {
                        path: self.path.clone(),
                        source,
                    };
                    debug!("{} (attempt {}), retrying in {:?}", error, attempt, interval);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown_requested(&mut self.shutdown) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::source::mocks::{MockOpener, MockSampleReader};
    use crate::event::decoder::encode_sample;
    use crate::event::protocol::{EV_KEY, EV_REL, EV_SYN};
    use std::io;
    use tokio::time::Instant;

    fn sample(event_type: u16, code: u16, value: i32) -> Vec<u8> {
        encode_sample(EventLayout::Wide, 1, 0, event_type, code, value)
    }

    fn options() -> ConnectionOptions {
        ConnectionOptions {
            layout: EventLayout::Wide,
            ..ConnectionOptions::default()
        }
    }

    fn manager(opener: &MockOpener) -> ConnectionManager {
        ConnectionManager::new("event0", options()).with_opener(Arc::new(opener.clone()))
    }

    #[test]
    fn test_default_options() {
        let options = ConnectionOptions::default();
        assert_eq!(options.retry_interval, Duration::from_millis(5000));
        assert_eq!(options.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(options.layout, EventLayout::NATIVE);
    }

    #[test]
    fn test_manager_resolves_device_path() {
        let manager = ConnectionManager::new("event4", ConnectionOptions::default());
        assert_eq!(manager.path(), Path::new("/dev/input/event4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_retries_every_interval_until_success() {
        let opener = MockOpener::new(3, MockSampleReader::new());
        let manager = manager(&opener);
        let mut lifecycle = manager.subscribe_lifecycle();

        let start = Instant::now();
        let mut device = manager.spawn();
        assert_eq!(device.state(), ConnectionState::Opening);

        match lifecycle.recv().await.unwrap() {
            LifecycleEvent::Opened { device } => assert_eq!(device, "event0"),
            other => panic!("Expected opened, got: {:?}", other),
        }

        // opened only after the fourth (first successful) attempt
        let attempts = opener.attempts();
        assert_eq!(attempts.len(), 4);
        assert_eq!(attempts[0], start);
        for pair in attempts.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_millis(5000));
        }
        assert_eq!(device.state(), ConnectionState::Open);

        device.close().await;
        assert_eq!(device.state(), ConnectionState::Closed);
        assert_eq!(opener.attempts().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failures_are_not_published() {
        let opener = MockOpener::always_failing();
        let manager = manager(&opener);
        let mut lifecycle = manager.subscribe_lifecycle();
        let mut device = manager.spawn();

        tokio::time::sleep(Duration::from_millis(12_500)).await;
        assert_eq!(opener.attempts().len(), 3);
        assert_eq!(device.state(), ConnectionState::Opening);
        assert!(matches!(
            lifecycle.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        device.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_retry_timer() {
        let opener = MockOpener::always_failing();
        let mut device = manager(&opener).spawn();

        // let the first attempt run
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(opener.attempts().len(), 1);

        device.close().await;
        assert_eq!(device.state(), ConnectionState::Closed);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(opener.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_events_carry_source_device() {
        let reader = MockSampleReader::new();
        reader.push_sample(sample(EV_KEY, 30, 0));
        reader.push_sample(sample(EV_SYN, 0, 0));
        let opener = MockOpener::new(0, reader);

        let manager = manager(&opener);
        let mut events = manager.subscribe();
        let mut device = manager.spawn();

        let key = events.recv().await.unwrap();
        assert_eq!(key.category, EventCategory::KeyUp);
        assert_eq!(key.symbolic_name, Some("KEY_A"));
        assert_eq!(key.source_device.as_deref(), Some("event0"));

        let syn = events.recv().await.unwrap();
        assert_eq!(syn.category, EventCategory::Syn);

        device.close().await;
    }

    #[tokio::test]
    async fn test_category_subscription_on_handle() {
        let reader = MockSampleReader::new();
        reader.push_sample(sample(EV_KEY, 0x110, 1));
        reader.push_sample(sample(EV_REL, 0x01, 3));
        reader.push_sample(sample(EV_KEY, 0x110, 0));
        let opener = MockOpener::new(0, reader);

        let manager = manager(&opener);
        let mut rel = manager.subscribe_category(EventCategory::Rel);
        let mut device = manager.spawn();

        let event = rel.recv().await.unwrap();
        assert_eq!(event.symbolic_name, Some("REL_Y"));
        assert_eq!(event.raw_value, 3);

        device.close().await;
    }

    #[tokio::test]
    async fn test_read_failure_closes_without_reopen() {
        let reader = MockSampleReader::new();
        reader.push_sample(sample(EV_SYN, 0, 0));
        reader.push_error(io::ErrorKind::Other);
        let opener = MockOpener::new(0, reader.clone());

        let manager = manager(&opener);
        let mut lifecycle = manager.subscribe_lifecycle();
        let mut device = manager.spawn();

        let opened = lifecycle.recv().await.unwrap();
        assert_eq!(opened.name(), "opened");

        match lifecycle.recv().await.unwrap() {
            LifecycleEvent::Error { device, error } => {
                assert_eq!(device, "event0");
                assert!(matches!(*error, InputEventError::Read { .. }));
            }
            other => panic!("Expected read error, got: {:?}", other),
        }

        let mut state = device.watch_state();
        state
            .wait_for(|s| *s == ConnectionState::Closed)
            .await
            .unwrap();

        assert_eq!(opener.attempts().len(), 1);
        assert_eq!(reader.reads(), 2);
        device.close().await;
    }

    #[tokio::test]
    async fn test_close_releases_idle_device_fd() {
        use crate::device::source::fifo;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event0");
        fifo::create(&path).unwrap();
        let mut writer = fifo::open_writer(&path).unwrap();

        let manager = ConnectionManager::new(path.to_string_lossy(), options());
        let mut events = manager.subscribe();
        let mut lifecycle = manager.subscribe_lifecycle();
        let mut device = manager.spawn();

        assert_eq!(lifecycle.recv().await.unwrap().name(), "opened");
        writer.write_all(&sample(EV_KEY, 30, 1)).unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.symbolic_name, Some("KEY_A"));
        assert_eq!(fifo::open_fds(&path), 2);

        // reader is now parked on an idle device
        device.close().await;
        assert_eq!(device.state(), ConnectionState::Closed);
        assert_eq!(fifo::open_fds(&path), 1);
    }

    #[test]
    fn test_runtime_shuts_down_after_close_on_idle_device() {
        use crate::device::source::fifo;
        use std::sync::mpsc;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event0");
        fifo::create(&path).unwrap();
        let _writer = fifo::open_writer(&path).unwrap();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let manager = ConnectionManager::new(path.to_string_lossy(), options());
            let mut lifecycle = manager.subscribe_lifecycle();
            let mut device = manager.spawn();
            assert_eq!(lifecycle.recv().await.unwrap().name(), "opened");
            device.close().await;
        });

        let (done_tx, done_rx) = mpsc::channel();
        std::thread::spawn(move || {
            drop(runtime);
            let _ = done_tx.send(());
        });
        assert!(
            done_rx.recv_timeout(Duration::from_secs(5)).is_ok(),
            "runtime drop blocked on a pending device read"
        );
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_connection() {
        let opener = MockOpener::new(0, MockSampleReader::new());
        let manager = manager(&opener);
        let mut lifecycle = manager.subscribe_lifecycle();
        let device = manager.spawn();
        let mut state = device.watch_state();

        assert_eq!(lifecycle.recv().await.unwrap().name(), "opened");
        drop(device);

        // the task drops the state sender once it has exited
        while state.changed().await.is_ok() {}
        assert_eq!(*state.borrow(), ConnectionState::Closed);
    }
}
