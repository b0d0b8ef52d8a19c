//! # Device Reader
//!
//! Sequential read → decode → publish loop over one open device.
//!
//! Exactly one read is in flight at a time. The sample buffer is owned by
//! the reader and reused for every read; decoded events are copied out before
//! the next read is issued.

use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use super::publisher::EventPublisher;
use super::source::SampleReader;
use crate::error::InputEventError;
use crate::event::layout::MAX_SAMPLE_SIZE;
use crate::event::EventDecoder;

/// Reader state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// No read in flight
    Idle,
    /// One read in flight
    Reading,
    /// Stopped; no further reads
    Closed,
}

/// Why [`DeviceReader::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// Shutdown was requested
    Shutdown,
    /// A read failed; an `error` lifecycle event was published
    ReadFailed,
}

/// Reads samples from one device and publishes decoded events
pub struct DeviceReader {
    source: Box<dyn SampleReader>,
    decoder: EventDecoder,
    buf: [u8; MAX_SAMPLE_SIZE],
    device: String,
    path: PathBuf,
    state: ReaderState,
    samples_read: u64,
}

impl std::fmt::Debug for DeviceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceReader")
            .field("device", &self.device)
            .field("state", &self.state)
            .field("samples_read", &self.samples_read)
            .finish_non_exhaustive()
    }
}

impl DeviceReader {
    /// Create a reader over an open source
    ///
    /// # Arguments
    ///
    /// * `source` - Open device
    /// * `decoder` - Decoder for the device's sample layout
    /// * `device` - Identifier attached to every event (e.g. `event0`)
    /// * `path` - Device node path, used in error reports
    pub fn new(
        source: Box<dyn SampleReader>,
        decoder: EventDecoder,
        device: String,
        path: PathBuf,
    ) -> Self {
        Self {
            source,
            decoder,
            buf: [0; MAX_SAMPLE_SIZE],
            device,
            path,
            state: ReaderState::Idle,
            samples_read: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Number of complete samples read so far
    pub fn samples_read(&self) -> u64 {
        self.samples_read
    }

    /// Read until a read fails or `shutdown` turns `true`
    ///
    /// A dropped shutdown sender counts as a shutdown request. An in-flight
    /// read is abandoned on shutdown and its sample is never published.
    pub async fn run(
        &mut self,
        publisher: &EventPublisher,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ReaderExit {
        let size = self.decoder.layout().sample_size();

        loop {
            if shutdown_pending(shutdown) {
                self.state = ReaderState::Closed;
                return ReaderExit::Shutdown;
            }

            self.state = ReaderState::Reading;
            let result = tokio::select! {
                biased;
                _ = shutdown_requested(shutdown) => None,
                result = self.source.read_sample(&mut self.buf[..size]) => Some(result),
            };

            match result {
                None => {
                    self.state = ReaderState::Closed;
                    return ReaderExit::Shutdown;
                }
                Some(Err(source)) => {
                    self.state = ReaderState::Closed;
                    let error = InputEventError::Read {
                        path: self.path.clone(),
                        source,
                    };
                    warn!("{}", error);
                    publisher.publish_error(&self.device, error);
                    return ReaderExit::ReadFailed;
                }
                Some(Ok(())) => {
                    self.state = ReaderState::Idle;
                    self.samples_read += 1;
                    self.dispatch(size, publisher);
                }
            }
        }
    }

    fn dispatch(&self, size: usize, publisher: &EventPublisher) {
        match self.decoder.decode(&self.buf[..size]) {
            Ok(Some(mut event)) => {
                event.source_device = Some(self.device.clone());
                trace!(
                    "{} {} code={} value={}",
                    self.device,
                    event.category,
                    event.raw_code,
                    event.raw_value
                );
                publisher.publish_event(event);
            }
            Ok(None) => {
                trace!("Dropped unreportable sample from {}", self.device);
            }
            Err(error) => {
                debug!("Failed to decode sample from {}: {}", self.device, error);
                publisher.publish_error(&self.device, error);
            }
        }
    }
}

/// Returns `true` if shutdown has been requested or the sender is gone
pub(crate) fn shutdown_pending(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Resolves once shutdown is requested or the sender is dropped
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::CodeTables;
    use crate::device::publisher::LifecycleEvent;
    use crate::device::source::mocks::MockSampleReader;
    use crate::event::decoder::encode_sample;
    use crate::event::protocol::{EV_ABS, EV_KEY, EV_REL, EV_SYN};
    use crate::event::{EventCategory, EventLayout};
    use std::io;

    fn sample(event_type: u16, code: u16, value: i32) -> Vec<u8> {
        encode_sample(EventLayout::Wide, 42, 7, event_type, code, value)
    }

    fn reader(mock: &MockSampleReader) -> DeviceReader {
        DeviceReader::new(
            Box::new(mock.clone()),
            EventDecoder::new(EventLayout::Wide, CodeTables::shared()),
            "event0".to_string(),
            PathBuf::from("/dev/input/event0"),
        )
    }

    #[tokio::test]
    async fn test_reader_publishes_until_read_failure() {
        let mock = MockSampleReader::new();
        mock.push_sample(sample(EV_KEY, 30, 1));
        mock.push_sample(sample(0x04, 4, 30)); // EV_MSC, dropped
        mock.push_sample(sample(EV_SYN, 0, 0));
        mock.push_error(io::ErrorKind::Other);

        let publisher = EventPublisher::default();
        let mut events = publisher.subscribe();
        let mut lifecycle = publisher.subscribe_lifecycle();
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let mut reader = reader(&mock);
        let exit = reader.run(&publisher, &mut shutdown_rx).await;

        assert_eq!(exit, ReaderExit::ReadFailed);
        assert_eq!(reader.state(), ReaderState::Closed);
        assert_eq!(reader.samples_read(), 3);
        // no read after the failure
        assert_eq!(mock.reads(), 4);

        let key = events.recv().await.unwrap();
        assert_eq!(key.category, EventCategory::KeyDown);
        assert_eq!(key.symbolic_name, Some("KEY_A"));
        assert_eq!(key.source_device.as_deref(), Some("event0"));
        assert_eq!(key.timestamp_seconds, 42);

        let syn = events.recv().await.unwrap();
        assert_eq!(syn.category, EventCategory::Syn);
        assert!(events.try_recv().is_err());

        match lifecycle.recv().await.unwrap() {
            LifecycleEvent::Error { device, error } => {
                assert_eq!(device, "event0");
                assert!(matches!(*error, InputEventError::Read { .. }));
                assert!(error.to_string().contains("/dev/input/event0"));
            }
            other => panic!("Expected read error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reader_continues_after_decode_error() {
        let mock = MockSampleReader::new();
        mock.push_sample(sample(EV_KEY, 30, 5));
        mock.push_sample(sample(EV_REL, 0x00, -2));
        mock.push_error(io::ErrorKind::UnexpectedEof);

        let publisher = EventPublisher::default();
        let mut events = publisher.subscribe();
        let mut lifecycle = publisher.subscribe_lifecycle();
        let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let exit = reader(&mock).run(&publisher, &mut shutdown_rx).await;
        assert_eq!(exit, ReaderExit::ReadFailed);

        match lifecycle.recv().await.unwrap() {
            LifecycleEvent::Error { error, .. } => {
                assert!(matches!(*error, InputEventError::InvalidKeyValue { value: 5 }));
            }
            other => panic!("Expected decode error, got: {:?}", other),
        }

        let rel = events.recv().await.unwrap();
        assert_eq!(rel.symbolic_name, Some("REL_X"));
        assert_eq!(rel.raw_value, -2);

        match lifecycle.recv().await.unwrap() {
            LifecycleEvent::Error { error, .. } => {
                assert!(matches!(*error, InputEventError::Read { .. }));
            }
            other => panic!("Expected read error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reader_single_read_in_flight() {
        let mock = MockSampleReader::new();
        for i in 0..50 {
            mock.push_sample(sample(EV_ABS, 0, i % 10));
        }

        let publisher = EventPublisher::new(64);
        let mut events = publisher.subscribe();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let mut reader = reader(&mock);
        let task_publisher = publisher.clone();
        let task = tokio::spawn(async move {
            let exit = reader.run(&task_publisher, &mut shutdown_rx).await;
            (exit, reader.state())
        });

        for _ in 0..50 {
            let event = events.recv().await.unwrap();
            assert_eq!(event.category, EventCategory::Abs);
        }

        // the 51st read is pending
        shutdown_tx.send(true).unwrap();
        let (exit, state) = task.await.unwrap();

        assert_eq!(exit, ReaderExit::Shutdown);
        assert_eq!(state, ReaderState::Closed);
        assert_eq!(mock.reads(), 51);
        assert_eq!(mock.max_in_flight(), 1);
        assert_eq!(mock.in_flight.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reader_does_not_read_after_shutdown() {
        let mock = MockSampleReader::new();
        mock.push_sample(sample(EV_SYN, 0, 0));

        let publisher = EventPublisher::default();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();

        let mut reader = reader(&mock);
        let exit = reader.run(&publisher, &mut shutdown_rx).await;

        assert_eq!(exit, ReaderExit::Shutdown);
        assert_eq!(mock.reads(), 0);
    }

    #[tokio::test]
    async fn test_dropped_shutdown_sender_stops_reader() {
        let mock = MockSampleReader::new();
        let publisher = EventPublisher::default();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);

        let exit = reader(&mock).run(&publisher, &mut shutdown_rx).await;
        assert_eq!(exit, ReaderExit::Shutdown);
    }
}
