//! Trait abstraction for device node I/O to enable testing

use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tokio::io::unix::AsyncFd;

/// Reads whole samples from an open device
#[async_trait]
pub trait SampleReader: Send {
    /// Fill `buf` with exactly one sample
    ///
    /// Waits until the device produces an event. A short read is an error.
    async fn read_sample(&mut self, buf: &mut [u8]) -> io::Result<()>;
}

/// Opens device nodes
#[async_trait]
pub trait DeviceOpener: Send + Sync {
    /// Open `path` read-only
    async fn open(&self, path: &Path) -> io::Result<Box<dyn SampleReader>>;
}

/// Opens device nodes non-blocking and reads them through the tokio reactor
#[derive(Debug, Default, Clone, Copy)]
pub struct FileOpener;

#[async_trait]
impl DeviceOpener for FileOpener {
    async fn open(&self, path: &Path) -> io::Result<Box<dyn SampleReader>> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        Ok(Box::new(FileSampleReader::new(file)?))
    }
}

/// Non-blocking device file registered with the tokio reactor
///
/// No read runs outside the awaiting task, so dropping the reader closes
/// the fd immediately.
#[derive(Debug)]
pub struct FileSampleReader {
    fd: AsyncFd<File>,
}

impl FileSampleReader {
    /// Wrap a file opened with `O_NONBLOCK`
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be polled (e.g. a regular file).
    pub fn new(file: File) -> io::Result<Self> {
        Ok(Self {
            fd: AsyncFd::new(file)?,
        })
    }
}

#[async_trait]
impl SampleReader for FileSampleReader {
    async fn read_sample(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;

        while filled < buf.len() {
            let mut guard = self.fd.readable().await?;
            let result = guard.try_io(|inner| {
                let mut file: &File = inner.get_ref();
                file.read(&mut buf[filled..])
            });

            match result {
                Ok(Ok(0)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "device stream ended",
                    ));
                }
                Ok(Ok(n)) => filled += n,
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => {}
                Ok(Err(e)) => return Err(e),
                // spurious wakeup, readiness already cleared
                Err(_would_block) => {}
            }
        }

        Ok(())
    }
}
