#![forbid(unsafe_code)]

//! Dedicated input thread.
//!
//! The reader owns a [`ByteSource`] and an [`InputDecoder`]. It polls the
//! source, decodes whatever arrives and pushes the messages onto the
//! program's inbound queue. It never waits on application logic, and it
//! never touches negotiation state: settling reports is the update loop's
//! job.
//!
//! # Lifecycle
//!
//! The thread exits when:
//! - [`InputReader::stop`] or [`InputReader::stop_within`] is called
//!   (checked between polls),
//! - the source reports EOF or a fatal error (a `Closed` event is sent),
//! - the inbound queue is gone.
//!
//! A source that blocks inside `read` never sees the stop flag, so
//! [`InputReader::stop_within`] waits a bounded time and then detaches.
//!
//! An idle poll flushes a held lone ESC, so a bare Escape key press is
//! delivered once input pauses.

#[cfg(unix)]
use std::fs::File;
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use modkeys_core::decoder::InputDecoder;
use modkeys_core::event::InputMsg;

/// A readable terminal byte stream.
pub trait ByteSource: Send {
    /// Wait up to `timeout` for input. `Ok(false)` means nothing arrived.
    fn poll(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Read available bytes. `Ok(0)` means end of input.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        (**self).poll(timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

/// A [`ByteSource`] over any blocking reader (pipes, in-memory buffers).
///
/// Polling always reports input as ready, so idle flushes only happen at
/// EOF and a stop request is only noticed between reads.
#[derive(Debug)]
pub struct ReaderSource<R> {
    inner: R,
}

impl<R: Read + Send> ReaderSource<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Send> ByteSource for ReaderSource<R> {
    fn poll(&mut self, _timeout: Duration) -> io::Result<bool> {
        Ok(true)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// The controlling terminal, `/dev/tty`, polled with `poll(2)`.
///
/// Putting the terminal into raw mode is the caller's responsibility.
#[cfg(unix)]
#[derive(Debug)]
pub struct TtySource {
    tty: File,
}

#[cfg(unix)]
impl TtySource {
    /// Open `/dev/tty` for reading.
    ///
    /// # Errors
    ///
    /// Fails when the process has no controlling terminal.
    pub fn open() -> io::Result<Self> {
        Ok(Self {
            tty: File::open("/dev/tty")?,
        })
    }

    /// Use an already-open terminal file.
    pub fn from_file(tty: File) -> Self {
        Self { tty }
    }
}

#[cfg(unix)]
impl ByteSource for TtySource {
    fn poll(&mut self, timeout: Duration) -> io::Result<bool> {
        use nix::errno::Errno;
        use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
        use std::os::fd::AsFd;

        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let mut fds = [PollFd::new(
            self.tty.as_fd(),
            PollFlags::POLLIN | PollFlags::POLLHUP,
        )];
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(0) => Ok(false),
            Ok(_) => Ok(fds[0]
                .revents()
                .is_some_and(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP))),
            Err(Errno::EINTR) => Ok(false),
            Err(err) => Err(io::Error::from(err)),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.tty.read(buf)
    }
}

/// What the reader thread sends to the inbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent {
    /// A decoded message.
    Input(InputMsg),
    /// The source reached EOF or failed; no more input will follow.
    Closed,
}

/// Signal checked by the reader between polls.
#[derive(Debug, Clone, Default)]
struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Reader thread settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// How long one poll waits before counting as idle.
    pub poll_timeout: Duration,
    /// Size of the read buffer.
    pub buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(50),
            buffer_size: 1024,
        }
    }
}

/// Handle to a running input thread.
#[derive(Debug)]
pub struct InputReader {
    signal: StopSignal,
    thread: Option<JoinHandle<()>>,
}

impl InputReader {
    /// Start the input thread.
    ///
    /// # Errors
    ///
    /// Fails if the OS refuses to spawn the thread.
    pub fn spawn<S, T>(
        source: S,
        decoder: InputDecoder,
        sender: mpsc::Sender<T>,
        config: ReaderConfig,
    ) -> io::Result<Self>
    where
        S: ByteSource + 'static,
        T: From<ReaderEvent> + Send + 'static,
    {
        let signal = StopSignal::default();
        let thread_signal = signal.clone();
        let thread = thread::Builder::new()
            .name("modkeys-input".into())
            .spawn(move || read_loop(source, decoder, &sender, &thread_signal, config))?;
        tracing::debug!(
            poll_timeout_ms = u64::try_from(config.poll_timeout.as_millis()).unwrap_or(u64::MAX),
            "input reader started"
        );
        Ok(Self {
            signal,
            thread: Some(thread),
        })
    }

    /// Ask the thread to exit without waiting for it.
    pub fn signal_stop(&self) {
        self.signal.stop();
    }

    /// True once the thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the thread and wait for it.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the thread panicked.
    pub fn stop(mut self) -> thread::Result<()> {
        self.signal.stop();
        match self.thread.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }

    /// Stop the thread, waiting at most `grace` for it to exit.
    ///
    /// Returns `Ok(true)` when the thread was joined and `Ok(false)` when it
    /// was still blocked at the deadline and has been detached.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the thread panicked.
    pub fn stop_within(mut self, grace: Duration) -> thread::Result<bool> {
        self.signal.stop();
        let deadline = Instant::now().checked_add(grace);
        while !self.is_finished() && deadline.is_none_or(|at| Instant::now() < at) {
            thread::sleep(Duration::from_millis(1));
        }
        if !self.is_finished() {
            tracing::debug!(
                grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                "input reader still blocked; detaching"
            );
            self.thread = None;
            return Ok(false);
        }
        match self.thread.take() {
            Some(handle) => handle.join().map(|()| true),
            None => Ok(true),
        }
    }
}

impl Drop for InputReader {
    fn drop(&mut self) {
        self.signal.stop();
        // Don't join in drop to avoid blocking on a source stuck in read.
    }
}

fn read_loop<S, T>(
    mut source: S,
    mut decoder: InputDecoder,
    sender: &mpsc::Sender<T>,
    signal: &StopSignal,
    config: ReaderConfig,
) where
    S: ByteSource,
    T: From<ReaderEvent>,
{
    let send = |event: ReaderEvent| sender.send(T::from(event)).is_ok();
    let mut buf = vec![0u8; config.buffer_size.max(1)];

    loop {
        if signal.is_stopped() {
            tracing::debug!("input reader stopped");
            return;
        }

        match source.poll(config.poll_timeout) {
            Ok(true) => {}
            Ok(false) => {
                if let Some(msg) = decoder.flush()
                    && !send(ReaderEvent::Input(msg))
                {
                    return;
                }
                continue;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                tracing::error!(error = %err, "input poll failed; closing input");
                send(ReaderEvent::Closed);
                return;
            }
        }

        match source.read(&mut buf) {
            Ok(0) => {
                tracing::debug!("input reached end of stream");
                if let Some(msg) = decoder.flush() {
                    send(ReaderEvent::Input(msg));
                }
                send(ReaderEvent::Closed);
                return;
            }
            Ok(n) => {
                for msg in decoder.decode(&buf[..n]) {
                    if !send(ReaderEvent::Input(msg)) {
                        tracing::debug!("inbound queue gone; input reader exiting");
                        return;
                    }
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                ) => {}
            Err(err) => {
                tracing::error!(error = %err, "input read failed; closing input");
                send(ReaderEvent::Closed);
                return;
            }
        }
    }
}
