//! Cancellation tokens and chunked I/O adapters.

use crate::error::{Result, StateError};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default interval between cancellation checks.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Default)]
struct TokenInner {
    cancelled: AtomicBool,
    deadline: Option<(Instant, Duration)>,
}

/// Shared cancellation signal with an optional deadline.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that reports [`StateError::Timeout`] once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                deadline: Some((Instant::now() + timeout, timeout)),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline.map(|(at, _)| at)
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// `Err(Cancelled)` after [`cancel`](Self::cancel), `Err(Timeout)` past the deadline.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(StateError::Cancelled);
        }
        match self.inner.deadline {
            Some((at, timeout)) if Instant::now() >= at => Err(StateError::Timeout(timeout)),
            _ => Ok(()),
        }
    }
}

/// Writer that checks a token before every `chunk` bytes.
pub struct CancellableWriter<'a, W> {
    inner: W,
    token: &'a CancelToken,
    chunk: usize,
    until_check: usize,
}

impl<'a, W: Write> CancellableWriter<'a, W> {
    pub fn new(inner: W, token: &'a CancelToken, chunk: usize) -> Self {
        Self {
            inner,
            token,
            chunk: chunk.max(1),
            until_check: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CancellableWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.until_check == 0 {
            self.token.check().map_err(StateError::into_io)?;
            self.until_check = self.chunk;
        }
        let n = buf.len().min(self.until_check);
        let written = self.inner.write(&buf[..n])?;
        self.until_check -= written;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Reader that checks a token before every `chunk` bytes.
pub struct CancellableReader<'a, R> {
    inner: R,
    token: &'a CancelToken,
    chunk: usize,
    until_check: usize,
}

impl<'a, R: Read> CancellableReader<'a, R> {
    pub fn new(inner: R, token: &'a CancelToken, chunk: usize) -> Self {
        Self {
            inner,
            token,
            chunk: chunk.max(1),
            until_check: 0,
        }
    }
}

impl<R: Read> Read for CancellableReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.until_check == 0 {
            self.token.check().map_err(StateError::into_io)?;
            self.until_check = self.chunk;
        }
        let n = buf.len().min(self.until_check);
        let read = self.inner.read(&mut buf[..n])?;
        self.until_check -= read;
        Ok(read)
    }
}
