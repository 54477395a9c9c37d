//! Background state I/O bounded by a timeout.

use crate::cancel::CancelToken;
use crate::codec::Format;
use crate::error::{Result, StateError};
use crate::manager::StateManager;
use crate::state::State;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

/// One-shot result of a background save or load.
#[must_use = "dropping a Completion discards the operation's result"]
pub struct Completion<T> {
    rx: Receiver<Result<T>>,
    token: CancelToken,
    timeout: Duration,
}

impl<T> Completion<T> {
    /// Block until the operation finishes or its timeout elapses.
    ///
    /// On timeout the operation is cancelled and [`StateError::Timeout`] returned.
    pub fn wait(self) -> Result<T> {
        let remaining = self.token.remaining().unwrap_or(self.timeout);
        match self.rx.recv_timeout(remaining) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                self.token.cancel();
                Err(StateError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(StateError::WorkerDisconnected),
        }
    }

    /// Non-blocking poll; `None` while the operation is still running.
    pub fn try_result(&self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(StateError::WorkerDisconnected)),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

impl StateManager {
    /// Save on a background thread, bounded by [`timeout`](Self::timeout).
    ///
    /// The writer is returned on success so callers can recover buffers.
    pub fn save_async<W>(&self, state: State, format: Format, writer: W) -> Result<Completion<W>>
    where
        W: Write + Send + 'static,
    {
        let manager = self.clone();
        self.spawn_io("plugbridge-state-save", move |token| {
            let mut writer = writer;
            manager.save_with_cancel(&state, format, &mut writer, token)?;
            Ok(writer)
        })
    }

    /// Load on a background thread, bounded by [`timeout`](Self::timeout).
    pub fn load_async<R>(&self, reader: R, format: Format) -> Result<Completion<State>>
    where
        R: Read + Send + 'static,
    {
        let manager = self.clone();
        self.spawn_io("plugbridge-state-load", move |token| {
            manager.load_with_cancel(reader, format, token)
        })
    }

    fn spawn_io<T, F>(&self, name: &str, op: F) -> Result<Completion<T>>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> Result<T> + Send + 'static,
    {
        let timeout = self.timeout();
        let token = CancelToken::with_timeout(timeout);
        let (tx, rx) = crossbeam_channel::bounded(1);

        let worker_token = token.clone();
        let plugin_id = self.plugin_id().to_string();
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let result = op(&worker_token);
                if let Err(e) = &result {
                    tracing::warn!("Background state I/O for {} failed: {}", plugin_id, e);
                }
                // The receiver may already have given up after a timeout.
                let _ = tx.send(result);
            })?;

        Ok(Completion { rx, token, timeout })
    }
}
