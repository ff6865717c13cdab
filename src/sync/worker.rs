//! Named worker threads with a bounded join

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to a spawned worker thread
pub struct Worker {
    name: String,
    handle: Option<JoinHandle<()>>,
    /// Disconnects when the thread body returns or unwinds
    done: Receiver<()>,
}

/// Dropped by the worker thread on exit, disconnecting `Worker::done`
struct ExitGuard(#[allow(dead_code)] Sender<()>);

/// Spawn a named thread whose exit can be awaited with a timeout
pub fn spawn_worker<F>(name: impl Into<String>, body: F) -> io::Result<Worker>
where
    F: FnOnce() + Send + 'static,
{
    let name = name.into();
    let (done_tx, done_rx) = bounded::<()>(1);
    
    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let _guard = ExitGuard(done_tx);
            body();
        })?;
    
    Ok(Worker {
        name,
        handle: Some(handle),
        done: done_rx,
    })
}

impl Worker {
    pub fn name(&self) -> &str {
        &self.name
    }
    
    /// Whether the thread body has returned
    pub fn is_finished(&self) -> bool {
        matches!(self.done.try_recv(), Err(crossbeam_channel::TryRecvError::Disconnected))
    }
    
    /// Wait up to `timeout` for the thread to exit
    ///
    /// Returns `true` if the thread was joined. On timeout the thread is
    /// detached and left to finish on its own.
    pub fn join_timeout(mut self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "Thread '{}' did not stop within {:?}, detaching",
                    self.name,
                    timeout
                );
                self.handle.take();
                false
            }
            _ => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        tracing::error!("Thread '{}' panicked", self.name);
                    }
                }
                true
            }
        }
    }
}
