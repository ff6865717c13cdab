//! Frame acquisition
//!
//! A `FrameSource` owns one grabber (local camera or network stream) and
//! runs it on a dedicated thread. The thread keeps only the newest frame in
//! a single-slot register; frames produced between two reads are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::SourceError;
use crate::sync::{spawn_worker, CancelToken, LatestCell, Worker};
use crate::video::frame::Frame;

/// Anything that can hand out frames with a bounded wait
///
/// Grabbers handed to a `FrameSource` must also be `Send`; device handles
/// that are pinned to their thread are driven directly by the capture loop.
pub trait FrameGrabber {
    /// Wait at most `timeout` for the next frame
    ///
    /// `Ok(None)` means nothing arrived in time. Errors are treated as a
    /// single failed read by the acquisition loop.
    fn grab(&mut self, timeout: Duration) -> Result<Option<Frame>, SourceError>;
    
    /// Release the underlying device or connection
    fn release(&mut self) {}
    
    /// Short description for logs
    fn describe(&self) -> String;
}

/// Acquisition counters
#[derive(Default)]
struct Counters {
    frames: AtomicU64,
    read_failures: AtomicU64,
    empty_reads: AtomicU64,
}

/// Snapshot of a source's counters
#[derive(Debug, Clone, Default)]
pub struct SourceStats {
    pub frames_acquired: u64,
    pub read_failures: u64,
    pub empty_reads: u64,
}

/// A named video source with its own acquisition thread
pub struct FrameSource {
    name: String,
    
    /// Grabber waiting to be moved onto the acquisition thread
    grabber: Option<Box<dyn FrameGrabber + Send>>,
    
    /// Newest frame
    latest: Arc<LatestCell<Frame>>,
    
    cancel: CancelToken,
    
    worker: Option<Worker>,
    
    counters: Arc<Counters>,
    
    /// Bounded wait per grab
    read_timeout: Duration,
    
    started_at: Option<Instant>,
}

impl FrameSource {
    /// Wrap an already connected grabber
    pub fn new(name: impl Into<String>, grabber: Box<dyn FrameGrabber + Send>, read_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            grabber: Some(grabber),
            latest: Arc::new(LatestCell::new()),
            cancel: CancelToken::new(),
            worker: None,
            counters: Arc::new(Counters::default()),
            read_timeout,
            started_at: None,
        }
    }
    
    pub fn name(&self) -> &str {
        &self.name
    }
    
    /// Spawn the acquisition thread
    pub fn start(&mut self) -> Result<(), SourceError> {
        if self.worker.is_some() {
            return Ok(());
        }
        
        let mut grabber = self
            .grabber
            .take()
            .ok_or_else(|| SourceError::Spawn(format!("source '{}' already stopped", self.name)))?;
        
        let name = self.name.clone();
        let latest = self.latest.clone();
        let cancel = self.cancel.clone();
        let counters = self.counters.clone();
        let read_timeout = self.read_timeout;
        
        tracing::info!("Starting acquisition for '{}' ({})", name, grabber.describe());
        
        let worker = spawn_worker(format!("acquire-{}", self.name), move || {
            while !cancel.is_cancelled() {
                match grabber.grab(read_timeout) {
                    Ok(Some(frame)) => {
                        latest.set(frame);
                        counters.frames.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(None) => {
                        counters.empty_reads.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        counters.read_failures.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!("Source '{}': {}", name, e);
                    }
                }
            }
            
            grabber.release();
            tracing::debug!("Acquisition for '{}' exited", name);
        })
        .map_err(|e| SourceError::Spawn(e.to_string()))?;
        
        self.worker = Some(worker);
        self.started_at = Some(Instant::now());
        Ok(())
    }
    
    /// Copy of the newest frame, if one has arrived
    pub fn get_latest(&self) -> Option<Frame> {
        self.latest.get_copy()
    }
    
    /// Cancel the acquisition thread and wait up to `timeout` for it
    ///
    /// Returns whether the thread was joined. A thread that does not exit in
    /// time is detached; it releases its device whenever its current read
    /// returns.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.cancel.cancel();
        
        match self.worker.take() {
            Some(worker) => {
                let joined = worker.join_timeout(timeout);
                if joined {
                    tracing::info!("Source '{}' stopped", self.name);
                }
                joined
            }
            None => {
                // Never started: release the grabber here
                if let Some(mut grabber) = self.grabber.take() {
                    grabber.release();
                }
                true
            }
        }
    }
    
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().map(|w| !w.is_finished()).unwrap_or(false)
    }
    
    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_acquired: self.counters.frames.load(Ordering::Relaxed),
            read_failures: self.counters.read_failures.load(Ordering::Relaxed),
            empty_reads: self.counters.empty_reads.load(Ordering::Relaxed),
        }
    }
    
    /// Time since `start`
    pub fn uptime(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop(Duration::from_millis(500));
        }
    }
}
