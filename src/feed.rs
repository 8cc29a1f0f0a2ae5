//! ALFA Face Vault - Descriptor Feed
//!
//! The capture pipeline samples descriptors continuously and publishes them
//! into a single-slot channel. Publishing never blocks: a newer snapshot
//! replaces an unread one. Readers always see the latest snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;

/// One sample of the capture feed
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorSnapshot {
    /// `None` when no face was in frame
    pub descriptor: Option<Vec<f64>>,
    pub captured_at: DateTime<Utc>,
}

/// Opaque descriptor extractor (camera + recognition model)
pub trait DescriptorSource: Send {
    /// Sample the current frame; `None` if no face is present
    fn sample(&mut self) -> Option<Vec<f64>>;
}

impl<F> DescriptorSource for F
where
    F: FnMut() -> Option<Vec<f64>> + Send,
{
    fn sample(&mut self) -> Option<Vec<f64>> {
        self()
    }
}

/// Producer side of the feed
#[derive(Clone)]
pub struct SnapshotSender {
    tx: Sender<Arc<DescriptorSnapshot>>,
    // drains the slot when it is full so the newest value always fits
    evict: Receiver<Arc<DescriptorSnapshot>>,
}

impl SnapshotSender {
    /// Publish a snapshot, dropping any unread older one
    pub fn publish(&self, snapshot: DescriptorSnapshot) {
        let mut pending = Arc::new(snapshot);
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    let _ = self.evict.try_recv();
                    pending = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// Consumer side of the feed
pub struct SnapshotReceiver {
    rx: Receiver<Arc<DescriptorSnapshot>>,
    latest: Mutex<Option<Arc<DescriptorSnapshot>>>,
}

impl SnapshotReceiver {
    /// Most recent snapshot, or `None` if nothing was ever published
    pub fn latest(&self) -> Option<Arc<DescriptorSnapshot>> {
        let mut latest = self.latest.lock();
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) => *latest = Some(snapshot),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        latest.clone()
    }

    /// Descriptor of the latest snapshot; `None` covers both "no snapshot" and "no face"
    pub fn latest_descriptor(&self) -> Option<Vec<f64>> {
        self.latest().and_then(|s| s.descriptor.clone())
    }
}

/// Create a connected single-slot feed
pub fn snapshot_channel() -> (SnapshotSender, SnapshotReceiver) {
    let (tx, rx) = bounded(1);
    let sender = SnapshotSender {
        tx,
        evict: rx.clone(),
    };
    let receiver = SnapshotReceiver {
        rx,
        latest: Mutex::new(None),
    };
    (sender, receiver)
}

/// Background thread sampling a [`DescriptorSource`] at a fixed interval
pub struct Sampler {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Sampler {
    pub fn spawn<S>(mut source: S, interval: Duration, sender: SnapshotSender) -> Self
    where
        S: DescriptorSource + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                let descriptor = source.sample();
                sender.publish(DescriptorSnapshot {
                    descriptor,
                    captured_at: Utc::now(),
                });
                thread::sleep(interval);
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop sampling and wait for the thread
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("descriptor sampler thread panicked");
            }
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.stop();
    }
}
