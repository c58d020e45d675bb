// Latest-frame slot shared between the frame producer and the pose worker.
// A new frame overwrites the previous one; nothing is ever queued.

use crate::models::capture::RawFrame;
use std::sync::Arc;
use tokio::sync::watch;

/// Creates a fresh, empty slot and returns its writer and reader halves
pub fn latest_frame_slot() -> (FrameSink, LatestFrame) {
    let (tx, rx) = watch::channel(None);
    (FrameSink { tx: Arc::new(tx) }, LatestFrame { rx })
}

/// Producer side. Cheap to clone; hand one to the frame source.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: Arc<watch::Sender<Option<Arc<RawFrame>>>>,
}

impl FrameSink {
    /// Publish a frame, replacing whatever was in the slot
    pub fn publish(&self, frame: RawFrame) {
        self.tx.send_replace(Some(Arc::new(frame)));
    }

    /// Empty the slot (used on teardown)
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}

/// Consumer side
#[derive(Debug, Clone)]
pub struct LatestFrame {
    rx: watch::Receiver<Option<Arc<RawFrame>>>,
}

impl LatestFrame {
    /// The most recently published frame, if any has arrived yet
    pub fn latest(&self) -> Option<Arc<RawFrame>> {
        self.rx.borrow().clone()
    }
}
