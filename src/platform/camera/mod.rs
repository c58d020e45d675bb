// Camera frame source abstraction
// The device itself (permissions, sessions, pixel transport) lives in the
// host application. The core only needs something that publishes decoded
// frames into a sink between start and stop.

use crate::core::frame_slot::FrameSink;
use crate::models::capture::{CaptureError, CaptureResult, RawFrame};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Platform-agnostic camera trait
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Acquire the device and begin publishing frames into `sink`
    async fn start(&mut self, sink: FrameSink) -> CaptureResult<()>;

    /// Release the device. Must be safe to call when not capturing.
    async fn stop(&mut self) -> CaptureResult<()>;

    /// Check if currently capturing
    fn is_capturing(&self) -> bool;
}

// ==============================================================================
// Host-fed source
// ==============================================================================

/// Frame source for hosts that own the camera and push frames from their own
/// capture callback. The host keeps a [`FrameFeeder`] and calls
/// [`FrameFeeder::push`] for every decoded frame.
pub struct HostFrameSource {
    shared: Arc<HostShared>,
}

struct HostShared {
    permission_granted: AtomicBool,
    device_present: AtomicBool,
    sink: Mutex<Option<FrameSink>>,
}

/// Handle the host uses to deliver frames and report device state
#[derive(Clone)]
pub struct FrameFeeder {
    shared: Arc<HostShared>,
}

impl HostFrameSource {
    pub fn new() -> (Self, FrameFeeder) {
        let shared = Arc::new(HostShared {
            permission_granted: AtomicBool::new(true),
            device_present: AtomicBool::new(true),
            sink: Mutex::new(None),
        });

        (
            Self {
                shared: shared.clone(),
            },
            FrameFeeder { shared },
        )
    }
}

impl FrameFeeder {
    /// Deliver a frame. Frames pushed while the source is stopped are dropped.
    /// Returns whether the frame was accepted.
    pub fn push(&self, frame: RawFrame) -> bool {
        let guard = match self.shared.sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match guard.as_ref() {
            Some(sink) => {
                sink.publish(frame);
                true
            }
            None => false,
        }
    }

    pub fn set_permission_granted(&self, granted: bool) {
        self.shared.permission_granted.store(granted, Ordering::SeqCst);
    }

    pub fn set_device_present(&self, present: bool) {
        self.shared.device_present.store(present, Ordering::SeqCst);
    }
}

#[async_trait]
impl FrameSource for HostFrameSource {
    async fn start(&mut self, sink: FrameSink) -> CaptureResult<()> {
        if !self.shared.permission_granted.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied(
                "Camera permission denied".to_string(),
            ));
        }

        if !self.shared.device_present.load(Ordering::SeqCst) {
            return Err(CaptureError::DeviceNotFound("No camera found".to_string()));
        }

        let mut guard = self
            .shared
            .sink
            .lock()
            .map_err(|e| CaptureError::CaptureFailed(format!("Frame sink lock poisoned: {}", e)))?;

        if guard.is_some() {
            return Err(CaptureError::AlreadyCapturing);
        }

        *guard = Some(sink);
        Ok(())
    }

    async fn stop(&mut self) -> CaptureResult<()> {
        let mut guard = self
            .shared
            .sink
            .lock()
            .map_err(|e| CaptureError::CaptureFailed(format!("Frame sink lock poisoned: {}", e)))?;

        if let Some(sink) = guard.take() {
            sink.clear();
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.shared
            .sink
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame_slot::latest_frame_slot;
    use crate::models::capture::PixelFormat;

    fn frame(fill: u8) -> RawFrame {
        RawFrame::new(1, 1, vec![fill; 4], PixelFormat::BGRA8)
    }

    #[tokio::test]
    async fn test_host_source_lifecycle() {
        let (mut source, feeder) = HostFrameSource::new();
        let (sink, latest) = latest_frame_slot();

        assert!(!feeder.push(frame(1)), "Frames before start are dropped");

        source.start(sink).await.expect("Failed to start source");
        assert!(source.is_capturing());

        assert!(feeder.push(frame(2)));
        assert_eq!(latest.latest().unwrap().data, vec![2; 4]);

        source.stop().await.expect("Failed to stop source");
        assert!(!source.is_capturing());
        assert!(latest.latest().is_none());
        assert!(!feeder.push(frame(3)));
    }

    #[tokio::test]
    async fn test_permission_denied() {
        let (mut source, feeder) = HostFrameSource::new();
        feeder.set_permission_granted(false);

        let (sink, _latest) = latest_frame_slot();
        let err = source.start(sink).await.unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert!(!source.is_capturing());
    }

    #[tokio::test]
    async fn test_missing_device() {
        let (mut source, feeder) = HostFrameSource::new();
        feeder.set_device_present(false);

        let (sink, _latest) = latest_frame_slot();
        let err = source.start(sink).await.unwrap_err();
        assert!(matches!(err, CaptureError::DeviceNotFound(_)));
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let (mut source, _feeder) = HostFrameSource::new();
        let (sink, _latest) = latest_frame_slot();

        source.start(sink.clone()).await.unwrap();
        assert!(matches!(
            source.start(sink).await.unwrap_err(),
            CaptureError::AlreadyCapturing
        ));
    }
}
