// Data structures for camera frames

/// A decoded camera frame handed over by the frame source
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub timestamp: i64, // Milliseconds since the Unix epoch
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>, format: PixelFormat) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            width,
            height,
            data,
            format,
        }
    }

    /// Check that the buffer can be handed to a landmark model
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("Frame has zero dimension ({}x{})", self.width, self.height));
        }

        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(self.format.bytes_per_pixel()))
            .ok_or_else(|| {
                format!("Frame dimensions {}x{} are too large", self.width, self.height)
            })?;
        if self.data.len() != expected {
            return Err(format!(
                "Frame buffer is {} bytes, expected {} for {}x{} {:?}",
                self.data.len(),
                expected,
                self.width,
                self.height,
                self.format
            ));
        }

        Ok(())
    }
}

/// Pixel format of captured frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    RGBA8,
    BGRA8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        4
    }
}

/// Error types for frame source operations
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Camera not found: {0}")]
    DeviceNotFound(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Already capturing")]
    AlreadyCapturing,
}

pub type CaptureResult<T> = Result<T, CaptureError>;
