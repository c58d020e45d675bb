// Reference snapshot image - the frame the user posed in, saved as PNG

use crate::models::capture::{PixelFormat, RawFrame};
use crate::models::pose::{PoseError, PoseResult};
use image::{ImageBuffer, Rgba};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_FILE_NAME: &str = "reference_pose_snapshot.png";

/// Write `frame` as `<dir>/reference_pose_snapshot.png`, replacing any
/// previous snapshot, and return the file path
pub fn write_snapshot(frame: &RawFrame, dir: &Path) -> PoseResult<PathBuf> {
    frame.validate().map_err(PoseError::InvalidFrame)?;

    std::fs::create_dir_all(dir)
        .map_err(|e| PoseError::SnapshotError(format!("Failed to create {}: {}", dir.display(), e)))?;

    // Convert to RGBA if needed
    let rgba_data = match frame.format {
        PixelFormat::BGRA8 => {
            let mut rgba = Vec::with_capacity(frame.data.len());
            for chunk in frame.data.chunks_exact(4) {
                rgba.extend_from_slice(&[chunk[2], chunk[1], chunk[0], chunk[3]]);
            }
            rgba
        }
        PixelFormat::RGBA8 => frame.data.clone(),
    };

    let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_raw(frame.width, frame.height, rgba_data)
            .ok_or_else(|| PoseError::SnapshotError("Failed to create image buffer".to_string()))?;

    let path = dir.join(SNAPSHOT_FILE_NAME);
    img.save(&path)
        .map_err(|e| PoseError::SnapshotError(format!("Failed to save snapshot: {}", e)))?;

    tracing::info!(path = %path.display(), width = frame.width, height = frame.height, "Saved reference snapshot");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_frame_written_as_rgba_png() {
        let dir = tempfile::tempdir().unwrap();
        // Two pixels: pure blue, pure red (BGRA byte order)
        let frame = RawFrame::new(2, 1, vec![255, 0, 0, 255, 0, 0, 255, 255], PixelFormat::BGRA8);

        let path = write_snapshot(&frame, dir.path()).expect("Failed to write snapshot");
        assert_eq!(path.file_name().unwrap(), SNAPSHOT_FILE_NAME);

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (2, 1));
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_snapshot_overwrites_previous() {
        let dir = tempfile::tempdir().unwrap();
        let white = RawFrame::new(1, 1, vec![255; 4], PixelFormat::RGBA8);
        let black = RawFrame::new(1, 1, vec![0, 0, 0, 255], PixelFormat::RGBA8);

        write_snapshot(&white, dir.path()).unwrap();
        let path = write_snapshot(&black, dir.path()).unwrap();

        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_invalid_frame_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let frame = RawFrame::new(3, 3, vec![0; 5], PixelFormat::RGBA8);
        assert!(matches!(
            write_snapshot(&frame, dir.path()).unwrap_err(),
            PoseError::InvalidFrame(_)
        ));
    }
}
