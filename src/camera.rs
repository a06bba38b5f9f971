use image::RgbImage;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
    Camera,
};
use tracing::{debug, error};

use crate::error::CaptureError;

/// A source of RGB frames. The relay loop owns exactly one per session and
/// drops it when the session ends, which releases the underlying device.
pub trait FrameSource {
    /// Native dimensions of the frames this source produces.
    fn dimensions(&self) -> (u32, u32);
    /// Blocks until the next frame is available.
    fn grab(&mut self) -> Result<RgbImage, CaptureError>;
}

/// Webcam-backed frame source.
pub struct WebcamSource {
    camera: Camera,
    dims: (u32, u32),
}

impl WebcamSource {
    /// Opens capture device `index`, preferring a format close to
    /// `width`x`height`. Walks common frame formats before giving the
    /// backend free rein, since some drivers reject otherwise-reasonable
    /// requests for specific pixel formats.
    pub fn open(index: u32, width: u32, height: u32) -> Result<Self, CaptureError> {
        let mut cam = None;
        for (w, h) in [(width, height), (640, 480)] {
            for fmt in [FrameFormat::RAWRGB, FrameFormat::MJPEG, FrameFormat::YUYV] {
                let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
                    CameraFormat::new_from(w, h, fmt, 30),
                ));
                match Camera::new(CameraIndex::Index(index), req) {
                    Ok(c) => {
                        cam = Some(c);
                        break;
                    }
                    Err(_) => continue,
                }
            }
            if cam.is_some() {
                break;
            }
        }
        let mut camera = match cam {
            Some(c) => c,
            None => {
                let any = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
                Camera::new(CameraIndex::Index(index), any).map_err(|e| CaptureError::Open {
                    device: format!("camera {index}"),
                    reason: e.to_string(),
                })?
            }
        };
        camera.open_stream().map_err(|e| CaptureError::Open {
            device: format!("camera {index}"),
            reason: e.to_string(),
        })?;
        debug!(format = ?camera.camera_format(), "camera stream opened");
        let resolution = camera.camera_format().resolution();
        Ok(Self {
            camera,
            dims: (resolution.width(), resolution.height()),
        })
    }
}

impl FrameSource for WebcamSource {
    fn dimensions(&self) -> (u32, u32) {
        self.dims
    }

    fn grab(&mut self) -> Result<RgbImage, CaptureError> {
        let frame = self.camera.frame().map_err(|e| CaptureError::Grab {
            reason: e.to_string(),
        })?;
        frame
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::Grab {
                reason: e.to_string(),
            })
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        let _ = self.camera.stop_stream();
    }
}

/// Lists capture devices known to the native backend, one line per device.
pub fn list_devices() -> Vec<String> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(devices) => devices
            .iter()
            .map(|d| format!("{}: {}", d.index(), d.human_name()))
            .collect(),
        Err(e) => {
            error!("failed to query capture devices: {e}");
            Vec::new()
        }
    }
}
