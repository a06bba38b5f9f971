use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, DimensionMismatch};

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Scales a captured frame to the overlay surface's dimensions. Frames that
/// already match are passed through.
pub fn fit_frame(frame: &RgbImage, target: (u32, u32)) -> RgbImage {
    if frame.dimensions() == target {
        frame.clone()
    } else {
        imageops::resize(frame, target.0, target.1, FilterType::CatmullRom)
    }
}

/// A frame compressed into the data-URL form the inference endpoint expects.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub width: u32,
    pub height: u32,
    pub data_url: String,
}

impl EncodedFrame {
    pub fn encode(frame: &RgbImage, quality: u8) -> Result<Self, CaptureError> {
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
            .encode_image(frame)
            .map_err(|e| CaptureError::Encode {
                reason: e.to_string(),
            })?;
        let (width, height) = frame.dimensions();
        Ok(Self {
            width,
            height,
            data_url: format!("{DATA_URL_PREFIX}{}", general_purpose::STANDARD.encode(&buffer)),
        })
    }
}

/// Request body for the inference endpoint: one field carrying the frame.
#[derive(Debug, Serialize)]
pub struct FramePayload {
    pub frame: String,
}

impl FramePayload {
    /// Builds the request body. The frame must match the overlay surface,
    /// since the endpoint reports bounding boxes in the sent frame's pixel
    /// space and the renderer paints them in the surface's.
    pub fn new(frame: EncodedFrame, surface: (u32, u32)) -> Result<Self, DimensionMismatch> {
        if (frame.width, frame.height) != surface {
            return Err(DimensionMismatch {
                frame_width: frame.width,
                frame_height: frame.height,
                surface_width: surface.0,
                surface_height: surface.1,
            });
        }
        Ok(Self {
            frame: frame.data_url,
        })
    }
}

/// One detected face, in the sent frame's pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    #[serde(default)]
    pub bbox: Option<[f32; 4]>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub emotion_confidence: Option<f32>,
    #[serde(default, rename = "autism_label")]
    pub behavior_label: Option<String>,
    #[serde(default, rename = "autism_score")]
    pub behavior_score: Option<f32>,
    #[serde(default)]
    pub eye_status: Option<String>,
}

/// Decoded response for one submitted frame. Consumed by the renderer right
/// away, never kept across round-trips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    #[serde(default)]
    pub faces: Vec<FaceObservation>,
    #[serde(default)]
    pub inference_time_ms: Option<f64>,
}
