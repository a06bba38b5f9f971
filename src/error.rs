use thiserror::Error;

/// Failure opening or reading from a frame source.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open {device}: {reason}")]
    Open { device: String, reason: String },
    #[error("failed to read frame: {reason}")]
    Grab { reason: String },
    #[error("failed to encode frame: {reason}")]
    Encode { reason: String },
}

/// Failure of a single inference round-trip. None of these stop the relay
/// loop; the next tick tries again.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure starting a relay session.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("consent not given, refusing to open the camera")]
    ConsentRequired,
    #[error("a relay session is already active")]
    AlreadyActive,
    #[error("camera unavailable: {0}")]
    CameraUnavailable(#[from] CaptureError),
}

/// A frame whose pixel dimensions disagree with the overlay surface. Bounding
/// boxes in the response are interpreted in the sent frame's pixel space, so
/// the two must match at request-build time.
#[derive(Debug, Error)]
#[error("frame is {frame_width}x{frame_height} but the overlay is {surface_width}x{surface_height}")]
pub struct DimensionMismatch {
    pub frame_width: u32,
    pub frame_height: u32,
    pub surface_width: u32,
    pub surface_height: u32,
}
