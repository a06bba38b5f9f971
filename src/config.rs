use std::env;
use std::path::PathBuf;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/infer_frame";
pub const DEFAULT_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_QUALITY: u8 = 70;
pub const DEFAULT_CAPTURE_WIDTH: u32 = 1280;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 720;

/// Everything a relay session needs, assembled from CLI flags over env
/// fallbacks over defaults. There is no config file; the capture interval is
/// the only setting that changes at runtime (over the control socket).
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// The user has acknowledged that the camera will be opened and frames
    /// uploaded. Sessions refuse to start without it.
    pub consent: bool,
    pub endpoint: String,
    pub camera_index: u32,
    pub interval_ms: u64,
    /// Requested capture size; the device may negotiate something else.
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    /// Write each annotated frame here as JPEG. Off by default.
    pub save: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            consent: false,
            endpoint: default_endpoint(),
            camera_index: 0,
            interval_ms: DEFAULT_INTERVAL_MS,
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
            quality: DEFAULT_QUALITY,
            save: None,
        }
    }
}

pub fn default_endpoint() -> String {
    env::var("FACE_RELAY_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string())
}

impl RelayConfig {
    /// Clamps out-of-range values instead of rejecting them.
    pub fn normalized(mut self) -> Self {
        self.interval_ms = self.interval_ms.max(1);
        self.quality = self.quality.clamp(1, 100);
        self
    }
}
