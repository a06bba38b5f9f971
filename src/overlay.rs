use image::{Rgba, RgbImage};

use crate::protocol::InferenceResult;

/// Overlay styling, mirroring the capture page: white 2px boxes, white
/// text, and a small indicator dot that flips color above the behavior
/// score threshold.
pub mod style {
    use image::Rgba;

    pub const BOX_COLOR: Rgba<u8> = Rgba([255, 255, 255, 230]);
    pub const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 242]);
    pub const ALERT_COLOR: Rgba<u8> = Rgba([255, 120, 120, 242]);
    pub const CALM_COLOR: Rgba<u8> = Rgba([120, 255, 180, 242]);
    pub const BOX_STROKE: u32 = 2;
    pub const DOT_RADIUS: i32 = 8;
    pub const ALERT_THRESHOLD: f32 = 0.6;
}

/// Where the relay paints inference results. Driven from the relay thread
/// only; coordinates may fall outside the surface and must be clipped, not
/// rejected.
pub trait OverlaySurface {
    fn dimensions(&self) -> (u32, u32);
    /// Matches the surface to the video's native size so response
    /// coordinates and painted pixels agree. Existing content is discarded.
    fn resize(&mut self, width: u32, height: u32);
    fn clear(&mut self);
    fn stroke_rect(&mut self, x: i32, y: i32, width: u32, height: u32, stroke: u32, color: Rgba<u8>);
    fn fill_circle(&mut self, cx: i32, cy: i32, radius: i32, color: Rgba<u8>);
    /// Draws `text` with its baseline at (`x`, `y`).
    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Rgba<u8>);
    /// Called after a successful render with the frame the overlay was
    /// computed for. Surfaces with an output sink write their composite
    /// here; the default does nothing.
    fn present(&mut self, frame: &RgbImage) {
        let _ = frame;
    }
}

/// Paints one inference result: clears previous paint, then draws each face
/// in the order received. Faces without a bounding box are skipped. A result
/// with no faces leaves the surface empty.
pub fn render_result<S: OverlaySurface + ?Sized>(surface: &mut S, result: &InferenceResult) {
    surface.clear();
    for face in &result.faces {
        let Some([bx, by, bw, bh]) = face.bbox else {
            continue;
        };
        let x = bx.round() as i32;
        let y = by.round() as i32;
        let w = bw.round().max(0.0) as u32;
        let h = bh.round().max(0.0) as u32;
        surface.stroke_rect(x, y, w, h, style::BOX_STROKE, style::BOX_COLOR);

        let emotion = scored_label(
            "Emotion",
            face.emotion.as_deref(),
            "-",
            face.emotion_confidence,
        );
        surface.draw_text(x + 6, y - 6, &emotion, style::TEXT_COLOR);

        let behavior = scored_label(
            "Behavior",
            face.behavior_label.as_deref(),
            "N/A",
            face.behavior_score,
        );
        surface.draw_text(x + 6, y + h as i32 + 18, &behavior, style::TEXT_COLOR);

        let eyes = format!("Eyes: {}", face.eye_status.as_deref().unwrap_or("unknown"));
        surface.draw_text(x + 6, y + h as i32 + 36, &eyes, style::TEXT_COLOR);

        let alert = face
            .behavior_score
            .map_or(false, |score| score > style::ALERT_THRESHOLD);
        let dot = if alert {
            style::ALERT_COLOR
        } else {
            style::CALM_COLOR
        };
        surface.fill_circle(x + w as i32 - 14, y + 14, style::DOT_RADIUS, dot);
    }
}

/// `"<prefix>: <label> (<pct>%)"`, with the percentage only when a score is
/// present and `fallback` standing in for a missing label.
fn scored_label(prefix: &str, label: Option<&str>, fallback: &str, score: Option<f32>) -> String {
    let mut text = format!("{prefix}: {}", label.unwrap_or(fallback));
    if let Some(score) = score {
        text.push_str(&format!(" ({}%)", (score * 100.0).round() as i64));
    }
    text
}
