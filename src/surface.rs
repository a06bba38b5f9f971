use std::fs::File;
use std::path::PathBuf;

use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, Rgba, RgbaImage, RgbImage};
use tracing::error;

use crate::overlay::OverlaySurface;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// An RGBA overlay buffer standing in for the capture page's canvas:
/// transparent until painted, resized to track the video, and composited
/// over the sent frame when a sink path is configured.
pub struct PixelSurface {
    buffer: RgbaImage,
    sink: Option<PathBuf>,
    sink_quality: u8,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffer: ImageBuffer::from_pixel(width, height, TRANSPARENT),
            sink: None,
            sink_quality: 90,
        }
    }

    /// A surface that writes each presented composite to `path` as JPEG.
    pub fn with_sink(width: u32, height: u32, path: PathBuf, quality: u8) -> Self {
        Self {
            buffer: ImageBuffer::from_pixel(width, height, TRANSPARENT),
            sink: Some(path),
            sink_quality: quality.clamp(1, 100),
        }
    }

    fn put(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x < self.buffer.width() && y < self.buffer.height() {
            self.buffer.put_pixel(x, y, color);
        }
    }

    fn fill_rect(&mut self, left: i32, top: i32, right: i32, bottom: i32, color: Rgba<u8>) {
        for y in top..bottom {
            for x in left..right {
                self.put(x, y, color);
            }
        }
    }

    /// Alpha-composites the overlay onto `frame`.
    pub fn composite_over(&self, frame: &RgbImage) -> RgbImage {
        let mut out = frame.clone();
        for (x, y, pixel) in self.buffer.enumerate_pixels() {
            let alpha = pixel[3] as u32;
            if alpha == 0 || x >= out.width() || y >= out.height() {
                continue;
            }
            let under = out.get_pixel_mut(x, y);
            for channel in 0..3 {
                let over = pixel[channel] as u32;
                let base = under[channel] as u32;
                under[channel] = ((over * alpha + base * (255 - alpha)) / 255) as u8;
            }
        }
        out
    }
}

impl OverlaySurface for PixelSurface {
    fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.buffer.dimensions() != (width, height) {
            self.buffer = ImageBuffer::from_pixel(width, height, TRANSPARENT);
        }
    }

    fn clear(&mut self) {
        for pixel in self.buffer.pixels_mut() {
            *pixel = TRANSPARENT;
        }
    }

    fn stroke_rect(&mut self, x: i32, y: i32, width: u32, height: u32, stroke: u32, color: Rgba<u8>) {
        let (w, h, s) = (width as i32, height as i32, stroke as i32);
        self.fill_rect(x, y, x + w, y + s, color);
        self.fill_rect(x, y + h - s, x + w, y + h, color);
        self.fill_rect(x, y + s, x + s, y + h - s, color);
        self.fill_rect(x + w - s, y + s, x + w, y + h - s, color);
    }

    fn fill_circle(&mut self, cx: i32, cy: i32, radius: i32, color: Rgba<u8>) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Rgba<u8>) {
        let mut px = x;
        let top = y - 7;
        for ch in text.chars().flat_map(|c| c.to_uppercase()) {
            if let Some(glyph) = glyph_bits(ch) {
                for (row, pattern) in glyph.iter().enumerate() {
                    for col in 0..5 {
                        if (pattern >> (4 - col)) & 1 == 1 {
                            self.put(px + col, top + row as i32, color);
                        }
                    }
                }
            }
            px += 6;
        }
    }

    fn present(&mut self, frame: &RgbImage) {
        let Some(path) = self.sink.clone() else {
            return;
        };
        let composite = self.composite_over(frame);
        let file = match File::create(&path) {
            Ok(f) => f,
            Err(e) => {
                error!(path = %path.display(), "failed to create sink file: {e}");
                return;
            }
        };
        if let Err(e) = JpegEncoder::new_with_quality(file, self.sink_quality).encode_image(&composite)
        {
            error!(path = %path.display(), "failed to write annotated frame: {e}");
        }
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        'A' => Some([
            0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001,
        ]),
        'B' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110,
        ]),
        'C' => Some([
            0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110,
        ]),
        'D' => Some([
            0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110,
        ]),
        'E' => Some([
            0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111,
        ]),
        'F' => Some([
            0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000,
        ]),
        'G' => Some([
            0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111,
        ]),
        'H' => Some([
            0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001,
        ]),
        'I' => Some([
            0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        'J' => Some([
            0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100,
        ]),
        'K' => Some([
            0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001,
        ]),
        'L' => Some([
            0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111,
        ]),
        'M' => Some([
            0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001,
        ]),
        'N' => Some([
            0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001,
        ]),
        'O' => Some([
            0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110,
        ]),
        'P' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000,
        ]),
        'Q' => Some([
            0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101,
        ]),
        'R' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001,
        ]),
        'S' => Some([
            0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        'T' => Some([
            0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100,
        ]),
        'U' => Some([
            0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110,
        ]),
        'V' => Some([
            0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100,
        ]),
        'W' => Some([
            0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010,
        ]),
        'X' => Some([
            0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001,
        ]),
        'Y' => Some([
            0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100,
        ]),
        'Z' => Some([
            0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111,
        ]),
        '0' => Some([
            0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110,
        ]),
        '1' => Some([
            0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        '2' => Some([
            0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111,
        ]),
        '3' => Some([
            0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110,
        ]),
        '4' => Some([
            0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010,
        ]),
        '5' => Some([
            0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        '6' => Some([
            0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110,
        ]),
        '7' => Some([
            0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000,
        ]),
        '8' => Some([
            0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110,
        ]),
        '9' => Some([
            0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100,
        ]),
        ':' => Some([0, 0b00110, 0b00110, 0, 0b00110, 0b00110, 0]),
        '(' => Some([
            0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010,
        ]),
        ')' => Some([
            0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000,
        ]),
        '%' => Some([
            0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0b00000,
        ]),
        '-' => Some([0, 0, 0, 0b11111, 0, 0, 0]),
        '/' => Some([
            0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000,
        ]),
        '_' => Some([0, 0, 0, 0, 0, 0, 0b11111]),
        '.' => Some([0, 0, 0, 0, 0, 0b00110, 0b00110]),
        ' ' => Some([0, 0, 0, 0, 0, 0, 0]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::OverlaySurface;

    fn painted(surface: &PixelSurface) -> usize {
        surface.buffer.pixels().filter(|p| p[3] != 0).count()
    }

    #[test]
    fn painting_outside_the_surface_is_clipped() {
        let mut surface = PixelSurface::new(16, 16);
        surface.stroke_rect(-10, -10, 40, 40, 2, Rgba([255, 255, 255, 230]));
        surface.fill_circle(-4, 20, 8, Rgba([255, 120, 120, 242]));
        surface.draw_text(-3, 3, "Eyes: open", Rgba([255, 255, 255, 242]));
        assert!(painted(&surface) > 0);
    }

    #[test]
    fn stroke_rect_paints_the_border_only() {
        let mut surface = PixelSurface::new(32, 32);
        let color = Rgba([255, 255, 255, 230]);
        surface.stroke_rect(4, 4, 10, 10, 2, color);
        assert_eq!(*surface.buffer.get_pixel(4, 4), color);
        assert_eq!(*surface.buffer.get_pixel(13, 13), color);
        assert_eq!(*surface.buffer.get_pixel(5, 5), color);
        assert_eq!(surface.buffer.get_pixel(9, 9)[3], 0);
    }

    #[test]
    fn fill_circle_covers_the_center() {
        let mut surface = PixelSurface::new(32, 32);
        let color = Rgba([120, 255, 180, 242]);
        surface.fill_circle(16, 16, 8, color);
        assert_eq!(*surface.buffer.get_pixel(16, 16), color);
        assert_eq!(*surface.buffer.get_pixel(16, 24), color);
        assert_eq!(surface.buffer.get_pixel(16 + 8, 16 + 8)[3], 0);
    }

    #[test]
    fn draw_text_paints_above_the_baseline() {
        let mut surface = PixelSurface::new(64, 16);
        surface.draw_text(2, 10, "OK", Rgba([255, 255, 255, 242]));
        let above = surface
            .buffer
            .enumerate_pixels()
            .filter(|(_, y, p)| *y < 10 && p[3] != 0)
            .count();
        let below = surface
            .buffer
            .enumerate_pixels()
            .filter(|(_, y, p)| *y >= 10 && p[3] != 0)
            .count();
        assert!(above > 0);
        assert_eq!(below, 0);
    }

    #[test]
    fn clear_and_resize_drop_existing_paint() {
        let mut surface = PixelSurface::new(16, 16);
        surface.fill_circle(8, 8, 4, Rgba([255, 120, 120, 242]));
        assert!(painted(&surface) > 0);
        surface.clear();
        assert_eq!(painted(&surface), 0);

        surface.fill_circle(8, 8, 4, Rgba([255, 120, 120, 242]));
        surface.resize(24, 24);
        assert_eq!(surface.dimensions(), (24, 24));
        assert_eq!(painted(&surface), 0);
    }

    #[test]
    fn composite_blends_by_alpha() {
        let frame = RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0]));
        let mut surface = PixelSurface::new(4, 4);
        surface.put(1, 1, Rgba([255, 255, 255, 255]));
        let out = surface.composite_over(&frame);
        assert_eq!(*out.get_pixel(1, 1), image::Rgb([255, 255, 255]));
        assert_eq!(*out.get_pixel(0, 0), image::Rgb([0, 0, 0]));
    }

    #[test]
    fn present_writes_a_decodable_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotated.jpg");
        let mut surface = PixelSurface::with_sink(8, 8, path.clone(), 90);
        surface.fill_circle(4, 4, 2, Rgba([255, 120, 120, 242]));
        surface.present(&RgbImage::new(8, 8));
        let bytes = std::fs::read(&path).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 8);
    }

    #[test]
    fn present_without_a_sink_is_a_no_op() {
        let mut surface = PixelSurface::new(8, 8);
        surface.present(&RgbImage::new(8, 8));
    }
}
