//! Capture backend abstraction.
//!
//! A backend turns "take a picture now" into PNG bytes:
//! - browser drivers capture the open page (viewport or full page)
//! - `MockFramebuffer` renders placeholder images for dry runs and tests

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{ImageBuffer, RgbImage};
use std::io::Cursor;

use super::types::{CaptureError, CaptureResult};

/// Glyph size of the built-in font
const GLYPH_SIZE: u32 = 8;

/// Result of a capture operation
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// PNG-encoded image data
    pub image_data: Vec<u8>,
}

/// Trait for capture backends
pub trait CaptureBackend: Send {
    /// Capture the current visual state.
    ///
    /// `full_page` asks for the whole scrollable surface; backends without
    /// scrolling treat it as a taller canvas or ignore it.
    fn capture(&mut self, full_page: bool) -> CaptureResult<CapturedImage>;

    /// Source type identifier (e.g. "playwright", "mock")
    fn source_type(&self) -> &str;
}

/// A virtual RGB framebuffer with a small drawing API.
#[derive(Debug, Clone)]
pub struct MockFramebuffer {
    width: u32,
    height: u32,
    /// Row-major, 3 bytes per pixel
    buffer: Vec<u8>,
}

impl MockFramebuffer {
    /// Create a framebuffer filled with `background`
    pub fn new(width: u32, height: u32, background: [u8; 3]) -> Self {
        let mut fb = Self {
            width,
            height,
            buffer: vec![0u8; width as usize * height as usize * 3],
        };
        fb.fill(background);
        fb
    }

    /// Load a framebuffer from PNG image bytes
    pub fn from_png_bytes(data: &[u8]) -> CaptureResult<Self> {
        let rgb = image::load_from_memory(data)?.to_rgb8();
        Ok(Self {
            width: rgb.width(),
            height: rgb.height(),
            buffer: rgb.into_raw(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Fill the entire framebuffer with a color
    pub fn fill(&mut self, color: [u8; 3]) {
        for chunk in self.buffer.chunks_exact_mut(3) {
            chunk.copy_from_slice(&color);
        }
    }

    /// Draw a filled rectangle, clipped to the framebuffer
    pub fn draw_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
        for py in y..y.saturating_add(h).min(self.height) {
            for px in x..x.saturating_add(w).min(self.width) {
                self.set_pixel(px, py, color);
            }
        }
    }

    /// Draw a single line of text; characters past the right edge are dropped.
    pub fn draw_text(&mut self, x: u32, y: u32, text: &str, fg: [u8; 3]) {
        let mut cursor_x = x;
        for ch in text.chars() {
            if cursor_x >= self.width {
                break;
            }
            self.draw_char(cursor_x, y, ch, fg);
            cursor_x += GLYPH_SIZE;
        }
    }

    /// Draw lines of text starting at `(x, y)`, one glyph row plus spacing each.
    ///
    /// Returns the y coordinate below the last line drawn.
    pub fn draw_lines<'a>(
        &mut self,
        x: u32,
        y: u32,
        lines: impl IntoIterator<Item = &'a str>,
        fg: [u8; 3],
    ) -> u32 {
        let mut cursor_y = y;
        for line in lines {
            if cursor_y + GLYPH_SIZE > self.height {
                break;
            }
            self.draw_text(x, cursor_y, line, fg);
            cursor_y += GLYPH_SIZE + 4;
        }
        cursor_y
    }

    fn draw_char(&mut self, x: u32, y: u32, ch: char, fg: [u8; 3]) {
        let glyph = BASIC_FONTS.get(ch).unwrap_or([0u8; 8]);
        for (row_idx, row) in glyph.iter().enumerate() {
            for bit in 0..GLYPH_SIZE {
                // font8x8 stores LSB as leftmost pixel
                if (row >> bit) & 1 == 1 {
                    self.set_pixel(x + bit, y + row_idx as u32, fg);
                }
            }
        }
    }

    /// Get the color of a pixel; out-of-bounds reads are black
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        match self.offset(x, y) {
            Some(idx) => [self.buffer[idx], self.buffer[idx + 1], self.buffer[idx + 2]],
            None => [0, 0, 0],
        }
    }

    /// Set the color of a pixel; out-of-bounds writes are ignored
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if let Some(idx) = self.offset(x, y) {
            self.buffer[idx..idx + 3].copy_from_slice(&color);
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| (y as usize * self.width as usize + x as usize) * 3)
    }

    /// Encode the framebuffer as PNG bytes
    pub fn to_png(&self) -> CaptureResult<Vec<u8>> {
        let img: RgbImage = ImageBuffer::from_raw(self.width, self.height, self.buffer.clone())
            .ok_or_else(|| CaptureError::Encode("buffer size does not match dimensions".into()))?;
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }
}

impl CaptureBackend for MockFramebuffer {
    fn capture(&mut self, _full_page: bool) -> CaptureResult<CapturedImage> {
        Ok(CapturedImage {
            image_data: self.to_png()?,
        })
    }

    fn source_type(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framebuffer_fill_and_rect() {
        let mut fb = MockFramebuffer::new(20, 20, [0, 0, 0]);
        fb.draw_rect(5, 5, 10, 10, [255, 0, 0]);

        assert_eq!(fb.get_pixel(4, 4), [0, 0, 0]);
        assert_eq!(fb.get_pixel(5, 5), [255, 0, 0]);
        assert_eq!(fb.get_pixel(14, 14), [255, 0, 0]);
        assert_eq!(fb.get_pixel(15, 15), [0, 0, 0]);
    }

    #[test]
    fn test_rect_is_clipped() {
        let mut fb = MockFramebuffer::new(10, 10, [0, 0, 0]);
        fb.draw_rect(8, 8, 100, 100, [1, 2, 3]);
        assert_eq!(fb.get_pixel(9, 9), [1, 2, 3]);
        assert_eq!(fb.get_pixel(10, 10), [0, 0, 0]);
    }

    #[test]
    fn test_draw_lines_advances_cursor() {
        let mut fb = MockFramebuffer::new(80, 40, [0, 0, 0]);
        let end = fb.draw_lines(0, 0, ["Hi", "There"], [255, 255, 255]);
        assert_eq!(end, 24);

        let lit = (0..8).any(|y| (0..8).any(|x| fb.get_pixel(x, y) == [255, 255, 255]));
        assert!(lit, "'H' should light some pixels");
    }

    #[test]
    fn test_capture_produces_png() {
        let mut fb = MockFramebuffer::new(32, 32, [100, 150, 200]);
        let result = fb.capture(false).unwrap();

        assert_eq!(&result.image_data[0..4], &[0x89, 0x50, 0x4E, 0x47]);
        let back = MockFramebuffer::from_png_bytes(&result.image_data).unwrap();
        assert_eq!(back.width(), 32);
        assert_eq!(back.get_pixel(3, 3), [100, 150, 200]);
    }
}
