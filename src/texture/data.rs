//! Raw RGBA texture data and its encodings.

use crate::error::{Result, SceneError};
use base64::Engine;
use image::ImageEncoder;

/// Logical size of every block texture, in pixels.
pub const TEXTURE_SIZE: u32 = 16;

/// Raw texture data in RGBA8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Texture width in pixels.
    pub width: u32,
    /// Texture height in pixels.
    pub height: u32,
    /// RGBA8 pixel data (4 bytes per pixel).
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Create a new texture from RGBA data.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Create a block-sized texture filled with one colour.
    pub fn filled(color: [u8; 4]) -> Self {
        let pixels = (0..TEXTURE_SIZE * TEXTURE_SIZE)
            .flat_map(|_| color.iter().copied())
            .collect();
        Self::new(TEXTURE_SIZE, TEXTURE_SIZE, pixels)
    }

    /// Whether any pixel is less than fully opaque.
    pub fn has_transparency(&self) -> bool {
        self.pixels.iter().skip(3).step_by(4).any(|&alpha| alpha != u8::MAX)
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// RGBA at column `x`, row `y`; row 0 is the top of the face.
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let start = self.offset(x, y);
        let mut rgba = [0; 4];
        rgba.copy_from_slice(&self.pixels[start..start + 4]);
        rgba
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let start = self.offset(x, y);
        self.pixels[start..start + 4].copy_from_slice(&rgba);
    }

    /// Encode the texture as PNG bytes.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let expected = (self.width * self.height * 4) as usize;
        if self.pixels.len() != expected {
            return Err(SceneError::Assembly(format!(
                "texture has {} bytes, expected {} for {}x{}",
                self.pixels.len(),
                expected,
                self.width,
                self.height
            )));
        }

        let mut bytes = Vec::new();
        let cursor = std::io::Cursor::new(&mut bytes);
        let encoder = image::codecs::png::PngEncoder::new(cursor);

        encoder.write_image(
            &self.pixels,
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
        )?;

        Ok(bytes)
    }

    /// Encode the texture as a `data:image/png;base64,...` URI.
    pub fn to_data_uri(&self) -> Result<String> {
        let png = self.to_png()?;
        Ok(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        ))
    }
}
