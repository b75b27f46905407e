//! Frame data structures for decoded video content

use std::time::Instant;

use image::RgbImage;

use super::SourceError;

/// A decoded video frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw BGR pixel data, row-major, 3 bytes per pixel
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// 0-based position in the source
    pub index: u64,
    /// Timestamp when the frame was decoded
    pub timestamp: Instant,
}

impl Frame {
    /// Create a frame from BGR bytes, checking the buffer matches the dimensions
    pub fn from_bgr(data: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self, SourceError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(SourceError::Decode(format!(
                "frame {} has {} bytes, expected {} for {}x{} BGR",
                index,
                data.len(),
                expected,
                width,
                height
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            index,
            timestamp: Instant::now(),
        })
    }

    /// Create a frame from an RGB image
    pub fn from_rgb_image(image: &RgbImage, index: u64) -> Self {
        let (width, height) = image.dimensions();
        let mut data = image.as_raw().clone();
        swap_red_blue(&mut data);

        Self {
            data,
            width,
            height,
            index,
            timestamp: Instant::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel data reordered to RGB
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let mut rgb = self.data.clone();
        swap_red_blue(&mut rgb);
        rgb
    }

    /// Convert to an RGB image for display and inference
    pub fn to_rgb_image(&self) -> RgbImage {
        // Length is checked on construction
        RgbImage::from_raw(self.width, self.height, self.to_rgb_bytes())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}

/// Swap channel 0 and 2 of every 3-byte pixel (BGR <-> RGB)
fn swap_red_blue(data: &mut [u8]) {
    for pixel in data.chunks_exact_mut(3) {
        pixel.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_from_bgr_checks_length() {
        assert!(Frame::from_bgr(vec![0; 12], 2, 2, 0).is_ok());
        assert!(Frame::from_bgr(vec![0; 11], 2, 2, 0).is_err());
    }

    #[test]
    fn test_rgb_conversion_swaps_channels() {
        let mut image = RgbImage::new(1, 1);
        image.put_pixel(0, 0, Rgb([10, 20, 30]));

        let frame = Frame::from_rgb_image(&image, 3);
        assert_eq!(frame.data, vec![30, 20, 10]);
        assert_eq!(frame.index, 3);
        assert_eq!(frame.dimensions(), (1, 1));

        let back = frame.to_rgb_image();
        assert_eq!(back.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }
}
