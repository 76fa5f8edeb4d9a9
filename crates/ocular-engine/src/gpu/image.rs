use std::path::Path;

use crate::coords::Shape;
use crate::error::Result;

use super::PixelFormat;

/// A decoded image as handed over by the codec.
///
/// `bytes` is tightly packed, row-major, top row first, with channels in
/// native endianness.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub bit_depth: u32,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    /// Decodes the image file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let img = image::open(path)?;
        Ok(Self::from_dynamic(&img))
    }

    pub fn from_dynamic(img: &image::DynamicImage) -> Self {
        let color = img.color();
        let channels = color.channel_count() as u32;
        Self {
            width: img.width(),
            height: img.height(),
            channels,
            bit_depth: color.bits_per_pixel() as u32 / channels.max(1),
            bytes: img.as_bytes().to_vec(),
        }
    }

    pub fn shape(&self) -> Shape {
        Shape::new(self.width, self.height)
    }

    /// Fails if the codec produced a layout the texture layer cannot store.
    pub fn format(&self) -> Result<PixelFormat> {
        PixelFormat::new(self.channels, self.bit_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn rgb8_image_reports_three_channels() {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(3, 2));
        let decoded = DecodedImage::from_dynamic(&img);
        assert_eq!(decoded.shape(), Shape::new(3, 2));
        assert_eq!(decoded.format().unwrap(), PixelFormat::new(3, 8).unwrap());
        assert_eq!(decoded.bytes.len(), 18);
    }

    #[test]
    fn sixteen_bit_luma_reports_bit_depth() {
        let img = image::DynamicImage::ImageLuma16(image::ImageBuffer::new(4, 4));
        let decoded = DecodedImage::from_dynamic(&img);
        assert_eq!(decoded.bit_depth, 16);
        assert_eq!(decoded.bytes.len(), 32);
    }

    #[test]
    fn bogus_metadata_is_rejected() {
        let decoded = DecodedImage {
            width: 1,
            height: 1,
            channels: 6,
            bit_depth: 8,
            bytes: vec![0; 6],
        };
        assert!(matches!(decoded.format(), Err(Error::InvalidChannelCount(6))));
    }
}
