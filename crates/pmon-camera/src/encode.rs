//! Frame encoding for the archive.

use image::{codecs::jpeg::JpegEncoder, ExtendedColorType, ImageEncoder};

use pmon_core::{Error, Result};

/// A decoded RGB8 frame straight off the camera.
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    const BYTES_PER_PIXEL: usize = 3;

    fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * Self::BYTES_PER_PIXEL
    }
}

/// Encode an RGB8 frame as JPEG.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>> {
    if frame.width == 0 || frame.height == 0 {
        return Err(Error::Device(format!(
            "empty frame ({}x{})",
            frame.width, frame.height
        )));
    }
    if frame.data.len() != frame.expected_len() {
        return Err(Error::Device(format!(
            "frame buffer is {} bytes, expected {} for {}x{} RGB",
            frame.data.len(),
            frame.expected_len(),
            frame.width,
            frame.height
        )));
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .write_image(
            &frame.data,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| Error::Device(format!("jpeg encoding failed: {e}")))?;
    Ok(out)
}
