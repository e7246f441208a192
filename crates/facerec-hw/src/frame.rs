//! Frame type and pixel conversion — YUYV/MJPG to RGB, dark detection.

use image::RgbImage;

/// A captured colour camera frame.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub sequence: u32,
    /// Nearly all pixels are black (lens covered, sensor still warming up).
    pub is_dark: bool,
}

impl Frame {
    /// Wrap an image, computing the dark flag.
    pub fn new(image: RgbImage, sequence: u32) -> Self {
        let is_dark = is_dark_frame(&image, DARK_FRAME_RATIO);
        Self {
            image,
            sequence,
            is_dark,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Fraction of near-black pixels at or above which a frame counts as dark.
pub const DARK_FRAME_RATIO: f32 = 0.95;

/// Convert packed YUYV (4:2:2) to RGB using BT.601 studio-swing coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U/V.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (u, v) = (chunk[1], chunk[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(chunk[0], u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(chunk[2], u, v));
    }

    RgbImage::from_raw(width, height, rgb).ok_or(FrameError::InvalidLength {
        expected,
        actual: yuyv.len(),
    })
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}

/// Decode one Motion-JPEG buffer.
pub fn mjpeg_to_rgb(jpeg: &[u8]) -> Result<RgbImage, FrameError> {
    let decoded = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg)?;
    Ok(decoded.to_rgb8())
}

/// True if at least `threshold_pct` of pixels have luma below 32.
pub fn is_dark_frame(image: &RgbImage, threshold_pct: f32) -> bool {
    let total = image.width() as usize * image.height() as usize;
    if total == 0 {
        return true;
    }
    let dark = image
        .pixels()
        .filter(|p| {
            let [r, g, b] = p.0;
            // integer BT.601 luma
            (77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8 < 32
        })
        .count();
    (dark as f32 / total as f32) >= threshold_pct
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("MJPG decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_yuyv_white_and_black() {
        // 2x1 image: Y0=235 (white), Y1=16 (black), neutral chroma
        let yuyv = vec![235, 128, 16, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_yuyv_red_chroma() {
        // Strong V pushes red up and green down
        let yuyv = vec![81, 90, 81, 240];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        let [r, g, b] = rgb.get_pixel(0, 0).0;
        assert!(r > 200 && g < 50 && b < 50, "got ({r}, {g}, {b})");
    }

    #[test]
    fn test_yuyv_invalid_length() {
        assert!(yuyv_to_rgb(&[100, 128], 2, 1).is_err());
    }

    #[test]
    fn test_mjpeg_round_trip_dimensions() {
        let src = RgbImage::from_pixel(16, 8, Rgb([200, 100, 50]));
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90)
            .encode_image(&src)
            .unwrap();
        let decoded = mjpeg_to_rgb(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (16, 8));
    }

    #[test]
    fn test_mjpeg_garbage_is_error() {
        assert!(mjpeg_to_rgb(b"not a jpeg").is_err());
    }

    #[test]
    fn test_dark_frame_all_black() {
        assert!(is_dark_frame(&RgbImage::new(10, 10), DARK_FRAME_RATIO));
    }

    #[test]
    fn test_dark_frame_normal() {
        let img = RgbImage::from_pixel(10, 10, Rgb([128, 128, 128]));
        assert!(!is_dark_frame(&img, DARK_FRAME_RATIO));
    }

    #[test]
    fn test_dark_frame_empty() {
        assert!(is_dark_frame(&RgbImage::new(0, 0), DARK_FRAME_RATIO));
    }

    #[test]
    fn test_dark_frame_borderline() {
        // 94 dark + 6 bright → not dark; 95 or 96 dark → dark
        let mut img = RgbImage::new(100, 1);
        for x in 94..100 {
            img.put_pixel(x, 0, Rgb([200, 200, 200]));
        }
        assert!(!is_dark_frame(&img, DARK_FRAME_RATIO));

        let mut img = RgbImage::new(100, 1);
        for x in 95..100 {
            img.put_pixel(x, 0, Rgb([200, 200, 200]));
        }
        assert!(is_dark_frame(&img, DARK_FRAME_RATIO));

        let mut img = RgbImage::new(100, 1);
        for x in 96..100 {
            img.put_pixel(x, 0, Rgb([200, 200, 200]));
        }
        assert!(is_dark_frame(&img, DARK_FRAME_RATIO));
    }

    #[test]
    fn test_frame_new_sets_dark_flag() {
        let frame = Frame::new(RgbImage::new(4, 4), 7);
        assert!(frame.is_dark);
        assert_eq!(frame.sequence, 7);
        assert_eq!((frame.width(), frame.height()), (4, 4));
    }
}
