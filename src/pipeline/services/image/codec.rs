use std::io::Cursor;

use image::{GrayImage, ImageFormat, Luma, RgbImage};

use crate::error::AppError;

/// Decode any supported format into a 3-channel buffer. Alpha is dropped.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, AppError> {
    let image = image::load_from_memory(bytes).map_err(AppError::Decode)?;
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(AppError::InvalidImage { width, height });
    }
    Ok(rgb)
}

/// BT.601 luma in 14-bit fixed point, rounding half up.
pub fn to_luma(image: &RgbImage) -> GrayImage {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let luma = (u32::from(r) * R + u32::from(g) * G + u32::from(b) * B + (1 << 13)) >> 14;
        Luma([luma as u8])
    })
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, AppError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(AppError::Encode)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_png_round_trip() {
        let image = RgbImage::from_fn(17, 9, |x, y| Rgb([x as u8 * 10, y as u8 * 20, 7]));
        let decoded = decode_image(&encode_png(&image).unwrap()).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(AppError::Decode(_))
        ));
        assert!(matches!(decode_image(&[]), Err(AppError::Decode(_))));
    }

    #[test]
    fn test_luma_uses_bt601_weights() {
        let image = RgbImage::from_fn(5, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 90, 0]),
            2 => Rgb([0, 0, 255]),
            3 => Rgb([255, 255, 255]),
            _ => Rgb([0, 0, 0]),
        });
        let luma: Vec<u8> = to_luma(&image).pixels().map(|p| p[0]).collect();
        assert_eq!(luma, vec![76, 53, 29, 255, 0]);
    }
}
