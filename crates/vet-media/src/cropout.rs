//! Cropout generation: rectangle coercion, cropping and blob naming.

use image::DynamicImage;
use uuid::Uuid;

use crate::error::MediaResult;

/// Characters replaced with `_` when a thumbnail URL becomes a blob name.
const CHARS_TO_REPLACE_IN_IMAGE_NAME: &[char] = &[':', '/', '.', '?', '#', '&', '=', '+'];

/// Crop a rectangle out of an image.
///
/// Coordinate units are resolved in this order, because different annotation
/// sources populate the same fields with different units and callers must
/// not pre-normalize:
/// 1. Bottom-right (0, 0) is the sentinel for "no crop": the full image is
///    returned unmodified.
/// 2. If all four coordinates are <= 1 they are relative and get scaled by
///    the image dimensions.
/// 3. Otherwise they are already absolute pixels.
pub fn cropout_from_image(
    image: &DynamicImage,
    top_left_x: f64,
    top_left_y: f64,
    bottom_right_x: f64,
    bottom_right_y: f64,
) -> DynamicImage {
    let width = image.width() as f64;
    let height = image.height() as f64;

    if bottom_right_x == 0.0 && bottom_right_y == 0.0 {
        return image.clone();
    }

    let (tlx, tly, brx, bry) = if top_left_x <= 1.0
        && top_left_y <= 1.0
        && bottom_right_x <= 1.0
        && bottom_right_y <= 1.0
    {
        (
            top_left_x * width,
            top_left_y * height,
            bottom_right_x * width,
            bottom_right_y * height,
        )
    } else {
        (top_left_x, top_left_y, bottom_right_x, bottom_right_y)
    };

    let x = tlx.max(0.0).min(width) as u32;
    let y = tly.max(0.0).min(height) as u32;
    let crop_w = (brx.max(0.0).min(width) as u32).saturating_sub(x);
    let crop_h = (bry.max(0.0).min(height) as u32).saturating_sub(y);

    image.crop_imm(x, y, crop_w, crop_h)
}

/// Generate a blob name for a cropout: `{label}-{6-hex-suffix}-{sanitized url}`.
///
/// Sanitization is cosmetic; uniqueness comes from the random suffix.
pub fn cropout_file_name(thumbnail_url: &str, label: &str) -> String {
    let mut sanitized: String = thumbnail_url
        .chars()
        .map(|c| {
            if CHARS_TO_REPLACE_IN_IMAGE_NAME.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    while sanitized.contains("__") {
        sanitized = sanitized.replace("__", "_");
    }

    let hex = Uuid::new_v4().simple().to_string();
    let suffix = &hex[hex.len() - 6..];

    format!("{label}-{suffix}-{sanitized}")
}

/// Encode an image as JPEG bytes for the object store.
pub fn encode_jpeg(image: &DynamicImage) -> MediaResult<Vec<u8>> {
    let mut buf = std::io::Cursor::new(Vec::new());
    // JPEG has no alpha channel; flatten first.
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    rgb.write_to(&mut buf, image::ImageOutputFormat::Jpeg(90))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use image::{GenericImageView, Rgb, RgbImage};

    use super::*;

    fn gradient_image(w: u32, h: u32) -> DynamicImage {
        let mut img = RgbImage::new(w, h);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgb([(x % 256) as u8, (y % 256) as u8, 7]);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_zero_sentinel_returns_full_image() {
        for (w, h) in [(8, 8), (640, 480), (1, 1)] {
            let img = gradient_image(w, h);
            let out = cropout_from_image(&img, 0.25, 0.25, 0.0, 0.0);
            assert_eq!(out.dimensions(), (w, h));
            assert_eq!(out.to_rgb8().as_raw(), img.to_rgb8().as_raw());
        }
    }

    #[test]
    fn test_relative_coordinates_scale_by_dimensions() {
        let img = gradient_image(200, 100);
        let out = cropout_from_image(&img, 0.1, 0.2, 0.5, 0.8);
        // (0.1*200, 0.2*100) .. (0.5*200, 0.8*100) = (20,20)..(100,80)
        assert_eq!(out.dimensions(), (80, 60));
        assert_eq!(out.to_rgb8().get_pixel(0, 0), img.to_rgb8().get_pixel(20, 20));
    }

    #[test]
    fn test_absolute_coordinates_pass_through() {
        let img = gradient_image(200, 100);
        let out = cropout_from_image(&img, 10.0, 5.0, 60.0, 45.0);
        assert_eq!(out.dimensions(), (50, 40));
        assert_eq!(out.to_rgb8().get_pixel(0, 0), img.to_rgb8().get_pixel(10, 5));
    }

    #[test]
    fn test_any_value_above_one_disables_scaling() {
        let img = gradient_image(200, 100);
        // bottom_right_x of 150 makes the whole tuple absolute.
        let out = cropout_from_image(&img, 0.0, 0.0, 150.0, 50.0);
        assert_eq!(out.dimensions(), (150, 50));
    }

    #[test]
    fn test_crop_clamped_to_image_bounds() {
        let img = gradient_image(100, 100);
        let out = cropout_from_image(&img, 50.0, 50.0, 500.0, 500.0);
        assert_eq!(out.dimensions(), (50, 50));
    }

    #[test]
    fn test_file_name_shape() {
        let name = cropout_file_name("https://i.ytimg.com/vi/abc/hq720.jpg", "Face");
        let expected_tail = "https_i_ytimg_com_vi_abc_hq720_jpg";

        let rest = name.strip_prefix("Face-").unwrap();
        let (suffix, tail) = rest.split_at(6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(tail, format!("-{expected_tail}"));
    }

    #[test]
    fn test_file_name_suffix_is_random() {
        let a = cropout_file_name("https://x/y.jpg", "Person");
        let b = cropout_file_name("https://x/y.jpg", "Person");
        assert_ne!(a, b);
    }

    #[test]
    fn test_encode_jpeg_produces_jpeg_magic() {
        let img = gradient_image(16, 16);
        let bytes = encode_jpeg(&img).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }
}
