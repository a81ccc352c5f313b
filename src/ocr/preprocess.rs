//! Image decoding and tensor preparation for text recognition.

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use std::io::Cursor;

/// Decode an in-memory image and undo the camera's EXIF rotation.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let img = image::load_from_memory(bytes).context("Failed to decode image")?;
    Ok(apply_orientation(img, read_exif_orientation(bytes)))
}

/// EXIF orientation tag (1-8), 1 when absent or unreadable.
fn read_exif_orientation(bytes: &[u8]) -> u16 {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(e) => e,
        Err(_) => return 1,
    };

    if let Some(field) = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY) {
        if let exif::Value::Short(ref v) = field.value {
            if let Some(&orientation) = v.first() {
                return orientation;
            }
        }
    }

    1
}

fn apply_orientation(img: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Split images much taller than wide into horizontal strips of roughly
/// square aspect, top to bottom. Other images are returned whole.
///
/// At most `max_tiles` strips are produced; past that the strips get taller.
pub fn split_into_strips(
    img: &DynamicImage,
    tile_aspect: f32,
    max_tiles: u32,
) -> Vec<DynamicImage> {
    let (width, height) = img.dimensions();
    if width == 0 || (height as f32) <= tile_aspect.max(1.0) * width as f32 {
        return vec![img.clone()];
    }

    let count = height.div_ceil(width).min(max_tiles.max(1));
    let strip_height = height.div_ceil(count);

    (0..count)
        .map(|i| i * strip_height)
        .take_while(|&y| y < height)
        .map(|y| img.crop_imm(0, y, width, strip_height.min(height - y)))
        .collect()
}

/// Resize to `size`×`size` RGB and lay out as normalized NCHW floats in [-1, 1].
pub fn pixel_values(img: &DynamicImage, size: u32) -> Vec<f32> {
    let rgb = img
        .resize_exact(size, size, FilterType::CatmullRom)
        .to_rgb8();
    let plane = (size * size) as usize;
    let mut input = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = y as usize * size as usize + x as usize;
        for channel in 0..3 {
            input[channel * plane + idx] = (pixel[channel] as f32 / 255.0 - 0.5) / 0.5;
        }
    }

    input
}
