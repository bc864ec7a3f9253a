//! Success path: fit a decoded image onto the dark canvas.

use image::{imageops, imageops::FilterType, DynamicImage, Rgb, RgbImage};

use super::{BACKGROUND_COLOR, TEXTURE_SIZE};

/// Places `decoded` centered on a `TEXTURE_SIZE` square canvas.
///
/// Images with an alpha channel are flattened against [`BACKGROUND_COLOR`]
/// first, then downscaled (never upscaled) with Lanczos3 so the larger side
/// fits.
pub fn compose(decoded: &DynamicImage) -> RgbImage {
    let rgb = if decoded.color().has_alpha() {
        flatten_alpha(decoded, BACKGROUND_COLOR)
    } else {
        decoded.to_rgb8()
    };

    let (w, h) = fit_within(rgb.width(), rgb.height(), TEXTURE_SIZE);
    let thumb = if (w, h) == rgb.dimensions() {
        rgb
    } else {
        imageops::resize(&rgb, w, h, FilterType::Lanczos3)
    };

    let mut canvas = RgbImage::from_pixel(TEXTURE_SIZE, TEXTURE_SIZE, BACKGROUND_COLOR);
    let x = (TEXTURE_SIZE - thumb.width()) / 2;
    let y = (TEXTURE_SIZE - thumb.height()) / 2;
    imageops::replace(&mut canvas, &thumb, x as i64, y as i64);
    canvas
}

/// Target dimensions that fit inside a `max` x `max` box.
///
/// Aspect ratio is preserved, each side is rounded and at least 1, and
/// images already inside the box are returned unchanged.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = max as f64 / width.max(height) as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max);
    (scaled(width), scaled(height))
}

fn flatten_alpha(image: &DynamicImage, background: Rgb<u8>) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let alpha = px.0[3] as u32;
        let blend = |c: u8, bg: u8| ((alpha * c as u32 + (255 - alpha) * bg as u32 + 127) / 255) as u8;
        out.put_pixel(
            x,
            y,
            Rgb([
                blend(px.0[0], background.0[0]),
                blend(px.0[1], background.0[1]),
                blend(px.0[2], background.0[2]),
            ]),
        );
    }
    out
}
