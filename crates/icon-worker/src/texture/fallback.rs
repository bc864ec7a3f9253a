//! Procedural texture for inputs the decoder rejects.

use image::{Rgb, RgbImage};
use rand::Rng;

use super::{FALLBACK_BACKGROUND_COLOR, TEXTURE_SIZE};

pub const LINE_COUNT: usize = 10;

/// Fills the canvas with [`FALLBACK_BACKGROUND_COLOR`] and draws
/// [`LINE_COUNT`] random 1-px segments.
///
/// Per line the RNG is consulted for the endpoints (x0, y0, x1, y1) and then
/// the color (r, g, b), so a seeded RNG reproduces the same picture.
pub fn generate<R: Rng>(rng: &mut R) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(TEXTURE_SIZE, TEXTURE_SIZE, FALLBACK_BACKGROUND_COLOR);
    let max = TEXTURE_SIZE as i32 - 1;

    for _ in 0..LINE_COUNT {
        let from = (rng.random_range(0..=max), rng.random_range(0..=max));
        let to = (rng.random_range(0..=max), rng.random_range(0..=max));
        let color = Rgb([
            rng.random_range(100..=200),
            rng.random_range(100..=200),
            rng.random_range(150..=220),
        ]);
        draw_line(&mut canvas, from, to, color);
    }

    canvas
}

/// Bresenham line, endpoints inclusive. Points outside the canvas are skipped.
pub fn draw_line(canvas: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let (x1, y1) = to;
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
            canvas.put_pixel(x as u32, y as u32, color);
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
