//! Texture synthesis: arbitrary uploaded bytes in, a 64x64 RGB PNG out.
//!
//! The engine is pure. It performs no I/O and holds no state; the only
//! source of variation is the caller-supplied RNG, which is consulted
//! exclusively when the input cannot be decoded.
//!
//! Both paths share the same finishing steps:
//!
//! 1. build a 64x64 canvas ([`compose`] for decodable images, [`fallback`] otherwise)
//! 2. Gaussian blur (sigma 0.5) over the whole canvas
//! 3. 1-pixel border in [`BORDER_COLOR`], drawn over the blurred edge
//! 4. PNG encoding

pub mod compose;
pub mod fallback;

use std::io::Cursor;

use image::{imageops, ImageFormat, Rgb, RgbImage};
use rand::Rng;
use thiserror::Error;
use tracing::debug;

/// Width and height of every texture, in pixels.
pub const TEXTURE_SIZE: u32 = 64;
/// Canvas color behind a successfully decoded image.
pub const BACKGROUND_COLOR: Rgb<u8> = Rgb([30, 30, 50]);
/// Canvas color of the procedural fallback.
pub const FALLBACK_BACKGROUND_COLOR: Rgb<u8> = Rgb([50, 50, 80]);
pub const BORDER_COLOR: Rgb<u8> = Rgb([100, 150, 255]);
pub const BLUR_SIGMA: f32 = 0.5;
pub const TEXTURE_CONTENT_TYPE: &str = "image/png";

#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Failed to encode texture as PNG: {0}")]
    Encode(#[from] image::ImageError),
}

/// Which branch produced the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSource {
    Decoded,
    Fallback,
}

/// Renders the texture without encoding it.
pub fn render<R: Rng>(bytes: &[u8], rng: &mut R) -> (RgbImage, TextureSource) {
    let (canvas, source) = match image::load_from_memory(bytes) {
        Ok(decoded) => (compose::compose(&decoded), TextureSource::Decoded),
        Err(e) => {
            debug!(len = bytes.len(), error = %e, "input not decodable, using fallback texture");
            (fallback::generate(rng), TextureSource::Fallback)
        }
    };

    let mut canvas = imageops::blur(&canvas, BLUR_SIGMA);
    draw_border(&mut canvas, BORDER_COLOR);

    (canvas, source)
}

/// Synthesizes the PNG-encoded texture for `bytes`.
///
/// Never panics on bad input: anything the decoder rejects (empty, truncated,
/// not an image) takes the fallback path.
pub fn synthesize<R: Rng>(bytes: &[u8], rng: &mut R) -> Result<Vec<u8>, TextureError> {
    let (canvas, _) = render(bytes, rng);
    encode_png(&canvas)
}

/// [`synthesize`] with the thread-local RNG.
pub fn synthesize_with_thread_rng(bytes: &[u8]) -> Result<Vec<u8>, TextureError> {
    synthesize(bytes, &mut rand::rng())
}

pub fn encode_png(canvas: &RgbImage) -> Result<Vec<u8>, TextureError> {
    let mut out = Vec::new();
    canvas.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}

fn draw_border(canvas: &mut RgbImage, color: Rgb<u8>) {
    let (w, h) = canvas.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    for x in 0..w {
        canvas.put_pixel(x, 0, color);
        canvas.put_pixel(x, h - 1, color);
    }
    for y in 0..h {
        canvas.put_pixel(0, y, color);
        canvas.put_pixel(w - 1, y, color);
    }
}
