use anyhow::{anyhow, Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{Delay, DynamicImage, Frame, RgbImage};
use std::path::Path;

use super::write_atomic;

pub const FRAME_DELAY_MS: u32 = 500;

/// Encodes `frames` as a looping GIF at `path`.
///
/// Frames that differ in size from the first one are resized to match it.
pub fn write_animation(path: &Path, frames: &[&RgbImage]) -> Result<()> {
    let first = frames
        .first()
        .ok_or_else(|| anyhow!("no frames to animate"))?;
    let (width, height) = first.dimensions();

    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        encoder.set_repeat(Repeat::Infinite)?;
        for frame in frames {
            let rgba = if frame.dimensions() == (width, height) {
                DynamicImage::ImageRgb8((*frame).clone()).to_rgba8()
            } else {
                let resized = imageops::resize(*frame, width, height, FilterType::Triangle);
                DynamicImage::ImageRgb8(resized).to_rgba8()
            };
            encoder
                .encode_frame(Frame::from_parts(
                    rgba,
                    0,
                    0,
                    Delay::from_numer_denom_ms(FRAME_DELAY_MS, 1),
                ))
                .context("encoding animation frame")?;
        }
    }
    write_atomic(path, &buf)
}
