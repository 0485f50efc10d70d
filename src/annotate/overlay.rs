//! Debug overlay rasterization: box outlines plus a class tag per box.

use image::{Rgb, RgbImage};

use super::record::BoundingBox2D;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const OUTLINE_WIDTH: u32 = 2;
const GLYPH_SCALE: u32 = 2;
const GLYPH_W: u32 = 3;
const GLYPH_H: u32 = 5;
const TAG_PADDING: u32 = 2;

/// Returns a copy of `image` with every non-absent box drawn on top.
pub fn draw_overlay(image: &RgbImage, boxes: &[BoundingBox2D]) -> RgbImage {
    let mut canvas = image.clone();
    for bbox in boxes {
        let Some(rect) = bbox.rect() else {
            continue;
        };
        let x0 = rect.xmin.floor().max(0.0) as i64;
        let y0 = rect.ymin.floor().max(0.0) as i64;
        let x1 = rect.xmax.ceil() as i64 - 1;
        let y1 = rect.ymax.ceil() as i64 - 1;
        draw_outline(&mut canvas, x0, y0, x1, y1);

        let text = format!("{} ({:.0}, {:.0})", bbox.class_id, rect.xmin, rect.ymin);
        draw_tag(&mut canvas, x0, y0, &text);
    }
    canvas
}

fn draw_outline(canvas: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64) {
    let t = OUTLINE_WIDTH as i64;
    fill_rect(canvas, x0, y0, x1, y0 + t - 1, BOX_COLOR);
    fill_rect(canvas, x0, y1 - t + 1, x1, y1, BOX_COLOR);
    fill_rect(canvas, x0, y0, x0 + t - 1, y1, BOX_COLOR);
    fill_rect(canvas, x1 - t + 1, y0, x1, y1, BOX_COLOR);
}

/// Tag sits above the box, or just inside it when the box touches the top edge.
fn draw_tag(canvas: &mut RgbImage, x0: i64, y0: i64, text: &str) {
    let advance = ((GLYPH_W + 1) * GLYPH_SCALE) as i64;
    let tag_w = text.chars().count() as i64 * advance + 2 * TAG_PADDING as i64;
    let tag_h = (GLYPH_H * GLYPH_SCALE + 2 * TAG_PADDING) as i64;
    let top = if y0 - tag_h < 0 { 0 } else { y0 - tag_h };
    fill_rect(canvas, x0, top, x0 + tag_w - 1, top + tag_h - 1, BOX_COLOR);

    let mut pen_x = x0 + TAG_PADDING as i64;
    let pen_y = top + TAG_PADDING as i64;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_W {
                    if bits & (0b100 >> col) != 0 {
                        let px = pen_x + (col * GLYPH_SCALE) as i64;
                        let py = pen_y + (row as u32 * GLYPH_SCALE) as i64;
                        let s = GLYPH_SCALE as i64;
                        fill_rect(canvas, px, py, px + s - 1, py + s - 1, TEXT_COLOR);
                    }
                }
            }
        }
        pen_x += advance;
    }
}

/// Inclusive, clipped to the canvas.
fn fill_rect(canvas: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let (w, h) = (canvas.width() as i64, canvas.height() as i64);
    let (x0, x1) = (x0.max(0), x1.min(w - 1));
    let (y0, y1) = (y0.max(0), y1.min(h - 1));
    if x0 > x1 || y0 > y1 {
        return;
    }
    for y in y0..=y1 {
        for x in x0..=x1 {
            canvas.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// 3x5 bitmaps, one byte per row, high bit on the left.
fn glyph(ch: char) -> Option<[u8; 5]> {
    let rows = match ch {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '(' => [0b010, 0b100, 0b100, 0b100, 0b010],
        ')' => [0b010, 0b001, 0b001, 0b001, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{PixelRect, Projection};

    fn boxed(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> BoundingBox2D {
        BoundingBox2D::new(
            0,
            "Cube",
            Projection::Visible {
                bbox: PixelRect {
                    xmin,
                    ymin,
                    xmax,
                    ymax,
                },
            },
        )
    }

    #[test]
    fn outlines_box_and_leaves_interior() {
        let base = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        let out = draw_overlay(&base, &[boxed(20.0, 40.0, 60.0, 80.0)]);
        assert_eq!(out.get_pixel(20, 60), &BOX_COLOR);
        assert_eq!(out.get_pixel(59, 60), &BOX_COLOR);
        assert_eq!(out.get_pixel(40, 79), &BOX_COLOR);
        assert_eq!(out.get_pixel(40, 60), &Rgb([0, 0, 0]));
        // Source image is untouched.
        assert_eq!(base.get_pixel(20, 60), &Rgb([0, 0, 0]));
    }

    #[test]
    fn tag_stays_inside_image_at_top_edge() {
        let base = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        let out = draw_overlay(&base, &[boxed(0.0, 0.0, 64.0, 64.0)]);
        let tag_pixels = out
            .enumerate_pixels()
            .filter(|(x, y, p)| *x > 1 && *y > 1 && *y < 14 && **p == TEXT_COLOR)
            .count();
        assert!(tag_pixels > 0);
    }

    #[test]
    fn absent_boxes_draw_nothing() {
        let base = RgbImage::from_pixel(10, 10, Rgb([1, 2, 3]));
        let out = draw_overlay(&base, &[BoundingBox2D::new(0, "Cube", Projection::Absent)]);
        assert_eq!(out, base);
    }
}
