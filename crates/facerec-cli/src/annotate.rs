//! Draw face boxes and name labels onto preview frames.
//!
//! Labels use a built-in 5×7 bitmap font so no font file has to ship with
//! the binary. Letters keep their case so usernames that differ only in
//! case stay distinguishable; unsupported characters render as `?`.

use facerec_core::BoundingBox;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const BOX_THICKNESS: i32 = 2;

const GLYPH_W: i32 = 5;
const GLYPH_H: i32 = 7;
const GLYPH_SCALE: i32 = 2;
const GLYPH_ADVANCE: i32 = (GLYPH_W + 1) * GLYPH_SCALE;
/// Gap between the label baseline and the top of the box.
const LABEL_GAP: i32 = 4;

/// Outline a detected face.
pub fn draw_face_box(image: &mut RgbImage, region: &BoundingBox) {
    let x = region.x.round() as i32;
    let y = region.y.round() as i32;
    let w = region.width.round().max(1.0) as u32;
    let h = region.height.round().max(1.0) as u32;

    for inset in 0..BOX_THICKNESS {
        let grow = 2 * inset as u32;
        if w <= grow || h <= grow {
            break;
        }
        let rect = Rect::at(x + inset, y + inset).of_size(w - grow, h - grow);
        draw_hollow_rect_mut(image, rect, BOX_COLOR);
    }
}

/// Outline a face and write `label` just above it (or inside, at the top edge).
pub fn draw_labelled_face(image: &mut RgbImage, region: &BoundingBox, label: &str) {
    draw_face_box(image, region);

    let text_h = GLYPH_H * GLYPH_SCALE;
    let x = (region.x.round() as i32).max(0);
    let above = region.y.round() as i32 - LABEL_GAP - text_h;
    let y = if above >= 0 { above } else { region.y.round().max(0.0) as i32 + LABEL_GAP };

    let width = text_width(label);
    if width > 0 {
        let background = Rect::at(x - 1, y - 1).of_size(width as u32 + 2, text_h as u32 + 2);
        draw_filled_rect_mut(image, background, LABEL_BACKGROUND);
    }
    draw_text(image, x, y, label, BOX_COLOR);
}

/// Rendered width of `text` in pixels.
pub fn text_width(text: &str) -> i32 {
    let n = text.chars().count() as i32;
    if n == 0 { 0 } else { n * GLYPH_ADVANCE - GLYPH_SCALE }
}

/// Draw `text` with its top-left corner at (x, y). Off-image pixels are clipped.
pub fn draw_text(image: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let (img_w, img_h) = (image.width() as i32, image.height() as i32);

    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i as i32 * GLYPH_ADVANCE;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_W {
                if (bits >> (GLYPH_W - 1 - col)) & 1 == 0 {
                    continue;
                }
                for sy in 0..GLYPH_SCALE {
                    for sx in 0..GLYPH_SCALE {
                        let px = origin_x + col * GLYPH_SCALE + sx;
                        let py = y + row as i32 * GLYPH_SCALE + sy;
                        if (0..img_w).contains(&px) && (0..img_h).contains(&py) {
                            image.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
    }
}

fn glyph(ch: char) -> [u8; 7] {
    match ch {
        ' ' => [0; 7],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        'a' => [0b00000, 0b00000, 0b01110, 0b00001, 0b01111, 0b10001, 0b01111],
        'b' => [0b10000, 0b10000, 0b10110, 0b11001, 0b10001, 0b10001, 0b11110],
        'c' => [0b00000, 0b00000, 0b01110, 0b10000, 0b10000, 0b10001, 0b01110],
        'd' => [0b00001, 0b00001, 0b01101, 0b10011, 0b10001, 0b10001, 0b01111],
        'e' => [0b00000, 0b00000, 0b01110, 0b10001, 0b11111, 0b10000, 0b01110],
        'f' => [0b00110, 0b01001, 0b01000, 0b11100, 0b01000, 0b01000, 0b01000],
        'g' => [0b00000, 0b01111, 0b10001, 0b10001, 0b01111, 0b00001, 0b01110],
        'h' => [0b10000, 0b10000, 0b10110, 0b11001, 0b10001, 0b10001, 0b10001],
        'i' => [0b00100, 0b00000, 0b01100, 0b00100, 0b00100, 0b00100, 0b01110],
        'j' => [0b00010, 0b00000, 0b00110, 0b00010, 0b00010, 0b10010, 0b01100],
        'k' => [0b10000, 0b10000, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010],
        'l' => [0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'm' => [0b00000, 0b00000, 0b11010, 0b10101, 0b10101, 0b10001, 0b10001],
        'n' => [0b00000, 0b00000, 0b10110, 0b11001, 0b10001, 0b10001, 0b10001],
        'o' => [0b00000, 0b00000, 0b01110, 0b10001, 0b10001, 0b10001, 0b01110],
        'p' => [0b00000, 0b00000, 0b11110, 0b10001, 0b11110, 0b10000, 0b10000],
        'q' => [0b00000, 0b00000, 0b01101, 0b10011, 0b01111, 0b00001, 0b00001],
        'r' => [0b00000, 0b00000, 0b10110, 0b11001, 0b10000, 0b10000, 0b10000],
        's' => [0b00000, 0b00000, 0b01110, 0b10000, 0b01110, 0b00001, 0b11110],
        't' => [0b01000, 0b01000, 0b11100, 0b01000, 0b01000, 0b01001, 0b00110],
        'u' => [0b00000, 0b00000, 0b10001, 0b10001, 0b10001, 0b10011, 0b01101],
        'v' => [0b00000, 0b00000, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'w' => [0b00000, 0b00000, 0b10001, 0b10001, 0b10101, 0b10101, 0b01010],
        'x' => [0b00000, 0b00000, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001],
        'y' => [0b00000, 0b00000, 0b10001, 0b10001, 0b01111, 0b00001, 0b01110],
        'z' => [0b00000, 0b00000, 0b11111, 0b00010, 0b00100, 0b01000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '_' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        '\'' => [0b00100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000],
        _ => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox { x, y, width: w, height: h, confidence: 0.9, landmarks: None }
    }

    fn count_color(image: &RgbImage, color: Rgb<u8>, rows: std::ops::Range<u32>) -> usize {
        rows.flat_map(|y| (0..image.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| *image.get_pixel(x, y) == color)
            .count()
    }

    #[test]
    fn face_box_outlines_region() {
        let mut img = RgbImage::new(100, 100);
        draw_face_box(&mut img, &region(20.0, 30.0, 40.0, 40.0));
        assert_eq!(*img.get_pixel(20, 30), BOX_COLOR);
        assert_eq!(*img.get_pixel(21, 31), BOX_COLOR);
        assert_eq!(*img.get_pixel(59, 69), BOX_COLOR);
        // interior untouched
        assert_eq!(*img.get_pixel(40, 50), Rgb([0, 0, 0]));
    }

    #[test]
    fn box_partly_outside_frame_is_clipped() {
        let mut img = RgbImage::new(50, 50);
        draw_face_box(&mut img, &region(-20.0, 40.0, 100.0, 100.0));
        assert_eq!(*img.get_pixel(0, 40), BOX_COLOR);
    }

    #[test]
    fn label_is_drawn_above_box() {
        let mut img = RgbImage::new(200, 200);
        draw_labelled_face(&mut img, &region(50.0, 100.0, 60.0, 60.0), "ALICE");
        let label_rows = (100 - LABEL_GAP - GLYPH_H * GLYPH_SCALE) as u32..(100 - LABEL_GAP) as u32;
        assert!(count_color(&img, BOX_COLOR, label_rows) > 0);
    }

    #[test]
    fn label_moves_inside_when_box_touches_top() {
        let mut img = RgbImage::new(200, 200);
        draw_labelled_face(&mut img, &region(10.0, 0.0, 80.0, 80.0), "Unknown");
        let inside = (LABEL_GAP as u32)..(LABEL_GAP + GLYPH_H * GLYPH_SCALE) as u32;
        assert!(count_color(&img, BOX_COLOR, inside) > 2 * 80);
    }

    #[test]
    fn text_width_accounts_for_scale() {
        assert_eq!(text_width(""), 0);
        assert_eq!(text_width("A"), GLYPH_W * GLYPH_SCALE);
        assert_eq!(text_width("AB"), GLYPH_ADVANCE + GLYPH_W * GLYPH_SCALE);
    }

    #[test]
    fn letter_case_is_preserved_and_unknown_is_question_mark() {
        for (lower, upper) in ('a'..='z').zip('A'..='Z') {
            assert_ne!(glyph(lower), glyph(upper), "{lower} drawn like {upper}");
            assert_ne!(glyph(lower), glyph('?'), "{lower} has no glyph");
        }
        assert_eq!(glyph('é'), glyph('?'));
    }

    #[test]
    fn case_distinct_names_render_differently() {
        let face = region(20.0, 60.0, 80.0, 80.0);
        let mut upper = RgbImage::new(160, 160);
        let mut lower = RgbImage::new(160, 160);
        draw_labelled_face(&mut upper, &face, "Alice");
        draw_labelled_face(&mut lower, &face, "alice");
        assert_ne!(upper, lower);
    }

    #[test]
    fn text_off_image_does_not_panic() {
        let mut img = RgbImage::new(10, 10);
        draw_text(&mut img, -30, -30, "CLIPPED", BOX_COLOR);
        draw_text(&mut img, 5, 5, "EDGE", BOX_COLOR);
    }
}
