//! Drawing helpers for map figures.
//!
//! Thin layer over `imageproc::drawing`: strokes wider than one pixel,
//! polygons given in sub-pixel coordinates, and text set in the bundled
//! DejaVu Sans face, aligned horizontally or rotated to read bottom to top.

use std::sync::OnceLock;

use image::{Rgba, RgbaImage, imageops};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut, draw_text_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use rusttype::{Font, Scale, point};

static FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Horizontal anchor of a text run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// The bundled font, parsed on first use. `None` only if the font data is corrupt.
pub fn font() -> Option<&'static Font<'static>> {
    static FONT: OnceLock<Option<Font<'static>>> = OnceLock::new();
    FONT.get_or_init(|| Font::try_from_bytes(FONT_DATA)).as_ref()
}

/// Width and line height in pixels of `text` set at `size` pixels
pub fn text_size(font: &Font<'_>, text: &str, size: f32) -> (u32, u32) {
    let scale = Scale::uniform(size);
    let v_metrics = font.v_metrics(scale);
    let width = font
        .layout(text, scale, point(0.0, v_metrics.ascent))
        .filter_map(|g| g.pixel_bounding_box())
        .map(|bb| bb.max.x)
        .max()
        .unwrap_or(0)
        .max(0) as u32;
    let height = (v_metrics.ascent - v_metrics.descent).ceil().max(0.0) as u32;
    (width, height)
}

/// Draws `text` with its top edge at `y`, anchored at `x` by `align`
#[allow(clippy::too_many_arguments)]
pub fn text(img: &mut RgbaImage, font: &Font<'_>, text: &str, x: i32, y: i32, size: f32, align: Align, color: Rgba<u8>) {
    let (width, _) = text_size(font, text, size);
    let start = match align {
        Align::Left => x,
        Align::Center => x - width as i32 / 2,
        Align::Right => x - width as i32,
    };
    draw_text_mut(img, color, start, y, Scale::uniform(size), font, text);
}

/// Draws `text` rotated 90° counter-clockwise with its left edge at `x`,
/// centered vertically on `center_y`
pub fn text_vertical(img: &mut RgbaImage, font: &Font<'_>, text: &str, x: i64, center_y: i64, size: f32, color: Rgba<u8>) {
    let (width, height) = text_size(font, text, size);
    if width == 0 || height == 0 {
        return;
    }
    let mut layer = RgbaImage::new(width, height);
    draw_text_mut(&mut layer, color, 0, 0, Scale::uniform(size), font, text);
    let rotated = imageops::rotate270(&layer);
    imageops::overlay(img, &rotated, x, center_y - width as i64 / 2);
}

pub fn fill_rect(img: &mut RgbaImage, x: i64, y: i64, w: i64, h: i64, color: Rgba<u8>) {
    let rect = Rect::at(x as i32, y as i32).of_size(w.max(1) as u32, h.max(1) as u32);
    draw_filled_rect_mut(img, rect, color);
}

/// Fills a polygon; degenerate outlines that collapse onto one pixel are skipped
pub fn fill_polygon(img: &mut RgbaImage, corners: &[(f64, f64)], color: Rgba<u8>) {
    let mut points: Vec<Point<i32>> = Vec::with_capacity(corners.len());
    for &(x, y) in corners {
        let p = Point::new(x.round() as i32, y.round() as i32);
        if points.last() != Some(&p) {
            points.push(p);
        }
    }
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    if points.len() >= 3 {
        draw_polygon_mut(img, &points, color);
    }
}

/// Line segment `width` pixels wide, drawn as adjacent one-pixel segments
pub fn stroke(img: &mut RgbaImage, from: (f64, f64), to: (f64, f64), width: u32, color: Rgba<u8>) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let len = dx.hypot(dy);
    if width <= 1 || len == 0.0 {
        draw_line_segment_mut(img, (from.0 as f32, from.1 as f32), (to.0 as f32, to.1 as f32), color);
        return;
    }
    let (nx, ny) = (-dy / len, dx / len);
    let half = (width / 2) as i64;
    for k in 0..width as i64 {
        let offset = (k - half) as f64;
        let (ox, oy) = (nx * offset, ny * offset);
        draw_line_segment_mut(
            img,
            ((from.0 + ox) as f32, (from.1 + oy) as f32),
            ((to.0 + ox) as f32, (to.1 + oy) as f32),
            color,
        );
    }
}
