//! Text drawing from glyph outlines.
//!
//! Each line is laid out with [`layout_line`], so the widths used here are the
//! same ones the fitter measured. Glyph outlines are appended to one path per
//! node and filled in a single pass.

use ab_glyph::{Font, FontArc, OutlineCurve, Point, ScaleFont};
use tiny_skia::{FillRule, Mask, PathBuilder, Pixmap};

use super::paint::{object_transform, solid};
use crate::fonts::{layout_line, px_scale};
use crate::template::{Colour, TextAlign, TextNode};

/// Draw `node` with `font` into `pixmap`.
pub fn draw_text(
    pixmap: &mut Pixmap,
    node: &TextNode,
    font: &FontArc,
    parent: tiny_skia::Transform,
    clip: Option<&Mask>,
) {
    let font_size = node.effective_font_size();
    let scale = px_scale(font, font_size);
    let scaled = font.as_scaled(scale);
    let lines: Vec<_> = node.lines().map(|line| layout_line(font, scale, line)).collect();

    let measured = lines.iter().map(|(_, w)| *w).fold(0.0f32, f32::max);
    let line_advance = node.line_advance();
    let box_width = if node.width > 0.0 { node.width } else { measured };
    let box_height = if node.height > 0.0 {
        node.height
    } else {
        line_advance * lines.len() as f32
    };

    let transform = parent.pre_concat(object_transform(&node.transform, box_width, box_height));
    let ascent = scaled.ascent();
    let glyph_height = ascent - scaled.descent();
    let (sx, sy) = (scaled.h_scale_factor(), scaled.v_scale_factor());

    let mut builder = PathBuilder::new();
    for (i, (glyphs, line_width)) in lines.iter().enumerate() {
        let x = match node.text_align {
            TextAlign::Left => -box_width / 2.0,
            TextAlign::Center => -line_width / 2.0,
            TextAlign::Right => box_width / 2.0 - line_width,
        };
        let baseline = -box_height / 2.0
            + i as f32 * line_advance
            + (line_advance - glyph_height) / 2.0
            + ascent;

        for (glyph_id, pen_x) in glyphs {
            if let Some(outline) = font.outline(*glyph_id) {
                append_outline(&mut builder, &outline.curves, x + pen_x, baseline, sx, sy);
            }
        }
    }

    let Some(path) = builder.finish() else {
        return;
    };
    let paint = solid(node.fill.unwrap_or(Colour::BLACK), node.opacity);
    pixmap.fill_path(&path, &paint, FillRule::Winding, transform, clip);
}

/// Append font-unit curves to `builder`, placed at `(origin_x, baseline)`.
///
/// Font units have y pointing up, so y is flipped against the baseline.
fn append_outline(
    builder: &mut PathBuilder,
    curves: &[OutlineCurve],
    origin_x: f32,
    baseline: f32,
    sx: f32,
    sy: f32,
) {
    let map = |p: &Point| (origin_x + p.x * sx, baseline - p.y * sy);
    let mut last: Option<Point> = None;

    for curve in curves {
        let (start, end) = match curve {
            OutlineCurve::Line(a, b) => (*a, *b),
            OutlineCurve::Quad(a, _, b) => (*a, *b),
            OutlineCurve::Cubic(a, _, _, b) => (*a, *b),
        };
        if last != Some(start) {
            if last.is_some() {
                builder.close();
            }
            let (x, y) = map(&start);
            builder.move_to(x, y);
        }
        match curve {
            OutlineCurve::Line(_, p) => {
                let (x, y) = map(p);
                builder.line_to(x, y);
            }
            OutlineCurve::Quad(_, c, p) => {
                let (cx, cy) = map(c);
                let (x, y) = map(p);
                builder.quad_to(cx, cy, x, y);
            }
            OutlineCurve::Cubic(_, c1, c2, p) => {
                let (c1x, c1y) = map(c1);
                let (c2x, c2y) = map(c2);
                let (x, y) = map(p);
                builder.cubic_to(c1x, c1y, c2x, c2y, x, y);
            }
        }
        last = Some(end);
    }
    if last.is_some() {
        builder.close();
    }
}
