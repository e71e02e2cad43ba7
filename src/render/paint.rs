//! Geometry and paint helpers shared by the node and text renderers.

use image::RgbaImage;
use tiny_skia::{FillRule, IntSize, Mask, Paint, Path, PathBuilder, Pixmap, Rect, Stroke};

use crate::template::{Colour, MaskGeometry, MaskShape, Style, Transform};

/// Affine transform from an object's centre-based local space into its
/// parent's space, for an object box of `width × height`.
pub fn object_transform(t: &Transform, width: f32, height: f32) -> tiny_skia::Transform {
    let anchor_x = t.origin_x.offset() * width;
    let anchor_y = t.origin_y.offset() * height;
    tiny_skia::Transform::from_translate(t.left, t.top)
        .pre_concat(tiny_skia::Transform::from_rotate(t.angle))
        .pre_scale(t.scale_x, t.scale_y)
        .pre_translate(-anchor_x, -anchor_y)
}

/// Solid paint for `colour` with an extra opacity multiplier.
pub fn solid(colour: Colour, opacity: f32) -> Paint<'static> {
    let alpha = (colour.a as f32 * opacity.clamp(0.0, 1.0)).round() as u8;
    let mut paint = Paint::default();
    paint.set_color_rgba8(colour.r, colour.g, colour.b, alpha);
    paint.anti_alias = true;
    paint
}

/// Axis-aligned box centred on the origin.
pub fn centered_rect(width: f32, height: f32) -> Option<Path> {
    Rect::from_xywh(-width / 2.0, -height / 2.0, width, height).map(PathBuilder::from_rect)
}

/// Clip path of a mask in its group's local space.
pub fn mask_path(mask: &MaskShape) -> Option<Path> {
    match mask.geometry {
        MaskGeometry::Circle { radius } => {
            PathBuilder::from_circle(mask.left + radius, mask.top + radius, radius)
        }
        MaskGeometry::Rect { width, height } => {
            Rect::from_xywh(mask.left, mask.top, width, height).map(PathBuilder::from_rect)
        }
    }
}

/// Build a pixel-space clip mask from `mask` placed with `transform`.
pub fn clip_mask(
    width: u32,
    height: u32,
    mask: &MaskShape,
    transform: tiny_skia::Transform,
) -> Option<Mask> {
    let path = mask_path(mask)?;
    let mut clip = Mask::new(width, height)?;
    clip.fill_path(&path, FillRule::Winding, true, transform);
    Some(clip)
}

/// Fill and stroke `path` with `style`.
pub fn fill_and_stroke(
    pixmap: &mut Pixmap,
    path: &Path,
    style: &Style,
    opacity: f32,
    transform: tiny_skia::Transform,
    clip: Option<&Mask>,
) {
    let opacity = opacity * style.opacity;
    if let Some(fill) = style.fill {
        pixmap.fill_path(path, &solid(fill, opacity), FillRule::Winding, transform, clip);
    }
    if let Some(stroke) = style.stroke
        && style.stroke_width > 0.0
    {
        let line = Stroke {
            width: style.stroke_width,
            ..Stroke::default()
        };
        pixmap.stroke_path(path, &solid(stroke, opacity), &line, transform, clip);
    }
}

/// Convert a straight-alpha RGBA bitmap to a premultiplied pixmap.
pub fn bitmap_to_pixmap(bitmap: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(bitmap.width(), bitmap.height())?;
    let mut data = Vec::with_capacity(bitmap.as_raw().len());
    for pixel in bitmap.pixels() {
        let [r, g, b, a] = pixel.0;
        let premultiply = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        data.extend_from_slice(&[premultiply(r), premultiply(g), premultiply(b), a]);
    }
    Pixmap::from_vec(data, size)
}

/// Convert a premultiplied pixmap back to a straight-alpha bitmap.
pub fn pixmap_to_bitmap(pixmap: &Pixmap) -> Option<RgbaImage> {
    let mut data = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
}
