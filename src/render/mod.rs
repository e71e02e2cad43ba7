//! # Rendering Module
//!
//! Rasterizes a resolved [`Template`] into an RGBA pixmap with tiny-skia and
//! encodes it as PNG.
//!
//! ## Modules
//!
//! - [`paint`]: object transforms, paints, clip masks, pixmap conversion
//! - [`text`]: glyph outline text drawing
//!
//! ## Coordinate model
//!
//! Template units are scaled by the pixel ratio at the root. Every object is
//! drawn in a centre-based local space: its box spans `-w/2..w/2` and
//! `-h/2..h/2`, and [`paint::object_transform`] maps that box into the
//! parent. Group children live in the group's local space, so a masked
//! group's clip path and its image share one transform.
//!
//! ## Usage Example
//!
//! ```
//! use placard::fonts::FontBook;
//! use placard::loader::Assets;
//! use placard::render::Renderer;
//! use placard::template::Template;
//!
//! let template = Template::from_json(
//!     r##"{"size": {"width": 100, "height": 50},
//!          "canvas": {"objects": [{"type": "rect", "width": 100, "height": 50, "fill": "#f00"}]}}"##,
//! ).unwrap();
//! let fonts = FontBook::default();
//! let assets = Assets::new();
//! let png = Renderer::new(&fonts, &assets).pixel_ratio(2.0).render_png(&template).unwrap();
//! assert_eq!(&png[1..4], b"PNG");
//! ```

pub mod paint;
pub mod text;

use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use tiny_skia::{Mask, PixmapPaint, Pixmap};
use tracing::{debug, warn};

use crate::error::PlacardError;
use crate::fonts::FontBook;
use crate::loader::Assets;
use crate::template::{ImageShape, MaskedImageNode, Node, Shape, Template};
use paint::{bitmap_to_pixmap, centered_rect, clip_mask, fill_and_stroke, object_transform};

/// Output scale applied to template units.
pub const DEFAULT_PIXEL_RATIO: f32 = 2.0;

/// Largest output edge in pixels.
pub const MAX_DIMENSION: u32 = 16_384;

/// Draws templates with a font book and preloaded bitmaps.
pub struct Renderer<'a> {
    fonts: &'a FontBook,
    assets: &'a Assets,
    pixel_ratio: f32,
}

impl<'a> Renderer<'a> {
    pub fn new(fonts: &'a FontBook, assets: &'a Assets) -> Self {
        Self {
            fonts,
            assets,
            pixel_ratio: DEFAULT_PIXEL_RATIO,
        }
    }

    pub fn pixel_ratio(mut self, ratio: f32) -> Self {
        self.pixel_ratio = ratio;
        self
    }

    /// Output size in pixels for `template`.
    pub fn output_size(&self, template: &Template) -> Result<(u32, u32), PlacardError> {
        if !(self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0) {
            return Err(PlacardError::Render(format!(
                "invalid pixel ratio {}",
                self.pixel_ratio
            )));
        }
        let width = (template.size.width * self.pixel_ratio).round();
        let height = (template.size.height * self.pixel_ratio).round();
        let limit = MAX_DIMENSION as f32;
        if !(width >= 1.0 && height >= 1.0 && width <= limit && height <= limit) {
            return Err(PlacardError::Render(format!(
                "output size {}x{} outside 1..={}",
                width, height, MAX_DIMENSION
            )));
        }
        Ok((width as u32, height as u32))
    }

    /// Rasterize `template`.
    pub fn render(&self, template: &Template) -> Result<Pixmap, PlacardError> {
        let (width, height) = self.output_size(template)?;
        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| PlacardError::Render("failed to allocate canvas".to_string()))?;

        if let Some(bg) = template.background {
            pixmap.fill(tiny_skia::Color::from_rgba8(bg.r, bg.g, bg.b, bg.a));
        }

        let root = tiny_skia::Transform::from_scale(self.pixel_ratio, self.pixel_ratio);
        for node in &template.nodes {
            self.draw_node(&mut pixmap, node, root)?;
        }

        debug!(width, height, nodes = template.nodes.len(), "template rasterized");
        Ok(pixmap)
    }

    /// Rasterize `template` and encode it as PNG.
    pub fn render_png(&self, template: &Template) -> Result<Vec<u8>, PlacardError> {
        let pixmap = self.render(template)?;
        encode_png(&pixmap)
    }

    fn draw_node(
        &self,
        pixmap: &mut Pixmap,
        node: &Node,
        root: tiny_skia::Transform,
    ) -> Result<(), PlacardError> {
        match node {
            Node::Text(text) => {
                let font = self.fonts.resolve(text.font_family.as_deref());
                text::draw_text(pixmap, text, font, root, None);
            }
            Node::MaskedImage(group) => self.draw_masked(pixmap, group, root)?,
            Node::Passthrough(p) => match p.shape() {
                Some(shape) => self.draw_shape(pixmap, &shape, root, None, 1.0)?,
                None => warn!(kind = %p.kind, "object could not be drawn, skipped"),
            },
        }
        Ok(())
    }

    fn draw_masked(
        &self,
        pixmap: &mut Pixmap,
        group: &MaskedImageNode,
        root: tiny_skia::Transform,
    ) -> Result<(), PlacardError> {
        let transform = root.pre_concat(object_transform(&group.transform, group.width, group.height));
        let Some(mask) = clip_mask(pixmap.width(), pixmap.height(), &group.mask, transform) else {
            warn!(id = group.id.as_deref().unwrap_or("-"), "degenerate clip shape, group skipped");
            return Ok(());
        };
        for child in &group.children {
            self.draw_shape(pixmap, child, transform, Some(&mask), group.opacity)?;
        }
        Ok(())
    }

    fn draw_shape(
        &self,
        pixmap: &mut Pixmap,
        shape: &Shape,
        parent: tiny_skia::Transform,
        clip: Option<&Mask>,
        opacity: f32,
    ) -> Result<(), PlacardError> {
        match shape {
            Shape::Rect(rect) => {
                let ts = parent.pre_concat(object_transform(&rect.transform, rect.width, rect.height));
                if let Some(path) = centered_rect(rect.width, rect.height) {
                    fill_and_stroke(pixmap, &path, &rect.style, opacity, ts, clip);
                }
            }
            Shape::Circle(circle) => {
                let d = circle.radius * 2.0;
                let ts = parent.pre_concat(object_transform(&circle.transform, d, d));
                if let Some(path) = tiny_skia::PathBuilder::from_circle(0.0, 0.0, circle.radius) {
                    fill_and_stroke(pixmap, &path, &circle.style, opacity, ts, clip);
                }
            }
            Shape::Ellipse(ellipse) => {
                let (w, h) = (ellipse.rx * 2.0, ellipse.ry * 2.0);
                let ts = parent.pre_concat(object_transform(&ellipse.transform, w, h));
                if let Some(path) = tiny_skia::Rect::from_xywh(-ellipse.rx, -ellipse.ry, w, h)
                    .and_then(tiny_skia::PathBuilder::from_oval)
                {
                    fill_and_stroke(pixmap, &path, &ellipse.style, opacity, ts, clip);
                }
            }
            Shape::Triangle(tri) => {
                let (w, h) = (tri.width, tri.height);
                let ts = parent.pre_concat(object_transform(&tri.transform, w, h));
                let mut pb = tiny_skia::PathBuilder::new();
                pb.move_to(-w / 2.0, h / 2.0);
                pb.line_to(0.0, -h / 2.0);
                pb.line_to(w / 2.0, h / 2.0);
                pb.close();
                if let Some(path) = pb.finish() {
                    fill_and_stroke(pixmap, &path, &tri.style, opacity, ts, clip);
                }
            }
            Shape::Image(image) => self.draw_image(pixmap, image, parent, clip, opacity)?,
            Shape::Group(group) => {
                let ts = parent.pre_concat(object_transform(&group.transform, group.width, group.height));
                for child in &group.objects {
                    self.draw_shape(pixmap, child, ts, clip, opacity * group.opacity)?;
                }
            }
            Shape::Unsupported => debug!("unsupported object type skipped"),
        }
        Ok(())
    }

    fn draw_image(
        &self,
        pixmap: &mut Pixmap,
        image: &ImageShape,
        parent: tiny_skia::Transform,
        clip: Option<&Mask>,
        opacity: f32,
    ) -> Result<(), PlacardError> {
        let bitmap = self.assets.get(&image.src).ok_or_else(|| {
            PlacardError::Render(format!("image {} was not loaded", image.src))
        })?;
        let source = bitmap_to_pixmap(bitmap)
            .ok_or_else(|| PlacardError::Render(format!("image {} is empty", image.src)))?;

        let (bw, bh) = (bitmap.width() as f32, bitmap.height() as f32);
        let w = if image.width > 0.0 { image.width } else { bw };
        let h = if image.height > 0.0 { image.height } else { bh };
        let ts = parent
            .pre_concat(object_transform(&image.transform, w, h))
            .pre_translate(-w / 2.0, -h / 2.0)
            .pre_scale(w / bw, h / bh);

        let paint = PixmapPaint {
            opacity: (opacity * image.opacity).clamp(0.0, 1.0),
            quality: tiny_skia::FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, ts, clip);
        Ok(())
    }
}

/// Encode a rendered pixmap as PNG.
pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, PlacardError> {
    let image: RgbaImage = paint::pixmap_to_bitmap(pixmap)
        .ok_or_else(|| PlacardError::Render("pixmap has inconsistent size".to_string()))?;
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| PlacardError::Render(format!("PNG encoding failed: {}", e)))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::mask::replace_masked_image;
    use image::Rgba;
    use std::sync::Arc;

    fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 4] {
        let p = pixmap.pixel(x, y).unwrap().demultiply();
        [p.red(), p.green(), p.blue(), p.alpha()]
    }

    #[test]
    fn test_red_rect_at_double_resolution() {
        let t = Template::from_json(
            r##"{"size": {"width": 100, "height": 100},
                 "canvas": {"objects": [{"type": "rect", "left": 0, "top": 0,
                    "width": 100, "height": 100, "fill": "#ff0000"}]}}"##,
        )
        .unwrap();
        let fonts = FontBook::default();
        let assets = Assets::new();
        let pixmap = Renderer::new(&fonts, &assets).render(&t).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (200, 200));
        assert_eq!(pixel(&pixmap, 0, 0), [255, 0, 0, 255]);
        assert_eq!(pixel(&pixmap, 100, 100), [255, 0, 0, 255]);
        assert_eq!(pixel(&pixmap, 199, 199), [255, 0, 0, 255]);
    }

    #[test]
    fn test_transparent_without_background() {
        let t = Template::from_json(r#"{"size": {"width": 10, "height": 10}}"#).unwrap();
        let fonts = FontBook::default();
        let assets = Assets::new();
        let pixmap = Renderer::new(&fonts, &assets).pixel_ratio(1.0).render(&t).unwrap();
        assert_eq!(pixel(&pixmap, 5, 5), [0, 0, 0, 0]);
    }

    #[test]
    fn test_masked_circle_clips_cover_image() {
        let mut t = Template::from_json(
            r##"{"size": {"width": 200, "height": 200}, "canvas": {"background": "#ffffff", "objects": [
                {"type": "group", "id": "avatar", "left": 100, "top": 100,
                 "originX": "center", "originY": "center", "width": 100, "height": 100,
                 "clipPath": {"type": "circle", "radius": 50, "left": -50, "top": -50},
                 "objects": []}
            ]}}"##,
        )
        .unwrap();
        replace_masked_image(&mut t, "avatar", "blue.png", 200, 400).unwrap();

        let mut assets = Assets::new();
        assets.insert(
            "blue.png",
            Arc::new(RgbaImage::from_pixel(200, 400, Rgba([0, 0, 255, 255]))),
        );
        let fonts = FontBook::default();
        let pixmap = Renderer::new(&fonts, &assets).pixel_ratio(1.0).render(&t).unwrap();

        assert_eq!(pixel(&pixmap, 100, 100), [0, 0, 255, 255]);
        assert_eq!(pixel(&pixmap, 100, 55), [0, 0, 255, 255]);
        // Outside the circle but inside its bounding box
        assert_eq!(pixel(&pixmap, 55, 55), [255, 255, 255, 255]);
        assert_eq!(pixel(&pixmap, 5, 5), [255, 255, 255, 255]);
    }

    #[test]
    fn test_missing_bitmap_is_render_error() {
        let t = Template::from_json(
            r#"{"size": {"width": 10, "height": 10}, "canvas": {"objects": [
                {"type": "image", "src": "nowhere.png", "width": 10, "height": 10}
            ]}}"#,
        )
        .unwrap();
        let fonts = FontBook::default();
        let assets = Assets::new();
        let err = Renderer::new(&fonts, &assets).render(&t).unwrap_err();
        assert!(matches!(err, PlacardError::Render(_)));
    }

    #[test]
    fn test_unknown_family_draws_with_default_font() {
        let t = Template::from_json(
            r##"{"size": {"width": 200, "height": 60}, "canvas": {"background": "#ffffff", "objects": [
                {"type": "text", "text": "Hello", "fontFamily": "No Such Family",
                 "fontSize": 40, "left": 10, "top": 5, "fill": "#000000"}
            ]}}"##,
        )
        .unwrap();
        let fonts = FontBook::default();
        let assets = Assets::new();
        let pixmap = Renderer::new(&fonts, &assets).pixel_ratio(1.0).render(&t).unwrap();
        let inked = pixmap
            .pixels()
            .iter()
            .filter(|p| p.demultiply().red() < 128)
            .count();
        assert!(inked > 50, "inked={inked}");
    }

    #[test]
    fn test_output_size_limits() {
        let fonts = FontBook::default();
        let assets = Assets::new();
        let t = Template::from_json(r#"{"size": {"width": 10000, "height": 10}}"#).unwrap();
        assert!(Renderer::new(&fonts, &assets).output_size(&t).is_err());
        assert_eq!(
            Renderer::new(&fonts, &assets).pixel_ratio(1.0).output_size(&t).unwrap(),
            (10000, 10)
        );
        assert!(Renderer::new(&fonts, &assets).pixel_ratio(0.0).output_size(&t).is_err());
    }

    #[test]
    fn test_encode_png_decodes_back() {
        let mut pixmap = Pixmap::new(3, 2).unwrap();
        pixmap.fill(tiny_skia::Color::from_rgba8(0, 255, 0, 255));
        let png = encode_png(&pixmap).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(2, 1), &Rgba([0, 255, 0, 255]));
    }
}
