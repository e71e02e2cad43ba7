//! Node and shape types for the scene model.
//!
//! Field names follow the camelCase keys of a serialized fabric.js canvas so
//! stored templates deserialize directly. Everything carries a [`Transform`];
//! coordinates inside a group are relative to the group's centre.

use serde::{Deserialize, Serialize};

use super::colour::{Colour, deserialize_colour};

/// Font size used when a text node does not declare one.
pub const DEFAULT_FONT_SIZE: f32 = 24.0;

/// Font family assigned to substituted text nodes that do not declare one.
pub const DEFAULT_FONT_FAMILY: &str = "Lobster";

fn one() -> f32 {
    1.0
}

fn default_line_height() -> f32 {
    1.16
}

fn default_fitting_percentage() -> f32 {
    0.8
}

/// Object ids are usually strings, but numeric ids are accepted as well.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ============================================================================
// TRANSFORM
// ============================================================================

/// Horizontal anchor of an object's `left` coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginX {
    #[default]
    Left,
    Center,
    Right,
}

impl OriginX {
    /// Anchor position as a fraction of the width, measured from the centre.
    pub fn offset(self) -> f32 {
        match self {
            OriginX::Left => -0.5,
            OriginX::Center => 0.0,
            OriginX::Right => 0.5,
        }
    }
}

/// Vertical anchor of an object's `top` coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginY {
    #[default]
    Top,
    Center,
    Bottom,
}

impl OriginY {
    /// Anchor position as a fraction of the height, measured from the centre.
    pub fn offset(self) -> f32 {
        match self {
            OriginY::Top => -0.5,
            OriginY::Center => 0.0,
            OriginY::Bottom => 0.5,
        }
    }
}

/// Placement of an object within its parent.
///
/// The anchor point selected by `origin_x`/`origin_y` sits at `(left, top)`;
/// rotation (degrees) and scale are applied around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    #[serde(default)]
    pub left: f32,
    #[serde(default)]
    pub top: f32,
    #[serde(default)]
    pub angle: f32,
    #[serde(default = "one")]
    pub scale_x: f32,
    #[serde(default = "one")]
    pub scale_y: f32,
    #[serde(default)]
    pub origin_x: OriginX,
    #[serde(default)]
    pub origin_y: OriginY,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            angle: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            origin_x: OriginX::Left,
            origin_y: OriginY::Top,
        }
    }
}

impl Transform {
    /// A centre-anchored, unrotated placement at `(x, y)` with uniform scale.
    pub fn centered_at(x: f32, y: f32, scale: f32) -> Self {
        Self {
            left: x,
            top: y,
            scale_x: scale,
            scale_y: scale,
            origin_x: OriginX::Center,
            origin_y: OriginY::Center,
            ..Default::default()
        }
    }
}

/// Fill, stroke and opacity shared by the drawable shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    #[serde(default, deserialize_with = "deserialize_colour")]
    pub fill: Option<Colour>,
    #[serde(default, deserialize_with = "deserialize_colour")]
    pub stroke: Option<Colour>,
    #[serde(default)]
    pub stroke_width: f32,
    #[serde(default = "one")]
    pub opacity: f32,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            stroke_width: 0.0,
            opacity: 1.0,
        }
    }
}

// ============================================================================
// TEXT
// ============================================================================

/// Horizontal alignment of the lines inside a text box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Accepts any alignment string; `justify*` and unknown values lay out as left.
fn deserialize_text_align<'de, D>(deserializer: D) -> Result<TextAlign, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(match value.as_deref() {
        Some("center") | Some("justify-center") => TextAlign::Center,
        Some("right") | Some("justify-right") => TextAlign::Right,
        _ => TextAlign::Left,
    })
}

/// A text object (`text`, `textbox` or `i-text`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default, deserialize_with = "deserialize_colour")]
    pub fill: Option<Colour>,
    #[serde(default, deserialize_with = "deserialize_text_align")]
    pub text_align: TextAlign,
    #[serde(default = "default_line_height")]
    pub line_height: f32,
    /// Box width; recomputed from the rendered text by the fitter.
    #[serde(default)]
    pub width: f32,
    /// Box height; recomputed alongside `width`.
    #[serde(default)]
    pub height: f32,
    #[serde(default = "one")]
    pub opacity: f32,
    #[serde(flatten)]
    pub transform: Transform,
    /// Scale the font so the text spans `fitting_percentage` of the canvas width.
    #[serde(default)]
    pub is_fitting_text: bool,
    #[serde(default = "default_fitting_percentage")]
    pub fitting_percentage: f32,
}

impl TextNode {
    /// A plain `text` node with default styling.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            id: None,
            text: text.into(),
            font_family: None,
            font_size: None,
            fill: None,
            text_align: TextAlign::Left,
            line_height: default_line_height(),
            width: 0.0,
            height: 0.0,
            opacity: 1.0,
            transform: Transform::default(),
            is_fitting_text: false,
            fitting_percentage: default_fitting_percentage(),
        }
    }

    /// Font size used for layout, falling back to [`DEFAULT_FONT_SIZE`].
    pub fn effective_font_size(&self) -> f32 {
        self.font_size
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(DEFAULT_FONT_SIZE)
    }

    /// Distance between consecutive baselines.
    pub fn line_advance(&self) -> f32 {
        self.effective_font_size() * self.line_height
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }

    /// Whether this is a fixed-width `textbox` rather than an auto-sized `text`.
    pub fn is_textbox(&self) -> bool {
        self.kind.eq_ignore_ascii_case("textbox")
    }
}

// ============================================================================
// MASKED IMAGE GROUP
// ============================================================================

/// Geometry of a clip shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaskGeometry {
    Circle { radius: f32 },
    Rect { width: f32, height: f32 },
}

/// A clip shape positioned (by its top-left corner) in the group's local space.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskShape {
    pub geometry: MaskGeometry,
    pub left: f32,
    pub top: f32,
}

impl MaskShape {
    /// Linear size the replacement image must cover.
    ///
    /// Rect masks only consider their width (square cover assumption).
    pub fn target_size(&self) -> f32 {
        match self.geometry {
            MaskGeometry::Circle { radius } => radius * 2.0,
            MaskGeometry::Rect { width, .. } => width,
        }
    }

    /// Bounding box size of the mask.
    pub fn extent(&self) -> (f32, f32) {
        match self.geometry {
            MaskGeometry::Circle { radius } => (radius * 2.0, radius * 2.0),
            MaskGeometry::Rect { width, height } => (width, height),
        }
    }

    /// Geometric centre in the group's local space.
    pub fn center(&self) -> (f32, f32) {
        let (w, h) = self.extent();
        (self.left + w / 2.0, self.top + h / 2.0)
    }
}

/// A `group` whose `clipPath` is a circle or rect: an image slot.
#[derive(Debug, Clone)]
pub struct MaskedImageNode {
    pub id: Option<String>,
    pub transform: Transform,
    pub width: f32,
    pub height: f32,
    pub opacity: f32,
    pub mask: MaskShape,
    pub children: Vec<Shape>,
}

// ============================================================================
// SHAPES
// ============================================================================

/// Drawable object inside a group or carried as a passthrough node.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    #[serde(alias = "Rect")]
    Rect(RectShape),
    #[serde(alias = "Circle")]
    Circle(CircleShape),
    #[serde(alias = "Ellipse")]
    Ellipse(EllipseShape),
    #[serde(alias = "Triangle")]
    Triangle(RectShape),
    #[serde(alias = "Image")]
    Image(ImageShape),
    #[serde(alias = "Group")]
    Group(GroupShape),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RectShape {
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(flatten)]
    pub transform: Transform,
    #[serde(flatten)]
    pub style: Style,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CircleShape {
    #[serde(default)]
    pub radius: f32,
    #[serde(flatten)]
    pub transform: Transform,
    #[serde(flatten)]
    pub style: Style,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EllipseShape {
    #[serde(default)]
    pub rx: f32,
    #[serde(default)]
    pub ry: f32,
    #[serde(flatten)]
    pub transform: Transform,
    #[serde(flatten)]
    pub style: Style,
}

/// A bitmap, referenced by `src`. `width`/`height` are the natural pixel size.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageShape {
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(flatten)]
    pub transform: Transform,
    #[serde(default = "one")]
    pub opacity: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupShape {
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(flatten)]
    pub transform: Transform,
    #[serde(default = "one")]
    pub opacity: f32,
    #[serde(default)]
    pub objects: Vec<Shape>,
}

impl Shape {
    /// Collect every image `src` reachable from this shape.
    pub fn collect_image_sources(&self, out: &mut Vec<String>) {
        match self {
            Shape::Image(img) if !img.src.is_empty() => {
                if !out.contains(&img.src) {
                    out.push(img.src.clone());
                }
            }
            Shape::Group(group) => {
                for child in &group.objects {
                    child.collect_image_sources(out);
                }
            }
            _ => {}
        }
    }
}

/// Any object the pipeline does not interpret, kept exactly as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PassthroughNode {
    pub kind: String,
    pub id: Option<String>,
    pub raw: serde_json::Value,
}

impl PassthroughNode {
    /// Interpret the stored object as a drawable shape.
    ///
    /// Returns `None` when the object cannot be parsed; unknown types parse
    /// as [`Shape::Unsupported`].
    pub fn shape(&self) -> Option<Shape> {
        serde_json::from_value(self.raw.clone()).ok()
    }
}
