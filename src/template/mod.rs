//! # Scene Model
//!
//! A [`Template`] is a canvas size plus an ordered list of [`Node`]s, parsed
//! from a serialized fabric.js canvas:
//!
//! ```json
//! {
//!   "size": { "width": 800, "height": 400 },
//!   "canvas": {
//!     "background": "#ffffff",
//!     "objects": [
//!       { "type": "text", "text": "Hello {{name}}", "left": 40, "top": 40 },
//!       { "type": "group", "id": "avatar", "clipPath": { "type": "circle", "radius": 50 },
//!         "objects": [ { "type": "image", "src": "https://..." } ] }
//!     ]
//!   }
//! }
//! ```
//!
//! Node order is render order. Stored templates are never mutated: the
//! pipeline clones a working copy per request and the stages below mutate
//! that copy in place.
//!
//! | Stage | Module |
//! |-------|--------|
//! | Placeholder substitution | [`placeholder`] |
//! | Text fitting | [`fit`] |
//! | Masked image replacement | [`mask`] |

pub mod colour;
pub mod fit;
pub mod mask;
pub mod placeholder;
pub mod types;

pub use colour::Colour;
pub use types::*;

use serde::Deserialize;
use serde_json::Value;

use crate::error::PlacardError;

/// Canvas dimensions in template units (pixels at 1x).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

/// One visual element of a template.
#[derive(Debug, Clone)]
pub enum Node {
    Text(TextNode),
    MaskedImage(MaskedImageNode),
    Passthrough(PassthroughNode),
}

/// A parsed template: canvas size, background and ordered nodes.
#[derive(Debug, Clone)]
pub struct Template {
    pub size: CanvasSize,
    pub background: Option<Colour>,
    pub nodes: Vec<Node>,
}

#[derive(Deserialize)]
struct TemplateDocument {
    size: CanvasSize,
    #[serde(default)]
    canvas: CanvasDocument,
}

#[derive(Deserialize, Default)]
struct CanvasDocument {
    #[serde(default, deserialize_with = "colour::deserialize_colour")]
    background: Option<Colour>,
    #[serde(default)]
    objects: Vec<Value>,
}

impl Template {
    /// Parse a template document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, PlacardError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a template document from a JSON value.
    ///
    /// A JSON string holding an encoded document is accepted too, since some
    /// stores keep the template in a text column.
    pub fn from_value(value: Value) -> Result<Self, PlacardError> {
        let value = match value {
            Value::String(encoded) => serde_json::from_str(&encoded)?,
            other => other,
        };
        let doc: TemplateDocument = serde_json::from_value(value)?;

        if !(doc.size.width > 0.0 && doc.size.height > 0.0) {
            return Err(PlacardError::Validation(format!(
                "template size must be positive, got {}x{}",
                doc.size.width, doc.size.height
            )));
        }

        let nodes = doc
            .canvas
            .objects
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                Node::from_value(v).map_err(|e| {
                    PlacardError::Validation(format!("canvas.objects[{}]: {}", i, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            size: doc.size,
            background: doc.canvas.background,
            nodes,
        })
    }

    /// Index of the first node carrying `id`.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id() == Some(id))
    }

    /// Whether the first node carrying `id` is a masked image group.
    pub fn is_masked_group(&self, id: &str) -> bool {
        matches!(
            self.position_of(id).map(|i| &self.nodes[i]),
            Some(Node::MaskedImage(_))
        )
    }

    /// Iterate over the text nodes.
    pub fn text_nodes(&self) -> impl Iterator<Item = &TextNode> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Text(t) => Some(t),
            _ => None,
        })
    }

    /// Iterate mutably over the text nodes.
    pub fn text_nodes_mut(&mut self) -> impl Iterator<Item = &mut TextNode> {
        self.nodes.iter_mut().filter_map(|n| match n {
            Node::Text(t) => Some(t),
            _ => None,
        })
    }

    /// Distinct font families referenced by text nodes, in first-use order.
    pub fn font_families(&self) -> Vec<String> {
        let mut families: Vec<String> = Vec::new();
        for node in self.text_nodes() {
            if let Some(family) = &node.font_family
                && !families.contains(family)
            {
                families.push(family.clone());
            }
        }
        families
    }

    /// Every image `src` referenced anywhere in the scene, deduplicated.
    pub fn image_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for node in &self.nodes {
            match node {
                Node::MaskedImage(group) => {
                    for child in &group.children {
                        child.collect_image_sources(&mut sources);
                    }
                }
                Node::Passthrough(p) => {
                    if let Some(shape) = p.shape() {
                        shape.collect_image_sources(&mut sources);
                    }
                }
                Node::Text(_) => {}
            }
        }
        sources
    }
}

impl Node {
    /// The node's `id`, if it has one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Node::Text(t) => t.id.as_deref(),
            Node::MaskedImage(m) => m.id.as_deref(),
            Node::Passthrough(p) => p.id.as_deref(),
        }
    }

    /// The serialized object type (`text`, `group`, `rect`, ...).
    pub fn kind(&self) -> &str {
        match self {
            Node::Text(t) => &t.kind,
            Node::MaskedImage(_) => "group",
            Node::Passthrough(p) => &p.kind,
        }
    }

    /// Classify a serialized canvas object.
    ///
    /// - `text`, `textbox`, `i-text` → [`Node::Text`]
    /// - `group` with a circle or rect `clipPath` → [`Node::MaskedImage`]
    /// - anything else → [`Node::Passthrough`], kept verbatim
    pub fn from_value(value: Value) -> Result<Self, String> {
        let obj = match &value {
            Value::Object(map) => map,
            other => return Err(format!("expected object, got {}", other)),
        };
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| "object has no 'type' field".to_string())?
            .to_ascii_lowercase();

        match kind.as_str() {
            "text" | "textbox" | "i-text" => {
                let node: TextNode = serde_json::from_value(value).map_err(|e| e.to_string())?;
                Ok(Node::Text(node))
            }
            "group" => match parse_masked_group(&value)? {
                Some(group) => Ok(Node::MaskedImage(group)),
                None => Ok(Node::Passthrough(passthrough(kind, value))),
            },
            _ => Ok(Node::Passthrough(passthrough(kind, value))),
        }
    }
}

fn passthrough(kind: String, raw: Value) -> PassthroughNode {
    let id = raw.get("id").and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    PassthroughNode { kind, id, raw }
}

/// Clip shapes a masked image group may carry.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawClip {
    #[serde(alias = "Circle")]
    Circle {
        #[serde(default)]
        radius: f32,
        #[serde(default)]
        left: f32,
        #[serde(default)]
        top: f32,
    },
    #[serde(alias = "Rect")]
    Rect {
        #[serde(default)]
        width: f32,
        #[serde(default)]
        height: f32,
        #[serde(default)]
        left: f32,
        #[serde(default)]
        top: f32,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct RawGroup {
    #[serde(default, deserialize_with = "types::deserialize_id")]
    id: Option<String>,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default = "default_opacity")]
    opacity: f32,
    #[serde(flatten)]
    transform: Transform,
    #[serde(default)]
    objects: Vec<Shape>,
    #[serde(default, rename = "clipPath")]
    clip_path: Option<RawClip>,
}

fn default_opacity() -> f32 {
    1.0
}

/// Returns `Ok(None)` for groups without a supported clip shape.
fn parse_masked_group(value: &Value) -> Result<Option<MaskedImageNode>, String> {
    let group: RawGroup = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;

    let mask = match group.clip_path {
        Some(RawClip::Circle { radius, left, top }) => MaskShape {
            geometry: MaskGeometry::Circle { radius },
            left,
            top,
        },
        Some(RawClip::Rect {
            width,
            height,
            left,
            top,
        }) => MaskShape {
            geometry: MaskGeometry::Rect { width, height },
            left,
            top,
        },
        Some(RawClip::Other) | None => return Ok(None),
    };

    Ok(Some(MaskedImageNode {
        id: group.id,
        transform: group.transform,
        width: group.width,
        height: group.height,
        opacity: group.opacity,
        mask,
        children: group.objects,
    }))
}
