//! # Placard - Template Image Rendering Library
//!
//! Placard renders PNG images from stored canvas templates (fabric.js
//! serializations). A request names a template and supplies substitutions:
//!
//! - **Placeholders**: `{{key}}` tokens in text nodes are replaced by values
//! - **Text fitting**: marked text is scaled to a share of the canvas width
//! - **Masked images**: clipped image slots get a new bitmap, cover-fitted
//!   into the clip shape without moving the slot
//!
//! ## Quick Start
//!
//! ```
//! use std::collections::HashMap;
//! use placard::{
//!     fonts::FontBook,
//!     loader::Assets,
//!     render::Renderer,
//!     template::{Node, Template, placeholder::resolve_template},
//! };
//!
//! let mut template = Template::from_json(
//!     r##"{"size": {"width": 200, "height": 100},
//!          "canvas": {"objects": [{"type": "text", "text": "Hello {{name}}"}]}}"##,
//! )?;
//!
//! let vars = HashMap::from([("name".to_string(), "World".to_string())]);
//! resolve_template(&mut template, &vars);
//! let Node::Text(text) = &template.nodes[0] else { unreachable!() };
//! assert_eq!(text.text, "Hello World");
//!
//! let fonts = FontBook::default();
//! let png = Renderer::new(&fonts, &Assets::new()).render_png(&template)?;
//! assert!(!png.is_empty());
//! # Ok::<(), placard::error::PlacardError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`template`] | Scene model, placeholders, text fitting, masked images |
//! | [`fonts`] | Font resolution and text measurement |
//! | [`loader`] | Image loading and decoding |
//! | [`store`] | Template stores (Supabase, files, memory) |
//! | [`render`] | Rasterization and PNG encoding |
//! | [`pipeline`] | Per-request stage orchestration |
//! | [`server`] | HTTP front end |
//! | [`config`] | Startup configuration |
//! | [`error`] | Error types |

pub mod config;
pub mod error;
pub mod fonts;
pub mod loader;
pub mod pipeline;
pub mod render;
pub mod server;
pub mod store;
pub mod template;

// Re-exports for convenience
pub use error::PlacardError;
pub use pipeline::{Pipeline, RenderRequest};
pub use template::Template;
