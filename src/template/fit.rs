//! Text fitting.
//!
//! Two strategies:
//!
//! - [`shrink_to_fit`]: step the font size down by 1 until the text fits a
//!   maximum width (never below 1), then centre the node horizontally.
//! - [`scale_to_fit`]: one multiplicative correction so a node flagged
//!   `isFittingText` spans `fittingPercentage` of the canvas width. Rendered
//!   width is linear in font size, so re-running it is a no-op.

use tracing::debug;

use super::{Colour, DEFAULT_FONT_SIZE, Node, OriginX, OriginY, Template, TextNode, Transform};

/// Measures rendered text.
pub trait TextMeasure {
    /// Advance width of a single line of `text` at `font_size` in `family`.
    ///
    /// `None` selects the default font.
    fn line_width(&self, family: Option<&str>, font_size: f32, text: &str) -> f32;
}

/// Width of the widest line of the node at `font_size`.
fn width_at(node: &TextNode, font_size: f32, measure: &dyn TextMeasure) -> f32 {
    node.lines()
        .map(|line| measure.line_width(node.font_family.as_deref(), font_size, line))
        .fold(0.0, f32::max)
}

/// Unscaled width of the node's text at its current font size.
pub fn rendered_width(node: &TextNode, measure: &dyn TextMeasure) -> f32 {
    width_at(node, node.effective_font_size(), measure)
}

impl TextNode {
    /// Recompute `width`/`height` from the current text and font size.
    ///
    /// Textboxes keep their declared width as a minimum.
    pub fn refresh_bounds(&mut self, measure: &dyn TextMeasure) {
        let measured = rendered_width(self, measure);
        self.width = if self.is_textbox() {
            self.width.max(measured)
        } else {
            measured
        };
        self.height = self.line_advance() * self.lines().count() as f32;
    }
}

/// Shrink the font size one step at a time until the text fits `max_width`.
///
/// Stops at font size 1. A non-positive `max_width` counts as already
/// fitting. Afterwards the node is centred on `canvas_width / 2`; its
/// vertical position is left alone. Returns the final font size.
pub fn shrink_to_fit(
    node: &mut TextNode,
    max_width: f32,
    canvas_width: f32,
    measure: &dyn TextMeasure,
) -> f32 {
    let mut font_size = node.effective_font_size();

    if max_width > 0.0 {
        while width_at(node, font_size, measure) > max_width && font_size > 1.0 {
            font_size = (font_size - 1.0).max(1.0);
        }
    }

    node.font_size = Some(font_size);
    node.refresh_bounds(measure);

    // Put the node's horizontal centre on the canvas midpoint, whatever its origin
    let scaled_width = node.width * node.transform.scale_x;
    node.transform.left = canvas_width / 2.0 + node.transform.origin_x.offset() * scaled_width;

    debug!(font_size, max_width, "shrink-to-fit converged");
    font_size
}

/// Scale a fitting text node's font so it spans its share of the canvas.
///
/// Resets `scaleX`/`scaleY` to 1 and refreshes the bounds. Returns the
/// applied factor, or `None` when the node is not flagged, has a
/// non-positive percentage, or measures zero width.
pub fn scale_to_fit(node: &mut TextNode, canvas_width: f32, measure: &dyn TextMeasure) -> Option<f32> {
    if !node.is_fitting_text {
        return None;
    }
    let percentage = node.fitting_percentage;
    if !(percentage.is_finite() && percentage > 0.0) {
        debug!(percentage, "skipping fit: non-positive fitting percentage");
        return None;
    }

    let max_width = canvas_width * percentage.min(1.0);
    let current = rendered_width(node, measure);
    if current <= 0.0 {
        debug!(text = %node.text, "skipping fit: zero measured width");
        return None;
    }

    let factor = max_width / current;
    node.font_size = Some(node.effective_font_size() * factor);
    node.transform.scale_x = 1.0;
    node.transform.scale_y = 1.0;
    node.refresh_bounds(measure);

    debug!(factor, max_width, "scale-to-fit applied");
    Some(factor)
}

/// Refresh every text node's bounds and apply [`scale_to_fit`] to flagged ones.
///
/// Returns how many nodes were scaled.
pub fn fit_template(template: &mut Template, measure: &dyn TextMeasure) -> usize {
    let canvas_width = template.size.width;
    let mut scaled = 0;
    for node in template.text_nodes_mut() {
        node.refresh_bounds(measure);
        if scale_to_fit(node, canvas_width, measure).is_some() {
            scaled += 1;
        }
    }
    scaled
}

/// Add a black, centre-anchored text node in the middle of the canvas and
/// shrink it to `width_percentage`% of the canvas width.
///
/// Returns the index of the new node.
pub fn add_limited_width_text(
    template: &mut Template,
    text: &str,
    width_percentage: f32,
    measure: &dyn TextMeasure,
) -> usize {
    let canvas_width = template.size.width;
    let max_width = width_percentage / 100.0 * canvas_width;

    let mut node = TextNode::new(text);
    node.font_size = Some(DEFAULT_FONT_SIZE);
    node.fill = Some(Colour::BLACK);
    node.transform = Transform {
        left: canvas_width / 2.0,
        top: template.size.height / 2.0,
        origin_x: OriginX::Center,
        origin_y: OriginY::Center,
        ..Default::default()
    };
    shrink_to_fit(&mut node, max_width, canvas_width, measure);

    template.nodes.push(Node::Text(node));
    template.nodes.len() - 1
}
