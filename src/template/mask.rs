//! Masked image replacement.
//!
//! Swaps the bitmap inside a clipped group. The clip shape and the group's
//! placement (`left`, `top`, `angle`, `scaleX`, `scaleY`, origin, size, id)
//! carry over untouched; only the child image and its placement inside the
//! group change. The rebuilt group keeps its slot in the node list so render
//! order is unchanged.

use tracing::{debug, warn};

use super::{ImageShape, MaskShape, MaskedImageNode, Node, Shape, Template, Transform};
use crate::error::PlacardError;

/// Cover-fit scale for an image of `image_width × image_height` in `mask`.
///
/// The larger of the two axis ratios, so both scaled dimensions are at least
/// the mask's target size (the excess gets clipped).
pub fn cover_scale(mask: &MaskShape, image_width: u32, image_height: u32) -> f32 {
    let target = mask.target_size();
    let scale_x = target / image_width as f32;
    let scale_y = target / image_height as f32;
    scale_x.max(scale_y)
}

/// The replacement image placed inside `mask`: scaled to cover it and
/// centred on it.
pub fn place_in_mask(mask: &MaskShape, src: &str, image_width: u32, image_height: u32) -> ImageShape {
    let scale = cover_scale(mask, image_width, image_height);
    let (cx, cy) = mask.center();
    ImageShape {
        src: src.to_string(),
        width: image_width as f32,
        height: image_height as f32,
        transform: Transform::centered_at(cx, cy, scale),
        opacity: 1.0,
    }
}

/// Replace the bitmap of the masked group with `id`.
///
/// Fails with [`PlacardError::NotFound`] when no node has the id, or when the
/// node with that id is not a clipped group. Returns the node's index.
pub fn replace_masked_image(
    template: &mut Template,
    id: &str,
    src: &str,
    image_width: u32,
    image_height: u32,
) -> Result<usize, PlacardError> {
    if image_width == 0 || image_height == 0 {
        return Err(PlacardError::Dependency(format!(
            "replacement image for {} has zero size",
            id
        )));
    }

    let index = locate(template, id)?;
    let Node::MaskedImage(group) = &template.nodes[index] else {
        return Err(PlacardError::NotFound(format!(
            "clip shape not found for id {}",
            id
        )));
    };

    let image = place_in_mask(&group.mask, src, image_width, image_height);
    debug!(
        id,
        scale = image.transform.scale_x,
        center_x = image.transform.left,
        center_y = image.transform.top,
        "placing replacement image"
    );

    let rebuilt = MaskedImageNode {
        id: group.id.clone(),
        transform: group.transform.clone(),
        width: group.width,
        height: group.height,
        opacity: group.opacity,
        mask: group.mask.clone(),
        children: vec![Shape::Image(image)],
    };
    template.nodes[index] = Node::MaskedImage(rebuilt);
    Ok(index)
}

/// Check that `id` names a masked group without modifying anything.
pub fn ensure_masked_group(template: &Template, id: &str) -> Result<usize, PlacardError> {
    let index = locate(template, id)?;
    match &template.nodes[index] {
        Node::MaskedImage(_) => Ok(index),
        _ => Err(PlacardError::NotFound(format!(
            "clip shape not found for id {}",
            id
        ))),
    }
}

fn locate(template: &Template, id: &str) -> Result<usize, PlacardError> {
    let index = template
        .position_of(id)
        .ok_or_else(|| PlacardError::NotFound(format!("mask/group not found for id {}", id)))?;

    let duplicates = template.nodes.iter().filter(|n| n.id() == Some(id)).count();
    if duplicates > 1 {
        warn!(id, count = duplicates, "several nodes share this id, using the first");
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{MaskGeometry, OriginX, OriginY};
    use pretty_assertions::assert_eq;

    fn circle(radius: f32) -> MaskShape {
        MaskShape {
            geometry: MaskGeometry::Circle { radius },
            left: -radius,
            top: -radius,
        }
    }

    fn template() -> Template {
        Template::from_json(
            r##"{
            "size": {"width": 400, "height": 400},
            "canvas": {"objects": [
                {"type": "rect", "width": 400, "height": 400, "fill": "#000"},
                {"type": "group", "id": "avatar", "left": 120, "top": 80, "angle": 30,
                 "scaleX": 1.25, "scaleY": 0.75, "originX": "center", "originY": "bottom",
                 "width": 100, "height": 100,
                 "clipPath": {"type": "circle", "radius": 50, "left": -50, "top": -50},
                 "objects": [{"type": "image", "src": "old.png", "width": 10, "height": 10}]},
                {"type": "text", "id": "caption", "text": "hi"},
                {"type": "group", "id": "plain", "objects": []}
            ]}
        }"##,
        )
        .unwrap()
    }

    #[test]
    fn test_cover_scale_circle_example() {
        // Diameter 100, image 200×400 → max(0.5, 0.25)
        let scale = cover_scale(&circle(50.0), 200, 400);
        assert_eq!(scale, 0.5);
        assert_eq!(200.0 * scale, 100.0);
        assert_eq!(400.0 * scale, 200.0);
    }

    #[test]
    fn test_cover_scale_always_covers() {
        let rect = MaskShape {
            geometry: MaskGeometry::Rect {
                width: 120.0,
                height: 120.0,
            },
            left: 0.0,
            top: 0.0,
        };
        for mask in [circle(50.0), circle(7.5), rect] {
            let target = mask.target_size();
            for (w, h) in [(200, 400), (400, 200), (1, 1), (3000, 17), (64, 64)] {
                let s = cover_scale(&mask, w, h);
                assert!(w as f32 * s >= target - 1e-3, "{w}x{h} in {target}");
                assert!(h as f32 * s >= target - 1e-3, "{w}x{h} in {target}");
            }
        }
    }

    #[test]
    fn test_rect_mask_uses_width_only() {
        let mask = MaskShape {
            geometry: MaskGeometry::Rect {
                width: 100.0,
                height: 300.0,
            },
            left: 10.0,
            top: 20.0,
        };
        assert_eq!(cover_scale(&mask, 50, 50), 2.0);
        assert_eq!(mask.center(), (60.0, 170.0));
    }

    #[test]
    fn test_place_in_mask_centers_image() {
        let img = place_in_mask(&circle(50.0), "new.png", 200, 400);
        assert_eq!(img.transform.left, 0.0);
        assert_eq!(img.transform.top, 0.0);
        assert_eq!(img.transform.origin_x, OriginX::Center);
        assert_eq!(img.transform.origin_y, OriginY::Center);
        assert_eq!(img.transform.scale_x, 0.5);
        assert_eq!(img.transform.scale_y, 0.5);
        assert_eq!((img.width, img.height), (200.0, 400.0));
    }

    #[test]
    fn test_replace_preserves_group_and_order() {
        let mut t = template();
        let Node::MaskedImage(before) = t.nodes[1].clone() else {
            panic!("expected masked group");
        };
        let kinds_before: Vec<String> = t.nodes.iter().map(|n| n.kind().to_string()).collect();

        let index = replace_masked_image(&mut t, "avatar", "https://img/new.png", 200, 400).unwrap();
        assert_eq!(index, 1);

        let kinds_after: Vec<String> = t.nodes.iter().map(|n| n.kind().to_string()).collect();
        assert_eq!(kinds_before, kinds_after);

        let Node::MaskedImage(after) = &t.nodes[1] else {
            panic!("expected masked group");
        };
        assert_eq!(after.transform, before.transform);
        assert_eq!(after.mask, before.mask);
        assert_eq!(after.id, before.id);
        assert_eq!((after.width, after.height), (before.width, before.height));
        assert_eq!(after.children.len(), 1);
        let Shape::Image(img) = &after.children[0] else {
            panic!("expected image child");
        };
        assert_eq!(img.src, "https://img/new.png");
        assert_eq!(img.transform.scale_x, 0.5);
    }

    #[test]
    fn test_missing_id_is_not_found() {
        let mut t = template();
        let err = replace_masked_image(&mut t, "nobody", "x.png", 10, 10).unwrap_err();
        assert!(matches!(err, PlacardError::NotFound(ref m) if m.contains("mask/group not found")));
    }

    #[test]
    fn test_node_without_clip_is_reported() {
        let mut t = template();
        for id in ["plain", "caption"] {
            let err = replace_masked_image(&mut t, id, "x.png", 10, 10).unwrap_err();
            assert!(
                matches!(err, PlacardError::NotFound(ref m) if m == &format!("clip shape not found for id {}", id))
            );
        }
        assert!(ensure_masked_group(&t, "avatar").is_ok());
        assert!(ensure_masked_group(&t, "plain").is_err());
    }

    #[test]
    fn test_zero_sized_image_rejected() {
        let mut t = template();
        let err = replace_masked_image(&mut t, "avatar", "x.png", 0, 10).unwrap_err();
        assert!(matches!(err, PlacardError::Dependency(_)));
    }
}
