//! Icon catalog: maps an icon name to vector geometry.
//!
//! Glyphs are described in their own square view box (24 units for the
//! built-in set) as a closed list of SVG primitive shapes, so they can be
//! drawn at any pixel size, stroke width and color without touching the
//! path data.
//!
//! # Catalog JSON
//!
//! ```json
//! {
//!   "Rocket": { "viewBox": 24, "shapes": [ { "type": "path", "d": "M4.5 16.5..." } ] },
//!   "Circle": { "shapes": [ { "type": "circle", "cx": 12, "cy": 12, "r": 10 } ] }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CatalogError;

// ============================================================================
// Geometry
// ============================================================================

/// One primitive of a glyph, in view-box units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IconShape {
    Path {
        d: String,
    },
    Circle {
        cx: f32,
        cy: f32,
        r: f32,
    },
    Ellipse {
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        #[serde(default)]
        rx: f32,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
    Polyline {
        points: String,
    },
    Polygon {
        points: String,
    },
}

impl IconShape {
    /// Returns true if the shape encloses an area a fill can paint.
    ///
    /// Lines and polylines are open strokes and never receive a fill.
    pub fn is_fillable(&self) -> bool {
        !matches!(self, IconShape::Line { .. } | IconShape::Polyline { .. })
    }
}

fn default_view_box() -> f32 {
    24.0
}

/// Size-independent vector description of one glyph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconGeometry {
    /// Edge length of the square view box the shapes are drawn in.
    #[serde(default = "default_view_box")]
    pub view_box: f32,
    pub shapes: Vec<IconShape>,
}

impl IconGeometry {
    pub fn new(shapes: Vec<IconShape>) -> Self {
        Self {
            view_box: default_view_box(),
            shapes,
        }
    }

    /// Pixels per view-box unit when drawn at `size` pixels.
    pub fn scale_for(&self, size: f32) -> f32 {
        if self.view_box > 0.0 {
            size / self.view_box
        } else {
            0.0
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// The icon name has no entry in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IconError {
    #[error("icon `{0}` not found")]
    NotFound(String),
}

/// Looks up glyph geometry by name.
pub trait IconResolver {
    fn resolve(&self, name: &str) -> Result<&IconGeometry, IconError>;
}

/// A name to geometry map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IconCatalog {
    icons: BTreeMap<String, IconGeometry>,
}

impl IconCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a catalog from JSON, rejecting glyphs without shapes.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: IconCatalog = serde_json::from_str(json)?;
        if let Some((name, _)) = catalog.icons.iter().find(|(_, g)| g.shapes.is_empty()) {
            return Err(CatalogError::EmptyIcon { name: name.clone() });
        }
        Ok(catalog)
    }

    /// Adds or replaces a glyph.
    pub fn insert(&mut self, name: impl Into<String>, geometry: IconGeometry) {
        self.icons.insert(name.into(), geometry);
    }

    /// Merges another catalog in; its entries win on name clashes.
    pub fn extend(&mut self, other: IconCatalog) {
        self.icons.extend(other.icons);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.icons.contains_key(name)
    }

    /// Icon names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.icons.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    /// A small catalog of common outline glyphs in a 24-unit view box.
    pub fn builtin() -> Self {
        let path = |d: &str| IconShape::Path { d: d.to_string() };
        let mut catalog = Self::new();

        catalog.insert(
            "Activity",
            IconGeometry::new(vec![path("M22 12h-4l-3 9L9 3l-3 9H2")]),
        );
        catalog.insert(
            "Box",
            IconGeometry::new(vec![
                path("M21 8a2 2 0 0 0-1-1.73l-7-4a2 2 0 0 0-2 0l-7 4A2 2 0 0 0 3 8v8a2 2 0 0 0 1 1.73l7 4a2 2 0 0 0 2 0l7-4A2 2 0 0 0 21 16Z"),
                path("m3.3 7 8.7 5 8.7-5"),
                path("M12 22V12"),
            ]),
        );
        catalog.insert(
            "Boxes",
            IconGeometry::new(vec![
                path("M2.97 12.92A2 2 0 0 0 2 14.63v3.24a2 2 0 0 0 .97 1.71l3 1.8a2 2 0 0 0 2.06 0L12 19v-5.5l-5-3-4.03 2.42Z"),
                path("m7 16.5-4.74-2.85"),
                path("m7 16.5 5-3"),
                path("M7 16.5v5.17"),
                path("M12 13.5V19l3.97 2.38a2 2 0 0 0 2.06 0l3-1.8a2 2 0 0 0 .97-1.71v-3.24a2 2 0 0 0-.97-1.71L17 10.5l-5 3Z"),
                path("m17 16.5-5-3"),
                path("m17 16.5 4.74-2.85"),
                path("M17 16.5v5.17"),
                path("M7.97 4.42A2 2 0 0 0 7 6.13v4.37l5 3 5-3V6.13a2 2 0 0 0-.97-1.71l-3-1.8a2 2 0 0 0-2.06 0l-3 1.8Z"),
                path("M12 8 7.26 5.15"),
                path("m12 8 4.74-2.85"),
                path("M12 13.5V8"),
            ]),
        );
        catalog.insert(
            "Circle",
            IconGeometry::new(vec![IconShape::Circle {
                cx: 12.0,
                cy: 12.0,
                r: 10.0,
            }]),
        );
        catalog.insert(
            "Heart",
            IconGeometry::new(vec![path(
                "M19 14c1.49-1.46 3-3.21 3-5.5A5.5 5.5 0 0 0 16.5 3c-1.76 0-3 .5-4.5 2-1.5-1.5-2.74-2-4.5-2A5.5 5.5 0 0 0 2 8.5c0 2.3 1.5 4.05 3 5.5l7 7Z",
            )]),
        );
        catalog.insert(
            "Rocket",
            IconGeometry::new(vec![
                path("M4.5 16.5c-1.5 1.26-2 5-2 5s3.74-.5 5-2c.71-.84.7-2.13-.09-2.91a2.18 2.18 0 0 0-2.91-.09z"),
                path("m12 15-3-3a22 22 0 0 1 2-3.95A12.88 12.88 0 0 1 22 2c0 2.72-.78 7.5-6 11a22.35 22.35 0 0 1-4 2z"),
                path("M9 12H4s.55-3.03 2-4c1.62-1.08 5 0 5 0"),
                path("M12 15v5s3.03-.55 4-2c1.08-1.62 0-5 0-5"),
            ]),
        );
        catalog.insert(
            "Square",
            IconGeometry::new(vec![IconShape::Rect {
                x: 3.0,
                y: 3.0,
                width: 18.0,
                height: 18.0,
                rx: 2.0,
            }]),
        );
        catalog.insert(
            "Star",
            IconGeometry::new(vec![IconShape::Polygon {
                points: "12 2 15.09 8.26 22 9.27 17 14.14 18.18 21.02 12 17.77 5.82 21.02 7 14.14 2 9.27 8.91 8.26 12 2".to_string(),
            }]),
        );

        catalog
    }
}

impl IconResolver for IconCatalog {
    fn resolve(&self, name: &str) -> Result<&IconGeometry, IconError> {
        self.icons
            .get(name)
            .ok_or_else(|| IconError::NotFound(name.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_resolves_default_and_common_icons() {
        let catalog = IconCatalog::builtin();
        for name in ["Boxes", "Rocket", "Activity", "Heart", "Star"] {
            let geometry = catalog.resolve(name).unwrap();
            assert_eq!(geometry.view_box, 24.0);
            assert!(!geometry.shapes.is_empty(), "{name} has no shapes");
        }
    }

    #[test]
    fn unknown_icon_is_not_found() {
        let catalog = IconCatalog::builtin();
        assert_eq!(
            catalog.resolve("NoSuchIcon"),
            Err(IconError::NotFound("NoSuchIcon".to_string()))
        );
    }

    #[test]
    fn load_catalog_from_json() {
        let json = r#"{
            "Dot": { "shapes": [ { "type": "circle", "cx": 12, "cy": 12, "r": 2 } ] },
            "Frame": { "viewBox": 48, "shapes": [ { "type": "rect", "x": 4, "y": 4, "width": 40, "height": 40 } ] }
        }"#;
        let catalog = IconCatalog::from_json(json).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["Dot", "Frame"]);
        assert_eq!(catalog.resolve("Dot").unwrap().view_box, 24.0);

        let frame = catalog.resolve("Frame").unwrap();
        assert_eq!(frame.view_box, 48.0);
        assert_eq!(frame.scale_for(96.0), 2.0);
        assert!(matches!(frame.shapes[0], IconShape::Rect { rx, .. } if rx == 0.0));
    }

    #[test]
    fn empty_glyph_is_rejected() {
        let err = IconCatalog::from_json(r#"{"Blank": {"shapes": []}}"#).unwrap_err();
        assert!(matches!(err, CatalogError::EmptyIcon { name } if name == "Blank"));
    }

    #[test]
    fn extend_overrides_builtin_entries() {
        let mut catalog = IconCatalog::builtin();
        let before = catalog.len();

        let mut custom = IconCatalog::new();
        custom.insert(
            "Rocket",
            IconGeometry::new(vec![IconShape::Line {
                x1: 0.0,
                y1: 0.0,
                x2: 24.0,
                y2: 24.0,
            }]),
        );
        catalog.extend(custom);

        assert_eq!(catalog.len(), before);
        let rocket = catalog.resolve("Rocket").unwrap();
        assert!(!rocket.shapes[0].is_fillable());
    }
}
