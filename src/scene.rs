//! Scene building: resolves a [`LogoState`] into absolute canvas coordinates.
//!
//! The scene is the intermediate representation the vector serializer and
//! the live preview render from. Building it is pure and total: any state,
//! including NaN or out-of-range numbers, produces a scene.
//!
//! # Layer Order
//!
//! ```text
//! ┌──────────────┐
//! │  Background  │ ◄── painted first, rounded rect inset by padding
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │     Icon     │ ◄── omitted if hidden, unresolved or zero-sized
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │     Text     │ ◄── omitted if content is empty
//! └──────────────┘
//! ```
//!
//! Padding and corner radius shape only the background rect. The icon and
//! text are not clipped to it and may overflow the rounded corners.

use crate::color::{ColorSpec, Paint};
use crate::config::ExportConfig;
use crate::icon::{IconGeometry, IconResolver};
use crate::state::LogoState;

// ============================================================================
// Canvas
// ============================================================================

/// The fixed logical canvas every position is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub const CANONICAL_SIZE: u32 = 600;

    /// The 600x600 canvas all exports are normalized to.
    pub const CANONICAL: Canvas = Canvas {
        width: Self::CANONICAL_SIZE,
        height: Self::CANONICAL_SIZE,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    /// Horizontal percent (0 = left edge) to pixels.
    pub fn x_from_percent(&self, percent: f32) -> f32 {
        sanitize_percent(percent) / 100.0 * self.width as f32
    }

    /// Vertical percent (0 = top edge) to pixels.
    ///
    /// The preview places layers with a CSS `bottom` offset of
    /// `100 - percent`; this converts that offset back to a top-based
    /// coordinate so preview and export agree.
    pub fn y_from_percent(&self, percent: f32) -> f32 {
        let height = self.height as f32;
        let bottom = 100.0 - sanitize_percent(percent);
        height - bottom / 100.0 * height
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::CANONICAL
    }
}

fn sanitize_percent(percent: f32) -> f32 {
    if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        50.0
    }
}

fn non_negative(value: f32) -> f32 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

// ============================================================================
// Scene
// ============================================================================

/// A point in canvas pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundNode {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub corner_radius: f32,
    pub paint: Paint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IconNode {
    /// Center of the glyph box on the canvas.
    pub center: Point,
    /// Edge length of the glyph box in pixels.
    pub size: f32,
    /// Clockwise rotation around `center`.
    pub rotation_deg: f32,
    pub stroke: Paint,
    /// Stroke width in view-box units.
    pub stroke_width: f32,
    /// [`Paint::None`] means the shapes carry no fill.
    pub fill: Paint,
    pub geometry: IconGeometry,
}

impl IconNode {
    /// Top-left corner of the unrotated glyph box.
    pub fn origin(&self) -> Point {
        let half = self.size / 2.0;
        Point::new(self.center.x - half, self.center.y - half)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    /// Center of the line; text is anchored middle/middle here.
    pub anchor: Point,
    pub content: String,
    pub font_size: f32,
    pub fill: Paint,
    pub font_family: String,
}

/// A logo resolved to absolute canvas coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub canvas: Canvas,
    pub background: BackgroundNode,
    pub icon: Option<IconNode>,
    pub text: Option<TextNode>,
}

// ============================================================================
// SceneBuilder
// ============================================================================

/// Builds [`Scene`]s for one canvas.
///
/// # Example
///
/// ```
/// use logo_renderer::{Canvas, IconCatalog, LogoState, SceneBuilder};
///
/// let builder = SceneBuilder::new(Canvas::CANONICAL);
/// let scene = builder.build_with(&LogoState::default(), &IconCatalog::builtin());
///
/// let icon = scene.icon.expect("default icon resolves");
/// assert_eq!((icon.center.x, icon.center.y), (300.0, 240.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SceneBuilder {
    canvas: Canvas,
    font_family: String,
}

impl SceneBuilder {
    pub fn new(canvas: Canvas) -> Self {
        Self {
            canvas,
            font_family: "sans-serif".to_string(),
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(config.canvas()).with_font_family(config.font_family.clone())
    }

    pub fn with_font_family(mut self, font_family: impl Into<String>) -> Self {
        self.font_family = font_family.into();
        self
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Resolves the icon through `resolver`, then builds.
    ///
    /// An unknown icon name is logged and the icon layer is left out; the
    /// rest of the scene is still built.
    pub fn build_with(&self, state: &LogoState, resolver: &dyn IconResolver) -> Scene {
        if !state.icon.visible {
            return self.build(state, None);
        }
        match resolver.resolve(&state.icon.name) {
            Ok(geometry) => self.build(state, Some(geometry)),
            Err(err) => {
                log::warn!("{err}; icon layer omitted");
                self.build(state, None)
            }
        }
    }

    /// Builds a scene from a state and already-resolved icon geometry.
    pub fn build(&self, state: &LogoState, icon: Option<&IconGeometry>) -> Scene {
        Scene {
            canvas: self.canvas,
            background: self.background(state),
            icon: icon.and_then(|geometry| self.icon(state, geometry)),
            text: self.text(state),
        }
    }

    fn background(&self, state: &LogoState) -> BackgroundNode {
        let width = self.canvas.width as f32;
        let height = self.canvas.height as f32;
        let padding = non_negative(state.background.padding).min(width.min(height) / 2.0);
        let rect_width = width - 2.0 * padding;
        let rect_height = height - 2.0 * padding;

        BackgroundNode {
            x: padding,
            y: padding,
            width: rect_width,
            height: rect_height,
            corner_radius: non_negative(state.background.corner_radius)
                .min(rect_width.min(rect_height) / 2.0),
            paint: resolve_paint(&state.background.color, "background"),
        }
    }

    fn icon(&self, state: &LogoState, geometry: &IconGeometry) -> Option<IconNode> {
        let icon = &state.icon;
        if !icon.visible {
            return None;
        }
        let size = non_negative(icon.size);
        if size == 0.0 {
            log::debug!("icon `{}` has zero size; icon layer omitted", icon.name);
            return None;
        }

        Some(IconNode {
            center: Point::new(
                self.canvas.x_from_percent(icon.position_x),
                self.canvas.y_from_percent(icon.position_y),
            ),
            size,
            rotation_deg: finite_or(icon.rotation_deg, 0.0),
            stroke: resolve_paint(&icon.border_color, "icon border"),
            stroke_width: non_negative(icon.border_width),
            fill: resolve_paint(&icon.fill_color, "icon fill"),
            geometry: geometry.clone(),
        })
    }

    fn text(&self, state: &LogoState) -> Option<TextNode> {
        let text = &state.text;
        if text.content.is_empty() {
            return None;
        }

        Some(TextNode {
            anchor: Point::new(
                self.canvas.x_from_percent(text.position_x),
                self.canvas.y_from_percent(text.position_y),
            ),
            content: text.content.clone(),
            font_size: non_negative(text.size),
            fill: resolve_paint(&text.color, "text"),
            font_family: self.font_family.clone(),
        })
    }
}

impl Default for SceneBuilder {
    fn default() -> Self {
        Self::new(Canvas::CANONICAL)
    }
}

/// Parses a layer color; an unparsable color paints nothing and is logged.
fn resolve_paint(spec: &ColorSpec, layer: &str) -> Paint {
    spec.parse().unwrap_or_else(|err| {
        log::warn!("{layer} color ignored: {err}");
        Paint::None
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;
    use crate::icon::IconCatalog;
    use crate::state::StoredValue;

    fn scene_for(json: &str) -> Scene {
        let state = StoredValue::from_json(json).unwrap().resolve();
        SceneBuilder::default().build_with(&state, &IconCatalog::builtin())
    }

    #[test]
    fn defaults_resolve_to_canvas_pixels() {
        let scene = scene_for("{}");

        assert_eq!(scene.canvas, Canvas::CANONICAL);
        assert_eq!(scene.background.x, 30.0);
        assert_eq!(scene.background.width, 540.0);
        assert_eq!(scene.background.corner_radius, 80.0);
        assert!(matches!(scene.background.paint, Paint::LinearGradient(_)));

        let icon = scene.icon.unwrap();
        assert_eq!(icon.center, Point::new(300.0, 240.0));
        assert_eq!(icon.origin(), Point::new(125.0, 65.0));
        assert_eq!(icon.fill, Paint::Solid(Rgba::opaque(0xff, 0x8c, 0x00)));

        let text = scene.text.unwrap();
        assert_eq!(text.anchor, Point::new(300.0, 480.0));
        assert_eq!(text.content, "SimpleLogo");
        assert_eq!(text.font_family, "sans-serif");
    }

    #[test]
    fn build_is_deterministic() {
        let state = LogoState::default();
        let builder = SceneBuilder::default();
        let catalog = IconCatalog::builtin();
        assert_eq!(
            builder.build_with(&state, &catalog),
            builder.build_with(&state, &catalog)
        );
    }

    #[test]
    fn edge_percentages_give_distinct_finite_coordinates() {
        let top = scene_for(r#"{"iconPositionX": 0, "iconPositionY": 0}"#).icon.unwrap();
        let bottom = scene_for(r#"{"iconPositionX": 100, "iconPositionY": 100}"#)
            .icon
            .unwrap();

        assert_eq!(top.center, Point::new(0.0, 0.0));
        assert_eq!(bottom.center, Point::new(600.0, 600.0));
        assert_ne!(top.center, bottom.center);
    }

    #[test]
    fn zero_alpha_fill_is_no_paint() {
        let icon = scene_for(r#"{"iconFillColor": "rgba(255, 255, 255, 0)"}"#)
            .icon
            .unwrap();
        assert_eq!(icon.fill, Paint::None);
        assert!(!icon.stroke.is_none());
    }

    #[test]
    fn hidden_icon_and_empty_text_are_omitted() {
        let scene = scene_for(r#"{"hideIcon": true, "text": ""}"#);
        assert!(scene.icon.is_none());
        assert!(scene.text.is_none());
    }

    #[test]
    fn unknown_icon_leaves_other_layers() {
        let scene = scene_for(r#"{"icon": "DoesNotExist", "text": "Hi"}"#);
        assert!(scene.icon.is_none());
        assert_eq!(scene.text.unwrap().content, "Hi");
    }

    #[test]
    fn oversized_padding_and_radius_are_clamped() {
        let scene = scene_for(r#"{"bgPadding": 1000, "bgRounded": 1000}"#);
        assert_eq!(scene.background.x, 300.0);
        assert_eq!(scene.background.width, 0.0);
        assert_eq!(scene.background.corner_radius, 0.0);

        let scene = scene_for(r#"{"bgPadding": 0, "bgRounded": 1000}"#);
        assert_eq!(scene.background.corner_radius, 300.0);
    }

    #[test]
    fn non_finite_numbers_do_not_panic() {
        let mut state = LogoState::default();
        state.icon.rotation_deg = f32::NAN;
        state.icon.position_x = f32::INFINITY;
        state.text.size = f32::NEG_INFINITY;
        state.background.padding = f32::NAN;

        let scene = SceneBuilder::default().build_with(&state, &IconCatalog::builtin());
        let icon = scene.icon.unwrap();
        assert_eq!(icon.rotation_deg, 0.0);
        assert_eq!(icon.center.x, 300.0);
        assert_eq!(scene.text.unwrap().font_size, 0.0);
        assert_eq!(scene.background.x, 0.0);

        state.icon.size = f32::NAN;
        let scene = SceneBuilder::default().build_with(&state, &IconCatalog::builtin());
        assert!(scene.icon.is_none());
    }

    #[test]
    fn end_to_end_positions() {
        let scene = scene_for(
            r##"{"bgColor": "#102030", "bgRounded": 40, "icon": "Rocket", "iconSize": 200,
                "iconPositionX": 50, "iconPositionY": 50, "text": "Hi",
                "textPositionX": 50, "textPositionY": 90}"##,
        );
        assert_eq!(
            scene.background.paint,
            Paint::Solid(Rgba::opaque(0x10, 0x20, 0x30))
        );
        assert_eq!(scene.icon.unwrap().center, Point::new(300.0, 300.0));
        assert_eq!(scene.text.unwrap().anchor, Point::new(300.0, 540.0));
    }

    #[test]
    fn custom_font_family_reaches_text_node() {
        let builder = SceneBuilder::from_config(&ExportConfig {
            font_family: "Inter".to_string(),
            ..Default::default()
        });
        let scene = builder.build(&LogoState::default(), None);
        assert_eq!(scene.text.unwrap().font_family, "Inter");
        assert!(scene.icon.is_none());
    }
}
