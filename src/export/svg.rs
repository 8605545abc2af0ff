//! Vector export: serializes a [`Scene`] to standalone SVG markup.
//!
//! The document is self-contained: gradients live in a local `<defs>` block
//! and icon path data is embedded verbatim. Elements are written in paint
//! order (background, icon, text).

use std::fmt::Write as _;

use quick_xml::escape::escape;

use crate::color::{LinearGradient, Paint, Rgba};
use crate::error::ExportError;
use crate::icon::IconShape;
use crate::scene::{BackgroundNode, IconNode, Scene, TextNode};

const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// Formats a coordinate with at most three decimals and no trailing zeros.
fn num(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let mut text = format!("{value:.3}");
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

// ============================================================================
// Paint attributes
// ============================================================================

/// A paint rendered to SVG attributes, plus the gradient it references.
struct PaintAttrs {
    attrs: String,
    def: Option<String>,
}

fn solid_attrs(attr: &str, color: &Rgba) -> String {
    let mut attrs = format!(r#" {attr}="{}""#, color.to_hex());
    if !color.is_opaque() {
        let _ = write!(attrs, r#" {attr}-opacity="{}""#, num(color.alpha.clamp(0.0, 1.0)));
    }
    attrs
}

fn gradient_def(id: &str, gradient: &LinearGradient) -> String {
    let ((x1, y1), (x2, y2)) = gradient.endpoints();
    let mut def = format!(
        r#"<linearGradient id="{id}" x1="{}" y1="{}" x2="{}" y2="{}">"#,
        num(x1),
        num(y1),
        num(x2),
        num(y2)
    );
    for stop in &gradient.stops {
        let _ = write!(
            def,
            r#"<stop offset="{}" stop-color="{}""#,
            num(stop.offset),
            stop.color.to_hex()
        );
        if !stop.color.is_opaque() {
            let _ = write!(def, r#" stop-opacity="{}""#, num(stop.color.alpha.clamp(0.0, 1.0)));
        }
        def.push_str("/>");
    }
    def.push_str("</linearGradient>");
    def
}

/// Attributes for `attr` (`fill` or `stroke`). `none_attr` decides whether
/// [`Paint::None`] is written as `attr="none"` or left out.
fn paint_attrs(attr: &str, paint: &Paint, id: &str, none_attr: bool) -> PaintAttrs {
    match paint {
        Paint::None => PaintAttrs {
            attrs: if none_attr {
                format!(r#" {attr}="none""#)
            } else {
                String::new()
            },
            def: None,
        },
        Paint::Solid(color) => PaintAttrs {
            attrs: solid_attrs(attr, color),
            def: None,
        },
        Paint::LinearGradient(gradient) => PaintAttrs {
            attrs: format!(r#" {attr}="url(#{id})""#),
            def: Some(gradient_def(id, gradient)),
        },
    }
}

// ============================================================================
// VectorSerializer
// ============================================================================

/// Serializes scenes to SVG.
///
/// # Example
///
/// ```
/// use logo_renderer::{LogoState, SceneBuilder, VectorSerializer};
///
/// let scene = SceneBuilder::default().build(&LogoState::default(), None);
/// let svg = VectorSerializer::new().serialize(&scene, 600, 600).unwrap();
/// assert!(svg.starts_with("<svg"));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VectorSerializer {
    pretty: bool,
}

impl VectorSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// One element per line, nested elements indented.
    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Serializes `scene` into a document of `width` x `height` pixels.
    ///
    /// The `viewBox` is the scene's canvas, so the output scales to any
    /// requested size. A zero dimension fails this request only.
    pub fn serialize(&self, scene: &Scene, width: u32, height: u32) -> Result<String, ExportError> {
        if width == 0 || height == 0 {
            return Err(ExportError::InvalidCanvas { width, height });
        }
        if scene.canvas.width == 0 || scene.canvas.height == 0 {
            return Err(ExportError::InvalidCanvas {
                width: scene.canvas.width,
                height: scene.canvas.height,
            });
        }

        let mut defs = Vec::new();
        let mut body = Vec::new();

        self.background(&scene.background, &mut defs, &mut body);
        if let Some(icon) = &scene.icon {
            self.icon(icon, &mut defs, &mut body);
        }
        if let Some(text) = &scene.text {
            self.text(text, &mut defs, &mut body);
        }

        let mut out = format!(
            r#"<svg xmlns="{SVG_NS}" width="{width}" height="{height}" viewBox="0 0 {} {}">"#,
            scene.canvas.width, scene.canvas.height
        );
        if !defs.is_empty() {
            self.push(&mut out, 1, "<defs>");
            for def in &defs {
                self.push(&mut out, 2, def);
            }
            self.push(&mut out, 1, "</defs>");
        }
        for (depth, line) in &body {
            self.push(&mut out, *depth, line);
        }
        self.push(&mut out, 0, "</svg>");
        if self.pretty {
            out.push('\n');
        }
        Ok(out)
    }

    fn push(&self, out: &mut String, depth: usize, line: &str) {
        if self.pretty {
            out.push('\n');
            out.push_str(&"  ".repeat(depth));
        }
        out.push_str(line);
    }

    fn background(&self, node: &BackgroundNode, defs: &mut Vec<String>, body: &mut Vec<(usize, String)>) {
        let fill = paint_attrs("fill", &node.paint, "background-paint", true);
        defs.extend(fill.def);
        let radius = num(node.corner_radius);
        body.push((
            1,
            format!(
                r#"<rect x="{}" y="{}" width="{}" height="{}" rx="{radius}" ry="{radius}"{}/>"#,
                num(node.x),
                num(node.y),
                num(node.width),
                num(node.height),
                fill.attrs
            ),
        ));
    }

    fn icon(&self, node: &IconNode, defs: &mut Vec<String>, body: &mut Vec<(usize, String)>) {
        let stroke = paint_attrs("stroke", &node.stroke, "icon-stroke", true);
        let fill = paint_attrs("fill", &node.fill, "icon-fill", false);
        defs.extend(stroke.def);
        defs.extend(fill.def);

        let half = node.size / 2.0;
        body.push((
            1,
            format!(
                r#"<g transform="translate({} {}) rotate({}) translate({} {})">"#,
                num(node.center.x),
                num(node.center.y),
                num(node.rotation_deg),
                num(-half),
                num(-half)
            ),
        ));
        let view_box = num(node.geometry.view_box);
        body.push((
            2,
            format!(
                r#"<svg width="{size}" height="{size}" viewBox="0 0 {view_box} {view_box}" fill="none"{} stroke-width="{}" stroke-linecap="round" stroke-linejoin="round">"#,
                stroke.attrs,
                num(node.stroke_width),
                size = num(node.size),
            ),
        ));
        for shape in &node.geometry.shapes {
            let shape_fill = if shape.is_fillable() { fill.attrs.as_str() } else { "" };
            body.push((3, shape_markup(shape, shape_fill)));
        }
        body.push((2, "</svg>".to_string()));
        body.push((1, "</g>".to_string()));
    }

    fn text(&self, node: &TextNode, defs: &mut Vec<String>, body: &mut Vec<(usize, String)>) {
        let fill = paint_attrs("fill", &node.fill, "text-fill", true);
        defs.extend(fill.def);
        body.push((
            1,
            format!(
                r#"<text x="{}" y="{}" text-anchor="middle" dominant-baseline="middle" font-size="{}" font-family="{}"{}>{}</text>"#,
                num(node.anchor.x),
                num(node.anchor.y),
                num(node.font_size),
                escape(node.font_family.as_str()),
                fill.attrs,
                escape(node.content.as_str())
            ),
        ));
    }
}

fn shape_markup(shape: &IconShape, fill: &str) -> String {
    match shape {
        IconShape::Path { d } => format!(r#"<path d="{}"{fill}/>"#, escape(d.as_str())),
        IconShape::Circle { cx, cy, r } => {
            format!(r#"<circle cx="{}" cy="{}" r="{}"{fill}/>"#, num(*cx), num(*cy), num(*r))
        }
        IconShape::Ellipse { cx, cy, rx, ry } => format!(
            r#"<ellipse cx="{}" cy="{}" rx="{}" ry="{}"{fill}/>"#,
            num(*cx),
            num(*cy),
            num(*rx),
            num(*ry)
        ),
        IconShape::Rect { x, y, width, height, rx } => {
            let corner = if *rx > 0.0 {
                format!(r#" rx="{}""#, num(*rx))
            } else {
                String::new()
            };
            format!(
                r#"<rect x="{}" y="{}" width="{}" height="{}"{corner}{fill}/>"#,
                num(*x),
                num(*y),
                num(*width),
                num(*height)
            )
        }
        IconShape::Line { x1, y1, x2, y2 } => format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}"/>"#,
            num(*x1),
            num(*y1),
            num(*x2),
            num(*y2)
        ),
        IconShape::Polyline { points } => {
            format!(r#"<polyline points="{}"/>"#, escape(points.as_str()))
        }
        IconShape::Polygon { points } => {
            format!(r#"<polygon points="{}"{fill}/>"#, escape(points.as_str()))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quick_xml::Reader;
    use quick_xml::events::Event;

    use super::*;
    use crate::icon::{IconCatalog, IconGeometry};
    use crate::scene::{Canvas, SceneBuilder};
    use crate::state::{LogoState, StoredValue};

    fn render(json: &str) -> String {
        let state = StoredValue::from_json(json).unwrap().resolve();
        let scene = SceneBuilder::default().build_with(&state, &IconCatalog::builtin());
        VectorSerializer::new().serialize(&scene, 600, 600).unwrap()
    }

    /// Element names in document order; panics on malformed XML.
    fn element_names(svg: &str) -> Vec<String> {
        let mut reader = Reader::from_str(svg);
        let mut names = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(e) | Event::Empty(e)) => {
                    names.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => panic!("malformed svg: {err}\n{svg}"),
            }
        }
        names
    }

    #[test]
    fn number_formatting() {
        assert_eq!(num(40.0), "40");
        assert_eq!(num(0.5), "0.5");
        assert_eq!(num(1.0 / 3.0), "0.333");
        assert_eq!(num(-0.0), "0");
        assert_eq!(num(f32::NAN), "0");
    }

    #[test]
    fn end_to_end_markup() {
        let svg = render(
            r##"{"bgColor": "#102030", "bgRounded": 40, "icon": "Rocket", "iconSize": 200,
                "iconPositionX": 50, "iconPositionY": 50, "text": "Hi",
                "textPositionX": 50, "textPositionY": 90}"##,
        );

        assert!(svg.contains(r#"xmlns="http://www.w3.org/2000/svg""#));
        assert!(svg.contains(r#"width="600" height="600" viewBox="0 0 600 600""#));
        assert!(svg.contains(
            r##"<rect x="30" y="30" width="540" height="540" rx="40" ry="40" fill="#102030"/>"##
        ));
        assert!(svg.contains(
            r#"<g transform="translate(300 300) rotate(0) translate(-100 -100)">"#
        ));
        assert!(svg.contains(r#"<text x="300" y="540""#));
        assert!(svg.contains(">Hi</text>"));
        assert!(!svg.contains("<defs>"));

        assert_eq!(
            element_names(&svg),
            vec!["svg", "rect", "g", "svg", "path", "path", "path", "path", "text"]
        );
    }

    #[test]
    fn zero_alpha_fill_leaves_shapes_unfilled() {
        let svg = render(r#"{"iconFillColor": "rgba(255,255,255,0)"}"#);
        let shapes: Vec<&str> = svg.split("<path").skip(1).collect();
        assert!(!shapes.is_empty());
        for shape in shapes {
            let element = &shape[..shape.find("/>").unwrap()];
            assert!(!element.contains("fill"), "unexpected fill in {element}");
        }
        assert!(!svg.contains("fill=\"black\""));
        assert!(!svg.contains("fill=\"transparent\""));
    }

    #[test]
    fn opaque_fill_reaches_fillable_shapes_only() {
        let mut catalog = IconCatalog::new();
        catalog.insert(
            "Mixed",
            IconGeometry::new(vec![
                IconShape::Circle { cx: 12.0, cy: 12.0, r: 4.0 },
                IconShape::Line { x1: 0.0, y1: 0.0, x2: 24.0, y2: 24.0 },
            ]),
        );
        let state = StoredValue::from_json(r##"{"icon": "Mixed", "iconFillColor": "#00ff00"}"##)
            .unwrap()
            .resolve();
        let scene = SceneBuilder::default().build_with(&state, &catalog);
        let svg = VectorSerializer::new().serialize(&scene, 600, 600).unwrap();

        assert!(svg.contains(r##"<circle cx="12" cy="12" r="4" fill="#00ff00"/>"##));
        assert!(svg.contains(r#"<line x1="0" y1="0" x2="24" y2="24"/>"#));
    }

    #[test]
    fn hidden_icon_is_absent() {
        let svg = render(r#"{"hideIcon": true}"#);
        assert!(!svg.contains("<g"));
        assert_eq!(element_names(&svg), vec!["svg", "defs", "linearGradient", "stop", "stop", "rect", "text"]);
    }

    #[test]
    fn default_background_is_a_gradient_definition() {
        let svg = render("{}");
        assert!(svg.contains(r#"<linearGradient id="background-paint""#));
        assert!(svg.contains(r#"fill="url(#background-paint)""#));
        assert!(svg.contains(r##"<stop offset="0.35" stop-color="#030128"/>"##));
    }

    #[test]
    fn translucent_colors_use_opacity_attributes() {
        let svg = render(r#"{"textColor": "rgba(255, 0, 0, 0.5)", "bgColor": "transparent"}"#);
        assert!(svg.contains(r##"fill="#ff0000" fill-opacity="0.5""##));
        assert!(svg.contains(r#"ry="80" fill="none"/>"#));
    }

    #[test]
    fn text_is_escaped() {
        let svg = render(r#"{"text": "A & <B>"}"#);
        assert!(svg.contains(">A &amp; &lt;B&gt;</text>"));
        element_names(&svg);
    }

    #[test]
    fn output_parses_as_svg() {
        let svg = render(r#"{"iconRotate": 45, "icon": "Star"}"#);
        let tree = resvg::usvg::Tree::from_str(&svg, &resvg::usvg::Options::default()).unwrap();
        assert_eq!(tree.size().width(), 600.0);
    }

    #[test]
    fn pretty_print_splits_lines() {
        let scene = SceneBuilder::default().build(&LogoState::default(), None);
        let svg = VectorSerializer::new()
            .with_pretty_print(true)
            .serialize(&scene, 300, 300)
            .unwrap();
        assert!(svg.contains("\n  <rect"));
        assert!(svg.contains(r#"width="300" height="300" viewBox="0 0 600 600""#));
        assert!(svg.ends_with("</svg>\n"));
    }

    #[test]
    fn zero_size_is_an_error() {
        let scene = SceneBuilder::default().build(&LogoState::default(), None);
        let err = VectorSerializer::new().serialize(&scene, 0, 600).unwrap_err();
        assert!(matches!(err, ExportError::InvalidCanvas { width: 0, height: 600 }));

        let scene = SceneBuilder::new(Canvas::square(0)).build(&LogoState::default(), None);
        assert!(VectorSerializer::new().serialize(&scene, 600, 600).is_err());
    }
}
