//! Color values as stored in the logo record, and the paint they resolve to.
//!
//! A [`ColorSpec`] keeps the CSS text exactly as an editor wrote it, so a
//! persisted record reloads byte-for-byte. Renderers call
//! [`ColorSpec::parse`] to get a [`Paint`]. Any color whose alpha is zero
//! resolves to [`Paint::None`]: it means "no paint", never black.

use std::fmt;

use palette::{Hsl, IntoColor, Srgb};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ColorSpec
// ============================================================================

/// A CSS color or `linear-gradient(...)` string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct ColorSpec(String);

impl ColorSpec {
    pub fn new(css: impl Into<String>) -> Self {
        Self(css.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolves the CSS text to a paint.
    pub fn parse(&self) -> Result<Paint, ColorParseError> {
        parse_paint(&self.0)
    }

    /// Returns true if this color paints nothing (zero alpha everywhere).
    ///
    /// Unparsable colors are not "absent"; they are errors for the caller to report.
    pub fn is_absent(&self) -> bool {
        matches!(self.parse(), Ok(Paint::None))
    }
}

impl From<&str> for ColorSpec {
    fn from(css: &str) -> Self {
        Self(css.to_string())
    }
}

impl From<String> for ColorSpec {
    fn from(css: String) -> Self {
        Self(css)
    }
}

impl fmt::Display for ColorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a [`ColorSpec`] could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("color is empty")]
    Empty,
    #[error("malformed hex color `{0}`")]
    Hex(String),
    #[error("malformed color function `{0}`")]
    Function(String),
    #[error("malformed linear gradient `{0}`")]
    Gradient(String),
    #[error("unknown color `{0}`")]
    Unknown(String),
}

// ============================================================================
// Paint
// ============================================================================

/// An sRGB color with 8-bit channels and a fractional alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    /// Opacity in 0.0-1.0.
    pub alpha: f32,
}

impl Rgba {
    pub const fn new(red: u8, green: u8, blue: u8, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    pub const fn opaque(red: u8, green: u8, blue: u8) -> Self {
        Self::new(red, green, blue, 1.0)
    }

    pub fn is_transparent(&self) -> bool {
        self.alpha <= 0.0
    }

    pub fn is_opaque(&self) -> bool {
        self.alpha >= 1.0
    }

    /// `#rrggbb`, lowercase, alpha dropped.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }

    pub fn alpha_u8(&self) -> u8 {
        (self.alpha.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

/// One color stop of a gradient; `offset` is in 0.0-1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Rgba,
}

/// A CSS linear gradient reduced to an angle and sorted stops.
///
/// The angle follows CSS: 0 points up, 90 points right.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    pub angle_deg: f32,
    pub stops: Vec<GradientStop>,
}

impl LinearGradient {
    /// Start and end points in bounding-box units (0..1 on both axes).
    pub fn endpoints(&self) -> ((f32, f32), (f32, f32)) {
        let theta = self.angle_deg.to_radians();
        let (dx, dy) = (theta.sin() * 0.5, -theta.cos() * 0.5);
        ((0.5 - dx, 0.5 - dy), (0.5 + dx, 0.5 + dy))
    }

    pub fn is_transparent(&self) -> bool {
        self.stops.iter().all(|stop| stop.color.is_transparent())
    }
}

/// What a layer is painted with.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Paint {
    /// No paint at all. Produced by zero-alpha colors.
    #[default]
    None,
    Solid(Rgba),
    LinearGradient(LinearGradient),
}

impl Paint {
    pub fn is_none(&self) -> bool {
        matches!(self, Paint::None)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses CSS color text: hex, `rgb[a]()`, `hsl[a]()`, named colors,
/// `transparent`, or `linear-gradient(...)`.
pub fn parse_paint(text: &str) -> Result<Paint, ColorParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ColorParseError::Empty);
    }
    let lower = trimmed.to_ascii_lowercase();

    if let Some(args) = function_args(&lower, "linear-gradient") {
        let gradient =
            parse_gradient(args).ok_or_else(|| ColorParseError::Gradient(trimmed.to_string()))?;
        if gradient.is_transparent() {
            return Ok(Paint::None);
        }
        return Ok(Paint::LinearGradient(gradient));
    }

    let color = parse_color(&lower)?;
    if color.is_transparent() {
        Ok(Paint::None)
    } else {
        Ok(Paint::Solid(color))
    }
}

/// Parses a single (non-gradient) color. Expects lowercase input.
fn parse_color(text: &str) -> Result<Rgba, ColorParseError> {
    let text = text.trim();
    if text == "transparent" || text == "none" {
        return Ok(Rgba::new(0, 0, 0, 0.0));
    }
    if let Some(digits) = text.strip_prefix('#') {
        return parse_hex(digits).ok_or_else(|| ColorParseError::Hex(text.to_string()));
    }
    if let Some(args) = function_args(text, "rgba").or_else(|| function_args(text, "rgb")) {
        return parse_rgb(args).ok_or_else(|| ColorParseError::Function(text.to_string()));
    }
    if let Some(args) = function_args(text, "hsla").or_else(|| function_args(text, "hsl")) {
        return parse_hsl(args).ok_or_else(|| ColorParseError::Function(text.to_string()));
    }
    palette::named::from_str(text)
        .map(|c: Srgb<u8>| Rgba::opaque(c.red, c.green, c.blue))
        .ok_or_else(|| ColorParseError::Unknown(text.to_string()))
}

/// Returns the text between the parentheses of `name(...)`.
fn function_args<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .trim_end()
        .strip_suffix(')')
}

fn parse_hex(digits: &str) -> Option<Rgba> {
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&digits[i..=i], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();

    match digits.len() {
        3 => Some(Rgba::opaque(nibble(0)?, nibble(1)?, nibble(2)?)),
        4 => Some(Rgba::new(
            nibble(0)?,
            nibble(1)?,
            nibble(2)?,
            nibble(3)? as f32 / 255.0,
        )),
        6 => Some(Rgba::opaque(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Rgba::new(
            byte(0)?,
            byte(2)?,
            byte(4)?,
            byte(6)? as f32 / 255.0,
        )),
        _ => None,
    }
}

/// Splits `1, 2, 3` and `1 2 3 / 0.5` alike.
fn split_args(args: &str) -> Vec<&str> {
    args.split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect()
}

fn parse_channel(token: &str) -> Option<u8> {
    let value = match token.strip_suffix('%') {
        Some(pct) => pct.parse::<f32>().ok()? / 100.0 * 255.0,
        None => token.parse::<f32>().ok()?,
    };
    value
        .is_finite()
        .then(|| value.clamp(0.0, 255.0).round() as u8)
}

fn parse_alpha(token: Option<&&str>) -> Option<f32> {
    let Some(token) = token else {
        return Some(1.0);
    };
    let value = match token.strip_suffix('%') {
        Some(pct) => pct.parse::<f32>().ok()? / 100.0,
        None => token.parse::<f32>().ok()?,
    };
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

fn parse_rgb(args: &str) -> Option<Rgba> {
    let parts = split_args(args);
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    Some(Rgba::new(
        parse_channel(parts[0])?,
        parse_channel(parts[1])?,
        parse_channel(parts[2])?,
        parse_alpha(parts.get(3))?,
    ))
}

fn parse_hsl(args: &str) -> Option<Rgba> {
    let parts = split_args(args);
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let hue: f32 = parts[0].trim_end_matches("deg").parse().ok()?;
    let saturation: f32 = parts[1].strip_suffix('%')?.parse().ok()?;
    let lightness: f32 = parts[2].strip_suffix('%')?.parse().ok()?;

    let hsl = Hsl::new(
        hue,
        (saturation / 100.0).clamp(0.0, 1.0),
        (lightness / 100.0).clamp(0.0, 1.0),
    );
    let rgb: Srgb = hsl.into_color();
    let rgb: Srgb<u8> = rgb.into_format();
    Some(Rgba::new(
        rgb.red,
        rgb.green,
        rgb.blue,
        parse_alpha(parts.get(3))?,
    ))
}

/// Splits on commas that are not nested inside parentheses.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}

fn parse_direction(text: &str) -> Option<f32> {
    if let Some(rest) = text.strip_prefix("to ") {
        let words: Vec<&str> = rest.split_whitespace().collect();
        let has = |w: &str| words.contains(&w);
        return match (has("top"), has("bottom"), has("left"), has("right")) {
            (true, false, false, false) => Some(0.0),
            (true, false, false, true) => Some(45.0),
            (false, false, false, true) => Some(90.0),
            (false, true, false, true) => Some(135.0),
            (false, true, false, false) => Some(180.0),
            (false, true, true, false) => Some(225.0),
            (false, false, true, false) => Some(270.0),
            (true, false, true, false) => Some(315.0),
            _ => None,
        };
    }

    let number = |suffix: &str| text.strip_suffix(suffix)?.trim().parse::<f32>().ok();
    number("deg")
        .or_else(|| number("turn").map(|t| t * 360.0))
        .or_else(|| number("grad").map(|g| g * 0.9))
        .or_else(|| number("rad").map(f32::to_degrees))
        .filter(|angle| angle.is_finite())
}

fn parse_gradient(args: &str) -> Option<LinearGradient> {
    let parts = split_top_level(args);
    let (angle_deg, stop_parts) = match parse_direction(parts.first()?) {
        Some(angle) => (angle, &parts[1..]),
        None => (180.0, &parts[..]),
    };
    if stop_parts.is_empty() {
        return None;
    }

    let mut colors = Vec::with_capacity(stop_parts.len());
    let mut offsets: Vec<Option<f32>> = Vec::with_capacity(stop_parts.len());
    for part in stop_parts {
        let (color, offset) = match part.rsplit_once(char::is_whitespace) {
            Some((color, pos)) if pos.ends_with('%') => {
                let pct = pos
                    .trim_end_matches('%')
                    .parse::<f32>()
                    .ok()
                    .filter(|pct| pct.is_finite())?;
                (color, Some(pct / 100.0))
            }
            _ => (*part, None),
        };
        colors.push(parse_color(color).ok()?);
        offsets.push(offset);
    }

    let offsets = fill_offsets(&offsets);
    Some(LinearGradient {
        angle_deg,
        stops: colors
            .into_iter()
            .zip(offsets)
            .map(|(color, offset)| GradientStop { offset, color })
            .collect(),
    })
}

/// Assigns positions to stops that have none: the ends default to 0 and 1,
/// interior gaps are spread evenly between their known neighbours. Offsets
/// never decrease.
fn fill_offsets(offsets: &[Option<f32>]) -> Vec<f32> {
    let last = offsets.len().saturating_sub(1);
    let mut known: Vec<Option<f32>> = offsets.to_vec();
    if known.first().is_some_and(Option::is_none) {
        known[0] = Some(0.0);
    }
    if last > 0 && known[last].is_none() {
        known[last] = Some(1.0);
    }

    let mut resolved = Vec::with_capacity(known.len());
    let mut i = 0;
    while i < known.len() {
        match known[i] {
            Some(offset) => {
                resolved.push(offset);
                i += 1;
            }
            None => {
                let prev = resolved.last().copied().unwrap_or(0.0);
                let next_index = (i..known.len()).find(|&j| known[j].is_some()).unwrap_or(last);
                let next = known[next_index].unwrap_or(1.0);
                let gap = (next_index - i + 1) as f32;
                for step in 0..(next_index - i) {
                    resolved.push(prev + (next - prev) * (step + 1) as f32 / gap);
                }
                i = next_index;
            }
        }
    }

    let mut floor = 0.0f32;
    resolved
        .into_iter()
        .map(|offset| {
            floor = offset.clamp(floor, 1.0);
            floor
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
