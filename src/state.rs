//! The logo design record.
//!
//! [`LogoState`] is the resolved, fully-defaulted view that renderers read.
//! [`StoredValue`] is the flat, JSON-shaped record the store persists and
//! merges. Every field in it is optional: an absent field falls back to its
//! default, while an explicit `0` or `false` is kept.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "bgColor": "#102030",
//!   "bgRounded": 40,
//!   "icon": "Rocket",
//!   "iconSize": 200,
//!   "text": "Hi",
//!   "textPositionY": 90
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use logo_renderer::{LogoState, StoredValue};
//!
//! let mut record = StoredValue::from_json(r#"{"bgRounded": 0, "text": "Hi"}"#).unwrap();
//! record.merge(StoredValue { icon_size: Some(200.0), ..Default::default() });
//!
//! let state: LogoState = record.resolve();
//! assert_eq!(state.background.corner_radius, 0.0);
//! assert_eq!(state.icon.size, 200.0);
//! assert_eq!(state.text.content, "Hi");
//! ```

use serde::{Deserialize, Serialize};

use crate::color::ColorSpec;

/// Built-in defaults applied per field when the record has no value.
pub mod defaults {
    pub const BACKGROUND_COLOR: &str =
        "linear-gradient(45deg, RGBA(3,1,40,1) 35%, rgba(1,221,255,1) 100%)";
    pub const BACKGROUND_ROUNDED: f32 = 80.0;
    pub const BACKGROUND_PADDING: f32 = 30.0;

    pub const ICON: &str = "Boxes";
    pub const ICON_SIZE: f32 = 350.0;
    pub const ICON_ROTATE: f32 = 0.0;
    pub const ICON_BORDER_WIDTH: f32 = 1.2;
    pub const ICON_BORDER_COLOR: &str = "#fff";
    pub const ICON_FILL_COLOR: &str = "#FF8C00";
    pub const ICON_POSITION_X: f32 = 50.0;
    pub const ICON_POSITION_Y: f32 = 40.0;
    pub const HIDE_ICON: bool = false;

    pub const TEXT: &str = "SimpleLogo";
    pub const TEXT_SIZE: f32 = 60.0;
    pub const TEXT_COLOR: &str = "#fff";
    pub const TEXT_POSITION_X: f32 = 50.0;
    pub const TEXT_POSITION_Y: f32 = 80.0;
}

// ============================================================================
// LogoState
// ============================================================================

/// Background layer: the rounded rectangle painted first.
#[derive(Debug, Clone, PartialEq)]
pub struct Background {
    pub color: ColorSpec,
    /// Corner radius in pixels.
    pub corner_radius: f32,
    /// Inset from the canvas edge in pixels.
    pub padding: f32,
}

/// Icon layer: one glyph from the catalog, stroked and optionally filled.
#[derive(Debug, Clone, PartialEq)]
pub struct IconLayer {
    /// Key into the icon catalog.
    pub name: String,
    /// Rendered edge length in pixels.
    pub size: f32,
    pub rotation_deg: f32,
    /// Stroke width, in the glyph's own view-box units.
    pub border_width: f32,
    pub border_color: ColorSpec,
    /// A zero-alpha fill means the glyph is not filled.
    pub fill_color: ColorSpec,
    /// Horizontal center, percent of canvas width.
    pub position_x: f32,
    /// Vertical center, percent of canvas height measured from the top.
    pub position_y: f32,
    pub visible: bool,
}

/// Text layer: a single centered line painted last.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayer {
    /// Empty content means no text node.
    pub content: String,
    /// Font size in pixels.
    pub size: f32,
    pub color: ColorSpec,
    pub position_x: f32,
    pub position_y: f32,
}

/// The canonical description of one logo design.
#[derive(Debug, Clone, PartialEq)]
pub struct LogoState {
    pub background: Background,
    pub icon: IconLayer,
    pub text: TextLayer,
}

impl Default for LogoState {
    fn default() -> Self {
        StoredValue::default().resolve()
    }
}

// ============================================================================
// StoredValue
// ============================================================================

/// The persisted, flattened form of a [`LogoState`], also used as a merge patch.
///
/// Keys this type does not model are kept in `extra`, so a merge never drops
/// them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct StoredValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<ColorSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_rounded: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_padding: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_rotate: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_border_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_border_color: Option<ColorSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_fill_color: Option<ColorSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_position_x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_position_y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_icon: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<ColorSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_position_x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_position_y: Option<f32>,

    /// Keys written by other editors that this crate does not interpret.
    #[serde(flatten)]
    #[cfg_attr(feature = "jsonschema", schemars(skip))]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Overwrites `$target.$field` for every field that is set in `$patch`.
macro_rules! merge_fields {
    ($target:ident, $patch:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $patch.$field {
                $target.$field = Some(value);
            }
        )+
    };
}

impl StoredValue {
    /// Creates an empty record; every field resolves to its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// A patch carrying only the background fields.
    pub fn from_background(background: &Background) -> Self {
        Self {
            bg_color: Some(background.color.clone()),
            bg_rounded: Some(background.corner_radius),
            bg_padding: Some(background.padding),
            ..Self::default()
        }
    }

    /// A patch carrying only the icon fields.
    pub fn from_icon(icon: &IconLayer) -> Self {
        Self {
            icon: Some(icon.name.clone()),
            icon_size: Some(icon.size),
            icon_rotate: Some(icon.rotation_deg),
            icon_border_width: Some(icon.border_width),
            icon_border_color: Some(icon.border_color.clone()),
            icon_fill_color: Some(icon.fill_color.clone()),
            icon_position_x: Some(icon.position_x),
            icon_position_y: Some(icon.position_y),
            hide_icon: Some(!icon.visible),
            ..Self::default()
        }
    }

    /// A patch carrying only the text fields.
    pub fn from_text(text: &TextLayer) -> Self {
        Self {
            text: Some(text.content.clone()),
            text_size: Some(text.size),
            text_color: Some(text.color.clone()),
            text_position_x: Some(text.position_x),
            text_position_y: Some(text.position_y),
            ..Self::default()
        }
    }

    /// Additively merges `patch` into this record.
    ///
    /// Only fields present in the patch are replaced. Untouched fields and
    /// unknown keys already in the record are kept.
    pub fn merge(&mut self, patch: StoredValue) {
        let target = self;
        merge_fields!(
            target,
            patch,
            bg_color,
            bg_rounded,
            bg_padding,
            icon,
            icon_size,
            icon_rotate,
            icon_border_width,
            icon_border_color,
            icon_fill_color,
            icon_position_x,
            icon_position_y,
            hide_icon,
            text,
            text_size,
            text_color,
            text_position_x,
            text_position_y,
        );
        target.extra.extend(patch.extra);
    }

    /// Applies defaults per field and returns the resolved state.
    pub fn resolve(&self) -> LogoState {
        let color = |value: &Option<ColorSpec>, fallback: &str| {
            value.clone().unwrap_or_else(|| ColorSpec::new(fallback))
        };

        LogoState {
            background: Background {
                color: color(&self.bg_color, defaults::BACKGROUND_COLOR),
                corner_radius: self.bg_rounded.unwrap_or(defaults::BACKGROUND_ROUNDED),
                padding: self.bg_padding.unwrap_or(defaults::BACKGROUND_PADDING),
            },
            icon: IconLayer {
                name: self.icon.clone().unwrap_or_else(|| defaults::ICON.to_string()),
                size: self.icon_size.unwrap_or(defaults::ICON_SIZE),
                rotation_deg: self.icon_rotate.unwrap_or(defaults::ICON_ROTATE),
                border_width: self.icon_border_width.unwrap_or(defaults::ICON_BORDER_WIDTH),
                border_color: color(&self.icon_border_color, defaults::ICON_BORDER_COLOR),
                fill_color: color(&self.icon_fill_color, defaults::ICON_FILL_COLOR),
                position_x: self.icon_position_x.unwrap_or(defaults::ICON_POSITION_X),
                position_y: self.icon_position_y.unwrap_or(defaults::ICON_POSITION_Y),
                visible: !self.hide_icon.unwrap_or(defaults::HIDE_ICON),
            },
            text: TextLayer {
                content: self.text.clone().unwrap_or_else(|| defaults::TEXT.to_string()),
                size: self.text_size.unwrap_or(defaults::TEXT_SIZE),
                color: color(&self.text_color, defaults::TEXT_COLOR),
                position_x: self.text_position_x.unwrap_or(defaults::TEXT_POSITION_X),
                position_y: self.text_position_y.unwrap_or(defaults::TEXT_POSITION_Y),
            },
        }
    }

    /// Serializes the record to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serializes the record to a pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes a record from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<&LogoState> for StoredValue {
    fn from(state: &LogoState) -> Self {
        let mut record = StoredValue::from_background(&state.background);
        record.merge(StoredValue::from_icon(&state.icon));
        record.merge(StoredValue::from_text(&state.text));
        record
    }
}

// ============================================================================
// Tests
// ============================================================================
