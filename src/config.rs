//! Export settings.

use serde::{Deserialize, Serialize};

use crate::scene::Canvas;

fn default_canvas_size() -> u32 {
    Canvas::CANONICAL_SIZE
}

fn default_supersample() -> f32 {
    2.0
}

fn default_ico_sizes() -> Vec<u32> {
    vec![16, 32, 48, 256]
}

fn default_font_family() -> String {
    "sans-serif".to_string()
}

fn default_file_stem() -> String {
    "icon".to_string()
}

/// Settings shared by the scene builder and both export paths.
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct ExportConfig {
    /// Edge length of the square canonical canvas, in pixels.
    #[serde(default = "default_canvas_size")]
    pub canvas_size: u32,

    /// Raster supersampling factor applied before resampling to the canvas size.
    #[serde(default = "default_supersample")]
    pub supersample: f32,

    /// Frame sizes packed into ICO output (each 1-256 px).
    #[serde(default = "default_ico_sizes")]
    pub ico_sizes: Vec<u32>,

    /// Font family written on the text node.
    #[serde(default = "default_font_family")]
    pub font_family: String,

    /// Saved files are named `<fileStem>.<ext>`.
    #[serde(default = "default_file_stem")]
    pub file_stem: String,

    /// Emit one element per line in SVG output.
    #[serde(default)]
    pub pretty_print: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            canvas_size: default_canvas_size(),
            supersample: default_supersample(),
            ico_sizes: default_ico_sizes(),
            font_family: default_font_family(),
            file_stem: default_file_stem(),
            pretty_print: false,
        }
    }
}

impl ExportConfig {
    pub fn canvas(&self) -> Canvas {
        Canvas::square(self.canvas_size)
    }

    /// The supersampling factor, forced to a finite value of at least 1.
    pub fn supersample_factor(&self) -> f32 {
        if self.supersample.is_finite() {
            self.supersample.max(1.0)
        } else {
            1.0
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = ExportConfig::from_json("{}").unwrap();
        assert_eq!(config, ExportConfig::default());
        assert_eq!(config.canvas(), Canvas::CANONICAL);
        assert_eq!(config.ico_sizes, vec![16, 32, 48, 256]);
    }

    #[test]
    fn partial_override() {
        let config =
            ExportConfig::from_json(r#"{"canvasSize": 512, "fileStem": "favicon"}"#).unwrap();
        assert_eq!(config.canvas_size, 512);
        assert_eq!(config.file_stem, "favicon");
        assert_eq!(config.supersample, 2.0);
    }

    #[test]
    fn supersample_is_sanitized() {
        let config = ExportConfig {
            supersample: f32::NAN,
            ..Default::default()
        };
        assert_eq!(config.supersample_factor(), 1.0);

        let config = ExportConfig {
            supersample: 0.25,
            ..Default::default()
        };
        assert_eq!(config.supersample_factor(), 1.0);
    }
}
