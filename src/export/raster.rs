//! Raster export: captures the live preview and encodes PNG or ICO.
//!
//! Unlike the vector path this does not rebuild the logo from state. It
//! clones whatever the preview host currently shows, forces the canonical
//! size on the clone, waits for fonts, renders it with `resvg` at a
//! supersampled resolution and resamples down.
//!
//! ```text
//! PreviewHost ──► OffscreenClone ──► fonts_ready().await ──► render 2x ──► resize ──► PNG / ICO
//!                      │
//!                      └── dropped on every path
//! ```

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::ico::{IcoEncoder, IcoFrame};
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageFormat, Rgba, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{Options, Tree, fontdb};

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::scene::Canvas;

/// Largest edge an ICO frame can declare.
const ICO_MAX_SIZE: u32 = 256;

// ============================================================================
// Seams
// ============================================================================

/// The mounted preview a raster export captures.
pub trait PreviewHost {
    /// The preview's current SVG markup, or `None` if it is not mounted.
    fn capture_markup(&self) -> Option<String>;
}

/// Supplies the font database once fonts are ready for text layout.
pub trait FontSource {
    fn fonts_ready(&self) -> impl Future<Output = Result<Arc<fontdb::Database>, ExportError>>;
}

/// System fonts, loaded on first use and shared afterwards.
#[derive(Debug, Default)]
pub struct SystemFonts {
    database: std::cell::OnceCell<Arc<fontdb::Database>>,
}

impl SystemFonts {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FontSource for SystemFonts {
    async fn fonts_ready(&self) -> Result<Arc<fontdb::Database>, ExportError> {
        let database = self.database.get_or_init(|| {
            let mut database = fontdb::Database::new();
            database.load_system_fonts();
            log::debug!("loaded {} system font faces", database.len());
            remap_generic_families(&mut database);
            Arc::new(database)
        });
        Ok(Arc::clone(database))
    }
}

/// Points each generic CSS family whose default face is not installed at
/// an installed family.
///
/// The database ships fixed family names for the generics; on a host
/// without those faces generic text would render as nothing.
/// Preference: a "Sans" family for sans-serif, a "Serif" one for serif, a
/// "Mono" one for monospace, shortest name first, else the first family.
fn remap_generic_families(database: &mut fontdb::Database) {
    let mut families: Vec<String> = database
        .faces()
        .filter_map(|face| face.families.first().map(|(name, _)| name.clone()))
        .collect();
    families.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    families.dedup();
    let Some(fallback) = families.first().cloned() else {
        return;
    };
    let pick = |wanted: fn(&str) -> bool| {
        families
            .iter()
            .find(|name| wanted(name.as_str()))
            .cloned()
            .unwrap_or_else(|| fallback.clone())
    };

    if !resolves(database, fontdb::Family::SansSerif) {
        let name = pick(|name| name.contains("Sans") && !name.contains("Mono"));
        log::info!("generic sans-serif family is not installed, using {name}");
        database.set_sans_serif_family(name);
    }
    if !resolves(database, fontdb::Family::Serif) {
        let name = pick(|name| name.contains("Serif") && !name.contains("Sans"));
        log::info!("generic serif family is not installed, using {name}");
        database.set_serif_family(name);
    }
    if !resolves(database, fontdb::Family::Monospace) {
        let name = pick(|name| name.contains("Mono"));
        log::info!("generic monospace family is not installed, using {name}");
        database.set_monospace_family(name);
    }
}

fn resolves(database: &fontdb::Database, family: fontdb::Family<'_>) -> bool {
    let query = fontdb::Query {
        families: &[family],
        ..fontdb::Query::default()
    };
    database.query(&query).is_some()
}

/// Whether any entry of a CSS `font-family` list matches a face in
/// `database`. Generic names go through the database's generic mapping.
pub fn family_resolves(database: &fontdb::Database, font_family: &str) -> bool {
    font_family
        .split(',')
        .map(|name| name.trim().trim_matches(['"', '\'']))
        .filter(|name| !name.is_empty())
        .any(|name| {
            let family = match name.to_ascii_lowercase().as_str() {
                "sans-serif" => fontdb::Family::SansSerif,
                "serif" => fontdb::Family::Serif,
                "monospace" => fontdb::Family::Monospace,
                "cursive" => fontdb::Family::Cursive,
                "fantasy" => fontdb::Family::Fantasy,
                _ => fontdb::Family::Name(name),
            };
            resolves(database, family)
        })
}

/// A font database that is ready immediately.
#[derive(Debug, Clone, Default)]
pub struct PreloadedFonts {
    database: Arc<fontdb::Database>,
}

impl PreloadedFonts {
    pub fn new(database: fontdb::Database) -> Self {
        Self {
            database: Arc::new(database),
        }
    }

    /// No faces at all; text renders as nothing.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl FontSource for PreloadedFonts {
    async fn fonts_ready(&self) -> Result<Arc<fontdb::Database>, ExportError> {
        Ok(Arc::clone(&self.database))
    }
}

// ============================================================================
// OffscreenClone
// ============================================================================

/// A detached copy of the preview, owned by exactly one export.
///
/// The clone is sized to the canonical canvas regardless of how large the
/// preview is displayed. It is torn down when dropped.
#[derive(Debug)]
pub struct OffscreenClone {
    markup: String,
    canvas: Canvas,
}

impl OffscreenClone {
    /// Clones the host's markup, failing if nothing is mounted.
    pub fn capture(host: &dyn PreviewHost, canvas: Canvas) -> Result<Self, ExportError> {
        let markup = host
            .capture_markup()
            .ok_or(ExportError::CaptureTargetMissing)?;
        log::debug!("offscreen clone attached at {}x{}", canvas.width, canvas.height);
        Ok(Self { markup, canvas })
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }
}

impl Drop for OffscreenClone {
    fn drop(&mut self) {
        log::debug!("offscreen clone torn down");
    }
}

// ============================================================================
// RasterExporter
// ============================================================================

/// Captures the preview into PNG and ICO bytes.
#[derive(Debug)]
pub struct RasterExporter<F> {
    fonts: F,
    canvas: Canvas,
    supersample: f32,
    ico_sizes: Vec<u32>,
    font_family: String,
}

impl<F: FontSource> RasterExporter<F> {
    pub fn new(fonts: F, config: &ExportConfig) -> Self {
        Self {
            fonts,
            canvas: config.canvas(),
            supersample: config.supersample_factor(),
            ico_sizes: config.ico_sizes.clone(),
            font_family: config.font_family.clone(),
        }
    }

    pub fn fonts(&self) -> &F {
        &self.fonts
    }

    /// Captures the host and returns the canonical-size image.
    ///
    /// The host is read before the font wait, so the image reflects the
    /// preview as it was when the export was requested.
    pub async fn capture(&self, host: &dyn PreviewHost) -> Result<RgbaImage, ExportError> {
        let clone = OffscreenClone::capture(host, self.canvas)?;
        let fonts = self.fonts.fonts_ready().await?;
        if !family_resolves(&fonts, &self.font_family) {
            log::warn!(
                "font family `{}` matches none of {} loaded faces; text will not render",
                self.font_family,
                fonts.len()
            );
        }
        rasterize(&clone, fonts, self.supersample)
    }

    pub async fn export_png(&self, host: &dyn PreviewHost) -> Result<Vec<u8>, ExportError> {
        let image = self.capture(host).await?;
        encode_png(&image)
    }

    pub async fn export_ico(&self, host: &dyn PreviewHost) -> Result<Vec<u8>, ExportError> {
        let image = self.capture(host).await?;
        encode_ico(&image, &self.ico_sizes)
    }
}

/// Renders the clone at `supersample` times its canvas, then resamples down.
fn rasterize(
    clone: &OffscreenClone,
    fonts: Arc<fontdb::Database>,
    supersample: f32,
) -> Result<RgbaImage, ExportError> {
    let canvas = clone.canvas();
    let options = Options {
        fontdb: fonts,
        ..Options::default()
    };
    let tree = Tree::from_str(clone.markup(), &options)?;

    let width = (canvas.width as f32 * supersample).round() as u32;
    let height = (canvas.height as f32 * supersample).round() as u32;
    let mut pixmap = Pixmap::new(width, height).ok_or(ExportError::Pixmap { width, height })?;

    // Force the canvas size regardless of the width/height the markup declares.
    let size = tree.size();
    let transform = Transform::from_scale(
        width as f32 / size.width(),
        height as f32 / size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    let image = pixmap_to_rgba_image(&pixmap);
    if image.dimensions() == (canvas.width, canvas.height) {
        return Ok(image);
    }
    Ok(imageops::resize(
        &image,
        canvas.width,
        canvas.height,
        FilterType::Triangle,
    ))
}

/// Converts a premultiplied tiny_skia pixmap to straight-alpha RGBA.
fn pixmap_to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        *dst = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    image
}

// ============================================================================
// Encoding
// ============================================================================

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Packs one PNG frame per size into an ICO container.
///
/// Sizes outside 1-256 are skipped; if none remain a single frame of the
/// image (capped at 256) is written.
pub fn encode_ico(image: &RgbaImage, sizes: &[u32]) -> Result<Vec<u8>, ExportError> {
    let mut sizes: Vec<u32> = sizes
        .iter()
        .copied()
        .filter(|size| (1..=ICO_MAX_SIZE).contains(size))
        .collect();
    sizes.sort_unstable();
    sizes.dedup();
    if sizes.is_empty() {
        sizes.push(image.width().clamp(1, ICO_MAX_SIZE));
    }

    let frames = sizes
        .iter()
        .map(|&size| {
            let resized = if image.dimensions() == (size, size) {
                image.clone()
            } else {
                imageops::resize(image, size, size, FilterType::Lanczos3)
            };
            IcoFrame::as_png(resized.as_raw(), size, size, ExtendedColorType::Rgba8)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut bytes = Vec::new();
    IcoEncoder::new(&mut bytes).encode_images(&frames)?;
    Ok(bytes)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticHost(Option<String>);

    impl PreviewHost for StaticHost {
        fn capture_markup(&self) -> Option<String> {
            self.0.clone()
        }
    }

    const RED_INSET: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="300" height="300" viewBox="0 0 600 600"><rect x="100" y="100" width="400" height="400" fill="#ff0000"/></svg>"##;

    fn exporter() -> RasterExporter<PreloadedFonts> {
        RasterExporter::new(PreloadedFonts::empty(), &ExportConfig::default())
    }

    #[tokio::test]
    async fn capture_forces_canonical_size() {
        let host = StaticHost(Some(RED_INSET.to_string()));
        let image = exporter().capture(&host).await.unwrap();

        assert_eq!(image.dimensions(), (600, 600));
        assert_eq!(image.get_pixel(300, 300).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(10, 10).0[3], 0, "outside the design stays transparent");
    }

    #[tokio::test]
    async fn png_decodes() {
        let host = StaticHost(Some(RED_INSET.to_string()));
        let bytes = exporter().export_png(&host).await.unwrap();

        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .unwrap()
            .to_rgba8();
        assert_eq!(decoded.dimensions(), (600, 600));
        assert_eq!(decoded.get_pixel(150, 150).0, [255, 0, 0, 255]);
    }

    #[tokio::test]
    async fn ico_has_one_frame_per_size() {
        let host = StaticHost(Some(RED_INSET.to_string()));
        let bytes = exporter().export_ico(&host).await.unwrap();

        // ICONDIR: reserved, type 1, frame count.
        assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 1);
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 4);

        let largest = image::load_from_memory_with_format(&bytes, ImageFormat::Ico).unwrap();
        assert_eq!((largest.width(), largest.height()), (256, 256));
    }

    #[test]
    fn ico_without_valid_sizes_falls_back_to_single_frame() {
        let image = RgbaImage::from_pixel(32, 32, Rgba([0, 0, 255, 255]));
        let bytes = encode_ico(&image, &[0, 1024]).unwrap();
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 1);
    }

    #[tokio::test]
    async fn missing_host_is_an_error() {
        let err = exporter().capture(&StaticHost(None)).await.unwrap_err();
        assert!(matches!(err, ExportError::CaptureTargetMissing));
    }

    #[tokio::test]
    async fn malformed_markup_is_an_error() {
        let host = StaticHost(Some("<svg".to_string()));
        let err = exporter().capture(&host).await.unwrap_err();
        assert!(matches!(err, ExportError::Markup(_)));
    }

    const WHITE_TEXT: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="600" height="600" viewBox="0 0 600 600"><rect width="600" height="600" fill="#000000"/><text x="300" y="300" text-anchor="middle" dominant-baseline="middle" font-size="120" font-family="sans-serif" fill="#ffffff">WWWW</text></svg>"##;

    fn bright_pixels_around(image: &RgbaImage, x: u32, y: u32, radius: u32) -> usize {
        let mut count = 0;
        for py in y.saturating_sub(radius)..(y + radius).min(image.height()) {
            for px in x.saturating_sub(radius)..(x + radius).min(image.width()) {
                if image.get_pixel(px, py).0[0] > 128 {
                    count += 1;
                }
            }
        }
        count
    }

    #[tokio::test]
    async fn system_fonts_render_generic_text() {
        let fonts = SystemFonts::new();
        let database = fonts.fonts_ready().await.unwrap();
        if database.is_empty() {
            eprintln!("no system fonts installed, skipping");
            return;
        }
        assert!(family_resolves(&database, "sans-serif"));

        let exporter = RasterExporter::new(fonts, &ExportConfig::default());
        let image = exporter
            .capture(&StaticHost(Some(WHITE_TEXT.to_string())))
            .await
            .unwrap();

        let lit = bright_pixels_around(&image, 300, 300, 150);
        assert!(lit > 500, "only {lit} text pixels near the anchor");
        assert_eq!(image.get_pixel(5, 5).0, [0, 0, 0, 255]);
    }

    #[test]
    fn missing_generic_family_is_remapped() {
        let mut database = fontdb::Database::new();
        database.load_system_fonts();
        if database.is_empty() {
            eprintln!("no system fonts installed, skipping");
            return;
        }
        database.set_sans_serif_family("No Such Family 7f3a");
        database.set_serif_family("No Such Family 7f3a");
        database.set_monospace_family("No Such Family 7f3a");
        assert!(!family_resolves(&database, "sans-serif"));

        remap_generic_families(&mut database);

        assert!(family_resolves(&database, "sans-serif"));
        assert!(family_resolves(&database, "serif"));
        assert!(family_resolves(&database, "monospace"));
    }

    #[test]
    fn family_lists_resolve_by_any_entry() {
        let empty = fontdb::Database::new();
        assert!(!family_resolves(&empty, "sans-serif"));
        assert!(!family_resolves(&empty, "'Inter', Arial"));

        let mut database = fontdb::Database::new();
        database.load_system_fonts();
        let Some(installed) = database
            .faces()
            .find_map(|face| face.families.first().map(|(name, _)| name.clone()))
        else {
            return;
        };
        let list = format!("\"No Such Family 7f3a\", '{installed}', serif");
        assert!(family_resolves(&database, &list));
        assert!(!family_resolves(&database, "No Such Family 7f3a"));
    }

    #[test]
    fn pixmap_conversion_unpremultiplies() {
        let mut pixmap = Pixmap::new(1, 1).unwrap();
        pixmap.fill(resvg::tiny_skia::Color::from_rgba8(200, 100, 50, 128));
        let image = pixmap_to_rgba_image(&pixmap);
        let [r, g, b, a] = image.get_pixel(0, 0).0;
        assert_eq!(a, 128);
        assert!(r.abs_diff(200) <= 2 && g.abs_diff(100) <= 2 && b.abs_diff(50) <= 2);
    }
}
