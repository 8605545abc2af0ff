//! Export pipeline: the coordinator that turns a request into a saved file.
//!
//! # State Machine
//!
//! ```text
//!            request (token > last served)
//!   ┌──────┐ ───────────────────────────► ┌───────────┐
//!   │ Idle │                              │ Exporting │ ──► any request here is dropped
//!   └──────┘ ◄─────────────────────────── └───────────┘
//!              success or failure (gate guard drop)
//! ```
//!
//! SVG exports rebuild the logo from the store's current state. PNG and ICO
//! exports capture the live preview through [`RasterExporter`].

pub mod raster;
pub mod svg;

use std::cell::Cell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::icon::IconResolver;
use crate::scene::SceneBuilder;
use crate::store::StateStore;

pub use raster::{
    FontSource, OffscreenClone, PreloadedFonts, PreviewHost, RasterExporter, SystemFonts,
    encode_ico, encode_png, family_resolves,
};
pub use svg::VectorSerializer;

// ============================================================================
// Requests
// ============================================================================

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub enum ExportFormat {
    Svg,
    Png,
    Ico,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Ico => "ico",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Svg => "image/svg+xml",
            Self::Png => "image/png",
            Self::Ico => "image/x-icon",
        }
    }

    pub fn is_raster(self) -> bool {
        !matches!(self, Self::Svg)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown export format `{0}` (expected svg, png or ico)")]
pub struct ParseFormatError(String);

impl FromStr for ExportFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            "ico" => Ok(Self::Ico),
            _ => Err(ParseFormatError(s.to_string())),
        }
    }
}

/// One export trigger. `token` must increase with every user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub token: u64,
}

impl ExportRequest {
    pub fn new(format: ExportFormat, token: u64) -> Self {
        Self { format, token }
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Where finished exports are delivered.
pub trait ExportSink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<(), ExportError>;
}

impl<T: ExportSink + ?Sized> ExportSink for Rc<T> {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<(), ExportError> {
        (**self).save(file_name, bytes)
    }
}

/// Writes each export into a directory, replacing files of the same name.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ExportSink for DirectorySink {
    /// Writes to a hidden staging file next to the target, then renames it
    /// over the target. A failed save leaves any earlier file untouched.
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<(), ExportError> {
        let path = self.dir.join(file_name);
        let staging = self.dir.join(format!(".{file_name}.tmp"));
        let written = fs::create_dir_all(&self.dir)
            .and_then(|()| fs::write(&staging, bytes))
            .and_then(|()| fs::rename(&staging, &path));
        if let Err(source) = written {
            if let Err(err) = fs::remove_file(&staging) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("could not remove {}: {err}", staging.display());
                }
            }
            return Err(ExportError::Save {
                file_name: file_name.to_string(),
                source,
            });
        }
        log::info!("saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

// ============================================================================
// Coordinator
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinatorState {
    #[default]
    Idle,
    Exporting,
}

/// Why a request was not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Another export was in flight.
    Busy,
    /// The token was not newer than the last served one.
    StaleToken { token: u64, last_served: u64 },
}

#[derive(Debug)]
pub enum ExportOutcome {
    Saved { file_name: String, len: usize },
    Dropped(DropReason),
    Failed(ExportError),
}

impl ExportOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Holds the coordinator in `Exporting` until dropped.
struct ExportGate<'a> {
    state: &'a Cell<CoordinatorState>,
}

impl<'a> ExportGate<'a> {
    fn enter(state: &'a Cell<CoordinatorState>) -> Self {
        state.set(CoordinatorState::Exporting);
        log::debug!("export gate: idle -> exporting");
        Self { state }
    }
}

impl Drop for ExportGate<'_> {
    fn drop(&mut self) {
        self.state.set(CoordinatorState::Idle);
        log::debug!("export gate: exporting -> idle");
    }
}

/// Runs export requests one at a time against a store and a live preview.
pub struct ExportCoordinator<F> {
    store: Rc<StateStore>,
    resolver: Rc<dyn IconResolver>,
    host: Rc<dyn PreviewHost>,
    sink: Box<dyn ExportSink>,
    builder: SceneBuilder,
    serializer: VectorSerializer,
    raster: RasterExporter<F>,
    file_stem: String,
    state: Cell<CoordinatorState>,
    last_served: Cell<Option<u64>>,
}

impl<F: FontSource> ExportCoordinator<F> {
    pub fn new(
        store: Rc<StateStore>,
        resolver: Rc<dyn IconResolver>,
        host: Rc<dyn PreviewHost>,
        fonts: F,
        sink: Box<dyn ExportSink>,
        config: &ExportConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            host,
            sink,
            builder: SceneBuilder::from_config(config),
            serializer: VectorSerializer::new().with_pretty_print(config.pretty_print),
            raster: RasterExporter::new(fonts, config),
            file_stem: config.file_stem.clone(),
            state: Cell::new(CoordinatorState::Idle),
            last_served: Cell::new(None),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state.get()
    }

    pub fn last_served(&self) -> Option<u64> {
        self.last_served.get()
    }

    pub fn file_name(&self, format: ExportFormat) -> String {
        format!("{}.{}", self.file_stem, format.extension())
    }

    /// Runs `request` to completion, or drops it.
    ///
    /// A request is dropped while another export is in flight, or when its
    /// token is not newer than the last served token. Once accepted its
    /// token counts as served even if the export then fails.
    pub async fn export(&self, request: ExportRequest) -> ExportOutcome {
        if self.state.get() == CoordinatorState::Exporting {
            log::debug!("dropping {} export #{}: busy", request.format, request.token);
            return ExportOutcome::Dropped(DropReason::Busy);
        }
        if let Some(last_served) = self.last_served.get() {
            if request.token <= last_served {
                log::debug!(
                    "dropping {} export #{}: last served #{last_served}",
                    request.format,
                    request.token
                );
                return ExportOutcome::Dropped(DropReason::StaleToken {
                    token: request.token,
                    last_served,
                });
            }
        }

        self.last_served.set(Some(request.token));
        let _gate = ExportGate::enter(&self.state);

        let file_name = self.file_name(request.format);
        let result = match self.render(request.format).await {
            Ok(bytes) => self.sink.save(&file_name, &bytes).map(|()| bytes.len()),
            Err(err) => Err(err),
        };
        match result {
            Ok(len) => ExportOutcome::Saved { file_name, len },
            Err(err) => {
                log::error!("{} export #{} failed: {err}", request.format, request.token);
                ExportOutcome::Failed(err)
            }
        }
    }

    async fn render(&self, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        match format {
            ExportFormat::Svg => {
                let state = self.store.get();
                let scene = self.builder.build_with(&state, self.resolver.as_ref());
                let canvas = self.builder.canvas();
                self.serializer
                    .serialize(&scene, canvas.width, canvas.height)
                    .map(String::into_bytes)
            }
            ExportFormat::Png => self.raster.export_png(self.host.as_ref()).await,
            ExportFormat::Ico => self.raster.export_ico(self.host.as_ref()).await,
        }
    }
}

impl<F> fmt::Debug for ExportCoordinator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportCoordinator")
            .field("state", &self.state.get())
            .field("last_served", &self.last_served.get())
            .field("file_stem", &self.file_stem)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
