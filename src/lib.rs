//! logo-renderer: logo design state and multi-format export
//!
//! This crate holds the state of a simple logo (background, one icon, one
//! line of text), persists it, and exports it as SVG, PNG or ICO.
//!
//! # Example
//!
//! ```
//! use logo_renderer::{IconCatalog, SceneBuilder, StateStore, StoredValue, VectorSerializer};
//!
//! let store = StateStore::in_memory();
//! store.set(StoredValue::from_json(r#"{"icon": "Rocket", "text": "Hi"}"#).unwrap());
//!
//! let scene = SceneBuilder::default().build_with(&store.get(), &IconCatalog::builtin());
//! let svg = VectorSerializer::new().serialize(&scene, 600, 600).unwrap();
//! assert!(svg.contains(">Hi</text>"));
//! ```
//!
//! # Exporting
//!
//! The [`ExportCoordinator`] runs one export at a time. SVG is rebuilt from
//! the store's current state; PNG and ICO capture a [`PreviewHost`] such as
//! [`LivePreview`]:
//!
//! ```
//! use std::rc::Rc;
//! use logo_renderer::{
//!     DirectorySink, ExportConfig, ExportCoordinator, ExportFormat, ExportRequest,
//!     IconCatalog, LivePreview, PreloadedFonts, SceneBuilder, StateStore,
//! };
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let dir = tempfile::tempdir().unwrap();
//! let config = ExportConfig::default();
//! let store = Rc::new(StateStore::in_memory());
//! let catalog = Rc::new(IconCatalog::builtin());
//! let preview = Rc::new(LivePreview::attach(&store, catalog.clone(), SceneBuilder::from_config(&config)));
//!
//! let coordinator = ExportCoordinator::new(
//!     store,
//!     catalog,
//!     preview,
//!     PreloadedFonts::empty(),
//!     Box::new(DirectorySink::new(dir.path())),
//!     &config,
//! );
//! let outcome = coordinator.export(ExportRequest::new(ExportFormat::Png, 1)).await;
//! assert!(outcome.is_saved());
//! assert!(dir.path().join("icon.png").exists());
//! # });
//! ```

mod color;
mod config;
mod error;
mod export;
mod icon;
mod preview;
mod scene;
mod state;
mod store;

pub use color::{ColorParseError, ColorSpec, GradientStop, LinearGradient, Paint, Rgba, parse_paint};
pub use config::ExportConfig;
pub use error::{CatalogError, ExportError, StorageError};
pub use export::{
    CoordinatorState, DirectorySink, DropReason, ExportCoordinator, ExportFormat, ExportOutcome,
    ExportRequest, ExportSink, FontSource, OffscreenClone, ParseFormatError, PreloadedFonts,
    PreviewHost, RasterExporter, SystemFonts, VectorSerializer, encode_ico, encode_png,
    family_resolves,
};
pub use icon::{IconCatalog, IconError, IconGeometry, IconResolver, IconShape};
pub use preview::LivePreview;
pub use scene::{BackgroundNode, Canvas, IconNode, Point, Scene, SceneBuilder, TextNode};
pub use state::{Background, IconLayer, LogoState, StoredValue, TextLayer, defaults};
pub use store::{FileStorage, MemoryStorage, STORAGE_KEY, StateStore, Storage, Subscription};
