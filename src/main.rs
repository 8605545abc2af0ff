use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use logo_renderer::{
    CatalogError, DirectorySink, ExportConfig, ExportCoordinator, ExportFormat, ExportOutcome,
    ExportRequest, FileStorage, IconCatalog, LivePreview, LogoState, SceneBuilder, StateStore,
    StoredValue, SystemFonts,
};
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "logo-renderer", version, about = "Render and export logo designs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Export a design as SVG, PNG or ICO.
    Export {
        /// JSON file with the stored record; defaults are used if omitted.
        #[arg(long, conflicts_with = "storage")]
        state: Option<PathBuf>,
        /// Directory holding a persisted `value.json` record.
        #[arg(long)]
        storage: Option<PathBuf>,
        #[arg(long, value_enum)]
        format: ExportFormat,
        /// Output directory.
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Extra icon catalog JSON, merged over the built-in glyphs.
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Export configuration JSON.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Merge a JSON patch into a persisted record.
    Set {
        #[arg(long)]
        storage: PathBuf,
        /// Patch as inline JSON, e.g. '{"text": "Hi"}'.
        patch: String,
    },
    /// Print the default record.
    Defaults,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON in {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("cannot start runtime: {0}")]
    Runtime(std::io::Error),
    #[error("export failed: {0}")]
    Export(logo_renderer::ExportError),
    #[error("export was dropped: {0:?}")]
    Dropped(logo_renderer::DropReason),
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn json_error(path: &Path) -> impl FnOnce(serde_json::Error) -> CliError {
    let context = path.display().to_string();
    move |source| CliError::Json { context, source }
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Export {
            state,
            storage,
            format,
            out,
            catalog,
            config,
        } => {
            let config = match config {
                Some(path) => ExportConfig::from_json(&read(&path)?).map_err(json_error(&path))?,
                None => ExportConfig::default(),
            };

            let store = match storage {
                Some(dir) => StateStore::open(FileStorage::new(dir)),
                None => {
                    let store = StateStore::in_memory();
                    if let Some(path) = state {
                        store.set(StoredValue::from_json(&read(&path)?).map_err(json_error(&path))?);
                    }
                    store
                }
            };

            let mut icons = IconCatalog::builtin();
            if let Some(path) = catalog {
                icons.extend(IconCatalog::from_json(&read(&path)?)?);
            }

            export(Rc::new(store), Rc::new(icons), format, out, &config)
        }
        Command::Set { storage, patch } => {
            let patch = StoredValue::from_json(&patch).map_err(|source| CliError::Json {
                context: "patch".to_string(),
                source,
            })?;
            let store = StateStore::open(FileStorage::new(&storage));
            store.set(patch);
            log::info!("updated record in {}", storage.display());
            Ok(())
        }
        Command::Defaults => {
            let record = StoredValue::from(&LogoState::default());
            let json = record.to_json_pretty().map_err(|source| CliError::Json {
                context: "defaults".to_string(),
                source,
            })?;
            println!("{json}");
            Ok(())
        }
    }
}

fn export(
    store: Rc<StateStore>,
    icons: Rc<IconCatalog>,
    format: ExportFormat,
    out: PathBuf,
    config: &ExportConfig,
) -> Result<(), CliError> {
    let preview = Rc::new(LivePreview::attach(
        &store,
        icons.clone(),
        SceneBuilder::from_config(config),
    ));
    let coordinator = ExportCoordinator::new(
        store,
        icons,
        preview,
        SystemFonts::new(),
        Box::new(DirectorySink::new(out)),
        config,
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(CliError::Runtime)?;
    let outcome = runtime.block_on(coordinator.export(ExportRequest::new(format, 1)));

    match outcome {
        ExportOutcome::Saved { file_name, len } => {
            log::info!("exported {file_name} ({len} bytes)");
            Ok(())
        }
        ExportOutcome::Dropped(reason) => Err(CliError::Dropped(reason)),
        ExportOutcome::Failed(err) => Err(CliError::Export(err)),
    }
}
