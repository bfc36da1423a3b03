//! Canvas annotation CLI
//!
//! Renders editor annotations onto a PDF, or renders and publishes the
//! result into a directory-backed file store.

mod config;

use annotator_core::{
    prepare_upload, AnnotationDocument, ColorPolicy, DirectoryStore, DocumentAssembler,
    FileRecord, FileStore, PdfVersion, RequireCompatible, Unit, UnknownObjectPolicy,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "annotate")]
#[command(version, about = "Overlay canvas editor annotations onto PDF documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Unit of annotation coordinates: pt, mm, in or px
    #[arg(long, global = true)]
    unit: Option<Unit>,

    /// Highest source PDF version accepted, e.g. 1.4
    #[arg(long, global = true)]
    max_pdf_version: Option<PdfVersion>,

    /// Handling of unsupported object types: skip, warn or reject
    #[arg(long, global = true)]
    unknown_objects: Option<UnknownObjectPolicy>,

    /// Draw undecodable colors in black instead of failing
    #[arg(long, global = true)]
    lenient_colors: bool,

    /// Wall-clock budget for building the document, in milliseconds.
    /// Nothing is written when the budget runs out.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the annotated PDF to a file
    Render {
        #[arg(long)]
        source: PathBuf,
        /// Annotation JSON as produced by the editor
        #[arg(long)]
        annotations: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Annotate and store the result as a response attachment
    Publish {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        annotations: PathBuf,
        #[arg(long)]
        store_root: PathBuf,
        #[arg(long)]
        context_id: u64,
        #[arg(long)]
        item_id: u64,
        #[arg(long)]
        filename: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // stdout stays free for piping
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::from_env()?.with_overrides(
        cli.unit,
        cli.max_pdf_version,
        cli.unknown_objects,
    );
    if cli.lenient_colors {
        config.render.colors = ColorPolicy::FallbackToBlack;
    }
    let budget = cli.timeout_ms.map(Duration::from_millis);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to start runtime")?;
    let result = runtime.block_on(run(cli.command, config, budget));
    // a build abandoned on timeout must not keep the process alive
    runtime.shutdown_background();

    result.map(|_| ())
}

/// Build the document under `budget`, then write it. Returns the written path.
async fn run(command: Command, config: Config, budget: Option<Duration>) -> Result<PathBuf> {
    let assembler = DocumentAssembler::new(config.render.clone());

    match command {
        Command::Render {
            source,
            annotations,
            output,
        } => {
            let (bytes, pages) = with_budget(budget, move || {
                let annotations = load_annotations(&annotations)?;
                let mut document = assembler
                    .build(&source, &annotations)
                    .with_context(|| format!("Failed to annotate {}", source.display()))?;
                Ok((document.to_bytes()?, document.page_count()))
            })
            .await?;

            std::fs::write(&output, &bytes)
                .with_context(|| format!("Cannot write {}", output.display()))?;
            tracing::info!(output = %output.display(), pages, "wrote annotated PDF");
            Ok(output)
        }
        Command::Publish {
            source,
            annotations,
            store_root,
            context_id,
            item_id,
            filename,
        } => {
            let normalizer = RequireCompatible {
                max_version: config.render.max_pdf_version,
            };
            let limits = config.limits;
            let bytes = with_budget(budget, move || {
                let annotations = load_annotations(&annotations)?;
                prepare_upload(&normalizer, &assembler, &source, &annotations, &limits)
                    .with_context(|| format!("Failed to publish {}", source.display()))
            })
            .await?;

            let store = DirectoryStore::new(store_root);
            let record = FileRecord::new(context_id, item_id, filename);
            store.store(&record, &bytes)?;
            let location = store.location(&record)?;
            println!("{}", location.display());
            tracing::info!(size = bytes.len(), "publish complete");
            Ok(location)
        }
    }
}

fn load_annotations(path: &Path) -> Result<AnnotationDocument> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Cannot read annotations {}", path.display()))?;
    AnnotationDocument::from_slice(&bytes)
        .with_context(|| format!("Invalid annotations in {}", path.display()))
}

/// Run `job` on the blocking pool, failing if it does not finish within `budget`
async fn with_budget<T, F>(budget: Option<Duration>, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(job);
    let joined = match budget {
        Some(budget) => match tokio::time::timeout(budget, task).await {
            Ok(joined) => joined,
            Err(_timeout) => bail!("Timed out after {} ms", budget.as_millis()),
        },
        None => task.await,
    };

    match joined {
        Ok(result) => result,
        Err(join_error) => bail!("Annotation task panicked: {}", join_error),
    }
}
