use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use tracing::warn;

use pagelens_bedrock::BedrockClient;
use pagelens_core::config::{ModelConfig, SearchConfig};
use pagelens_core::geometry::Margins;
use pagelens_core::index::{IndexDocument, SearchIndex};
use pagelens_core::model::ModelBackend;
use pagelens_core::snapshot;
use pagelens_extract::ExtractOptions;
use pagelens_index::OpenSearchIndex;
use pagelens_pdf_mupdf::MupdfBackend;
use pagelens_query::ChatSession;

/// PageLens - extract, index, and query figures from PDF documents
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract page renderings and embedded figures from a PDF
    Extract {
        /// Path to the PDF to process
        pdf_path: PathBuf,

        /// Directory for extracted images and the metadata snapshot
        savedir: PathBuf,

        /// Rendering resolution in dots per inch
        #[arg(long, default_value_t = 150.0)]
        dpi: f32,

        /// Minimum embedded-image width in pixels
        #[arg(long)]
        min_width: Option<u32>,

        /// Minimum embedded-image height in pixels
        #[arg(long)]
        min_height: Option<u32>,

        /// Crop expansion to the left, in PDF points
        #[arg(long, default_value_t = 20.0)]
        margin_left: f32,

        /// Crop expansion to the right, in PDF points
        #[arg(long, default_value_t = 20.0)]
        margin_right: f32,

        /// Crop expansion downward, in PDF points
        #[arg(long, default_value_t = 50.0)]
        margin_bottom: f32,

        /// Record geometry only; skip all model calls
        #[arg(long)]
        geometry_only: bool,
    },

    /// Embed and upload an extraction snapshot to the search index
    Index {
        /// Directory holding the images and metadata snapshot of a prior extract run
        savedir: PathBuf,
    },

    /// Answer a single question against the indexed document
    Ask {
        /// The question to answer
        query: String,

        /// Number of context images to retrieve
        #[arg(long, default_value_t = 5)]
        doc_count: usize,
    },

    /// Interactive multi-turn question session
    Chat {
        /// Number of context images to retrieve
        #[arg(long, default_value_t = 5)]
        doc_count: usize,
    },
}

fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    // File logging is opt-in via PAGELENS_LOG_DIR; the guard must outlive
    // main so buffered lines get flushed.
    match std::env::var("PAGELENS_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "pagelens.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Extract {
            pdf_path,
            savedir,
            dpi,
            min_width,
            min_height,
            margin_left,
            margin_right,
            margin_bottom,
            geometry_only,
        } => {
            let defaults = if geometry_only {
                ExtractOptions::geometry_mode()
            } else {
                ExtractOptions::default()
            };
            let options = ExtractOptions {
                min_width: min_width.unwrap_or(defaults.min_width),
                min_height: min_height.unwrap_or(defaults.min_height),
                margins: Margins {
                    left: margin_left,
                    right: margin_right,
                    bottom: margin_bottom,
                },
                dpi,
            };
            extract(&pdf_path, &savedir, options, geometry_only).await
        }
        Command::Index { savedir } => index(&savedir).await,
        Command::Ask { query, doc_count } => ask(&query, doc_count).await,
        Command::Chat { doc_count } => chat(doc_count).await,
    }
}

async fn extract(
    pdf_path: &Path,
    savedir: &Path,
    options: ExtractOptions,
    geometry_only: bool,
) -> anyhow::Result<()> {
    if !pdf_path.exists() {
        anyhow::bail!("File not found: {}", pdf_path.display());
    }
    let pdf = MupdfBackend;

    let metadata_path = if geometry_only {
        pagelens_extract::extract_document_geometry(&pdf, pdf_path, savedir, &options)?
    } else {
        let model_config = ModelConfig::from_env()?;
        let model_id = model_config.model_id.clone();
        let model = BedrockClient::new(model_config);
        pagelens_extract::extract_document(&pdf, &model, &model_id, pdf_path, savedir, &options)
            .await?
    };

    let records = snapshot::read_snapshot(&metadata_path)?;
    println!(
        "{} {} records written to {}",
        "Extracted:".bold().green(),
        records.len(),
        metadata_path.display()
    );
    Ok(())
}

async fn index(savedir: &Path) -> anyhow::Result<()> {
    let metadata_path = savedir.join("metadata.json");
    if !metadata_path.exists() {
        anyhow::bail!(
            "No metadata snapshot at {}. Run extract first.",
            metadata_path.display()
        );
    }

    let model = BedrockClient::new(ModelConfig::from_env()?);
    let search = OpenSearchIndex::new(SearchConfig::from_env()?);
    let records = snapshot::read_snapshot(&metadata_path)?;

    let mut uploaded = 0usize;
    for record in records.values() {
        let Some(record_type) = record.record_type else {
            warn!(file = %record.file_name, "record has no type, skipping");
            continue;
        };

        // Pipeline snapshots key records by full image path; geometry
        // snapshots by bare file name.
        let image_path = if Path::new(&record.file_name).exists() {
            PathBuf::from(&record.file_name)
        } else {
            savedir.join(&record.file_name)
        };
        let image_bytes = std::fs::read(&image_path)?;

        let content_vector = model.embed(&record.image_text).await?;
        let file_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| record.file_name.clone());

        search
            .upsert(IndexDocument {
                page_number: record.page,
                image_file_name: file_name,
                text: record.image_text.clone(),
                image_type: record_type,
                image_base64: BASE64.encode(&image_bytes),
                content_vector,
            })
            .await?;
        uploaded += 1;
    }

    println!(
        "{} {} of {} records uploaded",
        "Indexed:".bold().green(),
        uploaded,
        records.len()
    );
    Ok(())
}

async fn ask(query: &str, doc_count: usize) -> anyhow::Result<()> {
    let model_config = ModelConfig::from_env()?;
    let model_id = model_config.model_id.clone();
    let model = BedrockClient::new(model_config);
    let search = OpenSearchIndex::new(SearchConfig::from_env()?);

    let mut session = ChatSession::new(&model, &search, model_id, doc_count);
    let mut sink = |fragment: &str| {
        print!("{fragment}");
        let _ = std::io::stdout().flush();
    };
    session.ask(query, &mut sink).await?;
    println!();
    Ok(())
}

async fn chat(doc_count: usize) -> anyhow::Result<()> {
    let model_config = ModelConfig::from_env()?;
    let model_id = model_config.model_id.clone();
    let model = BedrockClient::new(model_config);
    let search = OpenSearchIndex::new(SearchConfig::from_env()?);

    let mut session = ChatSession::new(&model, &search, model_id, doc_count);
    let stdin = std::io::stdin();

    println!("Ask about the indexed document. Empty line or Ctrl-D exits.");
    loop {
        print!("{} ", ">".bold().cyan());
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        let mut sink = |fragment: &str| {
            print!("{fragment}");
            let _ = std::io::stdout().flush();
        };
        // A failed turn is reported and the session keeps going.
        match session.ask(question, &mut sink).await {
            Ok(_) => println!("\n"),
            Err(e) => eprintln!("\n{} {e}", "error:".bold().red()),
        }
    }
    Ok(())
}
