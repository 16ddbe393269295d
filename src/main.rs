use std::path::PathBuf;

use clap::{Parser, Subcommand};

use garment_tagger::pipeline::{self, HttpImageFetcher};
use garment_tagger::prompt::{ATTRIBUTE_PROMPT, ImagePayload};
use garment_tagger::store::SupabaseStore;
use garment_tagger::vision::{GeminiClient, VisionClient};
use garment_tagger::{
    ATTRIBUTES_FILE, BOTTOMS_FILE, PENDING_FILE, TOPS_FILE, attrs, load_env_files, recon,
};

#[derive(Parser)]
#[command(
    name = "garment-tagger",
    about = "Garment catalog enrichment — infer clothing attributes from images"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Describe one local image and print its attributes
    Analyze {
        image: PathBuf,
        /// Print the raw model reply instead of parsed attributes
        #[arg(long)]
        raw: bool,
    },
    /// Enrich pending catalog rows in place
    Fill {
        /// Restrict the run to one table
        #[arg(long)]
        table: Option<String>,
    },
    /// Export pending rows to the batch handoff file
    ExportPending {
        #[arg(long, default_value = PENDING_FILE)]
        output: PathBuf,
    },
    /// Join batch attributes against the handoff file into tops/bottoms CSVs
    Split {
        #[arg(long, default_value = PENDING_FILE)]
        urls: PathBuf,
        #[arg(long, default_value = ATTRIBUTES_FILE)]
        attrs: PathBuf,
        #[arg(long, default_value = TOPS_FILE)]
        tops: PathBuf,
        #[arg(long, default_value = BOTTOMS_FILE)]
        bottoms: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_files();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Analyze { image, raw } => {
            let bytes = std::fs::read(&image)?;
            let payload = ImagePayload::new(&bytes, &image.to_string_lossy());
            let vision = GeminiClient::from_env()?;
            let completion = vision.describe(ATTRIBUTE_PROMPT, &payload).await?;
            if raw {
                println!("{}", completion.text);
            } else {
                let record = attrs::parse_attributes(&completion.text)?;
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
        }
        Command::Fill { table } => {
            let store = SupabaseStore::from_env()?;
            let vision = GeminiClient::from_env()?;
            let images = HttpImageFetcher::new();
            let reports = match table {
                Some(table) => {
                    vec![pipeline::enrich_table(&store, &vision, &images, &table).await?]
                }
                None => pipeline::enrich_all(&store, &vision, &images).await?,
            };
            for report in reports {
                eprintln!(
                    "{}: {} pending, {} enriched, {} skipped",
                    report.table, report.pending, report.enriched, report.skipped
                );
            }
        }
        Command::ExportPending { output } => {
            let store = SupabaseStore::from_env()?;
            let counts = pipeline::export_pending(&store, &output).await?;
            for (table, count) in counts {
                eprintln!("{table}: {count} items exported");
            }
            eprintln!("Wrote {}", output.display());
        }
        Command::Split {
            urls,
            attrs: attrs_path,
            tops,
            bottoms,
        } => {
            let report = recon::split_files(&urls, &attrs_path, &tops, &bottoms)?;
            eprintln!("tops: {} rows, bottoms: {} rows", report.tops, report.bottoms);
        }
    }

    Ok(())
}
