use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use radiomics::{ExtractionContext, Extractor, FilterKind, ResultRecord};
use radiomics_cli::ParamsFile;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract features from an image and mask
    Extract {
        /// Image volume (.json document, raster or slice directory)
        #[arg(short, long)]
        image: PathBuf,
        /// Mask volume, same layouts as the image
        #[arg(short, long)]
        mask: PathBuf,
        /// Parameter file (.toml or .json)
        #[arg(short, long)]
        params: Option<PathBuf>,
        /// Mask label, overriding the parameter file
        #[arg(short, long)]
        label: Option<i64>,
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Worker threads (0 = one per core)
        #[arg(long, default_value = "0")]
        workers: usize,
    },
    /// Print the JSON schema of the parameter file
    Schema,
    /// List available filters and feature classes
    List,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Extract {
            image,
            mask,
            params,
            label,
            format,
            output,
            workers,
        } => {
            extract(image, mask, params.as_deref(), *label, *format, output.as_deref(), *workers)?;
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(ParamsFile);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Commands::List => list()?,
    }

    Ok(())
}

fn extract(
    image: &Path,
    mask: &Path,
    params: Option<&Path>,
    label: Option<i64>,
    format: OutputFormat,
    output: Option<&Path>,
    workers: usize,
) -> Result<()> {
    let params = match params {
        Some(path) => ParamsFile::from_file(path)
            .wrap_err_with(|| format!("Failed to read parameter file {}", path.display()))?,
        None => ParamsFile::default(),
    };

    let context = ExtractionContext::with_workers(workers)?;
    let config = params.into_builder().build(&context)?;
    info!(fingerprint = %config.fingerprint()?, "configuration resolved");

    let extractor = Extractor::new(context, config);
    let record = extractor
        .execute_paths(image, mask, label)
        .wrap_err_with(|| format!("Extraction failed for {}", image.display()))?;
    info!(keys = record.len(), "extraction completed");

    let rendered = render(&record, format)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            info!("Result written to {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn render(record: &ResultRecord, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(record)?,
        OutputFormat::Csv => record.to_csv(),
    })
}

fn list() -> Result<()> {
    let context = ExtractionContext::with_workers(1)?;

    println!("Filters:");
    for name in FilterKind::filter_names() {
        let description = name
            .parse::<FilterKind>()
            .map(|kind| kind.description())
            .unwrap_or_default();
        println!("  {name:<12} {description}");
    }

    println!("Feature classes:");
    for name in context.features().names() {
        println!("  {name}");
        for feature in context.features().get(name)?.features() {
            match feature.deprecated {
                Some(note) => println!("    {} (deprecated: {note})", feature.name),
                None => println!("    {}", feature.name),
            }
        }
    }
    Ok(())
}
