//! mpdata: MediaPipe landmark dataset reader and TFRecord converter.
//!
//! mpdata reads per-frame hand/face/pose landmark captures stored either as
//! CSV exports or as TFRecord files of `tf.train.Example` records, converts
//! CSV to TFRecord, and hands decoded `(landmarks, phrase)` entries to
//! visualization code. Rendering itself lives outside this crate.
//!
//! # Modules
//!
//! - [`tabular`]: CSV reading with an explicit text encoding
//! - [`record`]: record schema, codec and TFRecord framing
//! - [`convert`]: CSV to record-stream conversion
//! - [`corpus`]: resolving input paths into a file list
//! - [`reader`]: the dataset reader session
//! - [`snapshot`]: saving and restoring decoded datasets
//! - [`config`]: feature schema and external column configuration
//! - [`error`]: Error types for mpdata operations
//!
//! # Example
//!
//! ```no_run
//! use mpdata::config::FeatureSchema;
//! use mpdata::corpus::CorpusRequest;
//! use mpdata::reader::DatasetReader;
//! use mpdata::tabular::TextEncoding;
//!
//! let reader = DatasetReader::open(
//!     &CorpusRequest::dir("captures/", "csv"),
//!     FeatureSchema::default(),
//!     TextEncoding::Latin1,
//! )?;
//! for entry in reader.dataset() {
//!     let entry = entry?;
//!     println!("{} {:?}", entry.phrase_text(), entry.landmarks.shape());
//! }
//! # Ok::<(), mpdata::MpdataError>(())
//! ```

pub mod config;
pub mod convert;
pub mod corpus;
pub mod error;
pub mod reader;
pub mod record;
pub mod sample;
pub mod snapshot;
pub mod tabular;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub use error::MpdataError;

use config::{FeatureConfig, FeatureSchema, DEFAULT_CHANNELS, DEFAULT_NUM_FEATURES};
use convert::CsvRecordConverter;
use corpus::{CorpusRequest, InputFormat};
use reader::DatasetReader;
use record::container::write_tfrecord_file;
use record::DecodedEntry;
use tabular::TextEncoding;

/// The mpdata CLI application.
#[derive(Parser)]
#[command(name = "mpdata")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Only log errors.
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV corpus into a single TFRecord file.
    Convert(ConvertArgs),
    /// Decode a corpus and print a summary of its entries.
    Inspect(InspectArgs),
    /// Decode a corpus and save it as a snapshot directory.
    Snapshot(SnapshotArgs),
    /// Load a snapshot directory and print a summary of its entries.
    Restore(RestoreArgs),
}

/// Which files to read.
#[derive(clap::Args)]
struct CorpusArgs {
    /// A single CSV or TFRecord file.
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// A directory of CSV or TFRecord files.
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Input format ('csv' or 'tfrecord').
    #[arg(long, default_value = "csv")]
    format: String,

    /// Read only the file at this position of the sorted directory listing.
    #[arg(long)]
    index: Option<usize>,

    /// Text encoding of CSV input.
    #[arg(long, default_value = "ISO-8859-1")]
    encoding: String,
}

/// How to shape decoded landmarks.
#[derive(clap::Args)]
struct SchemaArgs {
    /// YAML or JSON file listing the feature columns.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Landmark points per frame.
    #[arg(long, default_value_t = DEFAULT_NUM_FEATURES)]
    num_features: usize,

    /// Coordinates per landmark point.
    #[arg(long, default_value_t = DEFAULT_CHANNELS)]
    channels: usize,
}

#[derive(clap::Args)]
struct ConvertArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    /// Output TFRecord file.
    #[arg(long, short)]
    output: PathBuf,
}

#[derive(clap::Args)]
struct InspectArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    #[command(flatten)]
    schema: SchemaArgs,

    /// Stop after this many entries.
    #[arg(long)]
    limit: Option<usize>,

    /// Show a random sample of this many entries.
    #[arg(long, conflicts_with = "limit")]
    sample: Option<usize>,

    /// Seed for --sample.
    #[arg(long, requires = "sample")]
    seed: Option<u64>,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

#[derive(clap::Args)]
struct SnapshotArgs {
    #[command(flatten)]
    corpus: CorpusArgs,

    #[command(flatten)]
    schema: SchemaArgs,

    /// Directory to write the snapshot to.
    #[arg(long)]
    output_dir: PathBuf,
}

#[derive(clap::Args)]
struct RestoreArgs {
    /// Snapshot directory.
    input: PathBuf,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Run the mpdata CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), MpdataError> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Some(Commands::Convert(args)) => run_convert(args),
        Some(Commands::Inspect(args)) => run_inspect(args),
        Some(Commands::Snapshot(args)) => run_snapshot(args),
        Some(Commands::Restore(args)) => run_restore(args),
        None => {
            println!("mpdata {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("MediaPipe landmark dataset reader and TFRecord converter.");
            println!();
            println!("Run 'mpdata --help' for usage information.");
            Ok(())
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    // Already set when embedded in a host that installed its own subscriber.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

impl CorpusArgs {
    fn request(&self) -> CorpusRequest {
        CorpusRequest {
            input_file: self.input_file.clone(),
            input_dir: self.input_dir.clone(),
            format: self.format.clone(),
            index: self.index,
        }
    }

    fn encoding(&self) -> Result<TextEncoding, MpdataError> {
        self.encoding.parse()
    }
}

impl SchemaArgs {
    fn schema(&self) -> Result<FeatureSchema, MpdataError> {
        match &self.config {
            Some(path) => {
                let config = FeatureConfig::from_path(path)?;
                Ok(config.to_schema(self.num_features, self.channels))
            }
            None => Ok(FeatureSchema::new(self.num_features, self.channels)),
        }
    }
}

fn open_reader(corpus: &CorpusArgs, schema: &SchemaArgs) -> Result<DatasetReader, MpdataError> {
    DatasetReader::open(&corpus.request(), schema.schema()?, corpus.encoding()?)
}

/// Execute the convert subcommand.
fn run_convert(args: ConvertArgs) -> Result<(), MpdataError> {
    let corpus = corpus::resolve(&args.corpus.request())?;
    if corpus.format() != InputFormat::Csv {
        return Err(MpdataError::config(
            "convert reads CSV input; pass --format csv",
        ));
    }

    let converter = CsvRecordConverter::new(args.corpus.encoding()?);
    let records = converter
        .record_stream(corpus.files())
        .map(|r| r.map(|(_, bytes)| bytes));
    let count = write_tfrecord_file(&args.output, records)?;

    info!(files = corpus.files().len(), records = count, "conversion finished");
    println!(
        "Wrote {} record(s) from {} file(s) to {}",
        count,
        corpus.files().len(),
        args.output.display()
    );
    Ok(())
}

/// Execute the inspect subcommand.
fn run_inspect(args: InspectArgs) -> Result<(), MpdataError> {
    let reader = open_reader(&args.corpus, &args.schema)?;

    let indexed: Vec<(usize, DecodedEntry)> = match args.sample {
        Some(n) => {
            let entries = reader.load_dataset(reader.files())?;
            let picks = sample::sample_indices(entries.len(), n, args.seed)?;
            let mut entries: Vec<Option<DecodedEntry>> = entries.into_iter().map(Some).collect();
            picks
                .into_iter()
                .filter_map(|i| entries[i].take().map(|e| (i, e)))
                .collect()
        }
        None => reader
            .dataset()
            .take(args.limit.unwrap_or(usize::MAX))
            .enumerate()
            .map(|(i, r)| r.map(|e| (i, e)))
            .collect::<Result<_, _>>()?,
    };

    print_entries(
        &indexed,
        reader.files().len(),
        &reader.corpus().format().to_string(),
        &args.output,
    );
    reader.close();
    Ok(())
}

/// Execute the snapshot subcommand.
fn run_snapshot(args: SnapshotArgs) -> Result<(), MpdataError> {
    let reader = open_reader(&args.corpus, &args.schema)?;
    let entries = reader.load_dataset(reader.files())?;
    reader.snapshot(&entries, &args.output_dir)?;
    println!(
        "Saved {} entr{} to {}",
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" },
        args.output_dir.display()
    );
    Ok(())
}

/// Execute the restore subcommand.
fn run_restore(args: RestoreArgs) -> Result<(), MpdataError> {
    let entries = snapshot::read_snapshot(&args.input)?;
    let indexed: Vec<(usize, DecodedEntry)> = entries.into_iter().enumerate().collect();
    print_entries(&indexed, 1, "snapshot", &args.output);
    Ok(())
}

fn print_entries(entries: &[(usize, DecodedEntry)], file_count: usize, format: &str, output: &str) {
    match output {
        "json" => {
            let items: Vec<serde_json::Value> = entries
                .iter()
                .map(|(i, e)| {
                    serde_json::json!({
                        "index": i,
                        "frame": e.frame,
                        "phrase": e.phrase_text(),
                        "context": e.context_text(),
                        "shape": [e.landmarks.rows(), e.landmarks.cols()],
                    })
                })
                .collect();
            let report = serde_json::json!({
                "files": file_count,
                "format": format,
                "entry_count": entries.len(),
                "entries": items,
            });
            match serde_json::to_string_pretty(&report) {
                Ok(text) => println!("{}", text),
                Err(e) => eprintln!("failed to render JSON report: {e}"),
            }
        }
        _ => {
            println!("Corpus: {} file(s) ({})", file_count, format);
            for (i, e) in entries {
                let (rows, cols) = e.landmarks.shape();
                println!(
                    "[{}] frame={} phrase=\"{}\" shape=({}, {})",
                    i,
                    e.frame,
                    e.phrase_text(),
                    rows,
                    cols
                );
            }
            println!("Entries: {}", entries.len());
        }
    }
}
