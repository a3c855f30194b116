//! rawbids: lay out raw MEG/EEG recordings as a BIDS dataset.
//!
//! Given a raw recording and its subject/session/task/run identifiers,
//! rawbids composes the BIDS file and folder names, copies the recording
//! into place and writes the sidecars that describe it.
//!
//! # Modules
//!
//! - [`bids`]: Name composition and the dataset writer
//! - [`raw`]: Header-only readers for the supported recording formats
//! - [`error`]: Error types for rawbids operations

pub mod bids;
pub mod error;
pub mod raw;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

use bids::{make_bids_basename, write_raw_bids, BidsEntities, EventIdMap, Kind, WriteOptions};
pub use bids::WriteReport;
pub use error::RawBidsError;
use raw::{read_raw, AuxFiles, RawFormat};

/// The rawbids CLI application.
#[derive(Parser)]
#[command(name = "rawbids")]
#[command(version, author, about)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Copy a raw recording into a BIDS dataset and write its sidecars.
    RawToBids(RawToBidsArgs),
}

/// Report output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Arguments for the raw-to-bids subcommand.
#[derive(clap::Args)]
struct RawToBidsArgs {
    /// Subject label (letters and digits).
    #[arg(long, alias = "subject_id")]
    subject_id: String,

    /// Task label.
    #[arg(long)]
    task: String,

    /// Raw recording to convert (.fif, .edf, .bdf, .vhdr, .sqd, .con, or a 4D c,rfDC file).
    #[arg(long, alias = "raw_fname")]
    raw_fname: PathBuf,

    /// Root of the BIDS dataset.
    #[arg(long, alias = "output_path", env = "RAWBIDS_OUTPUT_PATH")]
    output_path: PathBuf,

    /// Session label.
    #[arg(long, alias = "session_id")]
    session_id: Option<String>,

    /// Run label.
    #[arg(long)]
    run: Option<String>,

    /// Acquisition label.
    #[arg(long)]
    acq: Option<String>,

    /// Recording modality; decides the datatype folder and filename suffix.
    #[arg(long, value_enum, default_value_t = Kind::Meg)]
    kind: Kind,

    /// Events file (MNE .eve/.txt, or .tsv/.csv with an onset column).
    #[arg(long, alias = "events_data")]
    events_data: Option<PathBuf>,

    /// Event code mapping, e.g. 'auditory=1,visual=3'.
    #[arg(long, alias = "event_id")]
    event_id: Option<String>,

    /// KIT marker coil file.
    #[arg(long)]
    hpi: Option<PathBuf>,

    /// KIT head-native digitizer points.
    #[arg(long)]
    electrode: Option<PathBuf>,

    /// Head-shape points.
    #[arg(long)]
    hsp: Option<PathBuf>,

    /// Acquisition configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replace files that already exist in the dataset.
    #[arg(long)]
    overwrite: bool,

    /// Power line frequency in Hz, recorded in the modality sidecar.
    #[arg(long, alias = "line_freq")]
    line_freq: Option<f64>,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    report: ReportFormat,
}

/// Everything one raw-to-bids conversion needs, resolved from the CLI.
#[derive(Clone, Debug, PartialEq)]
pub struct RawToBidsConfig {
    pub subject_id: String,
    pub task: String,
    pub raw_fname: PathBuf,
    pub output_path: PathBuf,
    pub session_id: Option<String>,
    pub run: Option<String>,
    pub acq: Option<String>,
    pub kind: Kind,
    pub events_data: Option<PathBuf>,
    pub event_id: Option<EventIdMap>,
    pub aux: AuxFiles,
    pub overwrite: bool,
    pub line_freq: Option<f64>,
}

impl RawToBidsConfig {
    /// A config with only the required identifiers and paths set.
    pub fn new(
        subject_id: impl Into<String>,
        task: impl Into<String>,
        raw_fname: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            task: task.into(),
            raw_fname: raw_fname.into(),
            output_path: output_path.into(),
            session_id: None,
            run: None,
            acq: None,
            kind: Kind::default(),
            events_data: None,
            event_id: None,
            aux: AuxFiles::default(),
            overwrite: false,
            line_freq: None,
        }
    }

    /// The identifier set of the data file for a recording in `format`.
    pub fn entities(&self, format: RawFormat) -> BidsEntities {
        let ext = format.bids_extension(&self.raw_fname).unwrap_or_default();
        let mut entities = BidsEntities::new(self.subject_id.as_str(), format!("{}{}", self.kind, ext))
            .with_task(self.task.as_str());
        entities.session = self.session_id.clone();
        entities.acquisition = self.acq.clone();
        entities.run = self.run.clone();
        entities
    }
}

impl TryFrom<RawToBidsArgs> for RawToBidsConfig {
    type Error = RawBidsError;

    fn try_from(args: RawToBidsArgs) -> Result<Self, Self::Error> {
        let event_id = args
            .event_id
            .as_deref()
            .map(str::parse::<EventIdMap>)
            .transpose()?;

        Ok(Self {
            subject_id: args.subject_id,
            task: args.task,
            raw_fname: args.raw_fname,
            output_path: args.output_path,
            session_id: args.session_id,
            run: args.run,
            acq: args.acq,
            kind: args.kind,
            events_data: args.events_data,
            event_id,
            aux: AuxFiles {
                hpi: args.hpi,
                electrode: args.electrode,
                hsp: args.hsp,
                config: args.config,
            },
            overwrite: args.overwrite,
            line_freq: args.line_freq,
        })
    }
}

/// Converts one raw recording into the dataset at `config.output_path`.
///
/// Identifiers are validated before the recording is opened.
pub fn raw_to_bids(config: RawToBidsConfig) -> Result<WriteReport, RawBidsError> {
    let format = RawFormat::from_path(&config.raw_fname)?;
    let basename = make_bids_basename(&config.entities(format))?;

    let raw = read_raw(&config.raw_fname, &config.aux)?;

    let opts = WriteOptions {
        overwrite: config.overwrite,
        event_id: config.event_id,
        line_freq: config.line_freq,
    };

    write_raw_bids(
        raw.as_ref(),
        &basename,
        &config.output_path,
        config.events_data.as_deref(),
        &opts,
    )
}

/// Run the rawbids CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), RawBidsError> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::RawToBids(args) => run_raw_to_bids(args),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    // Fails only if a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

/// Execute the raw-to-bids subcommand.
fn run_raw_to_bids(args: RawToBidsArgs) -> Result<(), RawBidsError> {
    let format = args.report;
    let config = RawToBidsConfig::try_from(args)?;
    let report = raw_to_bids(config)?;

    match format {
        ReportFormat::Json => {
            let json =
                serde_json::to_string_pretty(&report).map_err(RawBidsError::ReportSerialize)?;
            println!("{}", json);
        }
        ReportFormat::Text => print!("{}", report),
    }

    Ok(())
}
