use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "diskforged")]
#[command(author, version, about = "Floppy disk imaging front end for flux readers")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Per-run overrides of the configured imaging parameters.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Base name for the capture, image, log and summary files
    #[arg(short, long)]
    pub base: Option<String>,

    /// Drive index passed to the reader
    #[arg(short, long)]
    pub drive: Option<u32>,

    /// Track range spec, e.g. "c=0-39:h=0"
    #[arg(short, long)]
    pub tracks: Option<String>,

    /// Revolutions per track
    #[arg(short, long)]
    pub revs: Option<u32>,

    /// Directory for all output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Path to the reader executable
    #[arg(long)]
    pub reader: Option<String>,

    /// Path to the converter executable
    #[arg(long)]
    pub converter: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the reader and converter are available and the drive answers
    Check,

    /// Read a disk and convert it to an image
    Image {
        #[command(flatten)]
        run: RunArgs,

        /// Do not remember these parameters in the config file
        #[arg(long)]
        no_save: bool,
    },

    /// Show the commands an imaging run would execute
    Plan {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Compute digests of files
    Digest {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Algorithms to use (md5, sha1, sha256); defaults to all
        #[arg(short, long, value_delimiter = ',')]
        algorithms: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Write the effective configuration to the config file
    SaveConfig,

    /// Display version information
    Version,
}
