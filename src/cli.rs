use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Tag separator override (e.g. ", " or ". ")
    #[arg(short, long)]
    pub separator: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the merged tag view across the given files
    Merge {
        /// Image or caption files to include
        files: Vec<PathBuf>,

        /// Scan a dataset directory for images instead
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Apply an edited merged view back to every file's caption
    Apply {
        /// Image or caption files to include
        files: Vec<PathBuf>,

        /// Scan a dataset directory for images instead
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Edited merged text (read from stdin when omitted)
        #[arg(short, long)]
        text: Option<String>,

        /// Read the edited merged text from a file
        #[arg(long)]
        text_file: Option<PathBuf>,

        /// Print resulting captions without writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Ensure a tag is present in every file's caption
    Ensure {
        /// Tag to add where missing
        #[arg(short, long)]
        tag: String,

        /// Image or caption files to include
        files: Vec<PathBuf>,

        /// Scan a dataset directory for images instead
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Report how widely a tag is present across the files
    Presence {
        /// Tag to look up
        #[arg(short, long)]
        tag: String,

        /// Image or caption files to include
        files: Vec<PathBuf>,

        /// Scan a dataset directory for images instead
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Tag frequency statistics over a dataset directory
    Stats {
        /// Dataset directory to scan
        #[arg(short, long)]
        dir: PathBuf,

        /// Number of tags to list
        #[arg(long)]
        top: Option<usize>,
    },
}
