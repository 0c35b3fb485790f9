use clap::{Parser, Subcommand};
use docket_bulk::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docket-bulk")]
#[command(about = "Bulk download docket documents and exhibits from exported docket reports")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download every document linked from the record files
    Download {
        #[command(flatten)]
        input: InputArgs,

        /// Output directory; one subfolder per record
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for the failed-downloads report
        #[arg(short, long)]
        reports: Option<PathBuf>,

        /// Client matter sent along with each request
        #[arg(short, long)]
        client_matter: Option<String>,

        /// Maximum number of concurrent downloads
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },

    /// List the documents that would be downloaded
    List {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(clap::Args)]
pub struct InputArgs {
    /// Directory containing the record files
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Record file extension
    #[arg(short, long)]
    pub extension: Option<String>,
}

impl InputArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(input) = &self.input {
            config.input_dir = input.clone();
        }
        if let Some(extension) = &self.extension {
            config.record_extension = extension.clone();
        }
    }
}
