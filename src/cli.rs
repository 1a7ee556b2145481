use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "filedeck", version, about = "Upload, list and delete your files")]
pub struct Cli {
    /// Configuration file; defaults to the first `config.*` in the user config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Principal to act as. Without one, nothing is visible and nothing can be written.
    #[arg(long, global = true, env = "FILEDECK_USER")]
    pub user: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Upload one or more files as a single batch.
    Upload {
        /// Upload route; defaults to `default_route` from the configuration.
        #[arg(long)]
        route: Option<String>,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List your files, newest first.
    List {
        /// Only show files whose name contains this text (case-insensitive).
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show one file's details.
    Show { id: String },
    /// Save a copy of one of your files.
    Download {
        /// Where to write the file; defaults to its name in the current directory.
        #[arg(long, short)]
        output: Option<PathBuf>,
        id: String,
    },
    /// Delete a file's record.
    Delete {
        /// Also remove the stored object.
        #[arg(long)]
        purge: bool,
        id: String,
    },
    /// Print the configured upload routes and their limits.
    Routes,
}
