use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;

use crate::core::{DiagramRequest, Engine};

#[derive(Parser)]
#[command(name = "callseq")]
#[command(about = "Sequence diagrams from the call graph of a Python function")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default callseq.toml
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Generate a sequence diagram for the function at a location
    Generate {
        /// Source file containing the entry function
        #[arg(short, long)]
        file: PathBuf,

        /// 1-based line inside the entry function
        #[arg(short, long)]
        line: u32,

        /// 1-based column
        #[arg(long, default_value_t = 1)]
        column: u32,

        /// Output directory (defaults to [output].directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (plantuml, json)
        #[arg(long)]
        format: Option<String>,

        /// Override the configured maximum depth
        #[arg(long)]
        max_depth: Option<u32>,

        /// Print to stdout instead of writing a file
        #[arg(long)]
        stdout: bool,
    },

    /// List the participants a diagram would contain
    Participants {
        /// Source file containing the entry function
        #[arg(short, long)]
        file: PathBuf,

        /// 1-based line inside the entry function
        #[arg(short, long)]
        line: u32,
    },
}

impl Cli {
    pub async fn execute(self, mut engine: Engine) -> Result<()> {
        match self.command {
            Commands::Init { path } => engine.init(path).await,
            Commands::Generate {
                file,
                line,
                column,
                output,
                format,
                max_depth,
                stdout,
            } => {
                engine
                    .generate(DiagramRequest {
                        file,
                        line,
                        column,
                        output,
                        format,
                        max_depth,
                        stdout,
                    })
                    .await
            }
            Commands::Participants { file, line } => engine.participants(&file, line).await,
        }
    }
}
