use std::path::PathBuf;
use thiserror::Error;

/// Main error type for callseq operations
#[derive(Error, Debug)]
pub enum CallseqError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parser error: {0}")]
    Parser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No function found at {uri}:{line}:{character}")]
    EntryResolution {
        uri: PathBuf,
        line: u32,
        character: u32,
    },

    #[error("Failed to analyze {node}: {reason}")]
    NodeAnalysis { node: String, reason: String },

    #[error("Failed to write diagram to {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("Diagram generation was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, CallseqError>;
