use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while staging data or running import scripts.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Script names must be bare file names inside the script directory.
    #[error("script name {name:?} must be a file name inside the script directory")]
    InvalidScriptName { name: String },

    #[error("failed to read script {path}")]
    ReadScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("script {name} is not valid UTF-8")]
    ScriptEncoding {
        name: String,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("failed to copy {from} to {to}")]
    Stage {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start {program}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write script to {program}")]
    Feed {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program}")]
    Wait {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write to console")]
    Console(#[source] std::io::Error),

    #[error(transparent)]
    Bolt(#[from] neo4rs::Error),

    #[error("failed to decode column {column}: {message}")]
    Decode { column: &'static str, message: String },

    #[error("similarity writer task failed")]
    Join(#[from] tokio::task::JoinError),

    #[error("similarity writer pool closed")]
    Acquire(#[from] tokio::sync::AcquireError),
}

pub type Result<T> = std::result::Result<T, ImportError>;
