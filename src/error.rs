use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ImportError {
    #[error("invalid dataset slug: {0}")]
    InvalidSlug(String),

    #[error("Dataset must be specified in the form of '{{username}}/{{dataset-slug}}': {0}")]
    #[diagnostic(help("use the owner and dataset parts of the kaggle URL, e.g. zynicide/wine-reviews"))]
    InvalidDataset(String),

    #[error("{0}")]
    MissingDependency(String),

    #[error("file '{file}' is not part of the dataset, available files: {}", available.join(", "))]
    FileNotInDataset { file: String, available: Vec<String> },

    #[error("kaggle credentials missing: {0}")]
    #[diagnostic(help(
        "pass --username/--key, set KAGGLE_USERNAME/KAGGLE_KEY or create ~/.kaggle/kaggle.json"
    ))]
    MissingCredentials(String),

    #[error("kaggle request failed: {0}")]
    RemoteService(String),

    #[error("kaggle returned status {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error("downloaded file not found in folder: {0}")]
    FileNotFound(PathBuf),

    #[error("archive {archive} did not contain expected file {file}")]
    ArchiveMissingFile { archive: PathBuf, file: String },

    #[error("failed to extract archive: {0}")]
    Extraction(String),

    #[error("invalid resource sink identifier: {0}")]
    InvalidSink(String),

    #[error("resource store request failed: {0}")]
    SinkHttp(String),

    #[error("resource store returned status {status}: {message}")]
    SinkStatus { status: u16, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
