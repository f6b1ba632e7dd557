use std::io;

use thiserror::Error;

use crate::jobs::JobStatus;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid page selection: {0}")]
    InvalidPageSelection(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("document has no readable text or layout in any source")]
    NoReadableContent,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job '{0}' not found")]
    NotFound(String),

    #[error("job '{0}' is already being processed")]
    AlreadyProcessing(String),

    #[error("job cannot move from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("original file for job '{0}' is missing")]
    MissingOriginalFile(String),

    #[error("job storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Extraction(#[from] ExtractError),
}
