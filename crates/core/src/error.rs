use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShortsmithError {
    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Audio extraction failed for {video_path}: {reason}")]
    AudioExtractionFailed { video_path: PathBuf, reason: String },

    #[error("Transcription failed for {audio_path}: {reason}")]
    TranscriptFailed { audio_path: PathBuf, reason: String },

    #[error("Model download failed for {url}: {reason}")]
    ModelDownloadFailed { url: String, reason: String },

    #[error("{step} failed for {path}: {reason}")]
    EditFailed {
        step: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("Could not probe {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing configuration: {env_var} is not set")]
    MissingConfig { env_var: String },
}

pub type Result<T> = std::result::Result<T, ShortsmithError>;

/// Failures of the text-generation service itself.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generation service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

/// Why no highlight window could be produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("Highlight generation failed: {0}")]
    GenerationFailure(String),

    #[error("Negative time values: start {start}s, end {end}s")]
    NegativeTime { start: f64, end: f64 },

    #[error("Invalid time range: start {start}s, end {end}s (end must be > start)")]
    InvalidRange { start: f64, end: f64 },

    #[error("Response is missing the \"{0}\" field")]
    MissingField(&'static str),
}

impl From<GenerationError> for SelectionError {
    fn from(err: GenerationError) -> Self {
        SelectionError::GenerationFailure(err.to_string())
    }
}
