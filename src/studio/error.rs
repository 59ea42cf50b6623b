// Error types for the studio

use super::types::{ImageId, Tab};
use thiserror::Error;

/// Result type for studio operations
pub type Result<T> = std::result::Result<T, StudioError>;

/// Problems caught before any request is sent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a prompt")]
    EmptyPrompt,

    #[error("Please select an image to edit")]
    NoEditSource,

    #[error("Please select at least one image for composition")]
    EmptySelection,

    #[error("Selected images have no file data to upload")]
    NoComposableImages,

    #[error("You can select up to {cap} images")]
    SelectionFull { cap: usize },

    #[error("Unsupported {field}: {value}")]
    Unsupported { field: &'static str, value: String },

    #[error("{name}: unsupported file type {mime}")]
    UnsupportedFileType { name: String, mime: String },

    #[error("{name}: file is larger than {max_bytes} bytes")]
    FileTooLarge { name: String, max_bytes: u64 },

    #[error("{name}: file is empty")]
    EmptyFile { name: String },

    #[error("No valid files found")]
    NoValidFiles,

    #[error("Too many files: at most {max} per upload")]
    TooManyFiles { max: usize },

    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),
}

/// Errors that can occur while driving the studio
#[derive(Error, Debug)]
pub enum StudioError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("A {} request is already in progress", .0.as_str())]
    Busy(Tab),

    #[error("{0}")]
    Api(String),

    #[error("HTTP error! status: {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No image returned: {0}")]
    NoImage(String),

    #[error("Failed to decode image data: {0}")]
    Decode(String),

    #[error("Malformed image source: {0}")]
    MalformedSource(String),

    #[error("Failed to fetch image: {0}")]
    Fetch(String),

    #[error("Response for the {} tab arrived after it was abandoned", .0.as_str())]
    Stale(Tab),

    #[error("Image {0} not found")]
    NotFound(ImageId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl StudioError {
    /// Whether the error was raised before anything left the process
    pub fn is_validation(&self) -> bool {
        matches!(self, StudioError::Validation(_) | StudioError::Busy(_))
    }
}

impl From<reqwest::Error> for StudioError {
    fn from(err: reqwest::Error) -> Self {
        StudioError::Network(err.to_string())
    }
}

impl From<base64::DecodeError> for StudioError {
    fn from(err: base64::DecodeError) -> Self {
        StudioError::Decode(err.to_string())
    }
}
