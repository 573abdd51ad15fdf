use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("invalid DOCX: {0}")]
    InvalidDocx(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid placeholder pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("PDF conversion failed: {0}")]
    Convert(String),

    #[cfg(feature = "cli")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
