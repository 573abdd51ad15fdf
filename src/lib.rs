mod batch;
mod docx;
mod error;
mod export;
mod format;
mod job;
mod model;
mod placeholder;
mod rules;
mod substitute;

pub use batch::{
    BatchOptions, BatchReport, DEFAULT_ARCHIVE_NAME, RowOutcome, RowStatus, TITLE_COLUMN,
    run_batch,
};
pub use error::{Error, Result};
pub use export::{CONVERTER_ENV, DEFAULT_CONVERTER, PdfConverter};
pub use format::{FormatPolicy, enforce_formatting};
pub use job::{
    JobOptions, JobOutput, default_title, generate, generate_with, run_job, validate_title,
};
pub use model::{
    Block, Document, HeaderFooter, Paragraph, ParagraphId, Run, RunProperties, Table, TableCell,
    TableRow,
};
pub use placeholder::{DEFAULT_KEYS, Mapping, extract_placeholders, normalize_key, token};
pub use rules::{ExceptionSet, MARKED_KEYS, classify_texts, normalize_text};
pub use substitute::substitute;
