use std::time::Instant;

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::export::PdfConverter;
use crate::format::{FormatPolicy, enforce_formatting};
use crate::model::Document;
use crate::placeholder::Mapping;
use crate::rules::classify_texts;
use crate::substitute::substitute;

const UNNAMED_GROUP: &str = "Sem Nome";

/// Run one generation job on a fresh copy of the template: substitute the
/// mapping, then apply the format policy with the exception paragraphs left
/// non-bold. Phrase rules are judged on the text before substitution.
pub fn generate_with(
    template: &Document,
    mapping: &Mapping,
    policy: &FormatPolicy,
) -> Result<Document> {
    let mut doc = template.clone();
    let original_texts = doc.paragraph_texts();
    let mut exceptions = substitute(&mut doc, mapping)?;
    exceptions.extend(&classify_texts(&original_texts));
    log::debug!(
        "{} of {} paragraphs keep non-bold formatting",
        exceptions.len(),
        original_texts.len()
    );
    enforce_formatting(&mut doc, &exceptions, policy);
    Ok(doc)
}

/// [`generate_with`] under the default policy (Calibri 11).
pub fn generate(template: &Document, mapping: &Mapping) -> Result<Document> {
    generate_with(template, mapping, &FormatPolicy::default())
}

/// `MOU – {GROUP_NAME} – {date}`, with a stand-in when the group is blank.
pub fn default_title(mapping: &Mapping, date: NaiveDate) -> String {
    let group = mapping
        .get("GROUP_NAME")
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .unwrap_or(UNNAMED_GROUP);
    format!("MOU – {group} – {}", date.format("%Y-%m-%d"))
}

/// Titles become file names, so they must be non-empty and free of path
/// separators and control characters.
pub fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::Validation("document title is empty".into()));
    }
    if let Some(c) = title
        .chars()
        .find(|c| matches!(c, '/' | '\\') || c.is_control())
    {
        return Err(Error::Validation(format!(
            "document title {title:?} contains invalid character {c:?}"
        )));
    }
    if title == "." || title == ".." {
        return Err(Error::Validation(format!("document title {title:?} is not a file name")));
    }
    Ok(title.to_string())
}

#[derive(Clone, Debug, Default)]
pub struct JobOptions {
    pub policy: FormatPolicy,
    /// Convert to PDF as well; `None` produces DOCX only.
    pub pdf: Option<PdfConverter>,
}

#[derive(Clone, Debug)]
pub struct JobOutput {
    pub title: String,
    pub docx: Vec<u8>,
    pub pdf: Option<Vec<u8>>,
    /// Informational notes, e.g. a skipped PDF export.
    pub notes: Vec<String>,
}

impl JobOutput {
    pub fn docx_name(&self) -> String {
        format!("{}.docx", self.title)
    }

    pub fn pdf_name(&self) -> String {
        format!("{}.pdf", self.title)
    }
}

/// Generate, serialize and optionally convert one document. A failed PDF
/// conversion is recorded as a note; the DOCX is still returned.
pub fn run_job(
    template: &Document,
    mapping: &Mapping,
    title: &str,
    options: &JobOptions,
) -> Result<JobOutput> {
    let t0 = Instant::now();
    let title = validate_title(title)?;

    let doc = generate_with(template, mapping, &options.policy)?;
    let t_generate = t0.elapsed();

    let docx = doc.to_bytes()?;
    let t_write = t0.elapsed();

    let mut notes = Vec::new();
    let pdf = match &options.pdf {
        Some(converter) => match converter.convert(&docx) {
            Ok(pdf) => Some(pdf),
            Err(e) => {
                log::warn!("{title}: PDF export skipped: {e}");
                notes.push(format!("PDF not generated: {e}"));
                None
            }
        },
        None => None,
    };
    let t_total = t0.elapsed();

    log::info!(
        "{title}: generate={:.1}ms, write={:.1}ms, pdf={:.1}ms, total={:.1}ms (docx {} bytes)",
        t_generate.as_secs_f64() * 1000.0,
        (t_write - t_generate).as_secs_f64() * 1000.0,
        (t_total - t_write).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        docx.len(),
    );

    Ok(JobOutput {
        title,
        docx,
        pdf,
        notes,
    })
}
