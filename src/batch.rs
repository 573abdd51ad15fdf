use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io::{Read, Seek, Write};

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::job::{JobOptions, JobOutput, default_title, run_job};
use crate::model::Document;
use crate::placeholder::{Mapping, extract_placeholders, normalize_key};

pub const DEFAULT_ARCHIVE_NAME: &str = "mous_gerados.zip";
/// Optional column naming each output document.
pub const TITLE_COLUMN: &str = "TITLE";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowStatus {
    Ok,
    /// Generated, but these expected keys had no value and were rendered empty.
    Warning { missing: Vec<String> },
    Error(String),
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowStatus::Ok => write!(f, "OK"),
            RowStatus::Warning { missing } => write!(f, "WARNING: missing {}", missing.join(", ")),
            RowStatus::Error(msg) => write!(f, "ERROR: {msg}"),
        }
    }
}

impl Serialize for RowStatus {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RowOutcome {
    /// 1-based data row number (header excluded).
    pub row: usize,
    pub title: String,
    pub status: RowStatus,
    /// ZIP entry names written for this row.
    pub entries: Vec<String>,
    pub notes: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchReport {
    pub rows: Vec<RowOutcome>,
}

#[derive(Serialize)]
struct ReportLine<'a> {
    row: usize,
    title: &'a str,
    status: String,
    entries: String,
    notes: String,
}

impl BatchReport {
    pub fn ok_count(&self) -> usize {
        self.count(|s| matches!(s, RowStatus::Ok))
    }

    pub fn warning_count(&self) -> usize {
        self.count(|s| matches!(s, RowStatus::Warning { .. }))
    }

    pub fn error_count(&self) -> usize {
        self.count(|s| matches!(s, RowStatus::Error(_)))
    }

    fn count(&self, pred: impl Fn(&RowStatus) -> bool) -> usize {
        self.rows.iter().filter(|r| pred(&r.status)).count()
    }

    /// One CSV line per row: row, title, status, entries, notes.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        for outcome in &self.rows {
            csv.serialize(ReportLine {
                row: outcome.row,
                title: &outcome.title,
                status: outcome.status.to_string(),
                entries: outcome.entries.join("; "),
                notes: outcome.notes.join("; "),
            })?;
        }
        csv.flush()?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct BatchOptions {
    pub job: JobOptions,
    /// Keys every row should provide; defaults to the template's placeholders.
    pub expected_keys: Option<BTreeSet<String>>,
    /// Date used in default titles.
    pub date: NaiveDate,
}

impl BatchOptions {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            job: JobOptions::default(),
            expected_keys: None,
            date,
        }
    }
}

/// Append ` (n)` to titles already used in this batch so entries never collide.
#[derive(Default)]
struct TitleRegistry {
    seen: HashMap<String, usize>,
}

impl TitleRegistry {
    fn claim(&mut self, title: String) -> String {
        let count = self.seen.entry(title.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            return title;
        }
        let mut n = *count;
        loop {
            let candidate = format!("{title} ({n})");
            if !self.seen.contains_key(&candidate) {
                self.seen.insert(candidate.clone(), 1);
                return candidate;
            }
            n += 1;
        }
    }
}

struct RowInput {
    mapping: Mapping,
    title: String,
    missing: Vec<String>,
}

fn row_input(
    headers: &[String],
    record: &csv::StringRecord,
    expected: &BTreeSet<String>,
    date: NaiveDate,
) -> Result<RowInput> {
    let mut mapping = Mapping::default();
    for (header, cell) in headers.iter().zip(record.iter()) {
        if header.is_empty() || cell.trim().is_empty() {
            continue;
        }
        mapping.insert(header, cell)?;
    }

    let missing: Vec<String> = expected
        .iter()
        .filter(|key| mapping.get(key).is_none())
        .cloned()
        .collect();
    for key in &missing {
        mapping.insert(key, "")?;
    }

    let title = match mapping.get(TITLE_COLUMN) {
        Some(title) if !title.trim().is_empty() => title.to_string(),
        _ => default_title(&mapping, date),
    };
    Ok(RowInput {
        mapping,
        title,
        missing,
    })
}

fn write_entry<W: Write + Seek>(
    zip: &mut zip::ZipWriter<W>,
    name: &str,
    data: &[u8],
) -> Result<()> {
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    zip.start_file(name, options)?;
    zip.write_all(data)?;
    Ok(())
}

fn write_outputs<W: Write + Seek>(
    zip: &mut zip::ZipWriter<W>,
    output: &JobOutput,
) -> Result<Vec<String>> {
    let mut entries = vec![output.docx_name()];
    write_entry(zip, &output.docx_name(), &output.docx)?;
    if let Some(pdf) = &output.pdf {
        write_entry(zip, &output.pdf_name(), pdf)?;
        entries.push(output.pdf_name());
    }
    Ok(entries)
}

/// Generate one document per CSV row into a ZIP archive. Rows are independent:
/// a failing row is reported and the batch moves on. Only unreadable CSV
/// headers or archive write failures abort the batch.
pub fn run_batch<R: Read, W: Write + Seek>(
    template: &Document,
    csv_data: R,
    archive: W,
    options: &BatchOptions,
) -> Result<BatchReport> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_data);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| normalize_key(h.trim_start_matches('\u{feff}')).unwrap_or_default())
        .collect();

    let expected = options
        .expected_keys
        .clone()
        .unwrap_or_else(|| extract_placeholders(template));
    let absent: Vec<&String> = expected.iter().filter(|k| !headers.contains(k)).collect();
    if !absent.is_empty() {
        log::warn!(
            "CSV has no column for {}; those fields will be empty",
            absent.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
        );
    }

    let mut zip = zip::ZipWriter::new(archive);
    let mut titles = TitleRegistry::default();
    let mut report = BatchReport::default();

    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let input = record
            .map_err(Into::into)
            .and_then(|record| row_input(&headers, &record, &expected, options.date));
        let input = match input {
            Ok(input) => input,
            Err(e) => {
                log::error!("row {row}: {e}");
                report.rows.push(RowOutcome {
                    row,
                    title: format!("row {row}"),
                    status: RowStatus::Error(e.to_string()),
                    entries: Vec::new(),
                    notes: Vec::new(),
                });
                continue;
            }
        };

        let title = titles.claim(input.title.trim().to_string());
        let output = match run_job(template, &input.mapping, &title, &options.job) {
            Ok(output) => output,
            Err(e) => {
                log::error!("row {row} ({title}): {e}");
                report.rows.push(RowOutcome {
                    row,
                    title,
                    status: RowStatus::Error(e.to_string()),
                    entries: Vec::new(),
                    notes: Vec::new(),
                });
                continue;
            }
        };

        let entries = write_outputs(&mut zip, &output)?;
        let status = if input.missing.is_empty() {
            RowStatus::Ok
        } else {
            log::warn!("row {row} ({title}): missing {}", input.missing.join(", "));
            RowStatus::Warning {
                missing: input.missing,
            }
        };
        report.rows.push(RowOutcome {
            row,
            title: output.title,
            status,
            entries,
            notes: output.notes,
        });
    }

    zip.finish()?;
    log::info!(
        "Batch done: {} ok, {} warnings, {} errors",
        report.ok_count(),
        report.warning_count(),
        report.error_count()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_titles_get_numbered() {
        let mut titles = TitleRegistry::default();
        assert_eq!(titles.claim("MOU".into()), "MOU");
        assert_eq!(titles.claim("MOU".into()), "MOU (2)");
        assert_eq!(titles.claim("MOU (3)".into()), "MOU (3)");
        assert_eq!(titles.claim("MOU".into()), "MOU (4)");
    }

    #[test]
    fn status_display() {
        assert_eq!(RowStatus::Ok.to_string(), "OK");
        let warning = RowStatus::Warning {
            missing: vec!["BP_FILE".into(), "COMMENTS".into()],
        };
        assert_eq!(warning.to_string(), "WARNING: missing BP_FILE, COMMENTS");
        assert_eq!(RowStatus::Error("boom".into()).to_string(), "ERROR: boom");
    }
}
