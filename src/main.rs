use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use mou_gen::{
    BatchOptions, DEFAULT_ARCHIVE_NAME, DEFAULT_KEYS, Document, Error, JobOptions, Mapping,
    PdfConverter, default_title, extract_placeholders, run_batch, run_job,
};

#[derive(Parser)]
#[command(
    name = "mou-gen",
    version,
    about = "Fill {{KEY}} placeholders in a DOCX template and export MOU documents"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the placeholder keys a template uses
    Fields {
        template: PathBuf,

        /// Print the keys as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Generate one document
    Generate {
        template: PathBuf,

        /// Placeholder value as KEY=VALUE (repeatable)
        #[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
        values: Vec<String>,

        /// Output title (file name without extension)
        #[arg(long)]
        title: Option<String>,

        /// Directory to write the outputs into
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        #[command(flatten)]
        pdf: PdfArgs,
    },
    /// Generate one document per CSV row into a ZIP archive
    Batch {
        template: PathBuf,

        /// CSV with one column per placeholder key and an optional TITLE column
        csv: PathBuf,

        /// Output archive
        #[arg(short, long, default_value = DEFAULT_ARCHIVE_NAME)]
        output: PathBuf,

        /// Write the per-row result report as CSV
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print the result report as JSON instead of a table
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        pdf: PdfArgs,
    },
}

#[derive(Args)]
struct PdfArgs {
    /// Also export PDF through an external converter
    #[arg(long)]
    pdf: bool,

    /// Converter binary (defaults to $MOU_PDF_CONVERTER or soffice)
    #[arg(long, value_name = "PATH")]
    converter: Option<PathBuf>,
}

impl PdfArgs {
    fn job_options(&self) -> JobOptions {
        let pdf = self.pdf.then(|| match &self.converter {
            Some(path) => PdfConverter::new(path),
            None => PdfConverter::from_env(),
        });
        JobOptions {
            pdf,
            ..JobOptions::default()
        }
    }
}

fn parse_assignment(raw: &str) -> Result<(&str, &str), Error> {
    raw.split_once('=')
        .ok_or_else(|| Error::Validation(format!("expected KEY=VALUE, got {raw:?}")))
}

fn load_template(path: &Path) -> Result<Document, Error> {
    let doc = Document::open(path)?;
    log::info!("Loaded template {}", path.display());
    Ok(doc)
}

fn fields(template: &Path, json: bool) -> Result<(), Error> {
    let doc = load_template(template)?;
    let keys = extract_placeholders(&doc);
    if keys.is_empty() {
        return Err(Error::Validation(format!(
            "{} contains no {{{{KEY}}}} placeholders",
            template.display()
        )));
    }
    if json {
        let json = serde_json::to_string_pretty(&keys)?;
        println!("{json}");
        return Ok(());
    }
    for key in &keys {
        println!("{key}");
    }
    let unknown: Vec<&str> = keys
        .iter()
        .map(String::as_str)
        .filter(|k| !DEFAULT_KEYS.contains(k))
        .collect();
    if !unknown.is_empty() {
        log::info!("Keys outside the standard MOU set: {}", unknown.join(", "));
    }
    Ok(())
}

fn generate(
    template: &Path,
    values: &[String],
    title: Option<&str>,
    out_dir: &Path,
    pdf: &PdfArgs,
) -> Result<(), Error> {
    let doc = load_template(template)?;
    let pairs = values
        .iter()
        .map(|raw| parse_assignment(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let mapping = Mapping::normalize(pairs)?;

    let missing: Vec<String> = extract_placeholders(&doc)
        .into_iter()
        .filter(|k| mapping.get(k).is_none())
        .collect();
    if !missing.is_empty() {
        log::warn!("No value for {}; tokens left as-is", missing.join(", "));
    }

    let title = match title {
        Some(t) => t.to_string(),
        None => default_title(&mapping, chrono::Local::now().date_naive()),
    };
    let output = run_job(&doc, &mapping, &title, &pdf.job_options())?;

    std::fs::create_dir_all(out_dir)?;
    let docx_path = out_dir.join(output.docx_name());
    std::fs::write(&docx_path, &output.docx)?;
    println!("{}", docx_path.display());
    if let Some(bytes) = &output.pdf {
        let pdf_path = out_dir.join(output.pdf_name());
        std::fs::write(&pdf_path, bytes)?;
        println!("{}", pdf_path.display());
    }
    for note in &output.notes {
        eprintln!("note: {note}");
    }
    Ok(())
}

fn batch(
    template: &Path,
    csv: &Path,
    output: &Path,
    report_path: Option<&Path>,
    json: bool,
    pdf: &PdfArgs,
) -> Result<(), Error> {
    let doc = load_template(template)?;
    let csv_file = File::open(csv).map_err(|e| {
        Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", e, csv.display())))
    })?;

    let mut options = BatchOptions::new(chrono::Local::now().date_naive());
    options.job = pdf.job_options();

    // Staged next to the target and renamed into place only once the archive is complete.
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    let report = run_batch(&doc, csv_file, staged.as_file_mut(), &options)?;
    staged.persist(output).map_err(|e| Error::Io(e.error))?;

    if let Some(path) = report_path {
        report.write_csv(File::create(path)?)?;
    }

    if json {
        let json = serde_json::to_string_pretty(&report)?;
        println!("{json}");
    } else {
        println!("{:<5} {:<50} STATUS", "ROW", "TITLE");
        for row in &report.rows {
            println!("{:<5} {:<50} {}", row.row, row.title, row.status);
            for note in &row.notes {
                println!("{:<5} {:<50} note: {note}", "", "");
            }
        }
    }
    eprintln!(
        "{}: {} ok, {} warnings, {} errors",
        output.display(),
        report.ok_count(),
        report.warning_count(),
        report.error_count()
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match &cli.command {
        Command::Fields { template, json } => fields(template, *json),
        Command::Generate {
            template,
            values,
            title,
            out_dir,
            pdf,
        } => generate(template, values, title.as_deref(), out_dir, pdf),
        Command::Batch {
            template,
            csv,
            output,
            report,
            json,
            pdf,
        } => batch(template, csv, output, report.as_deref(), *json, pdf),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
