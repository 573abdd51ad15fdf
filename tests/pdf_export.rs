//! PDF export through a stand-in converter script. Kept in its own test binary
//! so the freshly written script is never executed while another test thread
//! is spawning processes.
#![cfg(unix)]

mod common;

use std::io::Cursor;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use common::{DocxBuilder, entry_names, p, read_entry};
use mou_gen::{
    BatchOptions, JobOptions, Mapping, PdfConverter, RowStatus, run_batch, run_job,
};

/// Accepts the LibreOffice argument shape and writes a tiny PDF into `--outdir`.
const FAKE_CONVERTER: &str = r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
    case "$1" in
        --outdir) out="$2"; shift ;;
    esac
    shift
done
[ -n "$out" ] || exit 2
printf '%%PDF-1.4\n%% fake\n' > "$out/document.pdf"
"#;

const FAILING_CONVERTER: &str = "#!/bin/sh\necho 'no display' >&2\nexit 3\n";

fn install(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn converter_outputs_land_next_to_the_docx() {
    let _ = env_logger::try_init();
    let bin = tempfile::tempdir().unwrap();
    let working = install(bin.path(), "fake-soffice", FAKE_CONVERTER);
    let failing = install(bin.path(), "broken-soffice", FAILING_CONVERTER);

    let template =
        DocxBuilder::new(format!("{}{}", p("{{GROUP_NAME}}"), p("{{COMMENTS}}"))).parse();

    // Single job.
    let options = JobOptions {
        pdf: Some(PdfConverter::new(&working)),
        ..JobOptions::default()
    };
    let mapping = Mapping::normalize([("GROUP_NAME", "Alfa"), ("COMMENTS", "ok")]).unwrap();
    let output = run_job(&template, &mapping, "Acordo", &options).unwrap();
    assert!(output.notes.is_empty(), "{:?}", output.notes);
    assert!(output.pdf.as_deref().unwrap().starts_with(b"%PDF-1.4"));

    // Batch: three rows, one incomplete, every row gets both files.
    let mut batch = BatchOptions::new(NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
    batch.job = options;
    let csv = "GROUP_NAME,COMMENTS\nAlfa,a\nBeta\nGama,c\n";
    let mut archive = Cursor::new(Vec::new());
    let report = run_batch(&template, csv.as_bytes(), &mut archive, &batch).unwrap();
    let archive = archive.into_inner();

    let names = entry_names(&archive);
    assert_eq!(names.len(), 6);
    assert_eq!(names[0], "MOU – Alfa – 2026-03-09.docx");
    assert_eq!(names[1], "MOU – Alfa – 2026-03-09.pdf");
    assert!(read_entry(&archive, "MOU – Beta – 2026-03-09.pdf").starts_with(b"%PDF"));
    assert!(matches!(report.rows[1].status, RowStatus::Warning { .. }));
    assert!(report.rows.iter().all(|r| r.entries.len() == 2));

    // A converter that exits non-zero is a note, not a failure.
    let options = JobOptions {
        pdf: Some(PdfConverter::new(&failing)),
        ..JobOptions::default()
    };
    let output = run_job(&template, &mapping, "Acordo", &options).unwrap();
    assert!(output.pdf.is_none());
    assert!(!output.docx.is_empty());
    assert_eq!(output.notes.len(), 1);
    assert!(output.notes[0].contains("no display"), "{:?}", output.notes);
}
