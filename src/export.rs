use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

pub const DEFAULT_CONVERTER: &str = "soffice";
/// Environment variable naming the converter binary.
pub const CONVERTER_ENV: &str = "MOU_PDF_CONVERTER";

/// DOCX → PDF through an external LibreOffice-compatible binary
/// (`--headless --convert-to pdf --outdir <dir> <file>`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PdfConverter {
    program: PathBuf,
}

impl Default for PdfConverter {
    fn default() -> Self {
        Self::new(DEFAULT_CONVERTER)
    }
}

impl PdfConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_env() -> Self {
        match std::env::var_os(CONVERTER_ENV) {
            Some(program) if !program.is_empty() => Self::new(program),
            _ => Self::default(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn convert(&self, docx: &[u8]) -> Result<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("document.docx");
        std::fs::write(&input, docx)?;

        // A private profile keeps concurrent converter instances from locking each other out.
        let profile = format!(
            "-env:UserInstallation=file://{}",
            dir.path().join("profile").display()
        );
        let output = Command::new(&self.program)
            .arg(profile)
            .args(["--headless", "--convert-to", "pdf", "--outdir"])
            .arg(dir.path())
            .arg(&input)
            .output()
            .map_err(|e| Error::Convert(format!("cannot run {}: {e}", self.program.display())))?;

        if !output.status.success() {
            return Err(Error::Convert(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        std::fs::read(dir.path().join("document.pdf"))
            .map_err(|_| Error::Convert(format!("{} produced no PDF", self.program.display())))
    }
}
