use crate::model::{Document, ParagraphId};
use crate::rules::ExceptionSet;

/// Uniform run formatting applied to generated documents.
#[derive(Clone, Debug, PartialEq)]
pub struct FormatPolicy {
    pub font_name: String,
    /// Points.
    pub font_size: f32,
}

impl Default for FormatPolicy {
    fn default() -> Self {
        Self {
            font_name: "Calibri".to_string(),
            font_size: 11.0,
        }
    }
}

/// Set font and size on every run, bold everywhere, then clear bold on the
/// exception paragraphs. The bold pass finishes before any paragraph is
/// un-bolded, so re-running with the same set gives the same state.
///
/// Only `exceptions` is consulted; the phrase, heading and N/A rules are not
/// re-run here. Callers composing [`substitute`](crate::substitute) with this
/// function must add [`classify_texts`](crate::classify_texts) over the
/// template's paragraph texts themselves, as [`generate`](crate::generate) does:
///
/// ```
/// # fn run(template: &mou_gen::Document, mapping: &mou_gen::Mapping) -> mou_gen::Result<()> {
/// use mou_gen::{FormatPolicy, classify_texts, enforce_formatting, substitute};
///
/// let mut doc = template.clone();
/// let texts = doc.paragraph_texts();
/// let mut exceptions = substitute(&mut doc, mapping)?;
/// exceptions.extend(&classify_texts(&texts));
/// enforce_formatting(&mut doc, &exceptions, &FormatPolicy::default());
/// # Ok(())
/// # }
/// ```
pub fn enforce_formatting(
    doc: &mut Document,
    exceptions: &ExceptionSet,
    policy: &FormatPolicy,
) {
    let mut paragraphs = doc.paragraphs_mut();

    for para in paragraphs.iter_mut() {
        for run in para.runs_mut() {
            run.properties.set_font_name(&policy.font_name);
            run.properties.set_font_size(policy.font_size);
            run.properties.set_bold(true);
        }
    }

    for (i, para) in paragraphs.iter_mut().enumerate() {
        if !exceptions.contains(ParagraphId(i)) {
            continue;
        }
        for run in para.runs_mut() {
            run.properties.set_bold(false);
        }
    }
}
