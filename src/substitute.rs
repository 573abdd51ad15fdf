use regex::{Captures, Regex};

use crate::error::Result;
use crate::model::{Document, ParagraphId};
use crate::placeholder::Mapping;
use crate::rules::{ExceptionSet, has_marked_token};

fn replace_tokens(text: &str, pattern: &Regex, mapping: &Mapping) -> String {
    pattern
        .replace_all(text, |caps: &Captures| {
            mapping
                .get(&caps[1].to_uppercase())
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Replace every mapped `{{KEY}}` token in every paragraph, case-insensitively,
/// in one left-to-right pass over the paragraph's full text. A changed
/// paragraph is collapsed to a single run so tokens split across runs still
/// match. Returns the paragraphs that held a marked token before substitution.
pub fn substitute(doc: &mut Document, mapping: &Mapping) -> Result<ExceptionSet> {
    let pattern = mapping.pattern()?;
    let mut marked = ExceptionSet::new();
    let mut changed = 0usize;

    for (i, para) in doc.paragraphs_mut().into_iter().enumerate() {
        let original = para.text();
        if original.is_empty() {
            continue;
        }
        if has_marked_token(&original) {
            marked.insert(ParagraphId(i));
        }
        let Some(pattern) = &pattern else {
            continue;
        };
        let replaced = replace_tokens(&original, pattern, mapping);
        if replaced != original {
            log::debug!("paragraph {i}: {original:?} -> {replaced:?}");
            para.collapse_runs(replaced);
            changed += 1;
        }
    }

    log::debug!(
        "Substitution changed {changed} paragraphs, {} marked",
        marked.len()
    );
    Ok(marked)
}
