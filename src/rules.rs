//! Which paragraphs keep non-bold formatting.
//!
//! Rules look at the template text before substitution, normalized with
//! [`normalize_text`]. Each phrase rule is a list of anchor groups: every group
//! must have at least one anchor present in the paragraph.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::model::ParagraphId;

/// Placeholders bound to free-form narrative fields; their paragraphs are never bold.
pub const MARKED_KEYS: &[&str] = &["BP_DATE", "COMMENTS"];

struct PhraseRule {
    name: &'static str,
    all_of: &'static [&'static [&'static str]],
}

const PHRASE_RULES: &[PhraseRule] = &[
    PhraseRule {
        name: "disclaimer-pt",
        all_of: &[
            &["memorando de entendimento"],
            &["nao vinculante", "nao-vinculante", "carater nao vinculativo"],
        ],
    },
    PhraseRule {
        name: "disclaimer-en",
        all_of: &[
            &["memorandum of understanding"],
            &["non-binding", "non binding", "not binding"],
        ],
    },
    PhraseRule {
        name: "business-plan",
        all_of: &[
            &["business plan", "plano de negocios"],
            &[
                "approved",
                "approval",
                "validated",
                "validation",
                "aprovado",
                "aprovada",
                "aprovacao",
                "validado",
                "validada",
                "validacao",
            ],
        ],
    },
];

/// Heading vocabulary of section 2, in either language.
const HEADING_VOCABULARY: &[&[&str]] = &[
    &["especificacoes", "specifications"],
    &["alteracoes acordadas", "agreed changes"],
];

static SECTION_MARKER_RE: OnceLock<Regex> = OnceLock::new();
static BARE_MARKER_RE: OnceLock<Regex> = OnceLock::new();
static NOT_APPLICABLE_RE: OnceLock<Regex> = OnceLock::new();

fn section_marker_re() -> &'static Regex {
    SECTION_MARKER_RE.get_or_init(|| {
        Regex::new(r"^2\s*[.)]").expect("marker pattern is valid")
    })
}

fn bare_marker_re() -> &'static Regex {
    BARE_MARKER_RE.get_or_init(|| {
        Regex::new(r"^2\s*[.)]$").expect("marker pattern is valid")
    })
}

fn not_applicable_re() -> &'static Regex {
    NOT_APPLICABLE_RE.get_or_init(|| {
        Regex::new(r"^n\s*/\s*a\.?$").expect("n/a pattern is valid")
    })
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        _ => c,
    }
}

/// Lowercased, whitespace collapsed to single spaces (NBSP included), trimmed,
/// Portuguese diacritics folded to ASCII.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    for word in lowered.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars().map(fold_diacritic));
    }
    out
}

fn has_all(text: &str, groups: &[&[&str]]) -> bool {
    groups
        .iter()
        .all(|anchors| anchors.iter().any(|a| text.contains(a)))
}

/// Name of the first phrase rule the normalized text satisfies.
pub fn matching_phrase_rule(normalized: &str) -> Option<&'static str> {
    PHRASE_RULES
        .iter()
        .find(|rule| has_all(normalized, rule.all_of))
        .map(|rule| rule.name)
}

pub fn is_not_applicable(normalized: &str) -> bool {
    not_applicable_re().is_match(normalized)
}

pub fn has_heading_vocabulary(normalized: &str) -> bool {
    has_all(normalized, HEADING_VOCABULARY)
}

/// `2. Especificações e alterações acordadas` in one paragraph.
pub fn is_section_heading(normalized: &str) -> bool {
    section_marker_re().is_match(normalized) && has_heading_vocabulary(normalized)
}

pub fn is_bare_section_marker(normalized: &str) -> bool {
    bare_marker_re().is_match(normalized)
}

/// Whether the raw text carries one of the marked placeholder tokens.
pub fn has_marked_token(text: &str) -> bool {
    let lowered = text.to_lowercase();
    MARKED_KEYS
        .iter()
        .any(|key| lowered.contains(&format!("{{{{{}}}}}", key.to_lowercase())))
}

/// Paragraph identities excluded from the bold-everywhere policy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExceptionSet {
    ids: BTreeSet<ParagraphId>,
}

impl ExceptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ParagraphId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: ParagraphId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ParagraphId> + '_ {
        self.ids.iter().copied()
    }

    pub fn extend(&mut self, other: &ExceptionSet) {
        self.ids.extend(other.iter());
    }
}

/// Phrase, heading and N/A rules over paragraph texts in traversal order.
/// Depends only on each text and its successor.
pub fn classify_texts<S: AsRef<str>>(texts: &[S]) -> ExceptionSet {
    let normalized: Vec<String> = texts.iter().map(|t| normalize_text(t.as_ref())).collect();
    let mut set = ExceptionSet::new();

    for (i, text) in normalized.iter().enumerate() {
        let id = ParagraphId(i);
        if let Some(rule) = matching_phrase_rule(text) {
            log::debug!("paragraph {i}: phrase rule {rule}");
            set.insert(id);
        } else if is_not_applicable(text) {
            log::debug!("paragraph {i}: not-applicable marker");
            set.insert(id);
        } else if is_section_heading(text) {
            log::debug!("paragraph {i}: section heading");
            set.insert(id);
        }

        if is_bare_section_marker(text)
            && let Some(next) = normalized.get(i + 1)
            && has_heading_vocabulary(next)
        {
            log::debug!("paragraph {i}: section heading split over two paragraphs");
            set.insert(id);
            set.insert(ParagraphId(i + 1));
        }
    }
    set
}
