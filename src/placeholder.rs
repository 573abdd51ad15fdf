use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::model::Document;

/// Keys of the standard MOU template, in form order.
pub const DEFAULT_KEYS: &[&str] = &[
    "FANTASY_NAME",
    "GROUP_NAME",
    "CNPJ",
    "CONTRACT_DATE",
    "FULL_ADDRESS",
    "SHOWROOM_SIZE",
    "START_DATE",
    "END_DATE",
    "INSPECTION_DATE",
    "OPENING_DATE",
    "DEADLINE_DATE",
    "BP_DATE",
    "BP_FILE",
    "COMMENTS",
];

static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn token_re() -> &'static Regex {
    TOKEN_RE.get_or_init(|| {
        Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("token pattern is valid")
    })
}

/// `{{KEY}}` for a canonical key.
pub fn token(key: &str) -> String {
    format!("{{{{{key}}}}}")
}

/// Distinct placeholder keys used anywhere in the document, uppercased.
pub fn extract_placeholders(doc: &Document) -> BTreeSet<String> {
    doc.paragraphs()
        .into_iter()
        .flat_map(|p| {
            let text = p.text();
            token_re()
                .captures_iter(&text)
                .map(|c| c[1].to_uppercase())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Canonical form of a user-supplied key: trimmed, braces stripped, uppercased.
pub fn normalize_key(raw: &str) -> Result<String> {
    let key = raw
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim()
        .to_uppercase();
    if key.is_empty() {
        return Err(Error::Validation(format!(
            "placeholder key {raw:?} is empty after normalization"
        )));
    }
    Ok(key)
}

/// Canonical key → replacement value for one job.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mapping {
    values: BTreeMap<String, String>,
}

impl Mapping {
    /// Normalize raw pairs; later duplicates of the same canonical key win.
    pub fn normalize<K, V, I>(pairs: I) -> Result<Self>
    where
        K: AsRef<str>,
        V: ToString,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut values = BTreeMap::new();
        for (key, value) in pairs {
            values.insert(normalize_key(key.as_ref())?, value.to_string());
        }
        Ok(Self { values })
    }

    pub fn insert(&mut self, key: &str, value: impl ToString) -> Result<()> {
        self.values.insert(normalize_key(key)?, value.to_string());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// One case-insensitive pattern matching every mapped token; the key is capture 1.
    pub(crate) fn pattern(&self) -> Result<Option<Regex>> {
        if self.values.is_empty() {
            return Ok(None);
        }
        let alternatives: Vec<String> = self.values.keys().map(|k| regex::escape(k)).collect();
        let pattern = format!(r"(?i)\{{\{{({})\}}\}}", alternatives.join("|"));
        Ok(Some(Regex::new(&pattern)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_variants_normalize_to_the_same_key() {
        for raw in [
            "{GROUP_NAME}",
            "group_name",
            " GROUP_NAME ",
            "{{GROUP_NAME}}",
            "{{ group_name }}",
        ] {
            assert_eq!(normalize_key(raw).unwrap(), "GROUP_NAME", "raw key {raw:?}");
        }
    }

    #[test]
    fn normalizing_is_idempotent() {
        let once = Mapping::normalize([("{{cnpj}}", "1"), ("Bp_Date", "2")]).unwrap();
        let twice = Mapping::normalize(once.iter()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_keys_are_rejected() {
        for raw in ["", "   ", "{{}}", "{ }"] {
            assert!(matches!(normalize_key(raw), Err(Error::Validation(_))), "raw key {raw:?}");
        }
    }

    #[test]
    fn last_duplicate_wins() {
        let mapping = Mapping::normalize([("cnpj", "first"), ("{{CNPJ}}", "second")]).unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("CNPJ"), Some("second"));
    }

    #[test]
    fn values_are_stringified() {
        let mapping = Mapping::normalize([("SHOWROOM_SIZE", 250)]).unwrap();
        assert_eq!(mapping.get("SHOWROOM_SIZE"), Some("250"));
    }

    #[test]
    fn pattern_matches_tokens_in_any_case() {
        let mapping = Mapping::normalize([("GROUP_NAME", "x")]).unwrap();
        let re = mapping.pattern().unwrap().unwrap();
        assert!(re.is_match("{{group_name}}"));
        assert!(re.is_match("{{Group_Name}}"));
        assert!(!re.is_match("{GROUP_NAME}"));
        assert!(Mapping::default().pattern().unwrap().is_none());
    }
}
