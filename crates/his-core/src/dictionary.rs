//! Flat code lists (ethnicity, nationality)

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which flat code list a lookup field binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DictionaryKind {
    /// Ethnic groups, e.g. `{code: "01", name: "汉族"}`
    Ethnicity,
    /// Countries keyed by ISO alpha-3 code
    Nationality,
}

impl fmt::Display for DictionaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictionaryKind::Ethnicity => write!(f, "ethnicity"),
            DictionaryKind::Nationality => write!(f, "nationality"),
        }
    }
}

/// A dictionary entry as delivered by the static asset
///
/// Ethnicity assets use `name`/`name_py`/`name_py_first`; the nationality
/// asset uses `name_cn`/`name_en`/`name_py_first`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryRecord {
    pub code: String,
    #[serde(default, alias = "name_cn")]
    pub name: Option<String>,
    #[serde(default)]
    pub name_en: Option<String>,
    #[serde(default)]
    pub name_py: Option<String>,
    #[serde(default)]
    pub name_py_first: Option<String>,
}

impl DictionaryRecord {
    /// Normalize into a lookup entry
    ///
    /// The display name falls back to the English name and then the code.
    pub fn into_entry(self) -> CodeLookupEntry {
        let display_name = self
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.name_en.clone().filter(|n| !n.trim().is_empty()))
            .unwrap_or_else(|| self.code.clone());

        CodeLookupEntry {
            code: self.code,
            display_name,
            english_name: self.name_en,
            phonetic_full: self.name_py,
            phonetic_initials: self.name_py_first,
        }
    }
}

/// One entry of a flat, session-cached code list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLookupEntry {
    pub code: String,
    pub display_name: String,
    pub english_name: Option<String>,
    /// Full phonetic spelling, e.g. `hanzu`
    pub phonetic_full: Option<String>,
    /// Phonetic initials, e.g. `hz`
    pub phonetic_initials: Option<String>,
}

impl CodeLookupEntry {
    pub fn new(code: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            display_name: display_name.into(),
            english_name: None,
            phonetic_full: None,
            phonetic_initials: None,
        }
    }

    pub fn with_english_name(mut self, name: impl Into<String>) -> Self {
        self.english_name = Some(name.into());
        self
    }

    pub fn with_phonetic(mut self, full: impl Into<String>, initials: impl Into<String>) -> Self {
        self.phonetic_full = Some(full.into());
        self.phonetic_initials = Some(initials.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ethnicity_record() {
        let record: DictionaryRecord = serde_json::from_str(
            r#"{"code":"01","name":"汉族","name_py":"hanzu","name_py_first":"hz"}"#,
        )
        .unwrap();
        let entry = record.into_entry();
        assert_eq!(entry.display_name, "汉族");
        assert_eq!(entry.phonetic_full.as_deref(), Some("hanzu"));
        assert_eq!(entry.phonetic_initials.as_deref(), Some("hz"));
    }

    #[test]
    fn test_nationality_record() {
        let record: DictionaryRecord = serde_json::from_str(
            r#"{"code":"CHN","name_cn":"中国","name_en":"China"}"#,
        )
        .unwrap();
        let entry = record.into_entry();
        assert_eq!(entry.code, "CHN");
        assert_eq!(entry.display_name, "中国");
        assert_eq!(entry.english_name.as_deref(), Some("China"));
    }

    #[test]
    fn test_display_name_fallback() {
        let record: DictionaryRecord =
            serde_json::from_str(r#"{"code":"XKX","name_en":"Kosovo"}"#).unwrap();
        assert_eq!(record.into_entry().display_name, "Kosovo");

        let record: DictionaryRecord = serde_json::from_str(r#"{"code":"ZZZ"}"#).unwrap();
        assert_eq!(record.into_entry().display_name, "ZZZ");
    }
}
