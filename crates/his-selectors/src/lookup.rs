//! Type-ahead lookup over flat code lists
//!
//! [`CodeLookupMatcher`] filters a list as the user types and resolves the
//! final text to a code. [`LookupField`] holds the state of one such input.
//!
//! Text only becomes a value at a commit point: picking a suggestion, or
//! leaving the field with text that exactly matches a display name.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use his_core::{CodeLookupEntry, DictionaryKind};
use his_sync::{DictionaryCache, DictionaryList};

use crate::error::{FieldError, SelectorResult};
use crate::form::{ChangeCallback, FormControl, Listeners, TouchedCallback};

/// Matching behaviour for one kind of list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub kind: DictionaryKind,
    /// Also commit on exact matches of phonetic keys, English name or code
    pub commit_on_alias: bool,
}

impl MatcherConfig {
    pub fn ethnicity() -> Self {
        Self {
            kind: DictionaryKind::Ethnicity,
            commit_on_alias: false,
        }
    }

    pub fn nationality() -> Self {
        Self {
            kind: DictionaryKind::Nationality,
            commit_on_alias: false,
        }
    }

    pub fn with_commit_on_alias(mut self, enabled: bool) -> Self {
        self.commit_on_alias = enabled;
        self
    }
}

fn folded(field: &Option<String>) -> String {
    field.as_deref().unwrap_or_default().trim().to_lowercase()
}

/// Filter and exact-match over one loaded list
#[derive(Debug, Clone)]
pub struct CodeLookupMatcher {
    entries: DictionaryList,
    config: MatcherConfig,
}

impl CodeLookupMatcher {
    pub fn new(entries: DictionaryList, config: MatcherConfig) -> Self {
        Self { entries, config }
    }

    pub fn entries(&self) -> &[CodeLookupEntry] {
        &self.entries
    }

    pub fn config(&self) -> MatcherConfig {
        self.config
    }

    /// Entries matching `text`, in list order
    ///
    /// Case-insensitive: display name contains the text, or a phonetic key
    /// starts with it. The nationality list also matches on the English name
    /// (contains) and the code (prefix). Empty text matches everything.
    pub fn filter(&self, text: &str) -> Vec<CodeLookupEntry> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return self.entries.to_vec();
        }

        self.entries
            .iter()
            .filter(|entry| self.matches(entry, &needle))
            .cloned()
            .collect()
    }

    fn matches(&self, entry: &CodeLookupEntry, needle: &str) -> bool {
        if entry.display_name.to_lowercase().contains(needle)
            || folded(&entry.phonetic_full).starts_with(needle)
            || folded(&entry.phonetic_initials).starts_with(needle)
        {
            return true;
        }

        self.config.kind == DictionaryKind::Nationality
            && (folded(&entry.english_name).contains(needle)
                || entry.code.to_lowercase().starts_with(needle))
    }

    /// Entry whose display name equals `text`, ignoring case and outer space
    pub fn exact_match(&self, text: &str) -> Option<&CodeLookupEntry> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        let by_name = self
            .entries
            .iter()
            .find(|entry| entry.display_name.trim().to_lowercase() == needle);
        if by_name.is_some() || !self.config.commit_on_alias {
            return by_name;
        }

        self.entries.iter().find(|entry| {
            [
                &entry.phonetic_full,
                &entry.phonetic_initials,
                &entry.english_name,
            ]
            .into_iter()
            .any(|alias| folded(alias) == needle)
                || entry.code.trim().to_lowercase() == needle
        })
    }

    /// Entry with exactly this code
    pub fn find_code(&self, code: &str) -> Option<&CodeLookupEntry> {
        self.entries.iter().find(|entry| entry.code == code)
    }
}

#[derive(Debug, Default)]
struct FieldState {
    text: String,
    value: Option<String>,
    error: Option<FieldError>,
    disabled: bool,
}

/// State of one type-ahead input bound to a code list
pub struct LookupField {
    cache: Arc<DictionaryCache>,
    config: MatcherConfig,
    required: bool,
    state: Mutex<FieldState>,
    listeners: Listeners<Option<String>>,
}

impl LookupField {
    pub fn new(cache: Arc<DictionaryCache>, config: MatcherConfig) -> Self {
        Self {
            cache,
            config,
            required: false,
            state: Mutex::new(FieldState::default()),
            listeners: Listeners::default(),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Matcher over the current list, loading it on first use
    pub async fn matcher(&self) -> CodeLookupMatcher {
        CodeLookupMatcher::new(self.cache.get(self.config.kind).await, self.config)
    }

    /// Committed code
    pub fn value(&self) -> Option<String> {
        self.state.lock().value.clone()
    }

    /// Text currently in the input
    pub fn text(&self) -> String {
        self.state.lock().text.clone()
    }

    /// Typing; does not change the committed value
    ///
    /// Changed text drops the error left by the last failed commit.
    pub fn input(&self, text: &str) {
        let mut state = self.state.lock();
        if state.disabled || state.text == text {
            return;
        }
        state.text = text.to_string();
        state.error = None;
    }

    /// Entries matching the current text
    pub async fn suggestions(&self) -> Vec<CodeLookupEntry> {
        let text = self.text();
        self.matcher().await.filter(&text)
    }

    /// Commit a suggestion
    pub fn pick(&self, entry: &CodeLookupEntry) {
        {
            let mut state = self.state.lock();
            if state.disabled {
                return;
            }
            state.value = Some(entry.code.clone());
            state.text = entry.display_name.clone();
            state.error = None;
        }
        self.listeners.emit_change(&Some(entry.code.clone()));
    }

    /// Leave the input, committing exact matches
    ///
    /// If the text changes while the list is loading, the result is dropped
    /// and nothing is committed.
    pub async fn blur(&self) {
        let text = {
            let state = self.state.lock();
            if state.disabled {
                return;
            }
            state.text.trim().to_string()
        };

        let hit = if text.is_empty() {
            None
        } else {
            self.matcher().await.exact_match(&text).cloned()
        };

        let value = {
            let mut state = self.state.lock();
            if state.disabled || state.text.trim() != text {
                debug!(kind = %self.config.kind, "Text changed during lookup, commit dropped");
                return;
            }
            match hit {
                Some(entry) => {
                    debug!(kind = %self.config.kind, code = %entry.code, "Committed exact match");
                    state.value = Some(entry.code);
                    state.text = entry.display_name;
                    state.error = None;
                }
                None if text.is_empty() => {
                    state.value = None;
                    state.error = self.required.then_some(FieldError::Required);
                }
                None => {
                    state.value = None;
                    state.error = Some(FieldError::InvalidOption);
                }
            }
            state.value.clone()
        };

        self.listeners.emit_touched();
        self.listeners.emit_change(&value);
    }

    /// Empty the input and the value
    pub fn clear(&self) {
        {
            let mut state = self.state.lock();
            if state.disabled {
                return;
            }
            state.text.clear();
            state.value = None;
            state.error = None;
        }
        self.listeners.emit_change(&None);
        self.listeners.emit_touched();
    }

    /// Host write; the text shows the code's display name
    pub async fn write_value(&self, code: Option<String>) {
        let code = code.filter(|c| !c.trim().is_empty());
        let text = match &code {
            Some(code) => self
                .matcher()
                .await
                .find_code(code)
                .map(|entry| entry.display_name.clone())
                .unwrap_or_default(),
            None => String::new(),
        };

        let mut state = self.state.lock();
        state.value = code;
        state.text = text;
        state.error = None;
    }

    /// `InvalidOption` after a failed commit, else `Required` when required
    /// and empty
    pub fn validate(&self) -> Option<FieldError> {
        let state = self.state.lock();
        if state.error == Some(FieldError::InvalidOption) {
            return Some(FieldError::InvalidOption);
        }
        (self.required && state.value.is_none()).then_some(FieldError::Required)
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.state.lock().disabled = disabled;
    }
}

#[async_trait]
impl FormControl for LookupField {
    type Value = Option<String>;

    fn value(&self) -> Option<String> {
        LookupField::value(self)
    }

    async fn set_value(&self, value: Option<String>) -> SelectorResult<()> {
        self.write_value(value).await;
        Ok(())
    }

    fn on_change(&self, callback: ChangeCallback<Option<String>>) {
        self.listeners.add_change(callback);
    }

    fn on_touched(&self, callback: TouchedCallback) {
        self.listeners.add_touched(callback);
    }

    fn validate(&self) -> Option<FieldError> {
        LookupField::validate(self)
    }

    fn set_disabled(&self, disabled: bool) {
        LookupField::set_disabled(self, disabled)
    }
}

impl std::fmt::Debug for LookupField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupField")
            .field("config", &self.config)
            .field("required", &self.required)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ethnic_list() -> DictionaryList {
        vec![
            CodeLookupEntry::new("01", "汉族").with_phonetic("hanzu", "hz"),
            CodeLookupEntry::new("02", "蒙古族").with_phonetic("mengguzu", "mgz"),
            CodeLookupEntry::new("03", "回族").with_phonetic("huizu", "hz"),
        ]
        .into()
    }

    fn country_list() -> DictionaryList {
        vec![
            CodeLookupEntry::new("CHN", "中国")
                .with_english_name("China")
                .with_phonetic("zhongguo", "zg"),
            CodeLookupEntry::new("FRA", "法国")
                .with_english_name("France")
                .with_phonetic("faguo", "fg"),
        ]
        .into()
    }

    #[test]
    fn test_filter_by_name_and_phonetics() {
        let matcher = CodeLookupMatcher::new(ethnic_list(), MatcherConfig::ethnicity());

        assert_eq!(matcher.filter("").len(), 3);
        assert_eq!(matcher.filter("古").len(), 1);
        assert_eq!(matcher.filter("HZ").len(), 2);
        assert_eq!(matcher.filter("meng")[0].code, "02");
        // Phonetic keys match by prefix only
        assert!(matcher.filter("zu").is_empty());
    }

    #[test]
    fn test_ethnicity_profile_ignores_code() {
        let matcher = CodeLookupMatcher::new(ethnic_list(), MatcherConfig::ethnicity());
        assert!(matcher.filter("01").is_empty());
    }

    #[test]
    fn test_nationality_profile_matches_english_and_code() {
        let matcher = CodeLookupMatcher::new(country_list(), MatcherConfig::nationality());

        assert_eq!(matcher.filter("ance")[0].code, "FRA");
        assert_eq!(matcher.filter("ch")[0].code, "CHN");
        assert_eq!(matcher.filter("fr").len(), 1);
    }

    #[test]
    fn test_exact_match_on_display_name_only() {
        let matcher = CodeLookupMatcher::new(ethnic_list(), MatcherConfig::ethnicity());

        assert_eq!(matcher.exact_match(" 汉族 ").unwrap().code, "01");
        assert!(matcher.exact_match("汉").is_none());
        assert!(matcher.exact_match("hanzu").is_none());
        assert!(matcher.exact_match("").is_none());
    }

    #[test]
    fn test_exact_match_on_alias_when_enabled() {
        let matcher = CodeLookupMatcher::new(
            country_list(),
            MatcherConfig::nationality().with_commit_on_alias(true),
        );

        assert_eq!(matcher.exact_match("FRANCE").unwrap().code, "FRA");
        assert_eq!(matcher.exact_match("zg").unwrap().code, "CHN");
        assert_eq!(matcher.exact_match("chn").unwrap().code, "CHN");
    }
}
