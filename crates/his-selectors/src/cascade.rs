//! Cascading selection
//!
//! A [`CascadingSelectionController`] drives a chain of dependent pickers
//! (province → city → county). Selecting a level clears everything below it
//! and loads the candidates for the next level.
//!
//! ## Stale responses
//!
//! Every load is issued with a [`LoadTicket`] carrying the level's generation
//! at issue time. Any later selection or reset bumps the generation, so a
//! response that arrives after the user has moved on is discarded on arrival.
//! Loads are never aborted.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use his_core::{ROOT_PARENT, ReferenceNode};
use his_sync::{SyncCoordinator, SyncResult};

use crate::error::{FieldError, SelectorError, SelectorResult};
use crate::form::{ChangeCallback, FormControl, Listeners, TouchedCallback};

pub const PROVINCE_KEY: &str = "province";
pub const CITY_KEY: &str = "city";
pub const COUNTY_KEY: &str = "county";
pub const ADDRESS_KEY: &str = "address";

/// Source of candidates for each level
#[async_trait]
pub trait ChildLoader: Send + Sync {
    /// Candidates for the first level
    async fn load_roots(&self) -> SyncResult<Vec<ReferenceNode>>;

    /// Candidates below `parent_code`
    async fn load_children(&self, parent_code: &str) -> SyncResult<Vec<ReferenceNode>>;
}

#[async_trait]
impl ChildLoader for SyncCoordinator {
    async fn load_roots(&self) -> SyncResult<Vec<ReferenceNode>> {
        SyncCoordinator::load_roots(self).await
    }

    async fn load_children(&self, parent_code: &str) -> SyncResult<Vec<ReferenceNode>> {
        SyncCoordinator::load_children(self, parent_code).await
    }
}

/// Shape of a cascade: level keys, free-text companions, and whether a value
/// is required
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeConfig {
    pub levels: Vec<String>,
    pub text_fields: Vec<String>,
    pub required: bool,
}

impl CascadeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, key: impl Into<String>) -> Self {
        self.levels.push(key.into());
        self
    }

    pub fn with_text_field(mut self, key: impl Into<String>) -> Self {
        self.text_fields.push(key.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Province, city and (optionally) county, plus a detail address
    pub fn region(show_county: bool) -> Self {
        let config = Self::new().with_level(PROVINCE_KEY).with_level(CITY_KEY);
        let config = if show_county {
            config.with_level(COUNTY_KEY)
        } else {
            config
        };
        config.with_text_field(ADDRESS_KEY)
    }
}

/// Candidate list of one level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Candidates {
    /// Nothing to choose from (parent unselected)
    #[default]
    Empty,
    /// A load is in flight
    Pending,
    /// Loaded candidates, possibly none
    Ready(Vec<ReferenceNode>),
}

impl Candidates {
    pub fn is_pending(&self) -> bool {
        matches!(self, Candidates::Pending)
    }

    /// Loaded nodes, empty unless ready
    pub fn nodes(&self) -> &[ReferenceNode] {
        match self {
            Candidates::Ready(nodes) => nodes,
            _ => &[],
        }
    }
}

/// External value of a cascade
///
/// Levels are listed in order and stop at the first unselected level. Free
/// text is trimmed and empty fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionValue {
    pub levels: Vec<(String, String)>,
    pub text: Vec<(String, String)>,
}

impl SelectionValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, key: impl Into<String>, code: impl Into<String>) -> Self {
        self.levels.push((key.into(), code.into()));
        self
    }

    pub fn with_text(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.text.push((key.into(), text.into()));
        self
    }

    /// Selected code for a level key
    pub fn level(&self, key: &str) -> Option<&str> {
        self.levels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Text for a free-text field key
    pub fn text_field(&self, key: &str) -> Option<&str> {
        self.text
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty() && self.text.is_empty()
    }
}

/// Typed view of a region cascade value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionValue {
    pub province_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_address: Option<String>,
}

impl From<&SelectionValue> for RegionValue {
    fn from(value: &SelectionValue) -> Self {
        Self {
            province_code: value.level(PROVINCE_KEY).unwrap_or_default().to_string(),
            city_code: value.level(CITY_KEY).map(String::from),
            county_code: value.level(COUNTY_KEY).map(String::from),
            detail_address: value.text_field(ADDRESS_KEY).map(String::from),
        }
    }
}

impl From<RegionValue> for SelectionValue {
    fn from(value: RegionValue) -> Self {
        let mut selection = SelectionValue::new();
        if !value.province_code.is_empty() {
            selection = selection.with_level(PROVINCE_KEY, value.province_code);
        }
        if let Some(city) = value.city_code {
            selection = selection.with_level(CITY_KEY, city);
        }
        if let Some(county) = value.county_code {
            selection = selection.with_level(COUNTY_KEY, county);
        }
        if let Some(address) = value.detail_address {
            selection = selection.with_text(ADDRESS_KEY, address);
        }
        selection
    }
}

/// Handle for one issued candidate load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    level: usize,
    parent_code: String,
    generation: u64,
}

impl LoadTicket {
    /// Level whose candidates this load fills
    pub fn level(&self) -> usize {
        self.level
    }

    /// Parent code to load children for (`""` for the first level)
    pub fn parent_code(&self) -> &str {
        &self.parent_code
    }
}

#[derive(Debug, Default)]
struct LevelState {
    selected: Option<String>,
    candidates: Candidates,
    generation: u64,
}

#[derive(Debug)]
struct CascadeState {
    levels: Vec<LevelState>,
    text: Vec<(String, String)>,
    disabled: bool,
}

impl CascadeState {
    fn issue(&mut self, level: usize, parent_code: &str) -> LoadTicket {
        let state = &mut self.levels[level];
        state.generation += 1;
        state.candidates = Candidates::Pending;
        LoadTicket {
            level,
            parent_code: parent_code.to_string(),
            generation: state.generation,
        }
    }

    fn reset_below(&mut self, level: usize) {
        for state in self.levels.iter_mut().skip(level + 1) {
            state.selected = None;
            state.candidates = Candidates::Empty;
            state.generation += 1;
        }
    }

    fn is_current(&self, ticket: &LoadTicket) -> bool {
        let Some(state) = self.levels.get(ticket.level) else {
            return false;
        };
        if state.generation != ticket.generation {
            return false;
        }
        ticket.level == 0
            || self.levels[ticket.level - 1].selected.as_deref() == Some(ticket.parent_code.as_str())
    }

    fn value(&self, config: &CascadeConfig) -> SelectionValue {
        let levels = config
            .levels
            .iter()
            .zip(&self.levels)
            .map_while(|(key, state)| state.selected.clone().map(|code| (key.clone(), code)))
            .collect();
        let text = self
            .text
            .iter()
            .map(|(key, text)| (key, text.trim()))
            .filter(|(_, text)| !text.is_empty())
            .map(|(key, text)| (key.clone(), text.to_string()))
            .collect();
        SelectionValue { levels, text }
    }
}

/// State machine behind a chain of dependent pickers
pub struct CascadingSelectionController {
    config: CascadeConfig,
    loader: Arc<dyn ChildLoader>,
    state: Mutex<CascadeState>,
    listeners: Listeners<SelectionValue>,
}

impl CascadingSelectionController {
    /// Create a controller; call [`init`](Self::init) to load the first level
    pub fn new(config: CascadeConfig, loader: Arc<dyn ChildLoader>) -> SelectorResult<Self> {
        if config.levels.is_empty() {
            return Err(SelectorError::EmptyConfig);
        }

        let state = CascadeState {
            levels: config.levels.iter().map(|_| LevelState::default()).collect(),
            text: config
                .text_fields
                .iter()
                .map(|key| (key.clone(), String::new()))
                .collect(),
            disabled: false,
        };

        Ok(Self {
            config,
            loader,
            state: Mutex::new(state),
            listeners: Listeners::default(),
        })
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    pub fn level_count(&self) -> usize {
        self.config.levels.len()
    }

    /// Load the first level's candidates
    pub async fn init(&self) -> SelectorResult<()> {
        let ticket = self.state.lock().issue(0, ROOT_PARENT);
        let result = self.loader.load_roots().await;
        self.finish(&ticket, result)
    }

    /// Apply a selection and return the load it requires, if any
    ///
    /// An empty code clears the level. Selections on a disabled controller
    /// are ignored.
    ///
    /// # Errors
    ///
    /// The code must be one of the level's loaded candidates.
    pub fn begin_select(&self, level: usize, code: &str) -> SelectorResult<Option<LoadTicket>> {
        self.check_level(level)?;
        let code = code.trim();

        let (ticket, value) = {
            let mut state = self.state.lock();
            if state.disabled {
                debug!(level, "Ignoring selection on disabled controller");
                return Ok(None);
            }

            if code.is_empty() {
                if state.levels[level].selected.is_none() {
                    return Ok(None);
                }
                state.levels[level].selected = None;
                state.reset_below(level);
                (None, state.value(&self.config))
            } else {
                match &state.levels[level].candidates {
                    Candidates::Ready(nodes) if nodes.iter().any(|n| n.code == code) => {}
                    Candidates::Ready(_) => {
                        return Err(SelectorError::NotACandidate {
                            level,
                            code: code.to_string(),
                        });
                    }
                    _ => return Err(SelectorError::CandidatesNotReady(level)),
                }
                if state.levels[level].selected.as_deref() == Some(code) {
                    return Ok(None);
                }

                state.levels[level].selected = Some(code.to_string());
                state.reset_below(level);
                let ticket = (level + 1 < self.level_count()).then(|| state.issue(level + 1, code));
                (ticket, state.value(&self.config))
            }
        };

        self.listeners.emit_touched();
        self.listeners.emit_change(&value);
        Ok(ticket)
    }

    /// Deliver a load result
    ///
    /// Returns `false` when the ticket is stale and the result was discarded.
    pub fn apply(&self, ticket: &LoadTicket, nodes: Vec<ReferenceNode>) -> bool {
        let mut state = self.state.lock();
        if !state.is_current(ticket) {
            debug!(
                level = ticket.level,
                parent = %ticket.parent_code,
                "Discarding stale candidates"
            );
            return false;
        }
        state.levels[ticket.level].candidates = Candidates::Ready(nodes);
        true
    }

    /// Select `code` at `level` and load the next level
    pub async fn select(&self, level: usize, code: &str) -> SelectorResult<()> {
        if let Some(ticket) = self.begin_select(level, code)? {
            let result = self.loader.load_children(&ticket.parent_code).await;
            self.finish(&ticket, result)?;
        }
        Ok(())
    }

    /// Clear `level` and everything below it
    pub fn clear(&self, level: usize) -> SelectorResult<()> {
        self.begin_select(level, "").map(|_| ())
    }

    /// Update a free-text companion field
    pub fn set_text(&self, key: &str, text: &str) -> SelectorResult<()> {
        let value = {
            let mut state = self.state.lock();
            if state.disabled {
                return Ok(());
            }
            let Some((_, slot)) = state.text.iter_mut().find(|(k, _)| k == key) else {
                return Err(SelectorError::UnknownField(key.to_string()));
            };
            *slot = text.to_string();
            state.value(&self.config)
        };

        self.listeners.emit_touched();
        self.listeners.emit_change(&value);
        Ok(())
    }

    /// Current external value
    pub fn value(&self) -> SelectionValue {
        self.state.lock().value(&self.config)
    }

    /// Candidates of one level
    pub fn candidates(&self, level: usize) -> SelectorResult<Candidates> {
        self.check_level(level)?;
        Ok(self.state.lock().levels[level].candidates.clone())
    }

    /// Selected code of one level
    pub fn selected(&self, level: usize) -> SelectorResult<Option<String>> {
        self.check_level(level)?;
        Ok(self.state.lock().levels[level].selected.clone())
    }

    /// Host write: replace the whole value without notifying listeners
    ///
    /// Levels after the first missing one are dropped. Candidates below each
    /// written level are loaded; in-flight loads are invalidated. Codes are
    /// not checked against candidates.
    pub async fn write_value(&self, value: SelectionValue) -> SelectorResult<()> {
        let tickets = {
            let mut state = self.state.lock();

            let mut parent_selected = true;
            for (key, level) in self.config.levels.iter().zip(state.levels.iter_mut()) {
                let code = value
                    .level(key)
                    .map(str::trim)
                    .filter(|c| parent_selected && !c.is_empty())
                    .map(String::from);
                parent_selected = code.is_some();
                level.selected = code;
            }

            let mut tickets = Vec::new();
            for level in 1..self.level_count() {
                match state.levels[level - 1].selected.clone() {
                    Some(parent) => tickets.push(state.issue(level, &parent)),
                    None => {
                        let below = &mut state.levels[level];
                        below.candidates = Candidates::Empty;
                        below.generation += 1;
                    }
                }
            }

            for (key, text) in state.text.iter_mut() {
                *text = value.text_field(key).unwrap_or_default().to_string();
            }
            tickets
        };

        let mut first_error = None;
        for ticket in tickets {
            let result = self.loader.load_children(&ticket.parent_code).await;
            if let Err(e) = self.finish(&ticket, result) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// `Required` when required and the first level is unselected
    pub fn validate(&self) -> Option<FieldError> {
        let state = self.state.lock();
        (self.config.required && state.levels[0].selected.is_none()).then_some(FieldError::Required)
    }

    pub fn set_disabled(&self, disabled: bool) {
        self.state.lock().disabled = disabled;
    }

    pub fn is_disabled(&self) -> bool {
        self.state.lock().disabled
    }

    fn check_level(&self, level: usize) -> SelectorResult<()> {
        if level >= self.level_count() {
            return Err(SelectorError::LevelOutOfRange {
                level,
                levels: self.level_count(),
            });
        }
        Ok(())
    }

    fn finish(&self, ticket: &LoadTicket, result: SyncResult<Vec<ReferenceNode>>) -> SelectorResult<()> {
        match result {
            Ok(nodes) => {
                self.apply(ticket, nodes);
                Ok(())
            }
            // A failure only matters if nobody has moved on
            Err(e) if self.apply(ticket, Vec::new()) => Err(e.into()),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl FormControl for CascadingSelectionController {
    type Value = SelectionValue;

    fn value(&self) -> SelectionValue {
        CascadingSelectionController::value(self)
    }

    async fn set_value(&self, value: SelectionValue) -> SelectorResult<()> {
        self.write_value(value).await
    }

    fn on_change(&self, callback: ChangeCallback<SelectionValue>) {
        self.listeners.add_change(callback);
    }

    fn on_touched(&self, callback: TouchedCallback) {
        self.listeners.add_touched(callback);
    }

    fn validate(&self) -> Option<FieldError> {
        CascadingSelectionController::validate(self)
    }

    fn set_disabled(&self, disabled: bool) {
        CascadingSelectionController::set_disabled(self, disabled)
    }
}

impl std::fmt::Debug for CascadingSelectionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadingSelectionController")
            .field("config", &self.config)
            .field("value", &self.value())
            .finish_non_exhaustive()
    }
}
