//! # HIS Selectors
//!
//! Selection state for the reference-data pickers of a clinical form.
//!
//! - [`CascadingSelectionController`]: dependent province/city/county pickers
//!   with cascade reset and stale-response suppression
//! - [`LookupField`] / [`CodeLookupMatcher`]: type-ahead over the ethnicity
//!   and nationality lists with exact-match commit
//!
//! Both implement [`FormControl`], the contract a host form binds to.

pub mod cascade;
pub mod error;
pub mod form;
pub mod lookup;

pub use cascade::{
    ADDRESS_KEY, CITY_KEY, COUNTY_KEY, Candidates, CascadeConfig, CascadingSelectionController,
    ChildLoader, LoadTicket, PROVINCE_KEY, RegionValue, SelectionValue,
};
pub use error::{FieldError, SelectorError, SelectorResult};
pub use form::{ChangeCallback, FormControl, TouchedCallback};
pub use lookup::{CodeLookupMatcher, LookupField, MatcherConfig};
