//! Late initialization
//!
//! Providers fill in defaults for anything the user left out. Late
//! initialization copies those values back into the desired parameters once,
//! so the controller and the user never fight over an unset field. A field is
//! considered unset when it equals its type's zero value.

use crate::provider::ResourceKind;
use std::collections::BTreeMap;

/// Merge provider-observed defaults into `params`
///
/// Returns the merged parameters and whether anything changed.
pub fn late_initialize<K: ResourceKind>(
    params: &K::Parameters,
    observed: &K::Observed,
) -> (K::Parameters, bool) {
    let merged = K::late_initialize(params, observed);
    let changed = merged != *params;
    (merged, changed)
}

/// `current` unless it is the zero value, in which case `observed`
pub fn value<T: Clone + Default + PartialEq>(current: &T, observed: &T) -> T {
    if *current == T::default() {
        observed.clone()
    } else {
        current.clone()
    }
}

/// Like [`value`] for an optional provider field
pub fn from_option<T: Clone + Default + PartialEq>(current: &T, observed: Option<&T>) -> T {
    match observed {
        Some(v) if *current == T::default() => v.clone(),
        _ => current.clone(),
    }
}

/// Keep a user-set option, otherwise take the provider's
pub fn option<T: Clone>(current: &Option<T>, observed: &Option<T>) -> Option<T> {
    current.clone().or_else(|| observed.clone())
}

/// Take the provider's map only when the user declared none
pub fn map(
    current: &BTreeMap<String, String>,
    observed: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    value(current, observed)
}
