//! Partial-update plumbing shared by the brand and campaign `PUT` bodies.
//!
//! A field typed `Option<Option<T>>` with `#[serde(default, deserialize_with
//! = "nullable")]` reads as `None` when the key is absent, `Some(None)` when
//! it is an explicit `null` and `Some(Some(v))` otherwise.

use serde::{Deserialize, Deserializer};

pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Writes a present key into `target`; `null` clears it, absence keeps it.
pub fn overlay<T>(target: &mut Option<T>, value: Option<Option<T>>) {
    if let Some(value) = value {
        *target = value;
    }
}
