//! Deserializer for patch fields that distinguish "absent" from "null".
//!
//! Use with `#[serde(default, deserialize_with = "crate::nullable::deserialize")]`
//! on an `Option<Option<T>>`: a missing key stays `None`, an explicit `null`
//! becomes `Some(None)`.

use serde::{Deserialize, Deserializer};

pub(crate) fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
