use std::{fmt::Display, str::FromStr};

use crate::error::Error;

/// Separator between entries of a persisted list
pub const SEPARATOR: char = '|';

/// Join items into the single string stored under one preference key
pub fn encode_list<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    let mut out = String::new();
    for item in items {
        if !out.is_empty() {
            out.push(SEPARATOR);
        }
        out.push_str(&item.to_string());
    }
    out
}

/// Split a persisted list. Empty segments are skipped and malformed entries
/// dropped with a warning, so one bad value never loses the whole list.
pub fn decode_list<T>(raw: &str) -> Vec<T>
where
    T: FromStr<Err = Error>,
{
    raw.split(SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter_map(|segment| match segment.parse() {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("dropping malformed entry {:?}: {}", segment, e);
                None
            }
        })
        .collect()
}
