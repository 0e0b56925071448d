//! Display-name helpers.
//!
//! Names are freeform but compared case-insensitively with surrounding
//! whitespace ignored, so "Sam", " sam " and "SAM" are the same person.

/// Canonical display form of a name.
pub fn display_name(raw: &str) -> &str {
    raw.trim()
}

/// Identity key used for every name comparison.
pub fn name_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Returns true if both names refer to the same participant.
pub fn same_name(a: &str, b: &str) -> bool {
    name_key(a) == name_key(b)
}
