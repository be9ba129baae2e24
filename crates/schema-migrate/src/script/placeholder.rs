//! Placeholder substitution in script text.
//!
//! Scripts may reference configured values as `${name}` (prefix and
//! suffix are configurable). Substitution happens on the raw script
//! text before tokenization, so a placeholder can expand to anything a
//! script could contain. Names that are not configured are left
//! untouched.

use std::collections::BTreeMap;

/// Replaces configured placeholders in script text.
#[derive(Debug, Clone)]
pub struct PlaceholderReplacer {
    placeholders: BTreeMap<String, String>,
    prefix: String,
    suffix: String,
}

impl PlaceholderReplacer {
    /// Create a replacer for the given placeholder map and markers.
    pub fn new(
        placeholders: BTreeMap<String, String>,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            placeholders,
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// A replacer that substitutes nothing.
    pub fn empty() -> Self {
        Self::new(BTreeMap::new(), "${", "}")
    }

    /// Substitute every configured placeholder occurrence in `sql`.
    pub fn replace(&self, sql: &str) -> String {
        let mut result = sql.to_string();
        for (name, value) in &self.placeholders {
            let token = format!("{}{}{}", self.prefix, name, self.suffix);
            result = result.replace(&token, value);
        }
        result
    }
}
