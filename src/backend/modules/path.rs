//! Module identifier normalization.
//!
//! Callers may spell the same module in several ways: with surrounding
//! whitespace, with Windows separators, with doubled slashes or with a
//! leading root slash. All of them normalize to one canonical identifier,
//! which is the only key the module cache is ever indexed by.

use std::fmt;

use itertools::Itertools;

use super::error::ModuleError;
use crate::backend::script::Value;

/// Normalize a raw module identifier.
///
/// Trims surrounding whitespace, collapses every run of `\` and `/` into a
/// single `/` and strips one leading `/`, repeating until the text no longer
/// changes so the transform is idempotent. An empty result means "no module".
pub fn normalize_module_id(raw: &str) -> String {
    let mut id = normalize_once(raw);
    // " / a" only settles after a second pass.
    loop {
        let next = normalize_once(&id);
        if next == id {
            return id;
        }
        id = next;
    }
}

fn normalize_once(raw: &str) -> String {
    let collapsed: String = raw
        .trim()
        .chars()
        .map(|c| if c == '\\' { '/' } else { c })
        .coalesce(|a, b| if a == '/' && b == '/' { Ok('/') } else { Err((a, b)) })
        .collect();
    match collapsed.strip_prefix('/') {
        Some(rest) => rest.to_string(),
        None => collapsed,
    }
}

/// A normalized, non-empty module identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(String);

impl ModuleId {
    /// Normalize `raw`, returning `None` when nothing is left.
    pub fn normalize(raw: &str) -> Option<ModuleId> {
        let id = normalize_module_id(raw);
        if id.is_empty() {
            None
        } else {
            Some(ModuleId(id))
        }
    }

    /// Normalize an identifier passed from a module script.
    ///
    /// Strings, numbers and booleans are converted through their text form;
    /// any other value is rejected.
    pub fn from_value(value: &Value) -> Result<Option<ModuleId>, ModuleError> {
        match value.to_text() {
            Some(text) => Ok(ModuleId::normalize(&text)),
            None => Err(ModuleError::InvalidIdentifier {
                raw: format!("<{}>", value.type_name()),
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier already ends with `extension`.
    pub fn has_extension(&self, extension: &str) -> bool {
        !extension.is_empty() && self.0.ends_with(extension)
    }

    /// The identifier with `extension` appended.
    pub fn with_extension(&self, extension: &str) -> String {
        format!("{}{}", self.0, extension)
    }

    /// The extension-qualified identifier.
    pub fn qualified(&self, extension: &str) -> ModuleId {
        ModuleId(self.with_extension(extension))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_separators() {
        assert_eq!(normalize_module_id("a//b"), "a/b");
        assert_eq!(normalize_module_id("a\\b"), "a/b");
        assert_eq!(normalize_module_id("a\\/\\\\b//c"), "a/b/c");
    }

    #[test]
    fn test_strips_whitespace_and_leading_slash() {
        assert_eq!(normalize_module_id("  foo/bar  "), "foo/bar");
        assert_eq!(normalize_module_id("/foo"), "foo");
        assert_eq!(normalize_module_id(" //\\foo"), "foo");
        assert_eq!(normalize_module_id(" / a"), "a");
    }

    #[test]
    fn test_keeps_interior_and_trailing_structure() {
        assert_eq!(normalize_module_id("foo/bar/"), "foo/bar/");
        assert_eq!(normalize_module_id("foo bar/baz"), "foo bar/baz");
    }

    #[test]
    fn test_idempotent() {
        for raw in ["  /a\\\\b//c ", "x", "/", "\\\\", "a/b.sx", "   ", " / a", "/ /a"] {
            let once = normalize_module_id(raw);
            assert_eq!(normalize_module_id(&once), once, "raw = {:?}", raw);
        }
    }

    #[test]
    fn test_equivalent_spellings() {
        let spellings = ["foo/bar", "/foo/bar", " foo\\bar ", "foo//bar", "\\foo\\\\bar"];
        let ids: Vec<_> = spellings.iter().map(|s| ModuleId::normalize(s)).collect();
        assert!(ids.iter().all(|id| id == &ids[0]));
        assert_eq!(ids[0].as_ref().map(ModuleId::as_str), Some("foo/bar"));
    }

    #[test]
    fn test_empty_means_no_module() {
        assert_eq!(ModuleId::normalize(""), None);
        assert_eq!(ModuleId::normalize("   "), None);
        assert_eq!(ModuleId::normalize("/"), None);
        assert_eq!(ModuleId::normalize(" \\ "), None);
    }

    #[test]
    fn test_from_script_values() {
        let id = ModuleId::from_value(&Value::str("/lib//util")).unwrap();
        assert_eq!(id.map(|i| i.to_string()), Some("lib/util".to_string()));

        let id = ModuleId::from_value(&Value::Long(42)).unwrap();
        assert_eq!(id.map(|i| i.to_string()), Some("42".to_string()));

        assert_eq!(ModuleId::from_value(&Value::str("  ")).unwrap(), None);

        let err = ModuleId::from_value(&Value::Nil).unwrap_err();
        assert!(matches!(err, ModuleError::InvalidIdentifier { .. }));

        let cyclic = Value::dict();
        cyclic.set("k", cyclic.clone());
        match ModuleId::from_value(&cyclic) {
            Err(ModuleError::InvalidIdentifier { raw }) => assert_eq!(raw, "<Dict>"),
            other => panic!("expected invalid identifier, got {:?}", other),
        }
        assert!(ModuleId::from_value(&Value::list(vec![])).is_err());
    }

    #[test]
    fn test_extension_helpers() {
        let id = ModuleId::normalize("foo/bar").unwrap();
        assert!(!id.has_extension(".sx"));
        assert_eq!(id.with_extension(".sx"), "foo/bar.sx");
        assert_eq!(id.qualified(".sx"), ModuleId::normalize("foo/bar.sx").unwrap());
        let id = ModuleId::normalize("foo/bar.sx").unwrap();
        assert!(id.has_extension(".sx"));
        assert!(!id.has_extension(""));
    }
}
