//! Source book code to reference book name mapping.

use serde::{Deserialize, Serialize};
use std::collections::{btree_map, BTreeMap};

/// Canonical codes plus the aliases used by older source exports
const NEW_TESTAMENT_BOOKS: &[(&str, &str)] = &[
    ("MAT", "Matthew"),
    ("MAR", "Mark"),
    ("LUK", "Luke"),
    ("JHN", "John"),
    ("ACT", "Acts"),
    ("ROM", "Romans"),
    ("1CO", "I_Corinthians"),
    ("2CO", "II_Corinthians"),
    ("GAL", "Galatians"),
    ("EPH", "Ephesians"),
    ("PHP", "Philippians"),
    ("COL", "Colossians"),
    ("1TH", "I_Thessalonians"),
    ("2TH", "II_Thessalonians"),
    ("1TI", "I_Timothy"),
    ("2TI", "II_Timothy"),
    ("TIT", "Titus"),
    ("PHM", "Philemon"),
    ("HEB", "Hebrews"),
    ("JAS", "James"),
    ("1PE", "I_Peter"),
    ("2PE", "II_Peter"),
    ("1JN", "I_John"),
    ("2JN", "II_John"),
    ("3JN", "III_John"),
    ("JUD", "Jude"),
    ("REV", "Revelation"),
    // Legacy codes
    ("JOH", "John"),
    ("JAM", "James"),
    ("1JO", "I_John"),
    ("2JO", "II_John"),
    ("3JO", "III_John"),
    ("PA", "John"), // Pericope Adulterae
    ("ACT24", "Acts"),
];

/// Many-to-one map from source book codes to reference book names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookNameMap {
    names: BTreeMap<String, String>,
}

impl BookNameMap {
    /// Empty map: every code resolves to itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in New Testament table including legacy aliases.
    pub fn new_testament() -> Self {
        NEW_TESTAMENT_BOOKS
            .iter()
            .map(|&(code, name)| (code.to_string(), name.to_string()))
            .collect()
    }

    /// Overlay another map; its entries win.
    pub fn extend(&mut self, other: impl IntoIterator<Item = (String, String)>) {
        self.names.extend(other);
    }

    /// Reference book name for a source code. Unknown codes map to themselves.
    pub fn resolve<'a>(&'a self, code: &'a str) -> &'a str {
        self.names.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(String, String)> for BookNameMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        BookNameMap {
            names: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for BookNameMap {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.names.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_canonical_and_legacy() {
        let map = BookNameMap::new_testament();
        assert_eq!(map.resolve("JHN"), "John");
        assert_eq!(map.resolve("JOH"), "John");
        assert_eq!(map.resolve("PA"), "John");
        assert_eq!(map.resolve("1CO"), "I_Corinthians");
    }

    #[test]
    fn test_unknown_code_is_identity() {
        let map = BookNameMap::new_testament();
        assert_eq!(map.resolve("XYZ"), "XYZ");
        assert_eq!(BookNameMap::new().resolve("John"), "John");
    }

    #[test]
    fn test_overlay_another_map() {
        let mut map = BookNameMap::new_testament();
        let overrides: BookNameMap = [("PA".to_string(), "Pericope".to_string())]
            .into_iter()
            .collect();
        map.extend(overrides);
        assert_eq!(map.resolve("PA"), "Pericope");
        assert_eq!(map.resolve("JHN"), "John");
    }

    #[test]
    fn test_extend_overrides() {
        let mut map = BookNameMap::new_testament();
        map.extend([("JHN".to_string(), "Ioannes".to_string())]);
        assert_eq!(map.resolve("JHN"), "Ioannes");
        assert_eq!(map.resolve("JOH"), "John");
    }
}
