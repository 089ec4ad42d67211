//! Dot-separated key paths
//!
//! Keys inside a namespace may address nested values with `.` separators
//! (`user.profile.name`). Paths are compared segment by segment, so
//! `user` is an ancestor of `user.name` but unrelated to `username`.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// A dotted write that cannot be applied without destroying data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty key path")]
    Empty,

    #[error("'{segment}' is not a valid index for an array of length {len}")]
    BadIndex { segment: String, len: usize },
}

/// A parsed key path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// Parse a dotted key into its segments
    pub fn parse(key: &str) -> Self {
        Self {
            segments: key.split('.').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when `self` is a prefix of `other` (or equal to it)
    pub fn is_ancestor_of(&self, other: &KeyPath) -> bool {
        self.segments.len() <= other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }

    /// True when `other` is a prefix of `self` (or equal to it)
    pub fn is_descendant_of(&self, other: &KeyPath) -> bool {
        other.is_ancestor_of(self)
    }

    /// Exact, ancestor or descendant relationship in either direction
    pub fn overlaps(&self, other: &KeyPath) -> bool {
        self.is_ancestor_of(other) || self.is_descendant_of(other)
    }

    /// Every non-empty prefix of this path, including the path itself.
    ///
    /// `a.b.c` yields `a`, `a.b`, `a.b.c`.
    pub fn prefixes(&self) -> impl Iterator<Item = KeyPath> + '_ {
        (1..=self.segments.len()).map(move |n| KeyPath {
            segments: self.segments[..n].to_vec(),
        })
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Changed keys expanded with all of their ancestor prefixes
pub fn touched_paths<'a, I>(changed: I) -> BTreeSet<KeyPath>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut touched = BTreeSet::new();
    for key in changed {
        touched.extend(KeyPath::parse(key).prefixes());
    }
    touched
}

/// Whether a subscriber filtered on `keys` should see a change touching `touched`.
///
/// `None` means the subscriber listens to the whole namespace.
pub fn filter_matches(keys: Option<&[KeyPath]>, touched: &BTreeSet<KeyPath>) -> bool {
    match keys {
        None => true,
        Some(keys) => keys
            .iter()
            .any(|key| touched.iter().any(|path| key.overlaps(path))),
    }
}

/// Resolve a path inside a value. Numeric segments index into arrays.
pub fn lookup<'a>(root: &'a Value, path: &KeyPath) -> Option<&'a Value> {
    path.segments().iter().try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Resolve a path inside a namespace map
pub fn lookup_in<'a>(map: &'a Map<String, Value>, path: &KeyPath) -> Option<&'a Value> {
    let (first, rest) = path.segments().split_first()?;
    let head = map.get(first)?;
    lookup(head, &KeyPath { segments: rest.to_vec() })
}

/// Get a mutable slot for `path`, creating intermediate objects as needed.
///
/// Intermediates that exist but are not containers are replaced with empty
/// objects. Arrays are never replaced: a segment must be an existing index,
/// or equal to the length to append.
pub fn slot_mut<'a>(
    root: &'a mut Map<String, Value>,
    path: &KeyPath,
) -> Result<&'a mut Value, PathError> {
    let (first, rest) = path.segments().split_first().ok_or(PathError::Empty)?;

    let mut current = root.entry(first.clone()).or_insert(Value::Null);
    for segment in rest {
        current = descend_or_create(current, segment)?;
    }
    Ok(current)
}

fn descend_or_create<'a>(current: &'a mut Value, segment: &str) -> Result<&'a mut Value, PathError> {
    if !current.is_object() && !current.is_array() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Array(items) => {
            let len = items.len();
            match segment.parse::<usize>() {
                Ok(i) if i < len => Ok(&mut items[i]),
                Ok(i) if i == len => {
                    items.push(Value::Null);
                    Ok(&mut items[i])
                }
                _ => Err(PathError::BadIndex {
                    segment: segment.to_string(),
                    len,
                }),
            }
        }
        Value::Object(map) => Ok(map.entry(segment.to_string()).or_insert(Value::Null)),
        _ => unreachable!("non-container values are replaced by an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> KeyPath {
        KeyPath::parse(s)
    }

    #[test]
    fn test_ancestor_and_descendant() {
        assert!(p("user").is_ancestor_of(&p("user.name")));
        assert!(p("user.name").is_descendant_of(&p("user")));
        assert!(p("user").is_ancestor_of(&p("user")));
        assert!(!p("user.name").is_ancestor_of(&p("user")));
    }

    #[test]
    fn test_no_false_prefix_match() {
        assert!(!p("user").overlaps(&p("username")));
        assert!(!p("user.name").overlaps(&p("user.names")));
    }

    #[test]
    fn test_prefixes() {
        let prefixes: Vec<String> = p("a.b.c").prefixes().map(|k| k.to_string()).collect();
        assert_eq!(prefixes, vec!["a", "a.b", "a.b.c"]);
    }

    #[test]
    fn test_filter_exact() {
        let touched = touched_paths(&["count".to_string()]);
        assert!(filter_matches(Some(&[p("count")]), &touched));
        assert!(!filter_matches(Some(&[p("other")]), &touched));
    }

    #[test]
    fn test_filter_descendant_changed() {
        // subscribed to `user`, `user.name` changed
        let touched = touched_paths(&["user.name".to_string()]);
        assert!(filter_matches(Some(&[p("user")]), &touched));
    }

    #[test]
    fn test_filter_ancestor_changed() {
        // subscribed to `user.profile`, `user` replaced wholesale
        let touched = touched_paths(&["user".to_string()]);
        assert!(filter_matches(Some(&[p("user.profile")]), &touched));
    }

    #[test]
    fn test_filter_sibling_not_matched() {
        let touched = touched_paths(&["user.email".to_string()]);
        assert!(!filter_matches(Some(&[p("user.profile")]), &touched));
        assert!(!filter_matches(Some(&[p("username")]), &touched));
    }

    #[test]
    fn test_wildcard_filter() {
        let touched = touched_paths(&["anything".to_string()]);
        assert!(filter_matches(None, &touched));
    }

    #[test]
    fn test_lookup() {
        let value = json!({"user": {"tags": ["a", "b"], "name": "x"}});
        assert_eq!(lookup(&value, &p("user.name")), Some(&json!("x")));
        assert_eq!(lookup(&value, &p("user.tags.1")), Some(&json!("b")));
        assert_eq!(lookup(&value, &p("user.missing.deep")), None);
        assert_eq!(lookup(&value, &p("user.name.deeper")), None);
    }

    #[test]
    fn test_slot_mut_creates_intermediates() {
        let mut map = Map::new();
        map.insert("user".to_string(), json!("not an object"));
        *slot_mut(&mut map, &p("user.profile.name")).unwrap() = json!("ada");
        assert_eq!(
            Value::Object(map),
            json!({"user": {"profile": {"name": "ada"}}})
        );
    }

    #[test]
    fn test_slot_mut_indexes_existing_array() {
        let mut map = Map::new();
        map.insert("items".to_string(), json!([1, 2, 3]));
        *slot_mut(&mut map, &p("items.1")).unwrap() = json!(20);
        assert_eq!(map["items"], json!([1, 20, 3]));
    }

    #[test]
    fn test_slot_mut_appends_at_array_end() {
        let mut map = Map::new();
        map.insert("items".to_string(), json!([1, 2, 3]));
        *slot_mut(&mut map, &p("items.3")).unwrap() = json!(4);
        assert_eq!(map["items"], json!([1, 2, 3, 4]));
    }

    #[test]
    fn test_slot_mut_keeps_array_on_bad_index() {
        let mut map = Map::new();
        map.insert("items".to_string(), json!([1, 2, 3]));

        let err = slot_mut(&mut map, &p("items.7")).unwrap_err();
        assert_eq!(
            err,
            PathError::BadIndex {
                segment: "7".to_string(),
                len: 3
            }
        );
        assert!(slot_mut(&mut map, &p("items.name")).is_err());
        assert_eq!(map["items"], json!([1, 2, 3]));
    }
}
