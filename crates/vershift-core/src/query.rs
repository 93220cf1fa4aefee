//! Dotted key path resolution.
//!
//! A [`KeyPath`] such as `package.version` walks a parsed [`Value`] tree one
//! segment at a time. Mapping keys match segments exactly; sequences are
//! addressed by decimal index (`images.0.tag`).

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::document::Value;

/// Key path used when none is given.
pub const DEFAULT_QUERY: &str = "version";

/// Errors from key path resolution.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueryError {
    /// A segment was missing, or the path ended on `null`.
    #[error("Path \"{path}\" not found{}", in_file(.file.as_deref()))]
    PathNotFound {
        /// The full key path as given.
        path: String,
        /// File the tree came from, when known.
        file: Option<Utf8PathBuf>,
    },

    /// The path ended on a mapping or sequence instead of a scalar.
    #[error("Path \"{path}\" does not point to a scalar value{}", in_file(.file.as_deref()))]
    NotScalar {
        /// The full key path as given.
        path: String,
        /// File the tree came from, when known.
        file: Option<Utf8PathBuf>,
    },
}

fn in_file(file: Option<&Utf8Path>) -> String {
    file.map(|f| format!(" in {f}")).unwrap_or_default()
}

/// Result alias for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// A parsed dotted key path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    raw: String,
    segments: Vec<String>,
}

impl KeyPath {
    /// Split `raw` on `.`. An empty string is a single empty segment.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let segments = raw.split('.').map(str::to_string).collect();
        Self { raw, segments }
    }

    /// The path exactly as given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The individual segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolve this path against `root` and return the scalar as text.
    ///
    /// `file` only decorates error messages.
    #[instrument(skip(self, root), fields(path = %self.raw))]
    pub fn resolve(&self, root: &Value, file: Option<&Utf8Path>) -> QueryResult<String> {
        let mut current = root;
        for segment in &self.segments {
            current = current
                .get(segment)
                .ok_or_else(|| self.not_found(file))?;
        }

        if current.is_container() {
            return Err(QueryError::NotScalar {
                path: self.raw.clone(),
                file: file.map(Utf8Path::to_path_buf),
            });
        }

        let text = current.as_text().ok_or_else(|| self.not_found(file))?;
        debug!(value = %text, "path resolved");
        Ok(text)
    }

    fn not_found(&self, file: Option<&Utf8Path>) -> QueryError {
        QueryError::PathNotFound {
            path: self.raw.clone(),
            file: file.map(Utf8Path::to_path_buf),
        }
    }
}

impl Default for KeyPath {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for KeyPath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Resolve a dotted `path` against `root`.
pub fn resolve(root: &Value, path: &str) -> QueryResult<String> {
    KeyPath::new(path).resolve(root, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document;

    fn json(text: &str) -> Value {
        document::parse(text, "json").unwrap()
    }

    #[test]
    fn resolves_nested_number() {
        let tree = json(r#"{"a": {"b": {"c": 5}}}"#);
        assert_eq!(resolve(&tree, "a.b.c").unwrap(), "5");
    }

    #[test]
    fn missing_segment_is_not_found() {
        let tree = json(r#"{"a": {"b": {"c": 5}}}"#);
        let err = resolve(&tree, "a.b.x").unwrap_err();
        assert_eq!(
            err,
            QueryError::PathNotFound {
                path: "a.b.x".into(),
                file: None
            }
        );
    }

    #[test]
    fn error_names_path_and_file() {
        let tree = json(r#"{"name": "x"}"#);
        let err = KeyPath::new("version")
            .resolve(&tree, Some(Utf8Path::new("package.json")))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Path "version" not found in package.json"#
        );
    }

    #[test]
    fn scalar_in_the_middle_stops_traversal() {
        let tree = json(r#"{"version": "1.0.0"}"#);
        assert!(matches!(
            resolve(&tree, "version.major"),
            Err(QueryError::PathNotFound { .. })
        ));
    }

    #[test]
    fn null_terminal_is_not_found() {
        let tree = json(r#"{"version": null}"#);
        assert!(matches!(
            resolve(&tree, "version"),
            Err(QueryError::PathNotFound { .. })
        ));
    }

    #[test]
    fn container_terminal_is_not_scalar() {
        let tree = json(r#"{"package": {"version": "1"}}"#);
        assert!(matches!(
            resolve(&tree, "package"),
            Err(QueryError::NotScalar { .. })
        ));
    }

    #[test]
    fn empty_path_looks_up_empty_key() {
        let tree = json(r#"{"version": "1"}"#);
        assert!(matches!(
            resolve(&tree, ""),
            Err(QueryError::PathNotFound { .. })
        ));

        let tree = json(r#"{"": "2.0.0"}"#);
        assert_eq!(resolve(&tree, "").unwrap(), "2.0.0");
    }

    #[test]
    fn empty_path_has_one_segment() {
        assert_eq!(KeyPath::new("").segments(), &[String::new()]);
    }

    #[test]
    fn sequences_accept_index_segments() {
        let tree = json(r#"{"images": [{"tag": "1.4.0"}]}"#);
        assert_eq!(resolve(&tree, "images.0.tag").unwrap(), "1.4.0");
        assert!(resolve(&tree, "images.1.tag").is_err());
    }

    #[test]
    fn booleans_and_floats_are_stringified() {
        let tree = json(r#"{"flag": false, "v": 1.0}"#);
        assert_eq!(resolve(&tree, "flag").unwrap(), "false");
        assert_eq!(resolve(&tree, "v").unwrap(), "1");
    }

    #[test]
    fn toml_tables_resolve() {
        let tree = document::parse("[package]\nversion = \"0.4.1\"\n", "toml").unwrap();
        assert_eq!(resolve(&tree, "package.version").unwrap(), "0.4.1");
    }

    #[test]
    fn default_path_is_version() {
        assert_eq!(KeyPath::default().as_str(), DEFAULT_QUERY);
    }
}
