//! Allocation origin descriptors.
//!
//! Every tracked operation carries the call site that issued it. The site is
//! captured once at allocation time and travels unchanged into guard
//! corruption diagnostics and leak reports.

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};

/// Where an allocation (or a release/resize) was requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OriginSite {
    /// A source location.
    Source {
        file: Cow<'static, str>,
        line: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        column: Option<u32>,
    },
    /// A symbolic tag chosen by the caller (e.g. `"string_list::grow"`).
    Tag { name: Cow<'static, str> },
}

impl OriginSite {
    /// Site for a file and line, as a C caller would pass `__FILE__`/`__LINE__`.
    #[must_use]
    pub fn new(file: impl Into<Cow<'static, str>>, line: u32) -> Self {
        Self::Source {
            file: file.into(),
            line,
            column: None,
        }
    }

    /// Symbolic site.
    #[must_use]
    pub fn tag(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Tag { name: name.into() }
    }

    /// Site of the caller, captured through `#[track_caller]`.
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(Location::caller())
    }

    /// Placeholder when the caller supplied no location.
    #[must_use]
    pub const fn unknown() -> Self {
        Self::Tag {
            name: Cow::Borrowed("<unknown>"),
        }
    }

    /// Source file, if this is a location.
    #[must_use]
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::Source { file, .. } => Some(file),
            Self::Tag { .. } => None,
        }
    }

    /// Source line, if this is a location.
    #[must_use]
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::Source { line, .. } => Some(*line),
            Self::Tag { .. } => None,
        }
    }
}

impl From<&'static Location<'static>> for OriginSite {
    fn from(location: &'static Location<'static>) -> Self {
        Self::Source {
            file: Cow::Borrowed(location.file()),
            line: location.line(),
            column: Some(location.column()),
        }
    }
}

impl fmt::Display for OriginSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source {
                file,
                line,
                column: Some(column),
            } => write!(f, "{file}:{line}:{column}"),
            Self::Source {
                file,
                line,
                column: None,
            } => write!(f, "{file}:{line}"),
            Self::Tag { name } => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_line_renders_like_c_location() {
        let site = OriginSite::new("test_code.c", 42);
        assert_eq!(site.to_string(), "test_code.c:42");
        assert_eq!(site.file(), Some("test_code.c"));
        assert_eq!(site.line(), Some(42));
    }

    #[test]
    fn tag_renders_verbatim() {
        let site = OriginSite::tag("string_list::grow");
        assert_eq!(site.to_string(), "string_list::grow");
        assert_eq!(site.file(), None);
    }

    #[test]
    fn caller_points_at_this_file() {
        let site = OriginSite::caller();
        assert_eq!(site.file(), Some(file!()));
        let rendered = site.to_string();
        assert!(rendered.starts_with(file!()), "got {rendered}");
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(OriginSite::new("a.c", 7)).unwrap();
        assert_eq!(json["kind"], "source");
        assert_eq!(json["file"], "a.c");
        assert_eq!(json["line"], 7);
        assert!(json.get("column").is_none());

        let back: OriginSite = serde_json::from_value(json).unwrap();
        assert_eq!(back, OriginSite::new("a.c", 7));
    }
}
