//! The location path model: an ordered sequence of folder names.
//!
//! Nesting is represented purely by materialized paths — an entry stores
//! the [`Location`] of its containing folder, and a folder's descendants
//! are exactly the entries whose location starts with the folder's full
//! path. There is no parent-id pointer, so every hierarchy mutation must
//! keep this prefix relationship intact.
//!
//! # Storage encoding
//!
//! Locations persist as a single TEXT column via [`Location::storage_key`].
//! Each segment is backslash-escaped (`\` becomes `\\`, `/` becomes `\/`)
//! and terminated with `/`, so the root is the empty string and
//! `["Docs", "Q3"]` becomes `Docs/Q3/`. Because every segment ends with an
//! unescaped separator, string-prefix containment of keys is exactly
//! segment-prefix containment of locations: `Foo/` can never falsely match
//! `FooBar/`, and a folder named `a/b` cannot forge a segment boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where an entry lives: the ordered names of its enclosing folders,
/// outermost first. The empty sequence is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(Vec<String>);

impl Location {
    /// The root location (empty sequence).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a location from folder name segments.
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// `true` when this is the root location.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of nesting levels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The folder name segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The innermost folder name, if any.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The location one level up, or `None` at the root.
    pub fn parent(&self) -> Option<Location> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// This location extended with one more folder name.
    pub fn child(&self, name: &str) -> Location {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    /// Exact-segment prefix containment. A location is a prefix of itself.
    pub fn is_prefix_of(&self, other: &Location) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// Replace the leading `old_prefix` segments with `new_prefix`,
    /// preserving the remainder. Returns `None` when `old_prefix` does
    /// not actually prefix this location.
    pub fn reparent(&self, old_prefix: &Location, new_prefix: &Location) -> Option<Location> {
        if !old_prefix.is_prefix_of(self) {
            return None;
        }
        let mut segments = new_prefix.0.clone();
        segments.extend_from_slice(&self.0[old_prefix.0.len()..]);
        Some(Self(segments))
    }

    /// Encode to the stable, prefix-safe storage key (see module docs).
    pub fn storage_key(&self) -> String {
        let mut key = String::new();
        for segment in &self.0 {
            for ch in segment.chars() {
                match ch {
                    '\\' => key.push_str("\\\\"),
                    '/' => key.push_str("\\/"),
                    other => key.push(other),
                }
            }
            key.push('/');
        }
        key
    }

    /// Decode a storage key produced by [`Location::storage_key`].
    ///
    /// Tolerant of a missing trailing separator on the final segment,
    /// so hand-written keys behave as expected.
    pub fn from_storage_key(key: &str) -> Location {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut escaped = false;
        for ch in key.chars() {
            if escaped {
                current.push(ch);
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '/' {
                segments.push(std::mem::take(&mut current));
            } else {
                current.push(ch);
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        Self(segments)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0.join("/"))
    }
}

impl From<Vec<String>> for Location {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl From<&[&str]> for Location {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::Type<sqlx::Postgres> for Location {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "sqlx")]
impl<'q> sqlx::Encode<'q, sqlx::Postgres> for Location {
    fn encode_by_ref(
        &self,
        buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<'q, sqlx::Postgres>>::encode(self.storage_key(), buf)
    }
}

#[cfg(feature = "sqlx")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Location {
    fn decode(
        value: <sqlx::Postgres as sqlx::Database>::ValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let key = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        Ok(Location::from_storage_key(key))
    }
}
