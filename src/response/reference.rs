//! Content references
//!
//! A content reference is the canonical textual form of a UUID that names an
//! artifact held by the storage backend. Anything that is not exactly the
//! lower-case hyphenated form (after lower-casing) is literal text.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a stored artifact (image, audio)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentReference(Uuid);

impl ContentReference {
    /// Parses a token as a content reference.
    ///
    /// Returns `None` unless the lower-cased token parses as a UUID and
    /// re-serializes to the very same hyphenated string.
    ///
    /// # Examples
    ///
    /// ```
    /// use companion_bot::response::ContentReference;
    ///
    /// assert!(ContentReference::parse("3fa85f64-5717-4562-b3fc-2c963f66afa6").is_some());
    /// assert!(ContentReference::parse("3fa85f6457174562b3fc2c963f66afa6").is_none());
    /// ```
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let lowered = token.to_lowercase();
        let uuid = Uuid::parse_str(&lowered).ok()?;
        (uuid.hyphenated().to_string() == lowered).then_some(Self(uuid))
    }

    /// Generates a fresh random reference
    #[must_use]
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Returns `true` if `token` is a content reference rather than literal text.
///
/// Never fails: malformed input simply yields `false`.
#[must_use]
pub fn is_content_reference(token: &str) -> bool {
    ContentReference::parse(token).is_some()
}

impl fmt::Display for ContentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl From<Uuid> for ContentReference {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl TryFrom<String> for ContentReference {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("not a content reference: {value}"))
    }
}

impl From<ContentReference> for String {
    fn from(reference: ContentReference) -> Self {
        reference.to_string()
    }
}
