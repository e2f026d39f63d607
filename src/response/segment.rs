//! Response segmentation
//!
//! Splits raw agent output into alternating text and content-reference spans,
//! preserving the left-to-right order of the source.

// lazy_regex! uses once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use super::reference::ContentReference;
use lazy_regex::lazy_regex;

/// Loose identifier shape used for splitting. Spans it matches are
/// re-validated, so look-alikes fall back to text.
static RE_IDENTIFIER: lazy_regex::Lazy<regex::Regex> = lazy_regex!(
    r"[0-9A-Za-z]{8}-[0-9A-Za-z]{4}-[0-9A-Za-z]{4}-[0-9A-Za-z]{4}-[0-9A-Za-z]{12}"
);

/// Leading punctuation and whitespace left over by splitting
static RE_LEADING_NON_WORD: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"^\W+");

/// One unit of a response being assembled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text
    Text(String),
    /// Reference to a stored artifact
    MediaRef(ContentReference),
}

impl Segment {
    /// Classifies a span: references become `MediaRef`, everything else `Text`
    #[must_use]
    pub fn classify(span: &str) -> Self {
        ContentReference::parse(span).map_or_else(|| Self::Text(span.to_string()), Self::MediaRef)
    }

    /// Returns the text of a `Text` segment
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::MediaRef(_) => None,
        }
    }

    /// Whether this segment references media
    #[must_use]
    pub const fn is_media(&self) -> bool {
        matches!(self, Self::MediaRef(_))
    }
}

/// Splits `raw` into ordered segments.
///
/// Every span has its leading non-word characters stripped; spans that end up
/// empty are dropped.
///
/// # Examples
///
/// ```
/// use companion_bot::response::{segment, Segment};
///
/// let segments = segment("Look: 3fa85f64-5717-4562-b3fc-2c963f66afa6, nice!");
/// assert_eq!(segments.len(), 3);
/// assert_eq!(segments[2], Segment::Text("nice!".to_string()));
/// ```
#[must_use]
pub fn segment(raw: &str) -> Vec<Segment> {
    split_keeping_identifiers(raw)
        .into_iter()
        .map(strip_leading_non_word)
        .filter(|span| !span.is_empty())
        .map(Segment::classify)
        .collect()
}

/// Splits on the identifier pattern, keeping the matched identifiers as spans
fn split_keeping_identifiers(raw: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut last_end = 0;
    for mat in RE_IDENTIFIER.find_iter(raw) {
        spans.push(&raw[last_end..mat.start()]);
        spans.push(mat.as_str());
        last_end = mat.end();
    }
    spans.push(&raw[last_end..]);
    spans
}

fn strip_leading_non_word(span: &str) -> &str {
    RE_LEADING_NON_WORD
        .find(span)
        .map_or(span, |m| &span[m.end()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";
    const ID2: &str = "9b2d1f0e-46a1-4c55-8f2e-0d6f3c9a7b11";

    fn media(id: &str) -> Segment {
        Segment::MediaRef(ContentReference::parse(id).expect("valid id"))
    }

    #[test]
    fn test_empty_input() {
        assert!(segment("").is_empty());
    }

    #[test]
    fn test_plain_text_single_segment() {
        assert_eq!(
            segment("  ...Hello there, how are you?"),
            vec![Segment::Text("Hello there, how are you?".to_string())]
        );
    }

    #[test]
    fn test_photo_scenario() {
        let raw = format!("Here is your photo: {ID} enjoy!");
        assert_eq!(
            segment(&raw),
            vec![
                Segment::Text("Here is your photo: ".to_string()),
                media(ID),
                Segment::Text("enjoy!".to_string()),
            ]
        );
    }

    #[test]
    fn test_order_is_preserved() {
        let raw = format!("{ID}, first. Then {ID2}: second");
        assert_eq!(
            segment(&raw),
            vec![
                media(ID),
                Segment::Text("first. Then ".to_string()),
                media(ID2),
                Segment::Text("second".to_string()),
            ]
        );
    }

    #[test]
    fn test_adjacent_identifiers_drop_punctuation_only_spans() {
        let raw = format!("{ID}, {ID2}");
        assert_eq!(segment(&raw), vec![media(ID), media(ID2)]);
    }

    #[test]
    fn test_look_alike_stays_text() {
        let fake = "zzzzzzzz-5717-4562-b3fc-2c963f66afa6";
        let raw = format!("id {fake} end");
        assert_eq!(
            segment(&raw),
            vec![
                Segment::Text("id ".to_string()),
                Segment::Text(fake.to_string()),
                Segment::Text("end".to_string()),
            ]
        );
    }

    #[test]
    fn test_upper_case_identifier_is_media() {
        let raw = format!("photo {}", ID.to_uppercase());
        assert_eq!(
            segment(&raw),
            vec![Segment::Text("photo ".to_string()), media(ID)]
        );
    }

    #[test]
    fn test_unicode_text_is_kept() {
        assert_eq!(
            segment("— Привет, мир!"),
            vec![Segment::Text("Привет, мир!".to_string())]
        );
    }
}
