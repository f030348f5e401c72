use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: String,
}

impl Transcript {
    /// Build a transcript from bare segments, deriving the full text.
    pub fn from_segments(segments: Vec<Segment>, language: impl Into<String>) -> Self {
        let text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            text,
            segments,
            language: language.into(),
        }
    }

    /// End of the last segment, in seconds
    pub fn duration(&self) -> f64 {
        self.segments.last().map(|s| s.end).unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// One timed piece of speech, anchored to the source video's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// The span of the source video chosen for the short.
///
/// Only the selector constructs these, and only after checking
/// `0 <= start < end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightWindow {
    pub start: f64,
    pub end: f64,
    pub content: String,
}

impl HighlightWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Outcome of a single selection attempt that passed the hard checks.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Window(HighlightWindow),
    /// The model answered with a zero-length span. The caller decides whether
    /// to ask again or give up.
    Degenerate { at: f64, content: String },
}

impl Selection {
    pub fn window(&self) -> Option<&HighlightWindow> {
        match self {
            Selection::Window(w) => Some(w),
            Selection::Degenerate { .. } => None,
        }
    }

    pub fn into_window(self) -> Option<HighlightWindow> {
        match self {
            Selection::Window(w) => Some(w),
            Selection::Degenerate { .. } => None,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, Selection::Degenerate { .. })
    }
}

/// A caption re-timed onto the output clip's own timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedCaption {
    pub text: String,
    pub start: f64,
    pub end: f64,
}
