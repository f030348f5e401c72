//! Highlight selection.
//!
//! The model's answer is untrusted free text. It goes through a tolerant
//! decode (plain JSON, then the first embedded object), a typed field
//! extraction, and finally the timing checks. Nothing downstream ever sees a
//! window that has not passed `0 <= start < end`.

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::{
    error::SelectionError,
    format::{format_transcript_for_selection, snippet},
    generation::TextGenerator,
    types::{HighlightWindow, Selection, Transcript},
};

pub static SELECTION_PROMPT: &str = r#"
The input is a timestamped transcript of a video. Each line reads
"<start seconds> - <end seconds>: <spoken text>".

TASK:
Pick ONE contiguous segment of about 60 seconds that holds something
interesting, useful, surprising, controversial or thought-provoking.

RULES:
- Use only complete sentences; never start or stop in the middle of one
- The segment must express a complete thought on its own
- Take start and end from the transcript timestamps

OUTPUT: Return ONLY a JSON object, nothing else:
{
  "start": <start time of the segment in seconds, number>,
  "content": "<the spoken text of the segment, no timestamps>",
  "end": <end time of the segment in seconds, number>
}
"#;

/// Spans shorter than this count as zero-length
pub const DEGENERATE_EPSILON: f64 = 1e-6;

const RESPONSE_SNIPPET_CHARS: usize = 300;
const TRANSCRIPT_SNIPPET_CHARS: usize = 200;

#[derive(Clone, Debug, Default)]
pub struct SelectorOptions {
    /// Reject answers without `start`/`end` instead of defaulting them to 0
    pub strict_fields: bool,
}

pub struct HighlightSelector<G> {
    generator: G,
    options: SelectorOptions,
}

impl<G: TextGenerator> HighlightSelector<G> {
    pub fn new(generator: G) -> Self {
        Self::with_options(generator, SelectorOptions::default())
    }

    pub fn with_options(generator: G, options: SelectorOptions) -> Self {
        Self { generator, options }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Ask the model once and validate its answer.
    pub async fn select(&self, transcript: &Transcript) -> Result<Selection, SelectionError> {
        let user_text = format_transcript_for_selection(transcript);

        let raw = match self.generator.generate(SELECTION_PROMPT, &user_text).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(
                    error = %e,
                    transcript_chars = user_text.chars().count(),
                    transcript_head = %snippet(&user_text, TRANSCRIPT_SNIPPET_CHARS),
                    "highlight generation failed"
                );
                return Err(e.into());
            }
        };

        let selection = parse_selection(&raw, &self.options).inspect_err(|e| {
            error!(
                error = %e,
                response = %snippet(&raw, RESPONSE_SNIPPET_CHARS),
                "highlight response rejected"
            );
        })?;

        match &selection {
            Selection::Window(w) => info!(
                start = w.start,
                end = w.end,
                duration = w.duration(),
                content = %w.content,
                "highlight selected"
            ),
            Selection::Degenerate { at, .. } => {
                warn!(at, "model returned a zero-length highlight")
            }
        }

        Ok(selection)
    }

    /// Select, re-asking the model while it keeps answering with a zero-length
    /// span and `confirm` agrees, for at most `max_attempts` calls in total.
    ///
    /// A degenerate selection is returned once retries are declined or used
    /// up; hard failures end the loop immediately.
    pub async fn select_with_retry<F>(
        &self,
        transcript: &Transcript,
        max_attempts: u32,
        mut confirm: F,
    ) -> Result<Selection, SelectionError>
    where
        F: FnMut(u32) -> bool,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let selection = self.select(transcript).await?;

            if !selection.is_degenerate() || attempt >= max_attempts || !confirm(attempt) {
                return Ok(selection);
            }

            attempt += 1;
            info!(attempt, max_attempts, "retrying highlight selection");
        }
    }
}

/// Turn a raw model answer into a validated selection
pub fn parse_selection(raw: &str, options: &SelectorOptions) -> Result<Selection, SelectionError> {
    let value = decode_response(raw)?;
    let object = top_level_object(&value)?;

    if !object.contains_key("start") || !object.contains_key("end") {
        warn!(
            keys = ?object.keys().collect::<Vec<_>>(),
            "unexpected JSON structure in highlight response"
        );
    }

    let start = number_field(object, "start", options.strict_fields)?;
    let end = number_field(object, "end", options.strict_fields)?;
    let content = text_field(object, "content");

    validate_window(start, end, content)
}

/// Apply the timing checks in order: negative, zero-length, reversed.
pub fn validate_window(start: f64, end: f64, content: String) -> Result<Selection, SelectionError> {
    if start < 0.0 || end < 0.0 {
        return Err(SelectionError::NegativeTime { start, end });
    }

    if (end - start).abs() < DEGENERATE_EPSILON {
        return Ok(Selection::Degenerate { at: start, content });
    }

    if end < start {
        return Err(SelectionError::InvalidRange { start, end });
    }

    Ok(Selection::Window(HighlightWindow {
        start,
        end,
        content,
    }))
}

fn decode_response(raw: &str) -> Result<Value, SelectionError> {
    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        return Ok(value);
    }

    let candidates = [extract_json_object(raw), outer_braces(raw)];
    candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .ok_or_else(|| {
            SelectionError::GenerationFailure(format!(
                "Could not parse JSON from response: {}",
                snippet(raw, RESPONSE_SNIPPET_CHARS)
            ))
        })
}

fn top_level_object(value: &Value) -> Result<&Map<String, Value>, SelectionError> {
    match value {
        Value::Object(map) => Ok(map),
        // Some models wrap the object in a one-element list
        Value::Array(items) => items.iter().find_map(Value::as_object).ok_or_else(|| {
            SelectionError::GenerationFailure("Response array holds no JSON object".into())
        }),
        other => Err(SelectionError::GenerationFailure(format!(
            "Expected a JSON object, got: {}",
            snippet(&other.to_string(), RESPONSE_SNIPPET_CHARS)
        ))),
    }
}

/// First balanced `{...}` in `text`, skipping braces inside JSON strings.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn number_field(
    object: &Map<String, Value>,
    name: &'static str,
    strict: bool,
) -> Result<f64, SelectionError> {
    let not_numeric = |shown: &str| {
        SelectionError::GenerationFailure(format!("\"{name}\" is not a number: {shown}"))
    };

    match object.get(name) {
        None | Some(Value::Null) if strict => Err(SelectionError::MissingField(name)),
        None | Some(Value::Null) => {
            warn!(field = name, "missing in highlight response, using 0");
            Ok(0.0)
        }
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| not_numeric(&n.to_string())),
        Some(Value::String(s)) => parse_seconds(s).ok_or_else(|| not_numeric(s)),
        Some(other) => Err(not_numeric(&other.to_string())),
    }
}

fn text_field(object: &Map<String, Value>, name: &str) -> String {
    match object.get(name) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Parse `"12.5"`, `"12.5s"` or clock forms `"MM:SS"` / `"HH:MM:SS(.fff)"`.
pub fn parse_seconds(text: &str) -> Option<f64> {
    let text = text.trim();
    let text = text.strip_suffix('s').unwrap_or(text).trim_end();

    let seconds = if text.contains(':') {
        let parts = text
            .split(':')
            .map(|p| p.trim().parse::<f64>().ok())
            .collect::<Option<Vec<_>>>()?;
        match parts.as_slice() {
            [m, s] => m * 60.0 + s,
            [h, m, s] => h * 3600.0 + m * 60.0 + s,
            _ => return None,
        }
    } else {
        text.parse::<f64>().ok()?
    };

    seconds.is_finite().then_some(seconds)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Mutex,
            atomic::{AtomicU32, Ordering},
        },
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{error::GenerationError, types::Segment};

    struct ScriptedGenerator {
        answers: Mutex<VecDeque<Result<String, GenerationError>>>,
        calls: AtomicU32,
    }

    impl ScriptedGenerator {
        fn new(answers: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn answering(answers: &[&str]) -> Self {
            Self::new(answers.iter().map(|a| Ok(a.to_string())).collect())
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            system_prompt: &str,
            _user_text: &str,
        ) -> Result<String, GenerationError> {
            assert_eq!(system_prompt, SELECTION_PROMPT);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::InvalidResponse("script exhausted".into())))
        }
    }

    fn transcript() -> Transcript {
        Transcript::from_segments(
            vec![
                Segment::new("hello world", 0.0, 2.0),
                Segment::new("goodbye", 2.0, 4.0),
            ],
            "en",
        )
    }

    fn lenient(raw: &str) -> Result<Selection, SelectionError> {
        parse_selection(raw, &SelectorOptions::default())
    }

    fn window(start: f64, end: f64, content: &str) -> Selection {
        Selection::Window(HighlightWindow {
            start,
            end,
            content: content.into(),
        })
    }

    #[test]
    fn test_plain_json_answer() {
        assert_eq!(
            lenient(r#"{"start": 10, "end": 70, "content": "x"}"#).unwrap(),
            window(10.0, 70.0, "x")
        );
    }

    #[test]
    fn test_negative_start_is_rejected() {
        assert_eq!(
            lenient(r#"{"start": -5, "end": 10}"#).unwrap_err(),
            SelectionError::NegativeTime {
                start: -5.0,
                end: 10.0
            }
        );
    }

    #[test]
    fn test_negative_end_is_rejected() {
        assert!(matches!(
            lenient(r#"{"start": 5, "end": -1, "content": ""}"#),
            Err(SelectionError::NegativeTime { .. })
        ));
    }

    #[test]
    fn test_object_wrapped_in_prose() {
        assert_eq!(
            lenient(r#"Sure! {"start":5,"end":65,"content":"y"}"#).unwrap(),
            window(5.0, 65.0, "y")
        );
    }

    #[test]
    fn test_object_in_markdown_fence_followed_by_more_braces() {
        let raw = "```json\n{\"start\": 1.5, \"end\": 61.5, \"content\": \"a {b}\"}\n```\nNote: {not json}";
        assert_eq!(lenient(raw).unwrap(), window(1.5, 61.5, "a {b}"));
    }

    #[test]
    fn test_reversed_range_is_invalid() {
        assert_eq!(
            lenient(r#"{"start": 70, "end": 10, "content": "x"}"#).unwrap_err(),
            SelectionError::InvalidRange {
                start: 70.0,
                end: 10.0
            }
        );
    }

    #[test]
    fn test_equal_bounds_are_degenerate_not_errors() {
        assert_eq!(
            lenient(r#"{"start": 30, "end": 30, "content": "z"}"#).unwrap(),
            Selection::Degenerate {
                at: 30.0,
                content: "z".into()
            }
        );
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        assert_eq!(
            lenient(r#"{"start": "12.5", "end": " 72.5s ", "content": "q"}"#).unwrap(),
            window(12.5, 72.5, "q")
        );
    }

    #[test]
    fn test_clock_strings_are_coerced() {
        assert_eq!(
            lenient(r#"{"start": "01:05", "end": "0:02:05.5", "content": "c"}"#).unwrap(),
            window(65.0, 125.5, "c")
        );
    }

    #[test]
    fn test_non_numeric_start_is_generation_failure() {
        assert!(matches!(
            lenient(r#"{"start": "soon", "end": 10, "content": "x"}"#),
            Err(SelectionError::GenerationFailure(_))
        ));
        assert!(matches!(
            lenient(r#"{"start": "NaN", "end": 10, "content": "x"}"#),
            Err(SelectionError::GenerationFailure(_))
        ));
    }

    #[test]
    fn test_missing_content_defaults_to_empty() {
        assert_eq!(
            lenient(r#"{"start": 3, "end": 9}"#).unwrap(),
            window(3.0, 9.0, "")
        );
    }

    #[test]
    fn test_missing_start_defaults_to_zero_when_lenient() {
        assert_eq!(
            lenient(r#"{"end": 60, "content": "from the top"}"#).unwrap(),
            window(0.0, 60.0, "from the top")
        );
    }

    #[test]
    fn test_missing_end_fails_range_check_when_lenient() {
        assert_eq!(
            lenient(r#"{"start": 5, "content": "x"}"#).unwrap_err(),
            SelectionError::InvalidRange {
                start: 5.0,
                end: 0.0
            }
        );
    }

    #[test]
    fn test_missing_fields_are_hard_errors_when_strict() {
        let strict = SelectorOptions {
            strict_fields: true,
        };
        assert_eq!(
            parse_selection(r#"{"end": 60}"#, &strict).unwrap_err(),
            SelectionError::MissingField("start")
        );
        assert_eq!(
            parse_selection(r#"{"start": 1, "end": null}"#, &strict).unwrap_err(),
            SelectionError::MissingField("end")
        );
    }

    #[test]
    fn test_array_answer_uses_first_object() {
        assert_eq!(
            lenient(r#"[{"start": 2, "end": 62, "content": "first"}, {"start": 0, "end": 1}]"#)
                .unwrap(),
            window(2.0, 62.0, "first")
        );
    }

    #[test]
    fn test_unparseable_answer_is_generation_failure() {
        match lenient("I could not find anything interesting.") {
            Err(SelectionError::GenerationFailure(msg)) => {
                assert!(msg.contains("Could not parse JSON"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            lenient("42"),
            Err(SelectionError::GenerationFailure(_))
        ));
    }

    #[test]
    fn test_extract_json_object_ignores_braces_in_strings() {
        let text = r#"prefix {"a": "}{", "b": {"c": 1}} suffix }"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"a": "}{", "b": {"c": 1}}"#)
        );
        assert_eq!(extract_json_object("no braces"), None);
        assert_eq!(extract_json_object("{ unterminated"), None);
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("42"), Some(42.0));
        assert_eq!(parse_seconds(" 4.25s"), Some(4.25));
        assert_eq!(parse_seconds("1:00:00"), Some(3600.0));
        assert_eq!(parse_seconds("1:2:3:4"), None);
        assert_eq!(parse_seconds("inf"), None);
        assert_eq!(parse_seconds(""), None);
    }

    #[tokio::test]
    async fn test_select_returns_validated_window() {
        let selector = HighlightSelector::new(ScriptedGenerator::answering(&[
            r#"{"start": 0.5, "end": 3.5, "content": "hello world goodbye"}"#,
        ]));

        let selection = selector.select(&transcript()).await.unwrap();
        assert_eq!(selection, window(0.5, 3.5, "hello world goodbye"));
        assert_eq!(selector.generator().calls(), 1);
    }

    #[tokio::test]
    async fn test_select_maps_service_errors() {
        let selector = HighlightSelector::new(ScriptedGenerator::new(vec![Err(
            GenerationError::Status {
                status: 502,
                body: "bad gateway".into(),
            },
        )]));

        match selector.select(&transcript()).await {
            Err(SelectionError::GenerationFailure(msg)) => {
                assert!(msg.contains("502"));
                assert!(msg.contains("bad gateway"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retry_reinvokes_generation_on_degenerate_window() {
        let selector = HighlightSelector::new(ScriptedGenerator::answering(&[
            r#"{"start": 20, "end": 20, "content": ""}"#,
            r#"{"start": 20, "end": 80, "content": "better"}"#,
        ]));

        let mut asked = Vec::new();
        let selection = selector
            .select_with_retry(&transcript(), 3, |attempt| {
                asked.push(attempt);
                true
            })
            .await
            .unwrap();

        assert_eq!(selection, window(20.0, 80.0, "better"));
        assert_eq!(asked, vec![1]);
        assert_eq!(selector.generator().calls(), 2);
    }

    #[tokio::test]
    async fn test_declined_retry_returns_degenerate_selection() {
        let selector = HighlightSelector::new(ScriptedGenerator::answering(&[
            r#"{"start": 20, "end": 20, "content": "again"}"#,
        ]));

        let selection = selector
            .select_with_retry(&transcript(), 3, |_| false)
            .await
            .unwrap();

        assert!(selection.is_degenerate());
        assert_eq!(selector.generator().calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let degenerate = r#"{"start": 7, "end": 7}"#;
        let selector =
            HighlightSelector::new(ScriptedGenerator::answering(&[degenerate; 5]));

        let mut confirmations = 0;
        let selection = selector
            .select_with_retry(&transcript(), 3, |_| {
                confirmations += 1;
                true
            })
            .await
            .unwrap();

        assert!(selection.is_degenerate());
        assert_eq!(selector.generator().calls(), 3);
        assert_eq!(confirmations, 2);
    }

    #[tokio::test]
    async fn test_retry_stops_on_hard_failure() {
        let selector = HighlightSelector::new(ScriptedGenerator::answering(&[
            r#"{"start": 9, "end": 9}"#,
            r#"{"start": -1, "end": 9}"#,
        ]));

        let result = selector.select_with_retry(&transcript(), 5, |_| true).await;
        assert!(matches!(result, Err(SelectionError::NegativeTime { .. })));
        assert_eq!(selector.generator().calls(), 2);
    }
}
