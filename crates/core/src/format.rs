use crate::types::{HighlightWindow, Transcript};

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Format transcript segments as `start - end: text` lines for the selector
pub fn format_transcript_for_selection(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .map(|seg| format!("{} - {}: {}", seg.start, seg.end, seg.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_window_readable(window: &HighlightWindow) -> String {
    format!(
        "[{}–{}] {:.1}s\n{}",
        format_timestamp(window.start),
        format_timestamp(window.end),
        window.duration(),
        window.content.trim()
    )
}

/// Truncate to at most `max_chars` characters, marking the cut with "..."
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
