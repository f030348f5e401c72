//! Shortsmith Core Library
//!
//! Picks the most engaging minute of a transcribed video with a language
//! model, and re-times its subtitles onto the cut-down vertical clip.

pub mod cache;
pub mod captions;
pub mod edit;
pub mod error;
pub mod format;
pub mod generation;
pub mod highlight;
pub mod pipeline;
pub mod provider;
pub mod types;

// Re-export commonly used items at crate root
pub use cache::{
    RunDir, find_video_in_cache, get_audio_path, get_cache_dir, get_root_cache_dir,
    get_transcript_path,
};
pub use captions::{CaptionStyle, align_captions, render_ass};
pub use edit::{compose_captions, crop_to_vertical, mux_audio_video, probe_duration, trim_video};
pub use error::{GenerationError, Result, SelectionError, ShortsmithError};
pub use format::{format_timestamp, format_transcript_for_selection, format_window_readable};
pub use generation::{ChatCompletionsClient, TextGenerator};
pub use highlight::{HighlightSelector, SelectorOptions};
pub use pipeline::{
    download_video, ensure_model, extract_audio, load_transcript, local_source, transcribe_audio,
};
pub use provider::{ConfigOverrides, GenerationConfig, Provider};
pub use types::{AlignedCaption, HighlightWindow, Segment, Selection, Transcript};
