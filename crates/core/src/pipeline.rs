use std::path::{Path, PathBuf};

use tokio::{fs, process::Command};
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::{
    cache::get_model_dir,
    error::{Result, ShortsmithError},
    types::{Segment, Transcript},
};

pub const MODEL_NAME: &str = "ggml-medium-q5_0.bin";

/// Returns the path when `input` names an existing local file
pub fn local_source(input: &str) -> Option<PathBuf> {
    let path = PathBuf::from(input);
    path.is_file().then_some(path)
}

pub async fn ensure_model(cache_dir: &Path) -> Result<PathBuf> {
    let download_url = format!(
        "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
        MODEL_NAME
    );
    let model_dir = get_model_dir(cache_dir);

    if !model_dir.exists() {
        fs::create_dir_all(&model_dir).await?;
    }

    let model_path = model_dir.join(MODEL_NAME);
    if !model_path.exists() {
        info!(url = %download_url, "downloading whisper model");
        let output = Command::new("curl")
            .arg("-fL")
            .arg(&download_url)
            .arg("-o")
            .arg(&model_path)
            .output()
            .await?;

        if !output.status.success() {
            // partial download
            let _ = fs::remove_file(&model_path).await;
            return Err(ShortsmithError::ModelDownloadFailed {
                url: download_url,
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
    }

    Ok(model_path)
}

/// Download a video from URL using yt-dlp
pub async fn download_video(url: &str, cache_dir: &Path) -> Result<PathBuf> {
    let output_template = cache_dir.join("video.%(ext)s");
    let output = Command::new("yt-dlp")
        .arg(url)
        .arg("--print")
        .arg("after_move:filepath")
        .arg("--extractor-args")
        .arg("youtube:player_client=android,web")
        .arg("-f")
        .arg("best")
        .arg("-o")
        .arg(&output_template)
        .output()
        .await?;

    if !output.status.success() {
        return Err(ShortsmithError::DownloadFailed {
            url: url.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout_str = String::from_utf8_lossy(output.stdout.as_slice());
    let filepath = stdout_str.trim();
    if filepath.is_empty() {
        return Err(ShortsmithError::DownloadFailed {
            url: url.to_string(),
            reason: "yt-dlp did not report an output file".to_string(),
        });
    }

    Ok(PathBuf::from(filepath))
}

/// Extract audio from video using ffmpeg, as 16 kHz mono PCM for whisper
pub async fn extract_audio(video_path: &Path, audio_path: &Path) -> Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(video_path)
        .arg("-vn")
        .arg("-acodec")
        .arg("pcm_s16le")
        .arg("-ar")
        .arg("16000")
        .arg("-ac")
        .arg("1")
        .arg(audio_path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(ShortsmithError::AudioExtractionFailed {
            video_path: video_path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(())
}

/// Transcribe audio using whisper-rs with passed model
pub async fn transcribe_audio(
    audio_path: &Path,
    output_path: &Path,
    model_path: &Path,
) -> Result<Transcript> {
    let failed = |reason: String| ShortsmithError::TranscriptFailed {
        audio_path: audio_path.to_path_buf(),
        reason,
    };

    let mut reader = hound::WavReader::open(audio_path).map_err(|e| failed(e.to_string()))?;
    let samples = reader
        .samples::<i16>()
        .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| failed(e.to_string()))?;
    debug!(samples = samples.len(), "audio loaded");

    let ctx_params = WhisperContextParameters {
        use_gpu: true,
        flash_attn: true,
        ..Default::default()
    };
    let model_path_str = model_path
        .to_str()
        .ok_or_else(|| failed(format!("model path is not UTF-8: {}", model_path.display())))?;
    let ctx = WhisperContext::new_with_params(model_path_str, ctx_params)
        .map_err(|e| failed(format!("failed to load model: {e}")))?;

    let params = FullParams::new(SamplingStrategy::Greedy { best_of: 5 });

    let mut state = ctx
        .create_state()
        .map_err(|e| failed(format!("failed to create state: {e}")))?;
    state
        .full(params, &samples)
        .map_err(|e| failed(format!("failed to run model: {e}")))?;

    let mut text = String::new();
    let mut segments: Vec<Segment> = Vec::new();

    for segment in state.as_iter() {
        let seg_text = match segment.to_str() {
            Ok(s) => s,
            Err(_) => continue,
        };
        // whisper timestamps are in centiseconds
        let (start, end) = (
            segment.start_timestamp() as f64 / 100.0,
            segment.end_timestamp() as f64 / 100.0,
        );
        if end <= start {
            debug!(start, end, "skipping empty whisper segment");
            text.push_str(seg_text);
            continue;
        }
        segments.push(Segment {
            start,
            end,
            text: seg_text.to_string(),
        });

        text.push_str(seg_text);
    }

    let language_index = state.full_lang_id_from_state();
    let language = whisper_rs::get_lang_str(language_index);

    let transcript = Transcript {
        language: language.unwrap_or("Unknown").to_string(),
        segments,
        text,
    };

    save_transcript(&transcript, output_path).await?;

    Ok(transcript)
}

/// Load a transcript from a cached file
pub async fn load_transcript(path: &Path) -> Result<Transcript> {
    let json_content = fs::read_to_string(path).await?;
    let transcript: Transcript = serde_json::from_str(&json_content)?;
    Ok(transcript)
}

pub async fn save_transcript(transcript: &Transcript, path: &Path) -> Result<()> {
    let pretty_json = serde_json::to_string_pretty(transcript)?;
    fs::write(path, &pretty_json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_source_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("talk.mp4");
        std::fs::write(&video, b"").unwrap();

        assert_eq!(local_source(video.to_str().unwrap()), Some(video));
        assert_eq!(local_source("https://www.youtube.com/watch?v=abc"), None);
        assert_eq!(local_source(dir.path().to_str().unwrap()), None);
    }

    #[tokio::test]
    async fn test_transcript_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        let transcript = Transcript::from_segments(
            vec![Segment::new("院長好", 0.0, 4.82), Segment::new("所以", 5.04, 8.34)],
            "zh",
        );

        save_transcript(&transcript, &path).await.unwrap();
        assert_eq!(load_transcript(&path).await.unwrap(), transcript);
    }

    #[tokio::test]
    async fn test_load_transcript_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            load_transcript(&path).await,
            Err(ShortsmithError::JsonError(_))
        ));
    }
}
