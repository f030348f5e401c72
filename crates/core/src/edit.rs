//! ffmpeg-backed media steps applied after a highlight is chosen.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use tokio::{fs, process::Command};
use tracing::{debug, info};

use crate::{
    captions::{CaptionStyle, render_ass},
    error::{Result, ShortsmithError},
    types::AlignedCaption,
};

async fn run_ffmpeg<I, S>(step: &'static str, path: &Path, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error"])
        .args(args)
        .output()
        .await?;

    if !output.status.success() {
        return Err(ShortsmithError::EditFailed {
            step,
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    debug!(step, path = %path.display(), "ffmpeg step done");
    Ok(())
}

async fn run_ffprobe(path: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("ffprobe")
        .args(["-v", "error"])
        .args(args)
        .arg(path)
        .output()
        .await?;

    if !output.status.success() {
        return Err(ShortsmithError::ProbeFailed {
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Container duration in seconds
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let out = run_ffprobe(
        path,
        &[
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ],
    )
    .await?;

    parse_duration(&out).ok_or_else(|| ShortsmithError::ProbeFailed {
        path: path.to_path_buf(),
        reason: format!("unexpected duration output: {out:?}"),
    })
}

/// Width and height of the first video stream
pub async fn probe_dimensions(path: &Path) -> Result<(u32, u32)> {
    let out = run_ffprobe(
        path,
        &[
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ],
    )
    .await?;

    parse_dimensions(&out).ok_or_else(|| ShortsmithError::ProbeFailed {
        path: path.to_path_buf(),
        reason: format!("unexpected dimensions output: {out:?}"),
    })
}

fn parse_duration(out: &str) -> Option<f64> {
    let secs = out.lines().next()?.trim().parse::<f64>().ok()?;
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

fn parse_dimensions(out: &str) -> Option<(u32, u32)> {
    let (w, h) = out.lines().next()?.trim().split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Cut `[start, end)` out of `video_path`, re-encoding for frame accuracy
pub async fn trim_video(video_path: &Path, start: f64, end: f64, output_path: &Path) -> Result<()> {
    info!(start, end, "trimming clip");
    let seek = format!("{start:.3}");
    let duration = format!("{:.3}", end - start);

    run_ffmpeg(
        "Trim",
        video_path,
        [
            OsStr::new("-ss"),
            OsStr::new(&seek),
            OsStr::new("-i"),
            video_path.as_os_str(),
            OsStr::new("-t"),
            OsStr::new(&duration),
            OsStr::new("-c:v"),
            OsStr::new("libx264"),
            OsStr::new("-c:a"),
            OsStr::new("aac"),
            output_path.as_os_str(),
        ],
    )
    .await
}

/// Centre 9:16 crop with even dimensions; frames already narrower keep their width
pub fn vertical_crop_filter() -> &'static str {
    "crop='trunc(min(iw,ih*9/16)/2)*2':'trunc(min(ih,iw*16/9)/2)*2',setsar=1"
}

pub async fn crop_to_vertical(clip_path: &Path, output_path: &Path) -> Result<()> {
    run_ffmpeg(
        "Vertical crop",
        clip_path,
        [
            OsStr::new("-i"),
            clip_path.as_os_str(),
            OsStr::new("-vf"),
            OsStr::new(vertical_crop_filter()),
            OsStr::new("-c:v"),
            OsStr::new("libx264"),
            OsStr::new("-c:a"),
            OsStr::new("copy"),
            output_path.as_os_str(),
        ],
    )
    .await
}

/// ffmpeg `ass` filter argument for a subtitle file.
///
/// The path is escaped twice, once for the filter option value and once for
/// the filtergraph, and left unquoted.
pub fn subtitle_filter(subtitle_path: &Path) -> String {
    let path = subtitle_path.to_string_lossy().replace('\\', "/");
    let value = escape_chars(&path, &['\\', '\'', ':']);
    format!("ass={}", escape_chars(&value, &['\\', '\'', '[', ']', ',', ';']))
}

fn escape_chars(text: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Burn `captions` into `video_path`.
///
/// With no captions the video is passed through untouched.
pub async fn compose_captions(
    video_path: &Path,
    captions: &[AlignedCaption],
    subtitle_path: &Path,
    output_path: &Path,
    style: &CaptionStyle,
) -> Result<PathBuf> {
    if captions.is_empty() {
        info!("no captions for this segment, keeping video as is");
        fs::copy(video_path, output_path).await?;
        return Ok(output_path.to_path_buf());
    }

    let (width, height) = probe_dimensions(video_path).await?;
    fs::write(subtitle_path, render_ass(captions, width, height, style)).await?;
    info!(count = captions.len(), "adding caption segments");

    let filter = subtitle_filter(subtitle_path);
    run_ffmpeg(
        "Caption",
        video_path,
        [
            OsStr::new("-i"),
            video_path.as_os_str(),
            OsStr::new("-vf"),
            OsStr::new(&filter),
            OsStr::new("-c:v"),
            OsStr::new("libx264"),
            OsStr::new("-preset"),
            OsStr::new("medium"),
            OsStr::new("-b:v"),
            OsStr::new("3000k"),
            OsStr::new("-c:a"),
            OsStr::new("copy"),
            output_path.as_os_str(),
        ],
    )
    .await?;

    Ok(output_path.to_path_buf())
}

/// Take the picture from `video_with_captions` and the sound from `video_with_audio`
pub async fn mux_audio_video(
    video_with_audio: &Path,
    video_with_captions: &Path,
    output_path: &Path,
) -> Result<()> {
    run_ffmpeg(
        "Mux",
        video_with_captions,
        [
            OsStr::new("-i"),
            video_with_captions.as_os_str(),
            OsStr::new("-i"),
            video_with_audio.as_os_str(),
            OsStr::new("-map"),
            OsStr::new("0:v:0"),
            OsStr::new("-map"),
            OsStr::new("1:a:0?"),
            OsStr::new("-c:v"),
            OsStr::new("copy"),
            OsStr::new("-c:a"),
            OsStr::new("aac"),
            OsStr::new("-shortest"),
            output_path.as_os_str(),
        ],
    )
    .await
}
