use std::{
    hash::{DefaultHasher, Hash, Hasher},
    path::{Path, PathBuf},
};

use uuid::Uuid;

/// Get the cache directory for a given URL or local video path
pub fn get_cache_dir(source: &str) -> PathBuf {
    get_cache_dir_in(&get_root_cache_dir(), source)
}

/// Local files are keyed by canonical path, size and modification time, so a
/// file replaced in place gets a fresh cache entry.
pub fn get_cache_dir_in(root: &Path, source: &str) -> PathBuf {
    let mut hasher = DefaultHasher::new();

    match std::fs::canonicalize(source) {
        Ok(path) => {
            path.hash(&mut hasher);
            if let Ok(meta) = std::fs::metadata(&path) {
                meta.len().hash(&mut hasher);
                meta.modified().ok().hash(&mut hasher);
            }
        }
        Err(_) => source.hash(&mut hasher),
    }

    root.join(hasher.finish().to_string())
}

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("shortsmith")
}

pub fn get_model_dir(cache_dir: &Path) -> PathBuf {
    cache_dir.join("models")
}

/// Find a downloaded video file in the cache directory
pub fn find_video_in_cache(cache_dir: &Path) -> Option<PathBuf> {
    let Ok(entries) = std::fs::read_dir(cache_dir) else {
        return None;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if let Some(ext) = path.extension() {
            let ext = ext.to_string_lossy().to_lowercase();
            if matches!(ext.as_str(), "mp4" | "webm" | "mkv" | "mov" | "avi") {
                return Some(path);
            }
        }
    }
    None
}

/// Get the path for a cached audio file
pub fn get_audio_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("audio.wav")
}

/// Get the path for a cached transcript file
pub fn get_transcript_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("transcript.json")
}

/// Intermediate files of one run; nothing here outlives the run unless kept.
#[derive(Debug, Clone)]
pub struct RunDir {
    root: PathBuf,
}

impl RunDir {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            root: cache_dir.join("runs").join(Uuid::new_v4().to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn clip_path(&self) -> PathBuf {
        self.root.join("clip.mp4")
    }

    pub fn vertical_path(&self) -> PathBuf {
        self.root.join("vertical.mp4")
    }

    pub fn captioned_path(&self) -> PathBuf {
        self.root.join("captioned.mp4")
    }

    pub fn captions_path(&self) -> PathBuf {
        self.root.join("captions.ass")
    }
}
