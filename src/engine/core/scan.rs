use crate::error::{ConvertError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions picked up when a directory is given as input
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "mov", "avi", "flv", "m4v", "wmv", "mpeg", "mpg", "ts", "m2ts",
];

/// Check if a path has a video file extension
pub fn is_video_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        if let Some(ext_str) = ext.to_str() {
            return VIDEO_EXTENSIONS.contains(&ext_str.to_lowercase().as_str());
        }
    }
    false
}

/// Scan a directory recursively for video files, sorted by path
pub fn scan(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_video_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Expand command-line inputs into the conversion queue.
///
/// Files are taken as given whatever their extension; directories are
/// walked for video files. A missing path fails the whole run.
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut queue = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let found = scan(input);
            if found.is_empty() {
                tracing::warn!(dir = %input.display(), "no video files found");
            }
            queue.extend(found);
        } else if input.is_file() {
            queue.push(input.clone());
        } else {
            return Err(ConvertError::InputNotFound {
                path: input.clone(),
            });
        }
    }
    Ok(queue)
}
