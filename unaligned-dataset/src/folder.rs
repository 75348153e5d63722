//! Image file discovery

use anyhow::{Context, Result};
use walkdir::WalkDir;

use std::path::{Path, PathBuf};

use crate::error::DatasetError;

static VALID_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "ppm", "bmp", "tif", "tiff", "webp"];

/// Lists the image files under `dir`, recursively, sorted by path and
/// capped at `max_count` entries.
pub fn list_images(dir: &Path, max_count: Option<usize>) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(DatasetError::MissingDirectory(dir.to_path_buf()).into());
    }
    if !dir.is_dir() {
        return Err(DatasetError::NotADirectory(dir.to_path_buf()).into());
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry =
            entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;

        if entry.file_type().is_file() && is_image(entry.path()) {
            images.push(entry.into_path());
        }
    }

    images.sort();
    if let Some(max) = max_count {
        images.truncate(max);
    }

    log::debug!("Found {} images in {}", images.len(), dir.display());
    Ok(images)
}

fn is_image(path: &Path) -> bool {
    // Skip system files like .DS_Store and macOS resource forks
    let hidden = path
        .file_name()
        .map_or(true, |name| name.to_string_lossy().starts_with('.'));
    if hidden {
        return false;
    }

    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| VALID_EXTENSIONS.contains(&ext.as_str()))
}
