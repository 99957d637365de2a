use std::fs::read_dir;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use opencv::prelude::*;
use opencv::{highgui, imgcodecs};

use crate::error::{Result, TrainError};
use crate::utils::is_supported_image;

const PREVIEW_WINDOW: &str = "image";

/// Image files directly inside `dir`, sorted by path.
pub fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = read_dir(dir).map_err(|e| TrainError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| TrainError::io(dir, e))?.path();
        if !path.is_file() {
            continue;
        }
        match path.extension() {
            Some(ext) if is_supported_image(&ext.to_string_lossy()) => files.push(path),
            _ => debug!("skipping {}: not an image file", path.display()),
        }
    }
    files.sort();
    Ok(files)
}

/// Decode one image as 3-channel BGR, `None` when the file cannot be decoded.
pub fn read_image(path: &Path) -> Result<Option<Mat>> {
    let img = imgcodecs::imread(&path.to_string_lossy(), imgcodecs::IMREAD_COLOR)?;
    if img.empty() {
        return Ok(None);
    }
    Ok(Some(img))
}

/// Load every decodable image in `dir` with its path, keeping listing order.
///
/// Unreadable files are logged and skipped. With `preview` each image is shown
/// briefly as it loads.
pub fn load_images_with_paths(dir: &Path, preview: bool) -> Result<Vec<(PathBuf, Mat)>> {
    let mut images = Vec::new();
    for path in list_image_files(dir)? {
        let Some(img) = read_image(&path)? else {
            warn!("{} is invalid!", path.display());
            continue;
        };

        if preview {
            highgui::imshow(PREVIEW_WINDOW, &img)?;
            highgui::wait_key(1)?;
        }
        images.push((path, img));
    }
    debug!("loaded {} images from {}", images.len(), dir.display());
    Ok(images)
}

pub fn load_images(dir: &Path, preview: bool) -> Result<Vec<Mat>> {
    Ok(load_images_with_paths(dir, preview)?
        .into_iter()
        .map(|(_, img)| img)
        .collect())
}
