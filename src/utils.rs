use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{CocoError, Result};
use crate::types::ImageAnnotation;

/// Read and parse a single LabelMe JSON file.
/// The file is parsed from a buffered stream instead of being loaded into
/// memory first, since embedded image data can make it large.
pub fn read_and_parse_json(path: &Path) -> Result<ImageAnnotation> {
    let file = fs::File::open(path).map_err(|e| CocoError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| CocoError::json(path, e))
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .progress_chars("#>-"),
    );
    pb
}

/// Create a directory (and its parents) if it does not exist yet
pub fn ensure_directory(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        log::debug!("Creating directory {}", path.display());
        fs::create_dir_all(path).map_err(|e| CocoError::io(path, e))?;
    }
    Ok(path.to_path_buf())
}
