//! Reading and writing documents and images.

use glob::{glob, Pattern};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::conversion::ImageStore;
use crate::dataset::Dataset;
use crate::error::{CocoError, Result};
use crate::types::SourceRecord;
use crate::utils::{create_progress_bar, ensure_directory, read_and_parse_json};

/// Load a whole COCO document.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let file = File::open(path).map_err(|e| CocoError::io(path, e))?;
    let dataset: Dataset =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| CocoError::json(path, e))?;
    info!(
        "Loaded {}: {} images, {} annotations, {} categories.",
        path.display(),
        dataset.images().len(),
        dataset.annotations().len(),
        dataset.categories().len()
    );
    Ok(dataset)
}

/// Mode given to a document that did not exist before.
#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}

/// Write a whole COCO document.
///
/// The document goes to a temporary file next to `path` first and replaces
/// `path` only once it is completely written. An existing document keeps its
/// permissions.
pub fn save_dataset(path: &Path, dataset: &Dataset) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file = NamedTempFile::new_in(dir).map_err(|e| CocoError::io(dir, e))?;

    {
        let mut writer = BufWriter::new(file.as_file());
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
        dataset
            .serialize(&mut serializer)
            .map_err(|e| CocoError::json(path, e))?;
        writer.flush().map_err(|e| CocoError::io(path, e))?;
    }

    let permissions = match fs::metadata(path) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => new_file_permissions(),
    };
    if let Some(permissions) = permissions {
        fs::set_permissions(file.path(), permissions)
            .map_err(|e| CocoError::io(file.path(), e))?;
    }

    file.persist(path).map_err(|e| CocoError::io(path, e.error))?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Read every LabelMe JSON file directly inside `dir`, ordered by file name.
pub fn read_labelme_dir(dir: &Path) -> Result<Vec<SourceRecord>> {
    let pattern = format!("{}/*.json", Pattern::escape(&dir.to_string_lossy()));
    let entries = glob(&pattern).map_err(|e| {
        CocoError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        )
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => warn!("Skipping unreadable entry: {}", e),
        }
    }
    paths.sort();

    let pb = create_progress_bar(paths.len() as u64, "Read");
    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        let annotation = read_and_parse_json(&path)?;
        let image_path = path
            .parent()
            .unwrap_or(dir)
            .join(&annotation.image_path);
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        records.push(SourceRecord {
            name,
            image_path,
            annotation,
        });
        pb.inc(1);
    }
    pb.finish_with_message("Read complete");

    Ok(records)
}

/// Image store backed by an output directory.
///
/// Images are copied from next to their LabelMe file; when the file is
/// missing, the base64 image data embedded in the LabelMe JSON is decoded
/// instead.
#[derive(Debug, Clone)]
pub struct FsImageStore {
    output_dir: PathBuf,
}

impl FsImageStore {
    pub fn new(output_dir: &Path) -> Result<Self> {
        Ok(Self {
            output_dir: ensure_directory(output_dir)?,
        })
    }
}

impl ImageStore for FsImageStore {
    fn store(&mut self, record: &SourceRecord, file_name: &str) -> Result<PathBuf> {
        let dest_path = self.output_dir.join(file_name);

        if record.image_path.exists() {
            fs::copy(&record.image_path, &dest_path)
                .map_err(|e| CocoError::io(&record.image_path, e))?;
            return Ok(dest_path);
        }

        match record.annotation.image_data.as_deref() {
            Some(image_data) if !image_data.is_empty() => {
                warn!(
                    "Image file not found, using embedded image data: {}",
                    record.image_path.display()
                );
                let image_bytes = base64::decode(image_data).map_err(|source| CocoError::Base64 {
                    path: record.image_path.clone(),
                    source,
                })?;
                let format = image::guess_format(&image_bytes).map_err(|source| CocoError::Image {
                    path: record.image_path.clone(),
                    source,
                })?;
                debug!("Embedded image data is {:?}", format);
                fs::write(&dest_path, image_bytes).map_err(|e| CocoError::io(&dest_path, e))?;
                Ok(dest_path)
            }
            _ => Err(CocoError::io(
                &record.image_path,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "image file not found and no image data available",
                ),
            )),
        }
    }

    fn dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        image::image_dimensions(path).map_err(|source| CocoError::Image {
            path: path.to_path_buf(),
            source,
        })
    }
}
