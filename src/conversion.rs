//! LabelMe to COCO conversion.
//!
//! Records are processed in order of their external name. Image and
//! annotation ids are assigned from zero in that order; category ids come from
//! the position of each label in the vocabulary, starting at one.

use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::dataset::{Dataset, IdOrigin};
use crate::error::{CategoryKey, CocoError, Result};
use crate::geometry::{
    circle_to_polygon, flatten_points, pad_polygon, rectangle_to_polygon, CIRCLE_POINTS,
};
use crate::types::{ConversionStats, Shape, SourceRecord};

/// The fixed set of labels a conversion accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    labels: Vec<String>,
    supercategory: String,
}

impl Vocabulary {
    pub fn new<I, S>(labels: I, supercategory: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            supercategory: supercategory.to_string(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn supercategory(&self) -> &str {
        &self.supercategory
    }

    /// 1-based category id of `label`.
    pub fn category_id(&self, label: &str) -> Option<u64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| i as u64 + 1)
    }
}

/// Where converted images end up.
pub trait ImageStore {
    /// Copy the image of `record` into the store as `file_name` and return
    /// the stored path.
    fn store(&mut self, record: &SourceRecord, file_name: &str) -> Result<PathBuf>;

    /// `(width, height)` of a stored image.
    fn dimensions(&self, path: &Path) -> Result<(u32, u32)>;
}

/// Convert a shape into one COCO polygon.
pub fn shape_to_polygon(shape: &Shape) -> Result<Vec<f64>> {
    if shape.points.is_empty() {
        return Err(CocoError::EmptyPolygon {
            annotation_id: None,
        });
    }

    let polygon = match shape.shape_type.as_str() {
        "rectangle" if shape.points.len() >= 2 => {
            let (x1, y1) = shape.points[0];
            let (x2, y2) = shape.points[1];
            rectangle_to_polygon(x1, y1, x2, y2)
        }
        "circle" if shape.points.len() >= 2 => {
            let (cx, cy) = shape.points[0];
            let (px, py) = shape.points[1];
            let radius = ((cx - px).powi(2) + (cy - py).powi(2)).sqrt();
            circle_to_polygon(cx, cy, radius, CIRCLE_POINTS)
        }
        _ => flatten_points(&shape.points),
    };
    Ok(polygon)
}

fn output_file_name(position: usize, source: &Path) -> String {
    let extension = source
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_else(|| "png".to_string());
    format!("{:04}.{}", position + 1, extension)
}

/// Build a dataset from LabelMe records.
///
/// Every label and shape is checked before the first image is stored, so a
/// failing conversion leaves the image store untouched.
pub fn convert_records<S: ImageStore>(
    mut records: Vec<SourceRecord>,
    vocabulary: &Vocabulary,
    store: &mut S,
) -> Result<(Dataset, ConversionStats)> {
    records.sort_by(|a, b| a.name.cmp(&b.name));

    let mut stats = ConversionStats::default();
    let mut prepared = Vec::with_capacity(records.len());
    for record in &records {
        let mut shapes = Vec::with_capacity(record.annotation.shapes.len());
        for shape in &record.annotation.shapes {
            let category_id = vocabulary.category_id(&shape.label).ok_or_else(|| {
                CocoError::UnknownCategory(CategoryKey::Name(shape.label.clone()))
            })?;

            let mut polygon = shape_to_polygon(shape)?;
            if let Some(points) = pad_polygon(&mut polygon)? {
                warn!(
                    "Padding {:?} shape in {} from {} points.",
                    shape.label, record.name, points
                );
                stats.polygons_repaired += 1;
            }
            shapes.push((category_id, polygon));
        }
        prepared.push(shapes);
    }

    let mut dataset = Dataset::new(IdOrigin::Zero);
    for label in vocabulary.labels() {
        dataset.add_category(label, vocabulary.supercategory())?;
    }

    for (position, (record, shapes)) in records.iter().zip(prepared).enumerate() {
        let file_name = output_file_name(position, &record.image_path);
        let stored = store.store(record, &file_name)?;
        let (width, height) = store.dimensions(&stored)?;
        let image_id = dataset.add_image(&file_name, width, height)?;
        debug!("{} -> image {} ({})", record.name, image_id, file_name);

        for (category_id, polygon) in shapes {
            dataset.add_annotation(image_id, category_id, vec![polygon], 0)?;
            stats.annotations += 1;
        }
        stats.images += 1;
    }
    stats.categories = dataset.categories().len();

    Ok((dataset, stats))
}
