//! In-memory COCO dataset with identifier allocation and invariant checks.
//!
//! Every mutation primitive keeps identifiers unique, references resolvable
//! and category names unique at the point of insertion. Polygon vertex counts
//! and bbox/area consistency are only checked by [`Dataset::validate`].

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::coco::{Annotation, Category, CocoFile, CocoFileRef, Image, Segmentation};
use crate::error::{CategoryKey, CocoError, Result};
use crate::geometry::{derive_geometry, geometry_matches, MIN_POLYGON_POINTS};

/// First identifier handed out for images and annotations.
///
/// Converted datasets number from zero, merged datasets from one. Category
/// identifiers always start at one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdOrigin {
    #[default]
    Zero,
    One,
}

impl IdOrigin {
    pub fn first(self) -> u64 {
        match self {
            IdOrigin::Zero => 0,
            IdOrigin::One => 1,
        }
    }
}

const FIRST_CATEGORY_ID: u64 = 1;

/// `iscrowd` is a 0/1 flag.
const MAX_ISCROWD: u8 = 1;

/// Largest used id plus one, or `None` when the id space is used up.
fn next_after<'a>(ids: impl Iterator<Item = &'a u64>, origin: u64) -> Option<u64> {
    match ids.max() {
        Some(max) => max.checked_add(1),
        None => Some(origin),
    }
}

/// Next free id after a record with `id` was inserted.
fn advance(next: Option<u64>, id: u64) -> Option<u64> {
    match (next, id.checked_add(1)) {
        (Some(next), Some(after)) => Some(next.max(after)),
        _ => None,
    }
}

fn allocate(next: &mut Option<u64>, kind: &'static str) -> Result<u64> {
    let id = next.ok_or(CocoError::IdOverflow { kind })?;
    *next = id.checked_add(1);
    Ok(id)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(from = "CocoFile")]
pub struct Dataset {
    info: Option<Value>,
    licenses: Option<Value>,
    images: Vec<Image>,
    annotations: Vec<Annotation>,
    categories: Vec<Category>,

    origin: IdOrigin,
    image_index: HashMap<u64, usize>,
    annotation_ids: HashSet<u64>,
    category_index: HashMap<u64, usize>,
    category_names: HashMap<String, u64>,
    next_image_id: Option<u64>,
    next_annotation_id: Option<u64>,
    next_category_id: Option<u64>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new(IdOrigin::default())
    }
}

impl From<CocoFile> for Dataset {
    /// Index a loaded document as-is. Violations are left for `validate`.
    fn from(file: CocoFile) -> Self {
        let mut dataset = Dataset {
            info: file.info,
            licenses: file.licenses,
            images: file.images,
            annotations: file.annotations,
            categories: file.categories,
            ..Dataset::new(IdOrigin::Zero)
        };

        for (i, image) in dataset.images.iter().enumerate() {
            dataset.image_index.entry(image.id).or_insert(i);
        }
        for (i, category) in dataset.categories.iter().enumerate() {
            dataset.category_index.entry(category.id).or_insert(i);
            dataset
                .category_names
                .entry(category.name.clone())
                .or_insert(category.id);
        }
        dataset.annotation_ids = dataset.annotations.iter().map(|a| a.id).collect();

        let origin = dataset.origin.first();
        dataset.next_image_id = next_after(dataset.image_index.keys(), origin);
        dataset.next_annotation_id = next_after(dataset.annotation_ids.iter(), origin);
        dataset.next_category_id = next_after(dataset.category_index.keys(), FIRST_CATEGORY_ID);
        dataset
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        CocoFileRef {
            info: self.info.as_ref(),
            licenses: self.licenses.as_ref(),
            images: &self.images,
            annotations: &self.annotations,
            categories: &self.categories,
        }
        .serialize(serializer)
    }
}

impl Dataset {
    pub fn new(origin: IdOrigin) -> Self {
        Self {
            info: None,
            licenses: None,
            images: Vec::new(),
            annotations: Vec::new(),
            categories: Vec::new(),
            origin,
            image_index: HashMap::new(),
            annotation_ids: HashSet::new(),
            category_index: HashMap::new(),
            category_names: HashMap::new(),
            next_image_id: Some(origin.first()),
            next_annotation_id: Some(origin.first()),
            next_category_id: Some(FIRST_CATEGORY_ID),
        }
    }

    pub fn id_origin(&self) -> IdOrigin {
        self.origin
    }

    pub fn info(&self) -> Option<&Value> {
        self.info.as_ref()
    }

    pub fn licenses(&self) -> Option<&Value> {
        self.licenses.as_ref()
    }

    pub fn set_info(&mut self, info: Option<Value>) {
        self.info = info;
    }

    pub fn set_licenses(&mut self, licenses: Option<Value>) {
        self.licenses = licenses;
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn category(&self, id: u64) -> Option<&Category> {
        self.category_index.get(&id).map(|&i| &self.categories[i])
    }

    pub fn category_by_name(&self, name: &str) -> Option<&Category> {
        self.category_names
            .get(name)
            .and_then(|&id| self.category(id))
    }

    pub fn contains_image(&self, id: u64) -> bool {
        self.image_index.contains_key(&id)
    }

    /// Register a new category under the next free id.
    pub fn add_category(&mut self, name: &str, supercategory: &str) -> Result<u64> {
        let id = self.next_category_id.ok_or(CocoError::IdOverflow { kind: "category" })?;
        self.insert_category(Category {
            id,
            name: name.to_string(),
            supercategory: supercategory.to_string(),
        })?;
        Ok(id)
    }

    /// Insert a category keeping its id.
    pub fn insert_category(&mut self, category: Category) -> Result<()> {
        if self.category_names.contains_key(&category.name) {
            return Err(CocoError::DuplicateCategory(category.name));
        }
        if self.category_index.contains_key(&category.id) {
            return Err(CocoError::DuplicateId {
                kind: "category",
                id: category.id,
            });
        }

        self.next_category_id = advance(self.next_category_id, category.id);
        self.category_index
            .insert(category.id, self.categories.len());
        self.category_names
            .insert(category.name.clone(), category.id);
        self.categories.push(category);
        Ok(())
    }

    pub fn add_image(&mut self, file_name: &str, width: u32, height: u32) -> Result<u64> {
        self.push_image(Image::new(0, file_name.to_string(), width, height))
    }

    /// Append an image under the next free id, overwriting the id it carries.
    pub fn push_image(&mut self, mut image: Image) -> Result<u64> {
        let id = allocate(&mut self.next_image_id, "image")?;
        image.id = id;
        self.image_index.insert(id, self.images.len());
        self.images.push(image);
        Ok(id)
    }

    /// Insert an image keeping its id.
    pub fn insert_image(&mut self, image: Image) -> Result<()> {
        if self.image_index.contains_key(&image.id) {
            return Err(CocoError::DuplicateId {
                kind: "image",
                id: image.id,
            });
        }
        self.next_image_id = advance(self.next_image_id, image.id);
        self.image_index.insert(image.id, self.images.len());
        self.images.push(image);
        Ok(())
    }

    /// Create a polygon annotation, deriving its bbox and area.
    pub fn add_annotation(
        &mut self,
        image_id: u64,
        category_id: u64,
        segmentation: Vec<Vec<f64>>,
        iscrowd: u8,
    ) -> Result<u64> {
        if iscrowd > MAX_ISCROWD {
            return Err(CocoError::InvalidCrowdFlag {
                iscrowd,
                annotation_id: None,
            });
        }
        let (bbox, area) = derive_geometry(&segmentation)?;
        self.push_annotation(Annotation::new(
            0,
            image_id,
            category_id,
            Segmentation::Polygons(segmentation),
            bbox,
            area,
            iscrowd,
        ))
    }

    /// Append an annotation under the next free id, keeping its geometry.
    pub fn push_annotation(&mut self, mut annotation: Annotation) -> Result<u64> {
        self.check_annotation(&annotation)?;
        let id = allocate(&mut self.next_annotation_id, "annotation")?;
        annotation.id = id;
        self.annotation_ids.insert(id);
        self.annotations.push(annotation);
        Ok(id)
    }

    /// Insert an annotation keeping its id.
    pub fn insert_annotation(&mut self, annotation: Annotation) -> Result<()> {
        self.check_annotation(&annotation)?;
        if !self.annotation_ids.insert(annotation.id) {
            return Err(CocoError::DuplicateId {
                kind: "annotation",
                id: annotation.id,
            });
        }
        self.next_annotation_id = advance(self.next_annotation_id, annotation.id);
        self.annotations.push(annotation);
        Ok(())
    }

    fn check_annotation(&self, annotation: &Annotation) -> Result<()> {
        if annotation.iscrowd > MAX_ISCROWD {
            return Err(CocoError::InvalidCrowdFlag {
                iscrowd: annotation.iscrowd,
                annotation_id: Some(annotation.id),
            });
        }
        if !self.image_index.contains_key(&annotation.image_id) {
            return Err(CocoError::UnknownImage(annotation.image_id));
        }
        if !self.category_index.contains_key(&annotation.category_id) {
            return Err(CocoError::UnknownCategory(CategoryKey::Id(
                annotation.category_id,
            )));
        }
        Ok(())
    }

    pub fn annotations_for_image(&self, image_id: u64) -> Vec<&Annotation> {
        self.annotations
            .iter()
            .filter(|annotation| annotation.image_id == image_id)
            .collect()
    }

    /// Mutable access for in-place polygon repair. Geometry edits must not
    /// change identifiers or references.
    pub(crate) fn annotations_mut(&mut self) -> &mut [Annotation] {
        &mut self.annotations
    }

    /// Check every dataset invariant and list what is violated.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        let mut seen = HashSet::new();
        for image in &self.images {
            if !seen.insert(image.id) {
                violations.push(Violation::DuplicateImageId(image.id));
            }
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            if !seen.insert(category.id) {
                violations.push(Violation::DuplicateCategoryId(category.id));
            }
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            if !seen.insert(category.name.as_str()) {
                violations.push(Violation::DuplicateCategoryName(category.name.clone()));
            }
        }

        let mut seen = HashSet::new();
        for annotation in &self.annotations {
            if !seen.insert(annotation.id) {
                violations.push(Violation::DuplicateAnnotationId(annotation.id));
            }
            if !self.image_index.contains_key(&annotation.image_id) {
                violations.push(Violation::DanglingImage {
                    annotation_id: annotation.id,
                    image_id: annotation.image_id,
                });
            }
            if !self.category_index.contains_key(&annotation.category_id) {
                violations.push(Violation::DanglingCategory {
                    annotation_id: annotation.id,
                    category_id: annotation.category_id,
                });
            }
            if annotation.iscrowd > MAX_ISCROWD {
                violations.push(Violation::InvalidCrowdFlag {
                    annotation_id: annotation.id,
                    iscrowd: annotation.iscrowd,
                });
            }

            // RLE masks are carried opaquely and have no polygon to check.
            if let Some(polygons) = annotation.segmentation.polygons() {
                for polygon in polygons {
                    let points = polygon.len() / 2;
                    if points < MIN_POLYGON_POINTS {
                        violations.push(Violation::ShortPolygon {
                            annotation_id: annotation.id,
                            points,
                        });
                    }
                }
                if !geometry_matches(polygons, &annotation.bbox, annotation.area) {
                    violations.push(Violation::InconsistentGeometry {
                        annotation_id: annotation.id,
                    });
                }
            }
        }

        violations
    }
}

/// A broken dataset invariant, as reported by [`Dataset::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    DuplicateImageId(u64),
    DuplicateAnnotationId(u64),
    DuplicateCategoryId(u64),
    DuplicateCategoryName(String),
    DanglingImage { annotation_id: u64, image_id: u64 },
    DanglingCategory { annotation_id: u64, category_id: u64 },
    ShortPolygon { annotation_id: u64, points: usize },
    InconsistentGeometry { annotation_id: u64 },
    InvalidCrowdFlag { annotation_id: u64, iscrowd: u8 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DuplicateImageId(id) => write!(f, "image id {} is used more than once", id),
            Violation::DuplicateAnnotationId(id) => {
                write!(f, "annotation id {} is used more than once", id)
            }
            Violation::DuplicateCategoryId(id) => {
                write!(f, "category id {} is used more than once", id)
            }
            Violation::DuplicateCategoryName(name) => {
                write!(f, "category name {:?} is used more than once", name)
            }
            Violation::DanglingImage {
                annotation_id,
                image_id,
            } => write!(
                f,
                "annotation {} references missing image {}",
                annotation_id, image_id
            ),
            Violation::DanglingCategory {
                annotation_id,
                category_id,
            } => write!(
                f,
                "annotation {} references missing category {}",
                annotation_id, category_id
            ),
            Violation::ShortPolygon {
                annotation_id,
                points,
            } => write!(
                f,
                "annotation {} has a polygon with {} points (minimum {})",
                annotation_id, points, MIN_POLYGON_POINTS
            ),
            Violation::InconsistentGeometry { annotation_id } => write!(
                f,
                "annotation {} has a bbox or area that does not match its segmentation",
                annotation_id
            ),
            Violation::InvalidCrowdFlag {
                annotation_id,
                iscrowd,
            } => write!(
                f,
                "annotation {} has iscrowd {} (expected 0 or 1)",
                annotation_id, iscrowd
            ),
        }
    }
}
