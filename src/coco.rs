//! COCO record types
//!
//! Serde representations of the three record kinds of a COCO annotation
//! document and the raw document layout they are read from and written to.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// COCO category information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default = "default_supercategory")]
    pub supercategory: String,
}

fn default_supercategory() -> String {
    "none".to_string()
}

/// COCO image information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: u64,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    /// Fields such as `license` or `coco_url`, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Image {
    pub fn new(id: u64, file_name: String, width: u32, height: u32) -> Self {
        Self {
            id,
            file_name,
            width,
            height,
            extra: Map::new(),
        }
    }
}

/// Run-length encoded mask. Never produced or repaired, only carried along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RleMask {
    pub size: [u32; 2],
    pub counts: Value,
}

/// Segmentation of one annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segmentation {
    /// Polygons, each a flat `[x0, y0, x1, y1, ...]` list.
    Polygons(Vec<Vec<f64>>),
    Rle(RleMask),
}

impl Segmentation {
    pub fn polygons(&self) -> Option<&[Vec<f64>]> {
        match self {
            Segmentation::Polygons(polygons) => Some(polygons),
            Segmentation::Rle(_) => None,
        }
    }
}

/// COCO annotation information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u64,
    pub segmentation: Segmentation,
    pub area: f64,
    pub bbox: [f64; 4], // [x, y, width, height]
    #[serde(default)]
    pub iscrowd: u8,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Annotation {
    pub fn new(
        id: u64,
        image_id: u64,
        category_id: u64,
        segmentation: Segmentation,
        bbox: [f64; 4],
        area: f64,
        iscrowd: u8,
    ) -> Self {
        Self {
            id,
            image_id,
            category_id,
            segmentation,
            area,
            bbox,
            iscrowd,
            extra: Map::new(),
        }
    }
}

/// Document layout as stored on disk. `info` and `licenses` are kept verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub licenses: Option<Value>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// Borrowed view used to serialize a dataset without cloning it.
#[derive(Serialize)]
pub(crate) struct CocoFileRef<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub licenses: Option<&'a Value>,
    pub images: &'a [Image],
    pub annotations: &'a [Annotation],
    pub categories: &'a [Category],
}
