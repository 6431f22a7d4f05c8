use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

// The Shape struct representing annotated shapes
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Shape {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default = "default_shape_type")]
    pub shape_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_shape_type() -> String {
    "polygon".to_string()
}

impl Shape {
    pub fn polygon(label: &str, points: Vec<(f64, f64)>) -> Self {
        Self {
            label: label.to_string(),
            points,
            group_id: None,
            shape_type: default_shape_type(),
            description: None,
        }
    }
}

// The ImageAnnotation struct representing the annotation information of an image
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnnotation {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub flags: Option<HashMap<String, bool>>,
    pub shapes: Vec<Shape>,
    pub image_path: String,
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub image_height: u32,
    #[serde(default)]
    pub image_width: u32,
}

/// One LabelMe document together with where it came from.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    /// External name used to order records, normally the JSON file name.
    pub name: String,
    /// Path of the source image the annotation refers to.
    pub image_path: PathBuf,
    pub annotation: ImageAnnotation,
}

// Struct to hold conversion statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConversionStats {
    pub images: usize,
    pub annotations: usize,
    pub categories: usize,
    pub polygons_repaired: usize,
}

impl ConversionStats {
    pub fn print_summary(&self) {
        log::info!("=== Conversion Summary ===");
        log::info!("Images converted: {}", self.images);
        log::info!("Annotations created: {}", self.annotations);
        log::info!("Categories: {}", self.categories);
        if self.polygons_repaired > 0 {
            log::warn!(
                "Polygons padded to the minimum vertex count: {}",
                self.polygons_repaired
            );
        }
    }
}
