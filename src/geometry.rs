//! Polygon geometry: bounding box and area derivation, and repair of polygons
//! with too few vertices.

use log::{info, warn};

use crate::coco::Segmentation;
use crate::dataset::Dataset;
use crate::error::{CocoError, Result};

/// Minimum number of vertices a polygon must have.
pub const MIN_POLYGON_POINTS: usize = 5;

/// Number of vertices used to approximate a circle shape.
pub const CIRCLE_POINTS: usize = 12;

const GEOMETRY_TOLERANCE: f64 = 1e-6;

fn check_polygon(polygon: &[f64]) -> Result<()> {
    if polygon.is_empty() {
        return Err(CocoError::EmptyPolygon {
            annotation_id: None,
        });
    }
    if polygon.len() % 2 != 0 {
        return Err(CocoError::MalformedPolygon {
            len: polygon.len(),
            annotation_id: None,
        });
    }
    Ok(())
}

/// Axis-aligned bounding box `[min_x, min_y, width, height]` of one polygon.
pub fn polygon_bbox(polygon: &[f64]) -> Result<[f64; 4]> {
    extent([polygon])
}

/// Bounding box over every vertex of every polygon.
pub fn segmentation_bbox(polygons: &[Vec<f64>]) -> Result<[f64; 4]> {
    extent(polygons.iter().map(Vec::as_slice))
}

fn extent<'a>(polygons: impl IntoIterator<Item = &'a [f64]>) -> Result<[f64; 4]> {
    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;
    let mut any = false;

    for polygon in polygons {
        check_polygon(polygon)?;
        any = true;
        for point in polygon.chunks_exact(2) {
            min_x = min_x.min(point[0]);
            min_y = min_y.min(point[1]);
            max_x = max_x.max(point[0]);
            max_y = max_y.max(point[1]);
        }
    }

    if !any {
        return Err(CocoError::EmptyPolygon {
            annotation_id: None,
        });
    }
    Ok([min_x, min_y, max_x - min_x, max_y - min_y])
}

/// Area of a bounding box.
pub fn bbox_area(bbox: &[f64; 4]) -> f64 {
    bbox[2] * bbox[3]
}

/// Derive `(bbox, area)` from a polygon segmentation.
pub fn derive_geometry(polygons: &[Vec<f64>]) -> Result<([f64; 4], f64)> {
    let bbox = segmentation_bbox(polygons)?;
    Ok((bbox, bbox_area(&bbox)))
}

/// Whether a stored bbox/area pair agrees with the one derived from `polygons`.
pub fn geometry_matches(polygons: &[Vec<f64>], bbox: &[f64; 4], area: f64) -> bool {
    match derive_geometry(polygons) {
        Ok((derived, derived_area)) => {
            derived
                .iter()
                .zip(bbox.iter())
                .all(|(a, b)| (a - b).abs() <= GEOMETRY_TOLERANCE)
                && (derived_area - area).abs() <= GEOMETRY_TOLERANCE
        }
        Err(_) => false,
    }
}

/// Pad a polygon with copies of its last vertex until it has
/// [`MIN_POLYGON_POINTS`] vertices. Returns the vertex count before padding
/// when a repair happened.
///
/// Repeating an existing vertex leaves the bounding box and area unchanged.
pub fn pad_polygon(polygon: &mut Vec<f64>) -> Result<Option<usize>> {
    check_polygon(polygon)?;

    let points = polygon.len() / 2;
    if points >= MIN_POLYGON_POINTS {
        return Ok(None);
    }

    let (x, y) = (polygon[polygon.len() - 2], polygon[polygon.len() - 1]);
    while polygon.len() / 2 < MIN_POLYGON_POINTS {
        polygon.push(x);
        polygon.push(y);
    }
    Ok(Some(points))
}

/// What a repair pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepairReport {
    pub annotations_repaired: usize,
    pub polygons_repaired: usize,
}

impl RepairReport {
    pub fn print_summary(&self) {
        info!("=== Polygon Repair Summary ===");
        info!("Annotations repaired: {}", self.annotations_repaired);
        info!("Polygons padded: {}", self.polygons_repaired);
    }
}

/// Pad every short polygon of every polygon annotation in place.
///
/// Fails without touching the dataset if any polygon is empty or malformed.
pub fn repair_polygons(dataset: &mut Dataset) -> Result<RepairReport> {
    for annotation in dataset.annotations() {
        if let Some(polygons) = annotation.segmentation.polygons() {
            for polygon in polygons {
                check_polygon(polygon).map_err(|e| e.for_annotation(annotation.id))?;
            }
        }
    }

    let mut report = RepairReport::default();
    for annotation in dataset.annotations_mut() {
        let polygons = match &mut annotation.segmentation {
            Segmentation::Polygons(polygons) => polygons,
            Segmentation::Rle(_) => continue,
        };

        let mut repaired = false;
        for polygon in polygons.iter_mut() {
            let padded = pad_polygon(polygon).map_err(|e| e.for_annotation(annotation.id))?;
            if let Some(points) = padded {
                warn!(
                    "Repairing polygon in annotation ID {} with {} points.",
                    annotation.id, points
                );
                report.polygons_repaired += 1;
                repaired = true;
            }
        }
        if repaired {
            report.annotations_repaired += 1;
        }
    }

    Ok(report)
}

/// Flatten `(x, y)` points into a COCO polygon.
pub fn flatten_points(points: &[(f64, f64)]) -> Vec<f64> {
    points.iter().flat_map(|&(x, y)| [x, y]).collect()
}

/// Convert a rectangle given by two opposite corners to polygon points
pub fn rectangle_to_polygon(x1: f64, y1: f64, x2: f64, y2: f64) -> Vec<f64> {
    vec![x1, y1, x2, y1, x2, y2, x1, y2]
}

/// Convert a circle to polygon points
pub fn circle_to_polygon(cx: f64, cy: f64, radius: f64, num_points: usize) -> Vec<f64> {
    let mut points = Vec::with_capacity(num_points * 2);

    for i in 0..num_points {
        let angle = 2.0 * std::f64::consts::PI * i as f64 / num_points as f64;
        points.push(cx + radius * angle.cos());
        points.push(cy + radius * angle.sin());
    }

    points
}
