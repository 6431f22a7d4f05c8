//! Per-image instance statistics.

use std::collections::HashMap;

use crate::dataset::Dataset;
use crate::error::{CocoError, Result};

/// Number of annotations on one image.
pub fn instance_count(dataset: &Dataset, image_id: u64) -> Result<usize> {
    if !dataset.contains_image(image_id) {
        return Err(CocoError::UnknownImage(image_id));
    }
    Ok(dataset.annotations_for_image(image_id).len())
}

/// Mean number of annotations per image, or 0 for a dataset without images.
///
/// Annotations pointing at images outside the dataset are not counted.
pub fn average_instances(dataset: &Dataset) -> f64 {
    let images = dataset.images();
    if images.is_empty() {
        return 0.0;
    }

    let mut per_image: HashMap<u64, usize> = HashMap::with_capacity(images.len());
    for annotation in dataset.annotations() {
        *per_image.entry(annotation.image_id).or_default() += 1;
    }
    let total: usize = images
        .iter()
        .map(|image| per_image.get(&image.id).copied().unwrap_or(0))
        .sum();

    total as f64 / images.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::IdOrigin;

    fn square(x: f64) -> Vec<Vec<f64>> {
        vec![vec![x, 0.0, x + 1.0, 0.0, x + 1.0, 1.0, x, 1.0, x, 0.5]]
    }

    #[test]
    fn test_average_of_empty_dataset_is_zero() {
        assert_eq!(average_instances(&Dataset::new(IdOrigin::Zero)), 0.0);
    }

    #[test]
    fn test_average_and_count() {
        let mut dataset = Dataset::new(IdOrigin::Zero);
        let a = dataset.add_image("a.png", 4, 4).unwrap();
        let b = dataset.add_image("b.png", 4, 4).unwrap();
        let car = dataset.add_category("car", "none").unwrap();
        dataset.add_annotation(a, car, square(0.0), 0).unwrap();
        dataset.add_annotation(a, car, square(2.0), 0).unwrap();

        assert_eq!(instance_count(&dataset, a).unwrap(), 2);
        assert_eq!(instance_count(&dataset, b).unwrap(), 0);
        assert_eq!(average_instances(&dataset), 1.0);
    }

    #[test]
    fn test_count_of_unknown_image() {
        let dataset = Dataset::new(IdOrigin::Zero);
        assert!(matches!(
            instance_count(&dataset, 3),
            Err(CocoError::UnknownImage(3))
        ));
    }
}
