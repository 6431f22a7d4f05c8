//! Train/validation split of a dataset by image.

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;

use crate::dataset::Dataset;
use crate::error::{CocoError, Result};

/// Decides which image ids go to validation.
pub trait Partitioner {
    /// Split `ids` into `(train, val)`. The two parts must be disjoint and
    /// together contain every id.
    fn partition(&self, ids: &[u64], val_fraction: f64, seed: u64) -> (Vec<u64>, Vec<u64>);
}

/// Seeded shuffle; the first `ceil(n * val_fraction)` ids become validation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShufflePartitioner;

impl Partitioner for ShufflePartitioner {
    fn partition(&self, ids: &[u64], val_fraction: f64, seed: u64) -> (Vec<u64>, Vec<u64>) {
        let mut ids = ids.to_vec();
        let mut rng = StdRng::seed_from_u64(seed);
        ids.shuffle(&mut rng);

        let val_size = ((ids.len() as f64 * val_fraction).ceil() as usize).min(ids.len());
        let train = ids.split_off(val_size);
        (train, ids)
    }
}

#[derive(Debug, Clone)]
pub struct SplitData {
    pub train: Dataset,
    pub val: Dataset,
}

/// Split `dataset` into train and validation datasets.
///
/// Both outputs keep the original identifiers, `info`, `licenses` and the full
/// category list; each carries the images of its partition and the
/// annotations of those images, in source order.
pub fn split_dataset<P: Partitioner>(
    dataset: &Dataset,
    val_fraction: f64,
    seed: u64,
    partitioner: &P,
) -> Result<SplitData> {
    if !(val_fraction > 0.0 && val_fraction < 1.0) {
        return Err(CocoError::InvalidFraction(val_fraction));
    }
    if dataset.is_empty() {
        return Err(CocoError::EmptyDataset);
    }

    let ids: Vec<u64> = dataset.images().iter().map(|image| image.id).collect();
    let (train_ids, val_ids) = partitioner.partition(&ids, val_fraction, seed);
    let train_ids: HashSet<u64> = train_ids.into_iter().collect();
    let val_ids: HashSet<u64> = val_ids.into_iter().collect();
    check_partition(&ids, &train_ids, &val_ids)?;

    let train = subset(dataset, &train_ids)?;
    let val = subset(dataset, &val_ids)?;
    info!(
        "Split {} images into {} train / {} val ({} / {} annotations).",
        ids.len(),
        train.images().len(),
        val.images().len(),
        train.annotations().len(),
        val.annotations().len()
    );
    Ok(SplitData { train, val })
}

fn check_partition(ids: &[u64], train: &HashSet<u64>, val: &HashSet<u64>) -> Result<()> {
    let all: HashSet<u64> = ids.iter().copied().collect();
    let covered = train.len() + val.len() == all.len()
        && train.is_disjoint(val)
        && train.union(val).all(|id| all.contains(id));
    if covered {
        Ok(())
    } else {
        Err(CocoError::InvalidPartition(all.len()))
    }
}

fn subset(dataset: &Dataset, image_ids: &HashSet<u64>) -> Result<Dataset> {
    let mut part = Dataset::new(dataset.id_origin());
    part.set_info(dataset.info().cloned());
    part.set_licenses(dataset.licenses().cloned());

    for category in dataset.categories() {
        part.insert_category(category.clone())?;
    }
    for image in dataset.images() {
        if image_ids.contains(&image.id) {
            part.insert_image(image.clone())?;
        }
    }
    for annotation in dataset.annotations() {
        if image_ids.contains(&annotation.image_id) {
            part.insert_annotation(annotation.clone())?;
        }
    }
    Ok(part)
}
