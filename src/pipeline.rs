//! Drivers tying each command to the document store, image store and log.

use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::config::Command;
use crate::conversion::{convert_records, Vocabulary};
use crate::dataset::Violation;
use crate::error::Result;
use crate::geometry::repair_polygons;
use crate::io::{load_dataset, read_labelme_dir, save_dataset, FsImageStore};
use crate::merge::{merge_datasets, CategoryMerge};
use crate::split::{split_dataset, ShufflePartitioner};
use crate::stats::{average_instances, instance_count};

/// Run one parsed command.
///
/// Returns the invariant violations found by `validate`; every other command
/// returns an empty list.
pub fn run(command: &Command) -> Result<Vec<Violation>> {
    match command {
        Command::Convert {
            labelme_dir,
            img_dir,
            output,
            labels,
            supercategory,
        } => {
            let vocabulary = Vocabulary::new(labels.iter().cloned(), supercategory);
            process_convert(labelme_dir, img_dir, output, &vocabulary)?;
        }
        Command::Merge {
            inputs,
            output,
            category_merge,
        } => process_merge(inputs, output, *category_merge)?,
        Command::Split {
            input,
            train,
            val,
            val_size,
            seed,
        } => process_split(input, train, val, *val_size, *seed)?,
        Command::Fix { input, output } => {
            process_fix(input, output.as_deref().unwrap_or(input))?;
        }
        Command::Count { input, image_id } => {
            process_count(input, *image_id)?;
        }
        Command::Validate { input } => return process_validate(input),
    }
    Ok(Vec::new())
}

/// Convert a LabelMe directory into a COCO file.
pub fn process_convert(
    labelme_dir: &Path,
    img_dir: &Path,
    output: &Path,
    vocabulary: &Vocabulary,
) -> Result<()> {
    info!("Reading LabelMe files from {}...", labelme_dir.display());
    let records = read_labelme_dir(labelme_dir)?;
    info!("Read and parsed {} files.", records.len());

    let mut store = FsImageStore::new(img_dir)?;
    let (dataset, stats) = convert_records(records, vocabulary, &mut store)?;
    stats.print_summary();

    save_dataset(output, &dataset)
}

/// Merge COCO files in the given order.
pub fn process_merge(inputs: &[PathBuf], output: &Path, strategy: CategoryMerge) -> Result<()> {
    let sources = inputs
        .iter()
        .map(|path| load_dataset(path))
        .collect::<Result<Vec<_>>>()?;

    let merged = merge_datasets(&sources, strategy)?;
    save_dataset(output, &merged)?;
    info!("Merged COCO JSON file has been created at: {}", output.display());
    Ok(())
}

/// Split a COCO file into train and validation files.
pub fn process_split(
    input: &Path,
    train_path: &Path,
    val_path: &Path,
    val_size: f64,
    seed: u64,
) -> Result<()> {
    let dataset = load_dataset(input)?;
    let split = split_dataset(&dataset, val_size, seed, &ShufflePartitioner)?;

    save_dataset(train_path, &split.train)?;
    save_dataset(val_path, &split.val)?;
    info!("Train and validation JSON files have been created.");
    Ok(())
}

/// Pad short polygons and write the result to `output`.
pub fn process_fix(input: &Path, output: &Path) -> Result<()> {
    let mut dataset = load_dataset(input)?;
    let report = repair_polygons(&mut dataset)?;
    report.print_summary();
    save_dataset(output, &dataset)
}

/// Log the instance count of one image, or the average over all images.
pub fn process_count(input: &Path, image_id: Option<u64>) -> Result<f64> {
    let dataset = load_dataset(input)?;
    match image_id {
        Some(image_id) => {
            let count = instance_count(&dataset, image_id)?;
            info!("Number of instances in image ID {}: {}", image_id, count);
            Ok(count as f64)
        }
        None => {
            let average = average_instances(&dataset);
            info!("Average number of instances per image: {:.2}", average);
            Ok(average)
        }
    }
}

/// Log every invariant violation of a COCO file.
pub fn process_validate(input: &Path) -> Result<Vec<Violation>> {
    let dataset = load_dataset(input)?;
    let violations = dataset.validate();
    if violations.is_empty() {
        info!("No invariant violations found.");
    } else {
        for violation in &violations {
            warn!("{}", violation);
        }
        warn!("{} invariant violations found.", violations.len());
    }
    Ok(violations)
}
