//! Merging several datasets into one with fresh identifiers.

use log::info;
use std::collections::HashMap;

use crate::coco::Annotation;
use crate::dataset::{Dataset, IdOrigin};
use crate::error::{CategoryKey, CocoError, Result};

/// How the merger matches categories coming from different inputs.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum CategoryMerge {
    /// Each input's category ids are minted separately
    #[default]
    SourceId,
    /// Categories with the same name become one category
    Name,
}

/// Merge `sources` in order into a new dataset.
///
/// Images and annotations are renumbered from one in traversal order and
/// every annotation is pointed at the new id of its image. Categories are
/// minted on first reference from an annotation. With
/// [`CategoryMerge::SourceId`] each source's category ids are mapped
/// independently, and a second category with an existing name fails with
/// `DuplicateCategory`. [`CategoryMerge::Name`] reuses the merged category of
/// the same name instead.
///
/// Sources are only read. Any failure discards the partially merged result.
pub fn merge_datasets(sources: &[Dataset], strategy: CategoryMerge) -> Result<Dataset> {
    let mut merged = Dataset::new(IdOrigin::One);

    for (source_index, source) in sources.iter().enumerate() {
        let mut image_ids = HashMap::with_capacity(source.images().len());
        for image in source.images() {
            let new_id = merged.push_image(image.clone())?;
            image_ids.entry(image.id).or_insert(new_id);
        }

        let mut category_ids: HashMap<u64, u64> = HashMap::new();
        for annotation in source.annotations() {
            let image_id = *image_ids.get(&annotation.image_id).ok_or(
                CocoError::DanglingAnnotation {
                    source_index,
                    annotation_id: annotation.id,
                    image_id: annotation.image_id,
                },
            )?;

            let category_id = match category_ids.get(&annotation.category_id) {
                Some(&id) => id,
                None => {
                    let id = mint_category(&mut merged, source, annotation.category_id, strategy)?;
                    category_ids.insert(annotation.category_id, id);
                    id
                }
            };

            merged.push_annotation(Annotation {
                image_id,
                category_id,
                ..annotation.clone()
            })?;
        }
    }

    info!(
        "Merged {} datasets: {} images, {} annotations, {} categories.",
        sources.len(),
        merged.images().len(),
        merged.annotations().len(),
        merged.categories().len()
    );
    Ok(merged)
}

fn mint_category(
    merged: &mut Dataset,
    source: &Dataset,
    source_id: u64,
    strategy: CategoryMerge,
) -> Result<u64> {
    let category = source
        .category(source_id)
        .ok_or(CocoError::UnknownCategory(CategoryKey::Id(source_id)))?;

    if strategy == CategoryMerge::Name {
        if let Some(existing) = merged.category_by_name(&category.name) {
            return Ok(existing.id);
        }
    }
    merged.add_category(&category.name, &category.supercategory)
}
