//! LabelMe to COCO converter and COCO dataset curation
//!
//! This library keeps a COCO annotation dataset consistent while it is
//! converted from LabelMe, merged with other datasets, split into train and
//! validation subsets, repaired and summarised.

pub mod coco;
pub mod config;
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod io;
pub mod merge;
pub mod pipeline;
pub mod split;
pub mod stats;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use coco::{Annotation, Category, Image, Segmentation};
pub use config::{Args, Command};
pub use conversion::{convert_records, ImageStore, Vocabulary};
pub use dataset::{Dataset, IdOrigin, Violation};
pub use error::{CategoryKey, CocoError, Result};
pub use geometry::{repair_polygons, RepairReport};
pub use io::{load_dataset, save_dataset, FsImageStore};
pub use merge::{merge_datasets, CategoryMerge};
pub use split::{split_dataset, Partitioner, ShufflePartitioner, SplitData};
pub use stats::{average_instances, instance_count};
pub use types::{ImageAnnotation, Shape, SourceRecord};
