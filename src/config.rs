use clap::builder::PossibleValue;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

use crate::merge::CategoryMerge;

/// Convert LabelMe annotations to COCO and curate COCO datasets.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Convert a directory of LabelMe JSON files into one COCO file
    Convert {
        /// Directory containing LabelMe JSON files and their images
        #[arg(short = 'd', long = "labelme_dir")]
        labelme_dir: PathBuf,

        /// Directory the renamed images are copied to
        #[arg(long = "img_dir")]
        img_dir: PathBuf,

        /// Path of the COCO JSON file to write
        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// Ordered list of accepted labels; category ids follow this order
        #[arg(long = "labels", use_value_delimiter = true, required = true)]
        labels: Vec<String>,

        /// Supercategory recorded for every category
        #[arg(long = "supercategory", default_value = "none")]
        supercategory: String,
    },

    /// Merge several COCO files into one with fresh ids
    Merge {
        /// COCO JSON files to merge, in order
        #[arg(long = "inputs", num_args = 1.., required = true)]
        inputs: Vec<PathBuf>,

        /// Path of the merged COCO JSON file
        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// How categories of different inputs are matched. Inputs converted
        /// with the same label list share category names and need `name`;
        /// `source-id` fails on the first repeated name
        #[arg(long = "category_merge", value_enum, default_value = "source-id")]
        category_merge: CategoryMerge,
    },

    /// Split a COCO file into train and validation files
    Split {
        /// COCO JSON file to split
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        /// Path of the training subset
        #[arg(long = "train")]
        train: PathBuf,

        /// Path of the validation subset
        #[arg(long = "val")]
        val: PathBuf,

        /// Proportion of the images to use for validation
        #[arg(long = "val_size", default_value_t = 0.2, value_parser = validate_fraction)]
        val_size: f64,

        /// Seed for random shuffling
        #[arg(long = "seed", default_value_t = 42)]
        seed: u64,
    },

    /// Pad polygons with fewer than five points
    Fix {
        /// COCO JSON file to repair
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        /// Where to write the repaired file; repairs in place when omitted
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// Count instances of one image, or the average over all images
    Count {
        /// COCO JSON file to inspect
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        /// Image to count; averages over all images when omitted
        #[arg(long = "image_id")]
        image_id: Option<u64>,
    },

    /// Report every broken invariant of a COCO file
    Validate {
        /// COCO JSON file to check
        #[arg(short = 'i', long = "input")]
        input: PathBuf,
    },
}

impl ValueEnum for CategoryMerge {
    fn value_variants<'a>() -> &'a [Self] {
        &[CategoryMerge::SourceId, CategoryMerge::Name]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(match self {
            CategoryMerge::SourceId => PossibleValue::new("source-id")
                .help("Mint categories per input id; a repeated name is an error"),
            CategoryMerge::Name => {
                PossibleValue::new("name").help("Categories with the same name become one")
            }
        })
    }
}

// Validate that the fraction lies strictly between 0.0 and 1.0
fn validate_fraction(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val > 0.0 && val < 1.0 => Ok(val),
        _ => Err("SIZE must be strictly between 0.0 and 1.0".to_string()),
    }
}
