//! Error type shared by every dataset operation.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = CocoError> = std::result::Result<T, E>;

/// How a category was referenced when lookup failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryKey {
    Id(u64),
    Name(String),
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKey::Id(id) => write!(f, "id {}", id),
            CategoryKey::Name(name) => write!(f, "{:?}", name),
        }
    }
}

#[derive(Debug, Error)]
pub enum CocoError {
    #[error("category {0:?} already exists")]
    DuplicateCategory(String),

    #[error("unknown category {0}")]
    UnknownCategory(CategoryKey),

    #[error("unknown image id {0}")]
    UnknownImage(u64),

    #[error(
        "annotation {annotation_id} in source dataset {source_index} references image {image_id}, \
         which that dataset does not contain"
    )]
    DanglingAnnotation {
        source_index: usize,
        annotation_id: u64,
        image_id: u64,
    },

    #[error("empty polygon{}", annotation_suffix(.annotation_id))]
    EmptyPolygon { annotation_id: Option<u64> },

    #[error("polygon has an odd number of coordinates ({len}){}", annotation_suffix(.annotation_id))]
    MalformedPolygon {
        len: usize,
        annotation_id: Option<u64>,
    },

    #[error("dataset has no images")]
    EmptyDataset,

    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u64 },

    #[error("no {kind} ids left to allocate")]
    IdOverflow { kind: &'static str },

    #[error("iscrowd must be 0 or 1, got {iscrowd}{}", annotation_suffix(.annotation_id))]
    InvalidCrowdFlag {
        iscrowd: u8,
        annotation_id: Option<u64>,
    },

    #[error("validation fraction must be strictly between 0 and 1, got {0}")]
    InvalidFraction(f64),

    #[error("partition is not a disjoint cover of the {0} image ids")]
    InvalidPartition(usize),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid embedded image data for {path}: {source}")]
    Base64 {
        path: PathBuf,
        #[source]
        source: base64::DecodeError,
    },
}

fn annotation_suffix(annotation_id: &Option<u64>) -> String {
    match annotation_id {
        Some(id) => format!(" in annotation {}", id),
        None => String::new(),
    }
}

impl CocoError {
    /// Attach the offending annotation id to a geometry error.
    pub fn for_annotation(self, id: u64) -> Self {
        match self {
            CocoError::EmptyPolygon { .. } => CocoError::EmptyPolygon {
                annotation_id: Some(id),
            },
            CocoError::MalformedPolygon { len, .. } => CocoError::MalformedPolygon {
                len,
                annotation_id: Some(id),
            },
            other => other,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CocoError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        CocoError::Json {
            path: path.into(),
            source,
        }
    }
}
