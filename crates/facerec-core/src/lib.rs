//! facerec-core — face signatures, comparison and the enrollment store.
//!
//! Detection (SCRFD) and signature extraction (ArcFace) run through ONNX
//! Runtime behind the [`FaceEncoder`] trait; everything else here is plain
//! bookkeeping over [`Signature`] vectors.

pub mod alignment;
pub mod comparator;
pub mod detector;
pub mod encoder;
pub mod recognizer;
pub mod store;
pub mod types;

pub use comparator::{Comparator, CosineComparator, EuclideanComparator, Metric};
pub use encoder::{EncoderError, FaceEncoder, OnnxFaceEncoder};
pub use store::{EnrolledUser, EnrollmentStore, StoreError};
pub use types::{BoundingBox, FaceObservation, Signature};

use std::path::PathBuf;

/// `$XDG_DATA_HOME/facerec`, falling back to `~/.local/share/facerec`.
pub fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facerec")
}

/// Where the ONNX models are looked up when no directory is configured.
pub fn default_model_dir() -> PathBuf {
    default_data_dir().join("models")
}
