//! Detection + signature extraction behind one trait.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::FaceObservation;
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Finds faces in a frame and produces one signature per face.
pub trait FaceEncoder {
    fn encode_faces(&mut self, frame: &RgbImage) -> Result<Vec<FaceObservation>, EncoderError>;
}

/// SCRFD detection followed by ArcFace extraction.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, EncoderError> {
        let (det_path, rec_path) = model_paths(model_dir);
        let detector = FaceDetector::load(&det_path)?;
        let recognizer = FaceRecognizer::load(&rec_path)?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode_faces(&mut self, frame: &RgbImage) -> Result<Vec<FaceObservation>, EncoderError> {
        let regions = self.detector.detect(frame)?;
        let mut faces = Vec::with_capacity(regions.len());

        for region in regions {
            match self.recognizer.extract(frame, &region) {
                Ok(signature) => faces.push(FaceObservation { region, signature }),
                Err(RecognizerError::NoLandmarks) => {
                    tracing::debug!(confidence = region.confidence, "skipping face without landmarks");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(faces)
    }
}

/// Detector and recognizer model paths inside `model_dir`.
pub fn model_paths(model_dir: &Path) -> (PathBuf, PathBuf) {
    (model_dir.join(DETECTOR_MODEL_FILE), model_dir.join(RECOGNIZER_MODEL_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_paths() {
        let (det, rec) = model_paths(Path::new("/opt/models"));
        assert_eq!(det, Path::new("/opt/models/det_10g.onnx"));
        assert_eq!(rec, Path::new("/opt/models/w600k_r50.onnx"));
    }

    #[test]
    fn test_load_fails_on_missing_detector() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = OnnxFaceEncoder::load(tmp.path()).err().expect("no models present");
        assert!(matches!(err, EncoderError::Detector(DetectorError::ModelNotFound(_))));
    }
}
