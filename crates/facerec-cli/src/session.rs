//! Enrollment and recognition capture loops.
//!
//! Both loops block on the frame source, run the encoder inline and hand
//! the annotated frame to the preview, which decides when to stop.

use crate::annotate;
use facerec_core::{
    BoundingBox, Comparator, EncoderError, EnrollmentStore, FaceEncoder, FaceObservation, Metric,
    Signature, StoreError,
};
use facerec_hw::{CameraError, Frame, FrameStream};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

/// Label for faces that match nobody.
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("preview window: {0}")]
    Preview(String),
    #[error("username must not be empty")]
    EmptyUsername,
}

/// Supplies frames until the stream ends (`None`).
pub trait FrameSource {
    fn capture(&mut self) -> Result<Option<Frame>, SessionError>;
}

impl FrameSource for FrameStream<'_> {
    fn capture(&mut self) -> Result<Option<Frame>, SessionError> {
        Ok(Some(self.next_frame()?))
    }
}

/// Displays a frame. Returns `false` once the user asked to stop.
pub trait Preview {
    fn present(&mut self, image: &RgbImage) -> Result<bool, SessionError>;
}

/// Comparator plus the cutoff it is applied with.
pub struct MatchPolicy {
    comparator: Box<dyn Comparator>,
    threshold: f32,
}

impl MatchPolicy {
    pub fn new(metric: Metric, threshold: f32) -> Self {
        Self {
            comparator: metric.comparator(),
            threshold,
        }
    }

    /// First enrolled user matching `face`, if any.
    pub fn identify<'s>(&self, store: &'s EnrollmentStore, face: &FaceObservation) -> Option<&'s str> {
        store.identify(&face.signature, self.comparator.as_ref(), self.threshold)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrollOutcome {
    Enrolled { captured: usize, total: usize },
    /// Nothing was captured; the store was left untouched.
    NoFaceDetected,
}

/// Per-frame failures in a row that a session rides out before giving up.
pub const MAX_CONSECUTIVE_FRAME_ERRORS: usize = 5;

/// Counts consecutive capture/encode failures.
#[derive(Default)]
struct FrameErrorBudget {
    consecutive: usize,
}

impl FrameErrorBudget {
    /// Swallow `err` and skip the frame, or hand it back once too many
    /// frames in a row have failed.
    fn absorb(&mut self, err: SessionError) -> Result<(), SessionError> {
        self.consecutive += 1;
        if self.consecutive > MAX_CONSECUTIVE_FRAME_ERRORS {
            return Err(err);
        }
        tracing::warn!(error = %err, consecutive = self.consecutive, "skipping frame");
        Ok(())
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }
}

/// Capture signatures for `username` until the preview stops, then persist.
///
/// If the session fails partway, whatever was captured up to that point is
/// still saved before the error is returned.
pub fn run_enroll(
    store: &mut EnrollmentStore,
    store_path: &Path,
    username: &str,
    source: &mut dyn FrameSource,
    encoder: &mut dyn FaceEncoder,
    preview: &mut dyn Preview,
) -> Result<EnrollOutcome, SessionError> {
    if username.trim().is_empty() {
        return Err(SessionError::EmptyUsername);
    }

    let mut captured = Vec::new();
    let result = collect_signatures(source, encoder, preview, &mut captured);
    match &result {
        Ok(frames) => {
            tracing::debug!(frames, signatures = captured.len(), "enroll: capture finished")
        }
        Err(e) => {
            tracing::warn!(error = %e, kept = captured.len(), "enroll: capture interrupted")
        }
    }

    if captured.is_empty() {
        result?;
        tracing::warn!(user = username, "enroll: no face detected, nothing saved");
        return Ok(EnrollOutcome::NoFaceDetected);
    }

    let count = captured.len();
    let total = store.enroll(username, captured)?;
    store.save(store_path)?;
    tracing::info!(user = username, captured = count, total, "enroll: saved");

    result?;
    Ok(EnrollOutcome::Enrolled { captured: count, total })
}

/// Enrollment capture loop. Returns the number of frames seen.
fn collect_signatures(
    source: &mut dyn FrameSource,
    encoder: &mut dyn FaceEncoder,
    preview: &mut dyn Preview,
    captured: &mut Vec<Signature>,
) -> Result<usize, SessionError> {
    let mut budget = FrameErrorBudget::default();
    let mut frames = 0usize;

    loop {
        let mut frame = match source.capture() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                budget.absorb(e)?;
                continue;
            }
        };
        frames += 1;

        if frame.is_dark {
            tracing::debug!(seq = frame.sequence, "enroll: skipping dark frame");
            budget.reset();
        } else {
            match encoder.encode_faces(&frame.image) {
                Ok(faces) => {
                    budget.reset();
                    for face in faces {
                        annotate::draw_face_box(&mut frame.image, &face.region);
                        captured.push(face.signature);
                    }
                }
                Err(e) => budget.absorb(e.into())?,
            }
        }

        if !preview.present(&frame.image)? {
            break;
        }
    }

    Ok(frames)
}

/// A face in one frame and who it was matched to.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub region: BoundingBox,
    pub name: Option<String>,
}

impl Identification {
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_LABEL)
    }
}

/// Match every face in a frame against the store.
pub fn identify_faces(
    store: &EnrollmentStore,
    faces: &[FaceObservation],
    policy: &MatchPolicy,
) -> Vec<Identification> {
    faces
        .iter()
        .map(|face| Identification {
            region: face.region.clone(),
            name: policy.identify(store, face).map(str::to_string),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizeSummary {
    pub frames: usize,
    pub faces: usize,
    pub identified: usize,
}

/// Label faces in the live stream until the preview stops.
pub fn run_recognize(
    store: &EnrollmentStore,
    policy: &MatchPolicy,
    source: &mut dyn FrameSource,
    encoder: &mut dyn FaceEncoder,
    preview: &mut dyn Preview,
) -> Result<RecognizeSummary, SessionError> {
    let mut summary = RecognizeSummary::default();
    let mut budget = FrameErrorBudget::default();

    loop {
        let mut frame = match source.capture() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                budget.absorb(e)?;
                continue;
            }
        };
        summary.frames += 1;

        if frame.is_dark {
            budget.reset();
        } else {
            let faces = match encoder.encode_faces(&frame.image) {
                Ok(faces) => {
                    budget.reset();
                    faces
                }
                Err(e) => {
                    budget.absorb(e.into())?;
                    Vec::new()
                }
            };
            for id in identify_faces(store, &faces, policy) {
                summary.faces += 1;
                if id.name.is_some() {
                    summary.identified += 1;
                }
                annotate::draw_labelled_face(&mut frame.image, &id.region, id.label());
            }
        }

        if !preview.present(&frame.image)? {
            break;
        }
    }

    tracing::info!(
        frames = summary.frames,
        faces = summary.faces,
        identified = summary.identified,
        "recognize: session finished"
    );
    Ok(summary)
}
