use serde::{Deserialize, Serialize};

/// Face region in frame pixel coordinates, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - inter;

        if union > 0.0 { inter / union } else { 0.0 }
    }
}

/// Fixed-length face signature produced by a [`FaceEncoder`](crate::FaceEncoder).
///
/// The values are opaque to everything except a [`Comparator`](crate::Comparator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub values: Vec<f32>,
    /// Model that produced this signature (e.g., "w600k_r50").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl Signature {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values, model_version: None }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Same length and, when both record one, the same producing model.
    /// Signatures that fail this check are never matched.
    pub fn is_comparable(&self, other: &Signature) -> bool {
        if self.values.len() != other.values.len() {
            return false;
        }
        match (&self.model_version, &other.model_version) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Cosine similarity in [-1, 1]. Zero-norm inputs and length mismatches
    /// compare as 0.0.
    pub fn similarity(&self, other: &Signature) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Infinite for signatures of different length.
    pub fn euclidean_distance(&self, other: &Signature) -> f32 {
        if self.values.len() != other.values.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One face found in a frame: where it is and what it looks like.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceObservation {
    pub region: BoundingBox,
    pub signature: Signature,
}
