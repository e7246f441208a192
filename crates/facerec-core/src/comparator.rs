//! Signature comparison strategies.

use crate::types::Signature;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cosine similarity threshold tuned for L2-normalised ArcFace signatures.
pub const DEFAULT_COSINE_THRESHOLD: f32 = 0.40;
/// Euclidean distance tolerance used by classic 128-d dlib encoders.
pub const DEFAULT_EUCLIDEAN_THRESHOLD: f32 = 0.5;

/// Decides which reference signatures are within `threshold` of a candidate.
pub trait Comparator {
    /// One flag per reference, in reference order. References that are not
    /// [comparable](Signature::is_comparable) with the candidate never match.
    fn compare(&self, references: &[Signature], candidate: &Signature, threshold: f32) -> Vec<bool>;

    /// True if any reference is within threshold.
    fn any_match(&self, references: &[Signature], candidate: &Signature, threshold: f32) -> bool {
        self.compare(references, candidate, threshold).contains(&true)
    }
}

/// Matches when cosine similarity is at least the threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineComparator;

impl Comparator for CosineComparator {
    fn compare(&self, references: &[Signature], candidate: &Signature, threshold: f32) -> Vec<bool> {
        references
            .iter()
            .map(|r| r.is_comparable(candidate) && r.similarity(candidate) >= threshold)
            .collect()
    }
}

/// Matches when Euclidean distance is at most the threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanComparator;

impl Comparator for EuclideanComparator {
    fn compare(&self, references: &[Signature], candidate: &Signature, threshold: f32) -> Vec<bool> {
        references
            .iter()
            .map(|r| r.is_comparable(candidate) && r.euclidean_distance(candidate) <= threshold)
            .collect()
    }
}

/// Comparison metric, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Euclidean,
}

impl Metric {
    pub fn default_threshold(self) -> f32 {
        match self {
            Metric::Cosine => DEFAULT_COSINE_THRESHOLD,
            Metric::Euclidean => DEFAULT_EUCLIDEAN_THRESHOLD,
        }
    }

    pub fn comparator(self) -> Box<dyn Comparator> {
        match self {
            Metric::Cosine => Box::new(CosineComparator),
            Metric::Euclidean => Box::new(EuclideanComparator),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cosine => f.write_str("cosine"),
            Metric::Euclidean => f.write_str("euclidean"),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" => Ok(Metric::Euclidean),
            other => Err(format!("unknown metric '{other}' (expected cosine or euclidean)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(values: &[f32]) -> Signature {
        Signature::new(values.to_vec())
    }

    #[test]
    fn test_cosine_flags_per_reference() {
        let refs = vec![sig(&[0.0, 1.0]), sig(&[1.0, 0.0]), sig(&[0.9, 0.1])];
        let flags = CosineComparator.compare(&refs, &sig(&[1.0, 0.0]), 0.5);
        assert_eq!(flags, vec![false, true, true]);
    }

    #[test]
    fn test_cosine_threshold_is_inclusive() {
        let refs = vec![sig(&[1.0, 0.0])];
        assert!(CosineComparator.any_match(&refs, &sig(&[1.0, 0.0]), 1.0));
    }

    #[test]
    fn test_euclidean_flags_per_reference() {
        let refs = vec![sig(&[0.0, 0.0]), sig(&[0.3, 0.4]), sig(&[3.0, 4.0])];
        let flags = EuclideanComparator.compare(&refs, &sig(&[0.0, 0.0]), 0.5);
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn test_empty_references_never_match() {
        assert!(CosineComparator.compare(&[], &sig(&[1.0]), 0.0).is_empty());
        assert!(!EuclideanComparator.any_match(&[], &sig(&[1.0]), 10.0));
    }

    #[test]
    fn test_length_mismatch_never_matches() {
        let refs = vec![sig(&[1.0]), sig(&[1.0, 0.0])];
        let candidate = sig(&[1.0, 0.0]);
        // even the loosest thresholds reject the 1-d reference
        assert_eq!(CosineComparator.compare(&refs, &candidate, -1.0), vec![false, true]);
        assert_eq!(EuclideanComparator.compare(&refs, &candidate, f32::MAX), vec![false, true]);
    }

    #[test]
    fn test_metric_parse_and_defaults() {
        assert_eq!("Cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!(" euclidean ".parse::<Metric>().unwrap(), Metric::Euclidean);
        assert!("manhattan".parse::<Metric>().is_err());
        assert_eq!(Metric::Euclidean.default_threshold(), DEFAULT_EUCLIDEAN_THRESHOLD);
        assert_eq!(Metric::default(), Metric::Cosine);
    }
}
