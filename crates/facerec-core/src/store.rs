//! Enrollment store: username → signatures, persisted as one JSON document.
//!
//! The store is append-only. Users keep their insertion order, which
//! decides the winner when a candidate matches more than one user.

use crate::comparator::Comparator;
use crate::types::Signature;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt store {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("serialize store: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("refusing to enroll '{0}' with no signatures")]
    EmptyEnrollment(String),
    #[error("signature for '{username}' has {found} values, store holds {expected}")]
    DimensionMismatch {
        username: String,
        expected: usize,
        found: usize,
    },
}

/// All samples enrolled under one username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolledUser {
    pub username: String,
    pub signatures: Vec<Signature>,
}

/// In-memory enrollment store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentStore {
    users: Vec<EnrolledUser>,
}

impl EnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store from `path`, or start empty if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no store file, starting empty");
            return Ok(Self::new());
        }

        let data = fs::read(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let store: Self = serde_json::from_slice(&data).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        store.validate().map_err(|message| StoreError::Corrupt {
            path: path.to_path_buf(),
            message,
        })?;

        tracing::info!(
            path = %path.display(),
            users = store.users.len(),
            samples = store.total_samples(),
            "loaded store"
        );
        Ok(store)
    }

    /// Write the whole store to `path`.
    ///
    /// Goes through a temporary file in the same directory and renames it
    /// into place, so readers never observe a partially written store.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let write_err = |source: std::io::Error| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(write_err)?;

        let serialized = serde_json::to_vec_pretty(self)?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(&serialized).map_err(write_err)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        tracing::debug!(
            path = %path.display(),
            users = self.users.len(),
            samples = self.total_samples(),
            "saved store"
        );
        Ok(())
    }

    /// Append signatures to `username`, creating the user if needed.
    ///
    /// Returns the user's total sample count afterwards. An empty batch, or
    /// one whose signature length differs from what the store already
    /// holds, is rejected and leaves the store untouched.
    pub fn enroll(&mut self, username: &str, signatures: Vec<Signature>) -> Result<usize, StoreError> {
        let Some(first) = signatures.first() else {
            return Err(StoreError::EmptyEnrollment(username.to_string()));
        };
        let expected = self.dimension().unwrap_or(first.len());
        if let Some(bad) = signatures.iter().find(|s| s.len() != expected) {
            return Err(StoreError::DimensionMismatch {
                username: username.to_string(),
                expected,
                found: bad.len(),
            });
        }

        let idx = match self.users.iter().position(|u| u.username == username) {
            Some(idx) => idx,
            None => {
                self.users.push(EnrolledUser {
                    username: username.to_string(),
                    signatures: Vec::new(),
                });
                self.users.len() - 1
            }
        };

        let user = &mut self.users[idx];
        user.signatures.extend(signatures);
        Ok(user.signatures.len())
    }

    /// First user (in enrollment order) with any sample within threshold.
    ///
    /// Deliberately first-match rather than best-match: a candidate close
    /// to two users is always attributed to the earlier one.
    pub fn identify(
        &self,
        candidate: &Signature,
        comparator: &dyn Comparator,
        threshold: f32,
    ) -> Option<&str> {
        self.users
            .iter()
            .find(|u| comparator.any_match(&u.signatures, candidate, threshold))
            .map(|u| u.username.as_str())
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.iter().any(|u| u.username == username)
    }

    pub fn users(&self) -> &[EnrolledUser] {
        &self.users
    }

    pub fn sample_count(&self, username: &str) -> usize {
        self.users
            .iter()
            .find(|u| u.username == username)
            .map_or(0, |u| u.signatures.len())
    }

    pub fn total_samples(&self) -> usize {
        self.users.iter().map(|u| u.signatures.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Length shared by every stored signature, `None` while empty.
    pub fn dimension(&self) -> Option<usize> {
        self.users
            .iter()
            .find_map(|u| u.signatures.first())
            .map(Signature::len)
    }

    fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        let expected = self.dimension();
        for user in &self.users {
            if user.signatures.is_empty() {
                return Err(format!("user '{}' has no signatures", user.username));
            }
            if !seen.insert(user.username.as_str()) {
                return Err(format!("user '{}' appears more than once", user.username));
            }
            for sig in &user.signatures {
                if sig.is_empty() {
                    return Err(format!("user '{}' has an empty signature", user.username));
                }
                if Some(sig.len()) != expected {
                    return Err(format!(
                        "user '{}' has a {}-value signature, expected {}",
                        user.username,
                        sig.len(),
                        expected.unwrap_or_default()
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::{CosineComparator, EuclideanComparator};
    use tempfile::TempDir;

    fn sig(values: &[f32]) -> Signature {
        Signature::new(values.to_vec())
    }

    #[test]
    fn round_trip_preserves_sample_counts() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("faces.json");

        let mut store = EnrollmentStore::new();
        store.enroll("alice", vec![sig(&[1.0, 0.0]), sig(&[0.9, 0.1]), sig(&[0.8, 0.2])]).unwrap();
        store.save(&path).unwrap();

        let loaded = EnrollmentStore::load(&path).unwrap();
        assert_eq!(loaded.sample_count("alice"), 3);
        assert_eq!(loaded, store);
    }

    #[test]
    fn enrolling_twice_appends() {
        let mut store = EnrollmentStore::new();
        assert_eq!(store.enroll("bob", vec![sig(&[1.0])]).unwrap(), 1);
        assert_eq!(store.enroll("bob", vec![sig(&[0.5]), sig(&[0.2])]).unwrap(), 3);
        assert_eq!(store.users().len(), 1);
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let mut store = EnrollmentStore::new();
        store.enroll("Alice", vec![sig(&[1.0])]).unwrap();
        store.enroll("alice", vec![sig(&[1.0])]).unwrap();
        assert_eq!(store.users().len(), 2);
    }

    #[test]
    fn empty_enrollment_is_rejected() {
        let mut store = EnrollmentStore::new();
        let err = store.enroll("carol", Vec::new()).unwrap_err();
        assert!(matches!(err, StoreError::EmptyEnrollment(ref u) if u == "carol"));
        assert!(store.is_empty());
    }

    #[test]
    fn missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = EnrollmentStore::load(&tmp.path().join("absent.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("faces.json");
        fs::write(&path, b"\x80\x04not json").unwrap();
        assert!(matches!(EnrollmentStore::load(&path), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn user_without_signatures_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("faces.json");
        fs::write(&path, r#"{"users":[{"username":"dave","signatures":[]}]}"#).unwrap();
        let err = EnrollmentStore::load(&path).unwrap_err();
        assert!(err.to_string().contains("dave"), "{err}");
    }

    #[test]
    fn duplicate_user_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("faces.json");
        let one = r#"{"username":"erin","signatures":[{"values":[1.0]}]}"#;
        fs::write(&path, format!(r#"{{"users":[{one},{one}]}}"#)).unwrap();
        assert!(matches!(EnrollmentStore::load(&path), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn mixed_signature_lengths_are_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("faces.json");
        fs::write(
            &path,
            r#"{"users":[
                {"username":"grace","signatures":[{"values":[1.0,0.0]}]},
                {"username":"mallory","signatures":[{"values":[1.0]}]}
            ]}"#,
        )
        .unwrap();
        let err = EnrollmentStore::load(&path).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(err.to_string().contains("mallory"), "{err}");
    }

    #[test]
    fn short_stored_sample_does_not_identify_full_candidate() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("faces.json");
        fs::write(&path, r#"{"users":[{"username":"mallory","signatures":[{"values":[1.0]}]}]}"#)
            .unwrap();
        let store = EnrollmentStore::load(&path).unwrap();

        let mut values = vec![0.0; 512];
        values[0] = 0.01;
        values[1] = 0.99;
        let candidate = Signature::new(values);
        assert_eq!(store.identify(&candidate, &CosineComparator, 0.4), None);
        assert_eq!(store.identify(&candidate, &EuclideanComparator, 0.5), None);
    }

    #[test]
    fn enroll_rejects_mismatched_dimension() {
        let mut store = EnrollmentStore::new();
        store.enroll("alice", vec![sig(&[1.0, 0.0])]).unwrap();

        let err = store.enroll("bob", vec![sig(&[1.0, 0.0]), sig(&[1.0])]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch { expected: 2, found: 1, .. }
        ));
        assert!(!store.contains("bob"));
        assert_eq!(store.dimension(), Some(2));
    }

    #[test]
    fn save_creates_parent_directory() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/faces.json");
        let mut store = EnrollmentStore::new();
        store.enroll("frank", vec![sig(&[1.0])]).unwrap();
        store.save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn identify_exact_sample_returns_user() {
        let mut store = EnrollmentStore::new();
        store.enroll("alice", vec![sig(&[0.0, 1.0])]).unwrap();
        store.enroll("bob", vec![sig(&[1.0, 0.0])]).unwrap();
        assert_eq!(store.identify(&sig(&[1.0, 0.0]), &CosineComparator, 0.4), Some("bob"));
    }

    #[test]
    fn identify_far_sample_returns_none() {
        let mut store = EnrollmentStore::new();
        store.enroll("alice", vec![sig(&[0.0, 0.0])]).unwrap();
        assert_eq!(store.identify(&sig(&[5.0, 5.0]), &EuclideanComparator, 0.5), None);
    }

    #[test]
    fn identify_prefers_first_enrolled_user() {
        let mut store = EnrollmentStore::new();
        // alice is a weaker match than bob but was enrolled first
        store.enroll("alice", vec![sig(&[0.8, 0.6])]).unwrap();
        store.enroll("bob", vec![sig(&[1.0, 0.0])]).unwrap();
        assert_eq!(store.identify(&sig(&[1.0, 0.0]), &CosineComparator, 0.5), Some("alice"));
    }

    #[test]
    fn identify_checks_every_sample_of_a_user() {
        let mut store = EnrollmentStore::new();
        store.enroll("alice", vec![sig(&[0.0, 1.0]), sig(&[1.0, 0.0])]).unwrap();
        assert_eq!(store.identify(&sig(&[1.0, 0.0]), &CosineComparator, 0.9), Some("alice"));
    }
}
