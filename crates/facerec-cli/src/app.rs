//! Ties configuration, the store, the encoder and the camera together.

use crate::config::Config;
use crate::menu::MenuActions;
use crate::preview::PreviewWindow;
use crate::session::{self, EnrollOutcome, MatchPolicy, RecognizeSummary, SessionError};
use anyhow::{Context, Result};
use facerec_core::{EnrollmentStore, OnnxFaceEncoder};
use facerec_hw::Camera;

pub struct App {
    config: Config,
    store: EnrollmentStore,
    encoder: OnnxFaceEncoder,
    policy: MatchPolicy,
}

impl App {
    /// Load the store and both models. Fails fast if either is unusable.
    pub fn open(config: Config) -> Result<Self> {
        let store = EnrollmentStore::load(&config.store_path)
            .with_context(|| format!("loading enrollment store {}", config.store_path.display()))?;

        let encoder = OnnxFaceEncoder::load(&config.model_dir)
            .with_context(|| format!("loading face models from {}", config.model_dir.display()))?;

        let policy = MatchPolicy::new(config.metric, config.threshold);
        tracing::info!(
            metric = %config.metric,
            threshold = config.threshold,
            users = store.users().len(),
            "ready"
        );

        Ok(Self { config, store, encoder, policy })
    }

    fn open_camera(&self) -> Result<Camera, SessionError> {
        Ok(Camera::open(&self.config.camera_device)?)
    }

    pub fn enroll_session(&mut self, username: &str) -> Result<EnrollOutcome, SessionError> {
        let camera = self.open_camera()?;
        let mut stream = camera.stream()?;
        stream.discard(self.config.warmup_frames);
        let mut preview = PreviewWindow::new("Add User");

        session::run_enroll(
            &mut self.store,
            &self.config.store_path,
            username,
            &mut stream,
            &mut self.encoder,
            &mut preview,
        )
    }

    pub fn recognize_session(&mut self) -> Result<RecognizeSummary, SessionError> {
        let camera = self.open_camera()?;
        let mut stream = camera.stream()?;
        stream.discard(self.config.warmup_frames);
        let mut preview = PreviewWindow::new("Face Recognition");

        session::run_recognize(&self.store, &self.policy, &mut stream, &mut self.encoder, &mut preview)
    }
}

impl MenuActions for App {
    fn is_enrolled(&self, username: &str) -> bool {
        self.store.contains(username)
    }

    fn enroll(&mut self, username: &str) -> Result<EnrollOutcome> {
        Ok(self.enroll_session(username)?)
    }

    fn recognize(&mut self) -> Result<RecognizeSummary> {
        Ok(self.recognize_session()?)
    }
}
