use anyhow::{Context, Result};
use facerec_core::Metric;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable naming a TOML config file when `--config` is absent.
pub const CONFIG_ENV: &str = "FACEREC_CONFIG";

/// Runtime configuration: defaults, then the TOML file, then `FACEREC_*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing det_10g.onnx and w600k_r50.onnx.
    pub model_dir: PathBuf,
    /// Enrollment store file.
    pub store_path: PathBuf,
    pub metric: Metric,
    /// Match cutoff, interpreted by `metric`.
    pub threshold: f32,
    /// Frames discarded after opening the camera while exposure settles.
    pub warmup_frames: usize,
}

/// On-disk shape of the config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    camera_device: Option<String>,
    model_dir: Option<PathBuf>,
    store_path: Option<PathBuf>,
    metric: Option<Metric>,
    threshold: Option<f32>,
    warmup_frames: Option<usize>,
}

impl Config {
    /// Load from an explicit file, or from `FACEREC_CONFIG` if set, plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let file = match path {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                tracing::debug!(path = %path.display(), "loaded config file");
                parse_file(&text).with_context(|| format!("parsing config {}", path.display()))?
            }
            None => FileConfig::default(),
        };

        Ok(Self::resolve(file, |key| std::env::var(key).ok()))
    }

    fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = facerec_core::default_data_dir();

        let metric = env_parse(&env, "FACEREC_METRIC")
            .or(file.metric)
            .unwrap_or_default();

        Self {
            camera_device: env("FACEREC_CAMERA_DEVICE")
                .or(file.camera_device)
                .unwrap_or_else(|| "/dev/video0".to_string()),
            model_dir: env("FACEREC_MODEL_DIR")
                .map(PathBuf::from)
                .or(file.model_dir)
                .unwrap_or_else(facerec_core::default_model_dir),
            store_path: env("FACEREC_STORE_PATH")
                .map(PathBuf::from)
                .or(file.store_path)
                .unwrap_or_else(|| data_dir.join("face_encodings.json")),
            metric,
            threshold: env_parse(&env, "FACEREC_THRESHOLD")
                .or(file.threshold)
                .unwrap_or_else(|| metric.default_threshold()),
            warmup_frames: env_parse(&env, "FACEREC_WARMUP_FRAMES")
                .or(file.warmup_frames)
                .unwrap_or(4),
        }
    }
}

fn parse_file(text: &str) -> Result<FileConfig> {
    Ok(toml::from_str(text)?)
}

/// Parse an environment value, ignoring it (with a warning) if malformed.
fn env_parse<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring malformed environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let cfg = Config::resolve(FileConfig::default(), env_of(&[]));
        assert_eq!(cfg.camera_device, "/dev/video0");
        assert_eq!(cfg.metric, Metric::Cosine);
        assert_eq!(cfg.threshold, Metric::Cosine.default_threshold());
        assert_eq!(cfg.warmup_frames, 4);
        assert!(cfg.store_path.ends_with("facerec/face_encodings.json"));
        assert!(cfg.model_dir.ends_with("facerec/models"));
    }

    #[test]
    fn file_values_apply() {
        let file = parse_file(
            r#"
            camera_device = "/dev/video3"
            store_path = "/srv/faces.json"
            metric = "euclidean"
            warmup_frames = 0
            "#,
        )
        .unwrap();
        let cfg = Config::resolve(file, env_of(&[]));
        assert_eq!(cfg.camera_device, "/dev/video3");
        assert_eq!(cfg.store_path, PathBuf::from("/srv/faces.json"));
        assert_eq!(cfg.metric, Metric::Euclidean);
        // threshold follows the chosen metric when unset
        assert_eq!(cfg.threshold, Metric::Euclidean.default_threshold());
        assert_eq!(cfg.warmup_frames, 0);
    }

    #[test]
    fn env_overrides_file() {
        let file = parse_file("threshold = 0.3\ncamera_device = \"/dev/video3\"").unwrap();
        let cfg = Config::resolve(
            file,
            env_of(&[("FACEREC_THRESHOLD", "0.55"), ("FACEREC_CAMERA_DEVICE", "/dev/video9")]),
        );
        assert_eq!(cfg.threshold, 0.55);
        assert_eq!(cfg.camera_device, "/dev/video9");
    }

    #[test]
    fn malformed_env_falls_back() {
        let cfg = Config::resolve(
            FileConfig::default(),
            env_of(&[("FACEREC_THRESHOLD", "lots"), ("FACEREC_METRIC", "hamming")]),
        );
        assert_eq!(cfg.metric, Metric::Cosine);
        assert_eq!(cfg.threshold, Metric::Cosine.default_threshold());
    }

    #[test]
    fn unknown_file_key_is_rejected() {
        assert!(parse_file("camera = \"/dev/video0\"").is_err());
    }

    #[test]
    fn bad_metric_in_file_is_rejected() {
        assert!(parse_file("metric = \"hamming\"").is_err());
    }

    #[test]
    fn load_reads_explicit_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("facerec.toml");
        std::fs::write(&path, "warmup_frames = 9\n").unwrap();
        let cfg = Config::load(Some(&path)).unwrap();
        // FACEREC_WARMUP_FRAMES is not set by the test harness
        assert_eq!(cfg.warmup_frames, 9);
    }

    #[test]
    fn load_missing_explicit_file_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/facerec.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/facerec.toml"));
    }
}
