use crate::core::landmark_extractor::LandmarkExtractor;
use crate::core::pose_comparator::{PoseComparator, DEFAULT_TOLERANCE};
use crate::models::pose::{JointName, PoseResult};
use crate::platform::pose::LandmarkModel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine home directory")]
    NoHomeDirectory,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Pose matching configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Average joint distance (normalized units) at which similarity hits 0
    pub comparison_tolerance: f64,
    /// Joints below this confidence are dropped at extraction (0.0 keeps all)
    pub min_joint_confidence: f64,
    /// Restrict comparison to these joints; `None` compares every shared joint
    pub comparison_joints: Option<Vec<JointName>>,
    /// Similarity at or above which the user counts as "in position"
    pub match_threshold: f64,
    /// Upper bound for one landmark extraction; `None` waits indefinitely
    pub extraction_timeout_ms: Option<u64>,
    /// Pending commands the pose worker accepts before callers wait
    pub command_queue_depth: usize,
    /// Where the reference snapshot PNG is written
    pub snapshot_dir: PathBuf,
    /// SQLite file backing the key-value store
    pub store_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());

        let mut data_dir = PathBuf::from(home);
        data_dir.push(".poise_data");

        Self {
            comparison_tolerance: DEFAULT_TOLERANCE,
            min_joint_confidence: 0.0,
            comparison_joints: None,
            match_threshold: 0.8,
            extraction_timeout_ms: None,
            command_queue_depth: 8,
            snapshot_dir: data_dir.join("snapshots"),
            store_path: data_dir.join("store").join("poise.db"),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it with
    /// defaults if it doesn't exist
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        tracing::debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.comparison_tolerance.is_finite() || self.comparison_tolerance <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "Invalid comparison tolerance: {}. Must be greater than 0.0",
                self.comparison_tolerance
            )));
        }

        if !(0.0..=1.0).contains(&self.min_joint_confidence) {
            return Err(ConfigError::Invalid(format!(
                "Invalid joint confidence threshold: {}. Must be between 0.0 and 1.0",
                self.min_joint_confidence
            )));
        }

        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(ConfigError::Invalid(format!(
                "Invalid match threshold: {}. Must be between 0.0 and 1.0",
                self.match_threshold
            )));
        }

        if let Some(joints) = &self.comparison_joints {
            if joints.is_empty() {
                return Err(ConfigError::Invalid(
                    "Comparison joint list cannot be empty; omit it to compare all joints".to_string(),
                ));
            }
        }

        if self.extraction_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "Extraction timeout must be at least 1 ms".to_string(),
            ));
        }

        if self.command_queue_depth == 0 || self.command_queue_depth > 1024 {
            return Err(ConfigError::Invalid(format!(
                "Invalid command queue depth: {}. Must be between 1 and 1024",
                self.command_queue_depth
            )));
        }

        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> ConfigResult<Self> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    pub fn extraction_timeout(&self) -> Option<Duration> {
        self.extraction_timeout_ms.map(Duration::from_millis)
    }

    /// Comparator built from the tolerance and joint restriction
    pub fn comparator(&self) -> PoseResult<PoseComparator> {
        let comparator = PoseComparator::new(self.comparison_tolerance)?;
        Ok(match &self.comparison_joints {
            Some(joints) => comparator.restricted_to(joints.iter().copied()),
            None => comparator,
        })
    }

    /// Extractor around `model` with the configured confidence threshold
    pub fn extractor(&self, model: Arc<dyn LandmarkModel>) -> LandmarkExtractor {
        LandmarkExtractor::new(model).with_min_confidence(self.min_joint_confidence)
    }

    /// Get the configuration file path
    fn get_config_path() -> ConfigResult<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| ConfigError::NoHomeDirectory)?;

        let mut path = PathBuf::from(home);
        path.push(".poise_data");
        path.push("config");
        path.push("settings.json");

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::pose::DummyLandmarkModel;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.comparison_tolerance, 0.5);
        assert_eq!(config.min_joint_confidence, 0.0);
        assert_eq!(config.comparison_joints, None);
        assert_eq!(config.match_threshold, 0.8);
        assert_eq!(config.extraction_timeout(), None);
        assert_eq!(config.command_queue_depth, 8);
        assert!(config.snapshot_dir.ends_with("snapshots"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.comparison_tolerance = 0.0;
        assert!(config.validate().is_err());
        config.comparison_tolerance = f64::INFINITY;
        assert!(config.validate().is_err());
        config.comparison_tolerance = 0.2;
        assert!(config.validate().is_ok());

        config.min_joint_confidence = 1.5;
        assert!(config.validate().is_err());
        config.min_joint_confidence = 0.1;

        config.match_threshold = -0.1;
        assert!(config.validate().is_err());
        config.match_threshold = 0.8;

        config.comparison_joints = Some(vec![]);
        assert!(config.validate().is_err());
        config.comparison_joints = Some(JointName::LEGACY_KEY_JOINTS.to_vec());

        config.extraction_timeout_ms = Some(0);
        assert!(config.validate().is_err());
        config.extraction_timeout_ms = Some(250);

        config.command_queue_depth = 0;
        assert!(config.validate().is_err());
        config.command_queue_depth = 8;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");

        let config = Config {
            comparison_tolerance: 0.2,
            comparison_joints: Some(JointName::LEGACY_KEY_JOINTS.to_vec()),
            extraction_timeout_ms: Some(500),
            ..Config::default()
        };
        config.save_to(&path).expect("Failed to save config");

        let loaded = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"comparison_tolerance": 0.2}"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.comparison_tolerance, 0.2);
        assert_eq!(loaded.match_threshold, 0.8);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        std::fs::write(&path, r#"{"comparison_tolerance": -1.0}"#).unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Invalid(_))));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_builds_pipeline_components() {
        let config = Config {
            comparison_tolerance: 0.2,
            min_joint_confidence: 0.1,
            ..Config::default()
        };

        assert_eq!(config.comparator().unwrap().tolerance(), 0.2);
        let extractor = config.extractor(Arc::new(DummyLandmarkModel));
        assert_eq!(extractor.min_confidence(), 0.1);
    }
}
