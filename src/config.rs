//! Pipeline configuration.
//!
//! Every section has defaults matching the broadcast footage the pipeline was
//! tuned on; a JSON document only needs the keys it wants to override.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analytics::{CameraMotionConfig, PossessionConfig, SpeedConfig, ViewConfig};
use crate::error::ConfigError;
use crate::tracker::TrackerConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub tracker: TrackerConfig,
    pub camera: CameraMotionConfig,
    pub view: ViewConfig,
    pub speed: SpeedConfig,
    pub possession: PossessionConfig,
}

impl PipelineConfig {
    /// Use the video's frame rate for both tracking and speed estimation.
    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        self.tracker.frame_rate = fps as f32;
        self.speed.frame_rate = fps;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        info!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }

    /// Serialize to pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "speed": { "frame_window": 3 },
                "possession": { "max_player_ball_distance": 50.0 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.speed.frame_window, 3);
        assert_eq!(config.speed.frame_rate, 24.0);
        assert_eq!(config.possession.max_player_ball_distance, 50.0);
        assert_eq!(config.view, ViewConfig::default());
        assert_eq!(config.camera.feature_bands, vec![(0, 20), (900, 1050)]);
    }

    #[test]
    fn test_frame_rate_applies_to_both_stages() {
        let config = PipelineConfig::default().with_frame_rate(25.0);
        assert_eq!(config.tracker.frame_rate, 25.0);
        assert_eq!(config.speed.frame_rate, 25.0);
    }

    #[test]
    fn test_file_round_trip_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let config = PipelineConfig::default().with_frame_rate(30.0);
        std::fs::write(&path, config.to_json_pretty().unwrap()).unwrap();
        assert_eq!(PipelineConfig::from_json_file(&path).unwrap(), config);

        assert!(matches!(
            PipelineConfig::from_json_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
        assert!(matches!(PipelineConfig::from_json_str("{ nope"), Err(ConfigError::Json(_))));
    }
}
