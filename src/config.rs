//! Operator-tunable settings, stored as TOML.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    dispatch::{ActionMap, DEFAULT_COOLDOWN, DEFAULT_SCROLL_MAGNITUDE},
    error::{Error, Result},
    gesture::{DEFAULT_THRESHOLD, DEFAULT_WINDOW_SIZE},
};

pub const DEFAULT_CONFIG_FILE: &str = "gesture-control.toml";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub recognition: RecognitionConfig,
    pub dispatch: DispatchConfig,
    pub capture: CaptureConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory holding one sample file per gesture.
    pub dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Largest nearest-neighbor distance still accepted as a match. Lower
    /// values reject more ambiguous poses.
    pub threshold: f32,
    /// Frames in the majority-vote window. A gesture must win more than half
    /// of them before it triggers anything.
    pub window_size: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Minimum time between two actions, in seconds.
    pub cooldown_secs: f64,
    /// Scroll steps per scroll action.
    pub scroll_magnitude: i32,
    /// Distance from a screen corner, in pixels, at which the pointer trips
    /// the failsafe. 0 disables it.
    pub failsafe_margin_px: i32,
    pub actions: ActionMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub camera_index: u32,
    /// Flip the image horizontally so the preview behaves like a mirror.
    pub mirror: bool,
    /// Detections below this palm-times-handpose confidence count as no hand.
    pub min_hand_confidence: f32,
    pub model_path: PathBuf,
    pub palm_model_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("gesture_data"),
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN.as_secs_f64(),
            scroll_magnitude: DEFAULT_SCROLL_MAGNITUDE,
            failsafe_margin_px: 2,
            actions: ActionMap::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            mirror: true,
            min_hand_confidence: 0.2,
            model_path: PathBuf::from("models").join("handpose_estimation_mediapipe_2023feb.onnx"),
            palm_model_path: PathBuf::from("models").join("palm_detection_mediapipe_2023feb.onnx"),
        }
    }
}

impl DispatchConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs)
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let threshold = self.recognition.threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(Error::Config(format!(
                "recognition.threshold must be a finite number >= 0, got {threshold}"
            )));
        }
        if self.recognition.window_size == 0 {
            return Err(Error::Config(
                "recognition.window_size must be at least 1".to_string(),
            ));
        }
        let cooldown = self.dispatch.cooldown_secs;
        if !cooldown.is_finite() || cooldown < 0.0 {
            return Err(Error::Config(format!(
                "dispatch.cooldown_secs must be a finite number >= 0, got {cooldown}"
            )));
        }
        if self.dispatch.scroll_magnitude <= 0 {
            return Err(Error::Config(format!(
                "dispatch.scroll_magnitude must be > 0, got {}",
                self.dispatch.scroll_magnitude
            )));
        }
        if self.dispatch.failsafe_margin_px < 0 {
            return Err(Error::Config(format!(
                "dispatch.failsafe_margin_px must be >= 0, got {}",
                self.dispatch.failsafe_margin_px
            )));
        }
        if !(0.0..=1.0).contains(&self.capture.min_hand_confidence) {
            return Err(Error::Config(format!(
                "capture.min_hand_confidence must be in [0, 1], got {}",
                self.capture.min_hand_confidence
            )));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise `gesture-control.toml` from the
    /// working directory if it exists, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ActionKind;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.recognition.threshold, 0.5);
        assert_eq!(config.recognition.window_size, 5);
        assert_eq!(config.dispatch.cooldown(), Duration::from_millis(800));
        assert_eq!(config.dispatch.actions.palm, ActionKind::ScrollUp);
        assert_eq!(config.data.dir, PathBuf::from("gesture_data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_has_every_section() {
        let toml = Config::default().to_toml().unwrap();
        assert!(toml.contains("[recognition]"));
        assert!(toml.contains("[dispatch.actions]"));
        assert!(toml.contains("thumbs_up = \"right_click\""));
        assert!(toml.contains("palm_detection_mediapipe_2023feb.onnx"));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [recognition]
            threshold = 0.35

            [dispatch.actions]
            palm = "left_click"
            "#,
        )
        .unwrap();
        assert_eq!(config.recognition.threshold, 0.35);
        assert_eq!(config.recognition.window_size, 5);
        assert_eq!(config.dispatch.actions.palm, ActionKind::LeftClick);
        assert_eq!(config.dispatch.actions.fist, ActionKind::ScrollDown);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut original = Config::default();
        original.recognition.window_size = 7;
        original.dispatch.cooldown_secs = 1.25;
        original.dispatch.actions.peace = ActionKind::Ignore;
        original.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, original);
        assert_eq!(
            Config::load_or_default(Some(path.as_path())).unwrap(),
            original
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = Config::default();
        config.recognition.threshold = -0.1;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.recognition.window_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dispatch.cooldown_secs = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dispatch.scroll_magnitude = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.capture.min_hand_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_action_name_fails_to_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[dispatch.actions]\npalm = \"double_click\"\n").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }
}
