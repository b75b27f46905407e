//! Application Configuration
//!
//! User settings stored in TOML format. Every section falls back to its
//! defaults when missing from the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::vision::models::ModelSource;
use crate::vision::DEFAULT_VEHICLE_CLASSES;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Slot file storage
    pub storage: StorageSettings,
    /// Named videos offered by both tools
    pub videos: Vec<VideoEntry>,
    /// Object detector settings
    pub detector: DetectorSettings,
    /// Slot editor settings
    pub editor: EditorSettings,
    /// Occupancy monitor settings
    pub monitor: MonitorSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageSettings::default(),
            videos: (1..=3)
                .map(|n| VideoEntry::new(format!("Easy {}", n), format!("videos/easy{}.mp4", n)))
                .collect(),
            detector: DetectorSettings::default(),
            editor: EditorSettings::default(),
            monitor: MonitorSettings::default(),
        }
    }
}

impl AppConfig {
    /// Look up a catalog entry and its position by label (case-insensitive)
    pub fn find_video(&self, label: &str) -> Option<(usize, &VideoEntry)> {
        self.videos
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.label.eq_ignore_ascii_case(label))
    }
}

/// Where slot files are kept
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding `parking_slots_<stem>.json` files
    pub slot_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            slot_dir: PathBuf::from("."),
        }
    }
}

/// A named entry in the video catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEntry {
    pub label: String,
    pub path: PathBuf,
}

impl VideoEntry {
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }
}

/// Detector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// ONNX model file, absolute or relative to the models directory
    pub model_path: PathBuf,
    /// Download URL used when the model file is missing
    pub model_url: Option<String>,
    /// Expected SHA-256 of the downloaded model
    pub model_sha256: Option<String>,
    /// Square network input size in pixels
    pub input_size: u32,
    /// Minimum class score for a box to be kept
    pub confidence_threshold: f32,
    /// Overlap above which a weaker same-class box is suppressed
    pub iou_threshold: f32,
    /// Labels counted as vehicles
    pub vehicle_classes: Vec<String>,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("yolov8m.onnx"),
            model_url: None,
            model_sha256: None,
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            vehicle_classes: DEFAULT_VEHICLE_CLASSES.iter().map(|c| c.to_string()).collect(),
            intra_threads: 4,
        }
    }
}

impl DetectorSettings {
    pub fn model_source(&self) -> ModelSource {
        ModelSource {
            path: self.model_path.clone(),
            url: self.model_url.clone(),
            sha256: self.model_sha256.clone(),
        }
    }
}

/// Slot editor settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Pointer distance (exclusive) that grabs an existing corner
    pub hit_radius: f32,
    /// Shift applied by copy-last
    pub copy_offset: [i32; 2],
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            hit_radius: 10.0,
            copy_offset: [40, 20],
        }
    }
}

/// Occupancy monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Draw detector boxes over the frame
    pub show_detections: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            show_detections: true,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig =
        toml::from_str(&content).with_context(|| format!("Failed to parse config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.storage.slot_dir, PathBuf::from("."));
        assert_eq!(config.videos.len(), 3);
        assert_eq!(config.videos[0], VideoEntry::new("Easy 1", "videos/easy1.mp4"));

        // Check detector defaults
        assert_eq!(config.detector.model_path, PathBuf::from("yolov8m.onnx"));
        assert!(config.detector.model_url.is_none());
        assert_eq!(config.detector.input_size, 640);
        assert!((config.detector.confidence_threshold - 0.25).abs() < 0.001);
        assert!((config.detector.iou_threshold - 0.45).abs() < 0.001);
        assert_eq!(
            config.detector.vehicle_classes,
            vec!["car", "truck", "bus", "motorcycle", "bicycle"]
        );

        // Check editor defaults
        assert!((config.editor.hit_radius - 10.0).abs() < 0.001);
        assert_eq!(config.editor.copy_offset, [40, 20]);

        assert!(config.monitor.show_detections);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.videos.push(VideoEntry::new("Lot B", "/data/lot_b.mp4"));

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.videos, config.videos);
        assert_eq!(parsed.detector.input_size, config.detector.input_size);
        assert_eq!(parsed.editor, config.editor);
        assert_eq!(parsed.storage.slot_dir, config.storage.slot_dir);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
            [[videos]]
            label = "Easy 2"
            path = "videos/easy2.mp4"

            [detector]
            confidence_threshold = 0.5
        "#;
        let parsed: AppConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(parsed.videos.len(), 1);
        assert!((parsed.detector.confidence_threshold - 0.5).abs() < 0.001);
        assert!((parsed.detector.iou_threshold - 0.45).abs() < 0.001);
        assert_eq!(parsed.editor.copy_offset, [40, 20]);
    }

    #[test]
    fn test_find_video_ignores_case() {
        let config = AppConfig::default();

        assert_eq!(
            config.find_video("easy 2").map(|(i, v)| (i, v.path.clone())),
            Some((1, PathBuf::from("videos/easy2.mp4")))
        );
        assert!(config.find_video("Hard 9").is_none());
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.detector.model_url = Some("https://example.invalid/yolov8m.onnx".to_string());

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.detector.model_url, config.detector.model_url);
        assert_eq!(loaded.detector.model_source().path, PathBuf::from("yolov8m.onnx"));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
