// ============================================================================
// SETTINGS: persisted defaults for new sessions
// ============================================================================

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::components::layers::TextStyle;
use crate::error::EditResult;
use crate::ops::adjustments::MAX_UPSCALE_FACTOR;

/// User preferences, stored as TOML at `<data dir>/Retouch/settings.toml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Attributes given to every new text layer.
    pub text: TextStyle,
    /// Multiplier applied to crop output size.
    pub device_pixel_ratio: f32,
    pub log_level: String,
    pub upscale_factor: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            text: TextStyle::default(),
            device_pixel_ratio: 1.0,
            log_level: "info".to_string(),
            upscale_factor: 2,
        }
    }
}

impl Settings {
    pub fn settings_path() -> PathBuf {
        crate::logger::app_data_dir().join("settings.toml")
    }

    /// Load from the default location (returns defaults if missing or corrupt).
    pub fn load() -> Self {
        Self::load_from(&Self::settings_path())
    }

    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match toml::from_str::<Settings>(&content) {
            Ok(mut s) => {
                s.sanitize();
                s
            }
            Err(e) => {
                log::warn!("Ignoring corrupt settings file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> EditResult<()> {
        self.save_to(&Self::settings_path())
    }

    pub fn save_to(&self, path: &Path) -> EditResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)?;
        log::info!("Saved settings to {}", path.display());
        Ok(())
    }

    fn sanitize(&mut self) {
        if !self.device_pixel_ratio.is_finite() || self.device_pixel_ratio <= 0.0 {
            self.device_pixel_ratio = 1.0;
        }
        self.upscale_factor = self.upscale_factor.clamp(2, MAX_UPSCALE_FACTOR);
        self.text.font_size = self.text.font_size.max(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("retouch-settings-{}", uuid::Uuid::new_v4()))
            .join("settings.toml")
    }

    #[test]
    fn save_then_load() {
        let path = temp_path();
        let mut s = Settings::default();
        s.text.font_family = "DejaVu Sans".into();
        s.device_pixel_ratio = 2.0;
        s.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), s);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_or_corrupt_falls_back() {
        let path = temp_path();
        assert_eq!(Settings::load_from(&path), Settings::default());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "device_pixel_ratio = \"lots\"").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn partial_file_keeps_defaults_and_sanitizes() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "device_pixel_ratio = -3.0\n[text]\nfont_size = 20.0\n").unwrap();
        let s = Settings::load_from(&path);
        assert_eq!(s.device_pixel_ratio, 1.0);
        assert_eq!(s.text.font_size, 20.0);
        assert_eq!(s.text.content, "Your Text Here");
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
