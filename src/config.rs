use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct CopyConfig {
    /// Pixels-per-unit recorded into copy buffers and used to rescale pastes.
    #[serde(default = "CopyConfig::default_pixels_per_unit")]
    pub pixels_per_unit: f32,
    #[serde(default)]
    pub pretty_buffer: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamingConfig {
    #[serde(default = "NamingConfig::default_copy_separator")]
    pub copy_separator: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewConfig {
    #[serde(default = "PreviewConfig::default_dirty_on_activate")]
    pub dirty_on_activate: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RigConfig {
    #[serde(default)]
    pub copy: CopyConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Default)]
pub struct RigConfigOverrides {
    pub pixels_per_unit: Option<f32>,
    pub pretty_buffer: Option<bool>,
}

impl CopyConfig {
    const fn default_pixels_per_unit() -> f32 {
        100.0
    }
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self { pixels_per_unit: Self::default_pixels_per_unit(), pretty_buffer: false }
    }
}

impl NamingConfig {
    fn default_copy_separator() -> String {
        "_".to_string()
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self { copy_separator: Self::default_copy_separator() }
    }
}

impl PreviewConfig {
    const fn default_dirty_on_activate() -> bool {
        true
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self { dirty_on_activate: Self::default_dirty_on_activate() }
    }
}

impl RigConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = Self::from_json_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let mut cfg: Self = serde_json::from_slice(bytes)?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &RigConfigOverrides) {
        if let Some(pixels_per_unit) = overrides.pixels_per_unit {
            self.copy.pixels_per_unit = pixels_per_unit;
        }
        if let Some(pretty) = overrides.pretty_buffer {
            self.copy.pretty_buffer = pretty;
        }
        self.sanitize();
    }

    fn sanitize(&mut self) {
        if !(self.copy.pixels_per_unit.is_finite() && self.copy.pixels_per_unit > 0.0) {
            log::warn!(
                "pixels_per_unit {} is not a positive number; using {}",
                self.copy.pixels_per_unit,
                CopyConfig::default_pixels_per_unit()
            );
            self.copy.pixels_per_unit = CopyConfig::default_pixels_per_unit();
        }
        if self.naming.copy_separator.is_empty() {
            self.naming.copy_separator = NamingConfig::default_copy_separator();
        }
    }
}

impl RigConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.pixels_per_unit.is_none() && self.pretty_buffer.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.pixels_per_unit.is_some() {
            fields.push("pixels_per_unit");
        }
        if self.pretty_buffer.is_some() {
            fields.push("pretty_buffer");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_use_defaults() {
        let cfg = RigConfig::from_json_slice(br#"{"naming": {}}"#).expect("parse");
        assert_eq!(cfg.copy.pixels_per_unit, 100.0);
        assert!(!cfg.copy.pretty_buffer);
        assert_eq!(cfg.naming.copy_separator, "_");
        assert!(cfg.preview.dirty_on_activate);
    }

    #[test]
    fn invalid_values_are_sanitized() {
        let json = br#"{"copy": {"pixels_per_unit": -4.0}, "naming": {"copy_separator": ""}}"#;
        let cfg = RigConfig::from_json_slice(json).expect("parse");
        assert_eq!(cfg.copy.pixels_per_unit, 100.0);
        assert_eq!(cfg.naming.copy_separator, "_");
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut cfg = RigConfig::default();
        let overrides = RigConfigOverrides { pixels_per_unit: Some(32.0), pretty_buffer: Some(true) };
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.copy.pixels_per_unit, 32.0);
        assert!(cfg.copy.pretty_buffer);
        assert_eq!(overrides.applied_fields(), vec!["pixels_per_unit", "pretty_buffer"]);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = RigConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
