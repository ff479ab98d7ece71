//! Adapter configuration.
//!
//! Every field has a default, so hosts only pass what they override. Each adapter is handed
//! its own section; nothing here is process-global.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("unsupported log level `{0}`; expected trace|debug|info|warn|error|off")]
    UnknownLogLevel(String),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShelfConfig {
    pub database: DatabaseConfig,
    pub capture: CaptureConfig,
    pub camera: CameraConfig,
    pub export: ExportConfig,
}

impl ShelfConfig {
    /// Parses and validates a (possibly partial) JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.capture.validate()?;
        self.camera.validate()?;
        self.export.validate()
    }
}

/// Where records live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseConfig {
    pub name: String,
    pub version: u32,
    pub store: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "ProductManagerDB".to_string(),
            version: 1,
            store: "products".to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(invalid("database.name", "cannot be empty"));
        }
        if self.version == 0 {
            return Err(invalid("database.version", "must be at least 1"));
        }
        if self.store.trim().is_empty() {
            return Err(invalid("database.store", "cannot be empty"));
        }
        Ok(())
    }
}

/// Image normalization applied to picked files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Longest side, in pixels, after downscaling.
    pub max_dimension: u32,
    pub jpeg_quality: f64,
    /// When false, picked files are returned as read, without re-encoding.
    pub downscale: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_dimension: 800,
            jpeg_quality: 0.80,
            downscale: true,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_dimension == 0 {
            return Err(invalid("capture.maxDimension", "must be greater than 0"));
        }
        validate_quality("capture.jpegQuality", self.jpeg_quality)
    }
}

/// Camera stream request and still encoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraConfig {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_mode: String,
    /// Canvas size used when the video reports no intrinsic size yet.
    pub fallback_width: u32,
    pub fallback_height: u32,
    pub jpeg_quality: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 960,
            facing_mode: "environment".to_string(),
            fallback_width: 640,
            fallback_height: 480,
            jpeg_quality: 0.85,
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ideal_width == 0 || self.ideal_height == 0 {
            return Err(invalid("camera.idealWidth", "ideal size must be non-zero"));
        }
        if self.fallback_width == 0 || self.fallback_height == 0 {
            return Err(invalid("camera.fallbackWidth", "fallback size must be non-zero"));
        }
        if self.facing_mode.trim().is_empty() {
            return Err(invalid("camera.facingMode", "cannot be empty"));
        }
        validate_quality("camera.jpegQuality", self.jpeg_quality)
    }

    /// Frame size to draw: the video's intrinsic size, or the fallback when unknown.
    pub fn frame_size(&self, video_width: u32, video_height: u32) -> (u32, u32) {
        let width = if video_width == 0 {
            self.fallback_width
        } else {
            video_width
        };
        let height = if video_height == 0 {
            self.fallback_height
        } else {
            video_height
        };
        (width, height)
    }
}

/// Spreadsheet export layout and naming.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportConfig {
    /// Display widths in characters, applied to the leading columns in order.
    pub column_widths: Vec<f64>,
    pub default_sheet_name: String,
    pub file_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            column_widths: vec![30.0, 16.0, 16.0, 16.0, 14.0, 14.0, 14.0, 10.0, 10.0],
            default_sheet_name: "Sheet1".to_string(),
            file_prefix: "المنتجات".to_string(),
        }
    }
}

impl ExportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(bad) = self
            .column_widths
            .iter()
            .find(|w| !w.is_finite() || **w <= 0.0 || **w > 255.0)
        {
            return Err(invalid(
                "export.columnWidths",
                format!("widths must be in (0, 255], got {bad}"),
            ));
        }
        if self.default_sheet_name.trim().is_empty() {
            return Err(invalid("export.defaultSheetName", "cannot be empty"));
        }
        if self.file_prefix.contains(['/', '\\']) {
            return Err(invalid("export.filePrefix", "cannot contain path separators"));
        }
        Ok(())
    }

    /// The caller's sheet name, or the default when absent or blank.
    pub fn sheet_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.default_sheet_name,
        }
    }
}

fn validate_quality(field: &'static str, quality: f64) -> Result<(), ConfigError> {
    if quality.is_finite() && quality > 0.0 && quality <= 1.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be in (0, 1], got {quality}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_json_yields_defaults() {
        let config = ShelfConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ShelfConfig::default());
        assert_eq!(config.database.name, "ProductManagerDB");
        assert_eq!(config.database.store, "products");
        assert_eq!(config.capture.max_dimension, 800);
        assert_eq!(config.export.column_widths.len(), 9);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = ShelfConfig::from_json_str(
            r#"{"database":{"name":"Test"},"camera":{"jpegQuality":0.5}}"#,
        )
        .unwrap();
        assert_eq!(config.database.name, "Test");
        assert_eq!(config.database.version, 1);
        assert_eq!(config.camera.jpeg_quality, 0.5);
        assert_eq!(config.camera.ideal_width, 1280);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = ShelfConfig::from_json_str(r#"{"capture":{"jpegQuality":1.5}}"#).unwrap_err();
        assert_eq!(err.to_string(), "invalid `capture.jpegQuality`: must be in (0, 1], got 1.5");

        let err = ShelfConfig::from_json_str(r#"{"database":{"version":0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "database.version", .. }));

        let err = ShelfConfig::from_json_str(r#"{"export":{"columnWidths":[10,-1]}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "export.columnWidths", .. }));
    }

    #[test]
    fn frame_size_falls_back_when_video_has_no_size() {
        let camera = CameraConfig::default();
        assert_eq!(camera.frame_size(0, 0), (640, 480));
        assert_eq!(camera.frame_size(1920, 1080), (1920, 1080));
    }

    #[test]
    fn sheet_name_defaults_when_blank() {
        let export = ExportConfig::default();
        assert_eq!(export.sheet_name(None), "Sheet1");
        assert_eq!(export.sheet_name(Some("  ")), "Sheet1");
        assert_eq!(export.sheet_name(Some("Products")), "Products");
    }
}
