//! Editor configuration
//!
//! TOML-based settings for the interactive editor and the exporter. Every
//! field has a default, so an empty file (or no file) is a valid config.

use crate::color::Color;
use crate::export::ExportOptions;
use crate::model::TextStyle;
use crate::render::RenderOptions;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Eraser reach in document units
    pub eraser_radius: f64,
    /// Fill opacity for highlights (0.0 - 1.0)
    pub highlight_opacity: f64,
    pub selection_color: Color,
    /// Selection outline inset in view pixels
    pub selection_inset: f64,
    pub default_font_family: String,
    pub default_font_size: f64,
    pub default_color: Color,
    pub default_stroke_width: f64,
    /// Appended to the source file stem when naming the export
    pub output_suffix: String,
    /// Flatten the form after applying field values
    pub flatten_forms: bool,
    /// Undo steps kept before the oldest are dropped
    pub history_limit: usize,
    /// OCR results below this confidence (0 - 100) are not placed
    pub min_ocr_confidence: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            eraser_radius: 20.0,
            highlight_opacity: 0.35,
            selection_color: Color::new(0x3b, 0x82, 0xf6),
            selection_inset: 2.0,
            default_font_family: "Helvetica".to_string(),
            default_font_size: 16.0,
            default_color: Color::BLACK,
            default_stroke_width: 2.0,
            output_suffix: "-edited".to_string(),
            flatten_forms: true,
            history_limit: 100,
            min_ocr_confidence: 60.0,
        }
    }
}

impl EditorConfig {
    /// Load configuration from a TOML file
    ///
    /// ```no_run
    /// use overlay_core::EditorConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = EditorConfig::from_file("editor.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.eraser_radius.is_finite() && self.eraser_radius > 0.0,
            "eraser_radius must be positive, got {}",
            self.eraser_radius
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.highlight_opacity),
            "highlight_opacity must be within 0.0..=1.0, got {}",
            self.highlight_opacity
        );
        anyhow::ensure!(
            self.default_font_size > 0.0,
            "default_font_size must be positive, got {}",
            self.default_font_size
        );
        anyhow::ensure!(
            self.default_stroke_width >= 0.0,
            "default_stroke_width must not be negative"
        );
        anyhow::ensure!(self.history_limit > 0, "history_limit must be at least 1");
        anyhow::ensure!(
            (0.0..=100.0).contains(&self.min_ocr_confidence),
            "min_ocr_confidence must be within 0..=100, got {}",
            self.min_ocr_confidence
        );
        Ok(())
    }

    /// Style given to newly placed text
    pub fn default_text_style(&self) -> TextStyle {
        TextStyle {
            font_family: self.default_font_family.clone(),
            font_size: self.default_font_size,
            color: self.default_color,
            ..TextStyle::default()
        }
    }

    pub fn render_options(&self, zoom: f64) -> RenderOptions {
        RenderOptions {
            zoom,
            selected: None,
            highlight_opacity: self.highlight_opacity,
            selection_color: self.selection_color,
            selection_inset: self.selection_inset,
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            highlight_opacity: self.highlight_opacity,
            flatten_forms: self.flatten_forms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(EditorConfig::from_str("").unwrap(), EditorConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = EditorConfig::from_str(
            r##"
            eraser_radius = 12.5
            selection_color = "#FF0000"
            flatten_forms = false
            "##,
        )
        .unwrap();
        assert_eq!(config.eraser_radius, 12.5);
        assert_eq!(config.selection_color, Color::new(255, 0, 0));
        assert!(!config.flatten_forms);
        assert_eq!(config.output_suffix, "-edited");
    }

    #[test]
    fn test_invalid_color_rejected() {
        assert!(EditorConfig::from_str(r#"default_color = "red""#).is_err());
    }

    #[test]
    fn test_out_of_range_opacity_rejected() {
        let err = EditorConfig::from_str("highlight_opacity = 1.5").unwrap_err();
        assert!(err.to_string().contains("highlight_opacity"));
    }

    #[test]
    fn test_zero_history_limit_rejected() {
        let err = EditorConfig::from_str("history_limit = 0").unwrap_err();
        assert!(err.to_string().contains("history_limit"));
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = EditorConfig::from_file("/nonexistent/editor.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
