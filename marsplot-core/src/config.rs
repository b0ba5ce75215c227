//! Engine settings
//!
//! Settings are read from an optional TOML file. Every key is optional:
//!
//! ```toml
//! contour_levels = 21
//! dpi = 96
//! page_width_px = 2000
//! vertical_page = false
//! output_format = "pdf"
//! stack_years = false
//! input_dir = "/path/to/simulation/history"
//! ```

use crate::errors::MarsPlotResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File format of rendered pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Eps,
    Png,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Eps => "eps",
            OutputFormat::Png => "png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Number of filled contour levels when no explicit levels are given
    pub contour_levels: usize,
    pub dpi: u32,
    /// Font size of a single-panel page
    pub label_size: f64,
    /// Font size reduction per panel
    pub label_factor: f64,
    /// Page width in pixels
    pub page_width_px: u32,
    pub vertical_page: bool,
    pub output_format: OutputFormat,
    /// Overlay successive years of 1D time series on Ls 0-360
    pub stack_years: bool,
    /// Let figure failures abort the run
    pub debug: bool,
    /// Directory of the reference simulation
    pub input_dir: PathBuf,
    /// Defaults to `<input_dir>/plots`
    pub output_dir: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            contour_levels: 21,
            dpi: 96,
            label_size: 12.0,
            label_factor: 0.5,
            page_width_px: 2000,
            vertical_page: false,
            output_format: OutputFormat::Pdf,
            stack_years: false,
            debug: false,
            input_dir: PathBuf::from("."),
            output_dir: None,
        }
    }
}

impl EngineSettings {
    pub fn from_toml_str(text: &str) -> MarsPlotResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> MarsPlotResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> MarsPlotResult<String> {
        Ok(toml::to_string(self)?)
    }

    /// Page width and height in inches.
    pub fn page_size(&self) -> (f64, f64) {
        let width = self.page_width_px as f64 / self.dpi as f64;
        let height = self.page_width_px as f64 / 1.4 / self.dpi as f64;
        if self.vertical_page {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Font size for a page holding `panel_count` panels.
    pub fn font_size(&self, panel_count: usize) -> f64 {
        (self.label_size - panel_count as f64 * self.label_factor).max(1.0)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.input_dir.join("plots"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.contour_levels, 21);
        assert_eq!(settings.output_format, OutputFormat::Pdf);
        assert_eq!(settings.output_dir(), PathBuf::from("./plots"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let settings = EngineSettings::from_toml_str(
            r#"
            vertical_page = true
            output_format = "png"
            input_dir = "/data/sim1"
            "#,
        )
        .unwrap();
        assert!(settings.vertical_page);
        assert_eq!(settings.output_format, OutputFormat::Png);
        assert_eq!(settings.dpi, 96);
        assert_eq!(settings.output_dir(), PathBuf::from("/data/sim1/plots"));
    }

    #[test]
    fn bad_value_is_reported() {
        let result = EngineSettings::from_toml_str("output_format = \"svg\"");
        assert!(result.is_err());
    }

    #[test]
    fn toml_round_trip() {
        let settings = EngineSettings {
            stack_years: true,
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..EngineSettings::default()
        };
        let text = settings.to_toml_string().unwrap();
        assert_eq!(EngineSettings::from_toml_str(&text).unwrap(), settings);
    }

    #[test]
    fn page_size() {
        let settings = EngineSettings::default();
        let (width, height) = settings.page_size();
        assert_relative_eq!(width, 2000.0 / 96.0);
        assert_relative_eq!(height, 2000.0 / 1.4 / 96.0);

        let vertical = EngineSettings {
            vertical_page: true,
            ..settings
        };
        assert_eq!(vertical.page_size(), (height, width));
    }

    #[test]
    fn font_shrinks_with_panels() {
        let settings = EngineSettings::default();
        assert_eq!(settings.font_size(1), 11.5);
        assert_eq!(settings.font_size(4), 10.0);
    }
}
