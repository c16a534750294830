//! Configuration loading.
//! Reads odonto.toml from the current directory or the path in ODONTO_CONFIG.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::chart::GeometryConfig;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::models::{
    MeasurementLimits, MeasurementRange, MARGIN_MAX, MARGIN_MIN, PROBING_DEPTH_MAX,
    PROBING_DEPTH_MIN,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub medication_history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

fn default_db_path() -> String { "odonto.db".to_string() }

/// Valid ranges for chart readings, in mm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_margin_min")]
    pub margin_min: i32,
    #[serde(default = "default_margin_max")]
    pub margin_max: i32,
    #[serde(default = "default_probing_min")]
    pub probing_min: i32,
    #[serde(default = "default_probing_max")]
    pub probing_max: i32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            margin_min: default_margin_min(),
            margin_max: default_margin_max(),
            probing_min: default_probing_min(),
            probing_max: default_probing_max(),
        }
    }
}

fn default_margin_min()  -> i32 { MARGIN_MIN }
fn default_margin_max()  -> i32 { MARGIN_MAX }
fn default_probing_min() -> i32 { PROBING_DEPTH_MIN }
fn default_probing_max() -> i32 { PROBING_DEPTH_MAX }

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: default_capacity() }
    }
}

fn default_capacity() -> usize { DEFAULT_HISTORY_CAPACITY }

impl ChartConfig {
    pub fn limits(&self) -> MeasurementLimits {
        MeasurementLimits {
            margin: MeasurementRange::new(self.margin_min, self.margin_max),
            probing_depth: MeasurementRange::new(self.probing_min, self.probing_max),
        }
    }
}

impl AppConfig {
    /// Load configuration from odonto.toml.
    /// Checks ODONTO_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("ODONTO_CONFIG")
            .unwrap_or_else(|_| "odonto.toml".to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy odonto.example.toml to odonto.toml and edit it.",
                path.display()
            );
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let chart = &self.chart;
        if chart.margin_min > chart.margin_max {
            anyhow::bail!(
                "chart.margin_min ({}) exceeds chart.margin_max ({})",
                chart.margin_min,
                chart.margin_max
            );
        }
        if chart.probing_min > chart.probing_max {
            anyhow::bail!(
                "chart.probing_min ({}) exceeds chart.probing_max ({})",
                chart.probing_min,
                chart.probing_max
            );
        }
        if !(self.geometry.scale_px_per_mm > 0.0) {
            anyhow::bail!(
                "geometry.scale_px_per_mm must be positive, got {}",
                self.geometry.scale_px_per_mm
            );
        }
        if self.medication_history.capacity == 0 {
            anyhow::bail!("medication_history.capacity must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.chart.limits(), MeasurementLimits::default());
        assert_eq!(config.medication_history.capacity, 50);
        assert_eq!(config.geometry.scale_px_per_mm, 4.0);
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            [database]
            path = "/var/lib/odonto/clinic.db"

            [chart]
            margin_min = -5
            margin_max = 5

            [geometry]
            scale_px_per_mm = 3.5
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, "/var/lib/odonto/clinic.db");
        assert_eq!(config.chart.limits().margin, MeasurementRange::new(-5, 5));
        assert_eq!(config.chart.probing_max, 15);
        assert_eq!(config.geometry.scale_px_per_mm, 3.5);
        assert_eq!(config.geometry.tooth_width, 55.0);
    }

    #[test]
    fn test_validation() {
        assert!(AppConfig::from_toml_str("[chart]\nmargin_min = 6\nmargin_max = 5").is_err());
        assert!(AppConfig::from_toml_str("[chart]\nprobing_min = 9\nprobing_max = 2").is_err());
        assert!(AppConfig::from_toml_str("[geometry]\nscale_px_per_mm = 0.0").is_err());
        assert!(AppConfig::from_toml_str("[medication_history]\ncapacity = 0").is_err());
        assert!(AppConfig::from_toml_str("[chart]\nmargin_min = \"low\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[medication_history]\ncapacity = 20").unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.medication_history.capacity, 20);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load_from(dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
