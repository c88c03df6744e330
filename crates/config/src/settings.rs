// Application settings
// Loaded from ~/.config/termgrid/settings.json

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use termgrid_engine::cell::{DateTimeFormat, NumberFormat};
use termgrid_engine::SheetOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // History
    #[serde(rename = "history.limit")]
    pub history_limit: usize,

    // Viewport
    #[serde(rename = "viewport.retentionDistance")]
    pub retention_distance: u32,

    #[serde(rename = "viewport.rows")]
    pub viewport_rows: u32,

    #[serde(rename = "viewport.cols")]
    pub viewport_cols: u32,

    // Numbers
    #[serde(rename = "number.decimalPoints")]
    pub decimal_points: u8,

    #[serde(rename = "number.thousandsSeparator")]
    pub thousands_separator: char,

    #[serde(rename = "number.decimalSeparator")]
    pub decimal_separator: char,

    #[serde(rename = "number.financialSign")]
    pub financial_sign: char,

    // Dates: "auto", "date", "time" or "datetime"
    #[serde(rename = "dateTime.format")]
    pub date_time_format: String,

    // Cells
    #[serde(rename = "cell.minWidth")]
    pub min_cell_width: u16,

    #[serde(rename = "cell.maxWidth")]
    pub max_cell_width: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_limit: 100,
            retention_distance: 100,
            viewport_rows: 20,
            viewport_cols: 8,
            decimal_points: 2,
            thousands_separator: ',',
            decimal_separator: '.',
            financial_sign: '$',
            date_time_format: "auto".to_string(),
            min_cell_width: 10,
            max_cell_width: 40,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("termgrid");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                // Strip comments (lines starting with //)
                let cleaned: String = contents
                    .lines()
                    .filter(|line| !line.trim().starts_with("//"))
                    .collect::<Vec<_>>()
                    .join("\n");

                match serde_json::from_str(&cleaned) {
                    Ok(settings) => settings,
                    Err(e) => {
                        log::warn!("error parsing {}: {}; using default settings", path.display(), e);
                        Self::default()
                    }
                }
            }
            Err(e) => {
                log::warn!("error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;

        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }

    /// Engine options for new sheets. An unknown date format name falls back to auto.
    pub fn sheet_options(&self) -> SheetOptions {
        let date_time_format = DateTimeFormat::parse(&self.date_time_format).unwrap_or_else(|| {
            log::warn!("unknown date format '{}', using auto", self.date_time_format);
            DateTimeFormat::Auto
        });
        let min_width = self.min_cell_width.max(1);

        SheetOptions {
            history_limit: self.history_limit,
            retention_distance: self.retention_distance,
            view_rows: self.viewport_rows.max(1),
            view_cols: self.viewport_cols.max(1),
            number_format: NumberFormat {
                decimal_points: self.decimal_points,
                thousands_separator: self.thousands_separator,
                decimal_separator: self.decimal_separator,
                financial_sign: self.financial_sign,
            },
            date_time_format,
            min_width,
            max_width: self.max_cell_width.max(min_width),
        }
    }
}
