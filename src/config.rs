use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub scoring: Scoring,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub report: Report,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

/// Geometry of the printed answer sheet, in pixels of the scanned image.
///
/// The defaults are calibrated against the physical sheet; changing them only
/// makes sense for a different print template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    pub questions: u32,
    pub choices_per_question: u32,
    pub start_x: f64,
    pub start_y: f64,
    pub circle_width: f64,
    pub circle_height: f64,
    /// Horizontal advance after the first choice of a row.
    pub first_gap: f64,
    /// Horizontal advance after every later choice.
    pub spacing: f64,
    pub vertical_shift: f64,
}
impl Default for Layout {
    fn default() -> Self {
        Self {
            questions: 6,
            choices_per_question: 10,
            start_x: 93.0,
            start_y: 209.0,
            circle_width: 4.15,
            circle_height: 4.15,
            first_gap: 11.85,
            spacing: 9.23,
            vertical_shift: 7.11,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scoring {
    /// A question is answered only when its darkest circle is strictly above this.
    pub darkness_threshold: f64,
    pub dark_brightness: f64,
    pub min_alpha: u8,
}
impl Default for Scoring {
    fn default() -> Self {
        Self {
            darkness_threshold: 0.2,
            dark_brightness: 128.0,
            min_alpha: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    /// 0 disables the check.
    pub max_images: usize,
    /// Decoded size cap per image; 0 disables the check.
    pub max_image_bytes: usize,
}
impl Default for Limits {
    fn default() -> Self {
        Self {
            max_images: 0,
            max_image_bytes: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub sheet_name: String,
    pub error_column: String,
}
impl Default for Report {
    fn default() -> Self {
        Self {
            sheet_name: "SurveyData".into(),
            error_column: "error".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub out_dir: String,
    pub write_excel: bool,
    pub excel_filename: String,
    pub write_results_json: bool,
    pub results_filename: String,
    pub print_summary: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            write_excel: true,
            excel_filename: "survey.xlsx".into(),
            write_results_json: true,
            results_filename: "results.json".into(),
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
