use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration. Every numeric heuristic the engine uses lives here
/// as a configurable default; the shipped values are calibration choices,
/// not correctness constraints.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub heuristics: Heuristics,
    #[serde(default)]
    pub duplication: DuplicationConfig,
    #[serde(default)]
    pub ignore: IgnoreConfig,
}

/// Detection thresholds for the smell detectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Function length that triggers a long-method warning.
    #[serde(default = "default_long_method_warn")]
    pub long_method_warn: usize,
    #[serde(default = "default_long_method_major")]
    pub long_method_major: usize,
    #[serde(default = "default_long_method_critical")]
    pub long_method_critical: usize,

    /// Method count that makes a class "large".
    #[serde(default = "default_class_methods")]
    pub class_methods: usize,
    #[serde(default = "default_class_methods_critical")]
    pub class_methods_critical: usize,
    /// Field count that makes a class "large".
    #[serde(default = "default_class_fields")]
    pub class_fields: usize,
    #[serde(default = "default_class_fields_critical")]
    pub class_fields_critical: usize,

    /// Cyclomatic complexity at which a function becomes a hotspot.
    #[serde(default = "default_complexity_hotspot")]
    pub complexity_hotspot: u32,
    #[serde(default = "default_complexity_critical")]
    pub complexity_critical: u32,

    #[serde(default = "default_max_nesting")]
    pub max_nesting: u32,
    #[serde(default = "default_max_parameters")]
    pub max_parameters: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            long_method_warn: default_long_method_warn(),
            long_method_major: default_long_method_major(),
            long_method_critical: default_long_method_critical(),
            class_methods: default_class_methods(),
            class_methods_critical: default_class_methods_critical(),
            class_fields: default_class_fields(),
            class_fields_critical: default_class_fields_critical(),
            complexity_hotspot: default_complexity_hotspot(),
            complexity_critical: default_complexity_critical(),
            max_nesting: default_max_nesting(),
            max_parameters: default_max_parameters(),
        }
    }
}

fn default_long_method_warn() -> usize {
    50
}
fn default_long_method_major() -> usize {
    75
}
fn default_long_method_critical() -> usize {
    100
}
fn default_class_methods() -> usize {
    20
}
fn default_class_methods_critical() -> usize {
    30
}
fn default_class_fields() -> usize {
    15
}
fn default_class_fields_critical() -> usize {
    25
}
fn default_complexity_hotspot() -> u32 {
    10
}
fn default_complexity_critical() -> u32 {
    20
}
fn default_max_nesting() -> u32 {
    4
}
fn default_max_parameters() -> usize {
    5
}

/// Scoring and estimation heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heuristics {
    /// Maintainability index coefficients:
    /// max(0, mi_base - mi_loc_coeff*ln(loc) - mi_complexity_coeff*avg_cc - mi_volume_coeff*ln(loc)).
    #[serde(default = "default_mi_base")]
    pub mi_base: f64,
    #[serde(default = "default_mi_loc_coeff")]
    pub mi_loc_coeff: f64,
    #[serde(default = "default_mi_complexity_coeff")]
    pub mi_complexity_coeff: f64,
    #[serde(default = "default_mi_volume_coeff")]
    pub mi_volume_coeff: f64,

    /// Technical debt estimate: total cyclomatic complexity times this, in hours.
    #[serde(default = "default_debt_hours_per_complexity")]
    pub debt_hours_per_complexity: f64,

    /// Long-method remediation: minutes per N lines over the threshold.
    #[serde(default = "default_minutes_per_excess_lines")]
    pub minutes_per_excess_lines: u32,
    #[serde(default = "default_excess_line_unit")]
    pub excess_line_unit: usize,

    /// Large-class remediation: minutes per member over the threshold.
    #[serde(default = "default_minutes_per_excess_member")]
    pub minutes_per_excess_member: u32,

    /// Suggestion confidence per refactoring kind (0-100).
    #[serde(default = "default_confidence_reduce_complexity")]
    pub confidence_reduce_complexity: u8,
    #[serde(default = "default_confidence_remove_dead_code")]
    pub confidence_remove_dead_code: u8,
    #[serde(default = "default_confidence_extract_method")]
    pub confidence_extract_method: u8,
    #[serde(default = "default_confidence_extract_class")]
    pub confidence_extract_class: u8,
    #[serde(default = "default_confidence_eliminate_duplication")]
    pub confidence_eliminate_duplication: u8,
    #[serde(default = "default_confidence_simplify_conditionals")]
    pub confidence_simplify_conditionals: u8,
    #[serde(default = "default_confidence_modernize")]
    pub confidence_modernize: u8,
    #[serde(default = "default_confidence_organize_imports")]
    pub confidence_organize_imports: u8,

    /// Estimated minutes per step, by risk tier.
    #[serde(default = "default_minutes_high_risk")]
    pub minutes_high_risk: u32,
    #[serde(default = "default_minutes_medium_risk")]
    pub minutes_medium_risk: u32,
    #[serde(default = "default_minutes_low_risk")]
    pub minutes_low_risk: u32,

    /// Medium-risk step count above which a plan is rated medium overall.
    #[serde(default = "default_medium_risk_step_limit")]
    pub medium_risk_step_limit: usize,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            mi_base: default_mi_base(),
            mi_loc_coeff: default_mi_loc_coeff(),
            mi_complexity_coeff: default_mi_complexity_coeff(),
            mi_volume_coeff: default_mi_volume_coeff(),
            debt_hours_per_complexity: default_debt_hours_per_complexity(),
            minutes_per_excess_lines: default_minutes_per_excess_lines(),
            excess_line_unit: default_excess_line_unit(),
            minutes_per_excess_member: default_minutes_per_excess_member(),
            confidence_reduce_complexity: default_confidence_reduce_complexity(),
            confidence_remove_dead_code: default_confidence_remove_dead_code(),
            confidence_extract_method: default_confidence_extract_method(),
            confidence_extract_class: default_confidence_extract_class(),
            confidence_eliminate_duplication: default_confidence_eliminate_duplication(),
            confidence_simplify_conditionals: default_confidence_simplify_conditionals(),
            confidence_modernize: default_confidence_modernize(),
            confidence_organize_imports: default_confidence_organize_imports(),
            minutes_high_risk: default_minutes_high_risk(),
            minutes_medium_risk: default_minutes_medium_risk(),
            minutes_low_risk: default_minutes_low_risk(),
            medium_risk_step_limit: default_medium_risk_step_limit(),
        }
    }
}

fn default_mi_base() -> f64 {
    171.0
}
fn default_mi_loc_coeff() -> f64 {
    5.2
}
fn default_mi_complexity_coeff() -> f64 {
    0.23
}
fn default_mi_volume_coeff() -> f64 {
    16.2
}
fn default_debt_hours_per_complexity() -> f64 {
    0.5
}
fn default_minutes_per_excess_lines() -> u32 {
    15
}
fn default_excess_line_unit() -> usize {
    10
}
fn default_minutes_per_excess_member() -> u32 {
    10
}
fn default_confidence_reduce_complexity() -> u8 {
    85
}
// Lower: the export may be used by callers outside the analyzed set.
fn default_confidence_remove_dead_code() -> u8 {
    70
}
fn default_confidence_extract_method() -> u8 {
    80
}
fn default_confidence_extract_class() -> u8 {
    75
}
fn default_confidence_eliminate_duplication() -> u8 {
    75
}
fn default_confidence_simplify_conditionals() -> u8 {
    80
}
fn default_confidence_modernize() -> u8 {
    60
}
fn default_confidence_organize_imports() -> u8 {
    90
}
fn default_minutes_high_risk() -> u32 {
    60
}
fn default_minutes_medium_risk() -> u32 {
    30
}
fn default_minutes_low_risk() -> u32 {
    15
}
fn default_medium_risk_step_limit() -> usize {
    3
}

/// Duplication detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicationConfig {
    /// Minimum block size (normalized lines) considered a clone.
    #[serde(default = "default_min_lines")]
    pub min_lines: usize,
    /// Similarity floor (0-100) below which blocks are not reported.
    #[serde(default = "default_similarity_floor")]
    pub similarity_floor: u8,
    /// Similarity at or above which a clone is classed structural.
    #[serde(default = "default_structural_similarity")]
    pub structural_similarity: u8,
}

impl Default for DuplicationConfig {
    fn default() -> Self {
        Self {
            min_lines: default_min_lines(),
            similarity_floor: default_similarity_floor(),
            structural_similarity: default_structural_similarity(),
        }
    }
}

fn default_min_lines() -> usize {
    6
}
fn default_similarity_floor() -> u8 {
    60
}
fn default_structural_similarity() -> u8 {
    85
}

/// File discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IgnoreConfig {
    /// Glob patterns excluded from discovery, in addition to .gitignore.
    #[serde(default)]
    pub patterns: Vec<String>,
}

pub const CONFIG_FILE_NAME: &str = "reforge.toml";

impl EngineConfig {
    /// Load configuration from `reforge.toml` under `root`, falling back to
    /// defaults when the file does not exist.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
    }
}

/// Default config file content written by `reforge init`.
pub fn default_config_toml() -> String {
    let config = EngineConfig::default();
    toml::to_string_pretty(&config).unwrap_or_default()
}
