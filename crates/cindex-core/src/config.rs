//! Configuration loading and parsing for cindex
//!
//! Provides functionality to load and parse `cindex.toml` configuration files.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::diagnostic::{DiagnosticKind, Severity};
use crate::semantic::typedefs::DEFAULT_MAX_TYPEDEF_DEPTH;
use crate::semantic::types::BuiltinTypes;

pub const CONFIG_FILENAME: &str = "cindex.toml";

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &[
    "max_typedef_depth",
    "parallel",
    "builtin_types",
    "diagnostics",
];
const KNOWN_DIAGNOSTICS_KEYS: &[&str] = &["severity"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid TOML in '{path}': {message}")]
    ParseError { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct ConfigResult {
    pub config: Config,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub max_typedef_depth: usize,
    pub parallel: bool,
    pub builtin_types: Vec<String>,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_typedef_depth: DEFAULT_MAX_TYPEDEF_DEPTH,
            parallel: true,
            builtin_types: Vec::new(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Keyed by diagnostic code (`X002`) or name (`unknown-field`).
    pub severity: HashMap<String, SeverityValue>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SeverityValue {
    Error,
    Warning,
    Info,
    Hint,
}

impl From<SeverityValue> for Severity {
    fn from(value: SeverityValue) -> Self {
        match value {
            SeverityValue::Error => Severity::Error,
            SeverityValue::Warning => Severity::Warning,
            SeverityValue::Info => Severity::Info,
            SeverityValue::Hint => Severity::Hint,
        }
    }
}

impl Config {
    pub fn severity_for(&self, kind: DiagnosticKind) -> Severity {
        self.diagnostics
            .severity
            .iter()
            .find(|(key, _)| DiagnosticKind::from_key(key) == Some(kind))
            .map(|(_, value)| Severity::from(*value))
            .unwrap_or_else(|| kind.default_severity())
    }

    pub fn builtins(&self) -> BuiltinTypes {
        let mut builtins = BuiltinTypes::with_defaults();
        for name in &self.builtin_types {
            builtins.register(name);
        }
        builtins
    }
}

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })
}

pub fn load_config_with_warnings(path: &Path) -> Result<ConfigResult, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;

    let warnings = detect_unknown_keys(&content);

    Ok(ConfigResult { config, warnings })
}

fn detect_unknown_keys(content: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    let table: toml::Table = match content.parse() {
        Ok(t) => t,
        Err(_) => return warnings,
    };

    let known_top: HashSet<&str> = KNOWN_TOP_LEVEL_KEYS.iter().copied().collect();
    for key in table.keys() {
        if !known_top.contains(key.as_str()) {
            warnings.push(format!("Unknown config option: '{}'", key));
        }
    }

    if let Some(toml::Value::Table(diagnostics)) = table.get("diagnostics") {
        let known: HashSet<&str> = KNOWN_DIAGNOSTICS_KEYS.iter().copied().collect();
        for key in diagnostics.keys() {
            if !known.contains(key.as_str()) {
                warnings.push(format!("Unknown config option in [diagnostics]: '{}'", key));
            }
        }

        if let Some(toml::Value::Table(severity)) = diagnostics.get("severity") {
            for key in severity.keys() {
                if DiagnosticKind::from_key(key).is_none() {
                    warnings.push(format!(
                        "Unknown diagnostic in [diagnostics.severity]: '{}'",
                        key
                    ));
                }
            }
        }
    }

    warnings
}

pub fn load_config_or_default(start_dir: &Path) -> Config {
    find_config_file(start_dir)
        .and_then(|path| load_config(&path).ok())
        .unwrap_or_default()
}

pub fn load_config_or_default_with_warnings(start_dir: &Path) -> ConfigResult {
    match find_config_file(start_dir) {
        Some(path) => load_config_with_warnings(&path).unwrap_or_default(),
        None => ConfigResult::default(),
    }
}
