use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    oracle::llm::{LlmBackendConfig, ReliabilityConfig},
    runner::TaskSetting,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub settings: BTreeMap<String, TaskSetting>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub backend: LlmBackendConfig,
    #[serde(default)]
    pub reliability: ReliabilityConfig,
    #[serde(default = "enabled")]
    pub memoize: bool,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackendConfig::default(),
            reliability: ReliabilityConfig::default(),
            memoize: true,
            cache_dir: None,
        }
    }
}

fn enabled() -> bool {
    true
}

fn default_logging_dir() -> PathBuf {
    PathBuf::from("./logs/safeguard")
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_rotation() -> LoggingRotation {
    LoggingRotation::Daily
}

fn default_logging_retention_days() -> usize {
    14
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default = "default_logging_rotation")]
    pub rotation: LoggingRotation,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
    #[serde(default = "enabled")]
    pub stderr_warn_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            rotation: default_logging_rotation(),
            retention_days: default_logging_retention_days(),
            stderr_warn_enabled: true,
        }
    }
}

const SCHEMA_FILE_NAME: &str = "safeguard.schema.json";

impl Config {
    /// Reads a JSONC file, checks it against its schema, then deserializes it. Relative paths in
    /// the result are anchored at the file's directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        let raw = read_json5(config_path)?;
        let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

        let schema_path = schema_location(base_dir, &raw)?;
        check_schema(&raw, &schema_path)?;

        let mut config = serde_json::from_value::<Config>(raw)
            .with_context(|| format!("config {} has an unexpected shape", config_path.display()))?;
        config.anchor_paths(base_dir);
        Ok(config)
    }

    fn anchor_paths(&mut self, base_dir: &Path) {
        if self.logging.dir.is_relative() {
            self.logging.dir = base_dir.join(&self.logging.dir);
        }
        if let Some(cache_dir) = self.oracle.cache_dir.take() {
            self.oracle.cache_dir = Some(if cache_dir.is_relative() {
                base_dir.join(cache_dir)
            } else {
                cache_dir
            });
        }
    }
}

fn read_json5(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    json5::from_str(&text).with_context(|| format!("config {} is not valid JSON5", path.display()))
}

/// `$schema` from the file wins; otherwise the schema must sit next to the config.
fn schema_location(base_dir: &Path, raw: &Value) -> Result<PathBuf> {
    match raw.get("$schema").and_then(Value::as_str) {
        Some(declared) => Ok(base_dir.join(declared)),
        None => {
            let sibling = base_dir.join(SCHEMA_FILE_NAME);
            if sibling.is_file() {
                Ok(sibling)
            } else {
                Err(anyhow!(
                    "no schema for config: set $schema or place {SCHEMA_FILE_NAME} beside it"
                ))
            }
        }
    }
}

fn check_schema(raw: &Value, schema_path: &Path) -> Result<()> {
    let schema_text = fs::read_to_string(schema_path)
        .with_context(|| format!("cannot read schema {}", schema_path.display()))?;
    let schema = serde_json::from_str::<Value>(&schema_text)
        .with_context(|| format!("schema {} is not valid JSON", schema_path.display()))?;
    let validator = JSONSchema::compile(&schema)
        .map_err(|err| anyhow!("schema {} does not compile: {err}", schema_path.display()))?;

    if let Err(errors) = validator.validate(raw) {
        let problems = errors
            .map(|error| format!("{} at '{}'", error, error.instance_path))
            .collect::<Vec<_>>();
        return Err(anyhow!("config validation failed: {}", problems.join("; ")));
    }
    Ok(())
}
