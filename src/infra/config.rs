//! Configuration loading from TOML files
//!
//! Config file is selected via `--config <path>` (default: config/dev.toml).
//! Every section is optional; missing values fall back to the guardrail
//! deployment defaults.

use crate::domain::event::EventFields;
use crate::io::http::RetryPolicy;
use crate::io::source::SourceFields;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// SQLite database holding the feature table
    pub database: String,
    pub table: String,
    pub fields: SourceFields,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database: "data/guardrails.sqlite".to_string(),
            table: "GuardRails".to_string(),
            fields: SourceFields::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LrsConfig {
    pub locate_url: String,
    pub apply_edits_url: String,
    pub event_layer_id: u32,
    /// Snapping distance for geometryToMeasure, in map units
    pub tolerance: f64,
    pub timeout_ms: u64,
    pub retry_backoff_ms: u64,
    pub retry_transient: bool,
}

impl Default for LrsConfig {
    fn default() -> Self {
        Self {
            locate_url: "http://localhost:6080/arcgis/rest/services/LRS/MapServer/exts/LRSServer/networkLayers/15/geometryToMeasure".to_string(),
            apply_edits_url: "http://localhost:6080/arcgis/rest/services/LRS/MapServer/exts/LRSServer/applyEdits".to_string(),
            event_layer_id: 12,
            tolerance: 300.0,
            timeout_ms: 30_000,
            retry_backoff_ms: 500,
            retry_transient: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AttributesConfig {
    /// Source fields copied to the event under the same name
    pub passthrough: Vec<String>,
}

impl Default for AttributesConfig {
    fn default() -> Self {
        Self { passthrough: vec!["GUARDRAIL_END_TYPE".to_string(), "GUARDRAIL_TYPE".to_string()] }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// File path for submitted events (JSONL format)
    pub file: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { file: "submitted_events.jsonl".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TomlConfig {
    pub source: SourceConfig,
    pub lrs: LrsConfig,
    pub event_fields: EventFields,
    pub attributes: AttributesConfig,
    pub journal: JournalConfig,
}

/// Immutable run configuration handed to each component at construction
#[derive(Debug, Clone)]
pub struct Config {
    source: SourceConfig,
    lrs: LrsConfig,
    event_fields: EventFields,
    passthrough: Vec<String>,
    journal_file: String,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            source: toml_config.source,
            lrs: toml_config.lrs,
            event_fields: toml_config.event_fields,
            passthrough: toml_config.attributes.passthrough,
            journal_file: toml_config.journal.file,
            config_file: config_file.to_string(),
        }
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str, config_file: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content)
            .with_context(|| format!("Failed to parse config file {}", config_file))?;
        let config = Self::from_toml(toml_config, config_file);
        config.validate().with_context(|| format!("Invalid config file {}", config_file))?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.lrs.locate_url.trim().is_empty() {
            bail!("lrs.locate_url must not be empty");
        }
        if self.lrs.apply_edits_url.trim().is_empty() {
            bail!("lrs.apply_edits_url must not be empty");
        }
        if !self.lrs.tolerance.is_finite() || self.lrs.tolerance < 0.0 {
            bail!("lrs.tolerance must be a non-negative number, got {}", self.lrs.tolerance);
        }
        if self.lrs.timeout_ms == 0 {
            bail!("lrs.timeout_ms must be greater than zero");
        }
        if self.source.table.trim().is_empty() {
            bail!("source.table must not be empty");
        }
        if self.source.fields.names().iter().any(|name| name.trim().is_empty()) {
            bail!("source.fields entries must not be empty");
        }
        if self.event_fields.names().iter().any(|name| name.trim().is_empty()) {
            bail!("event_fields entries must not be empty");
        }

        let core: HashSet<&str> = self.event_fields.names().into_iter().collect();
        let mut seen = HashSet::new();
        for name in &self.passthrough {
            if name.trim().is_empty() {
                bail!("attributes.passthrough entries must not be empty");
            }
            if core.contains(name.as_str()) {
                bail!("passthrough attribute {} collides with an event core field", name);
            }
            if !seen.insert(name.as_str()) {
                bail!("passthrough attribute {} listed twice", name);
            }
        }
        Ok(())
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    pub fn source_fields(&self) -> &SourceFields {
        &self.source.fields
    }

    pub fn database(&self) -> &str {
        &self.source.database
    }

    pub fn table(&self) -> &str {
        &self.source.table
    }

    pub fn locate_url(&self) -> &str {
        &self.lrs.locate_url
    }

    pub fn apply_edits_url(&self) -> &str {
        &self.lrs.apply_edits_url
    }

    pub fn event_layer_id(&self) -> u32 {
        self.lrs.event_layer_id
    }

    pub fn tolerance(&self) -> f64 {
        self.lrs.tolerance
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.lrs.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retry_transient: self.lrs.retry_transient,
            backoff: Duration::from_millis(self.lrs.retry_backoff_ms),
        }
    }

    pub fn event_fields(&self) -> &EventFields {
        &self.event_fields
    }

    pub fn passthrough(&self) -> &[String] {
        &self.passthrough
    }

    pub fn journal_file(&self) -> &str {
        &self.journal_file
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to point at another database
    pub fn with_database(mut self, database: &str) -> Self {
        self.source.database = database.to_string();
        self
    }

    /// Builder method for tests to redirect the journal
    pub fn with_journal_file(mut self, file: &str) -> Self {
        self.journal_file = file.to_string();
        self
    }
}
