//! Configuration file handling

use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use schemawalk_core::{SqlDialect, WalkThroughConfig};

use crate::args::{OutputFormat, WalkArgs};

/// Contents of `schemawalk.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON snapshot of the database the scripts run against
    pub snapshot: Option<String>,

    /// SQL file patterns to check
    #[serde(default)]
    pub files: Vec<String>,

    /// SQL dialect name
    pub dialect: Option<String>,

    /// Output format (human, json, sarif)
    pub format: Option<String>,

    /// Report references to unknown objects (default true)
    pub check_integrity: Option<bool>,

    /// Maximum number of keys per index
    pub max_index_keys: Option<usize>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).into_diagnostic()?;
        let config: Config = toml::from_str(&contents).into_diagnostic()?;
        Ok(config)
    }

    /// Load an explicit file, or look for schemawalk.toml in the current and parent directories
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::find_and_load()?.unwrap_or_default()),
        }
    }

    pub fn find_and_load() -> Result<Option<Self>> {
        let mut current_dir = std::env::current_dir().into_diagnostic()?;

        loop {
            let config_path = current_dir.join("schemawalk.toml");
            if config_path.exists() {
                return Ok(Some(Self::from_file(&config_path)?));
            }

            if !current_dir.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Merge CLI arguments into configuration.
    /// CLI arguments take precedence over config file values.
    pub fn merge_with_args(
        mut self,
        files: &[PathBuf],
        walk: &WalkArgs,
        format: Option<OutputFormat>,
    ) -> Self {
        if !files.is_empty() {
            self.files = files.iter().map(|p| p.display().to_string()).collect();
        }

        if let Some(snapshot) = &walk.snapshot {
            self.snapshot = Some(snapshot.display().to_string());
        }

        if walk.dialect.is_some() {
            self.dialect = walk.dialect.clone();
        }

        if walk.no_check_integrity {
            self.check_integrity = Some(false);
        }

        if walk.max_index_keys.is_some() {
            self.max_index_keys = walk.max_index_keys;
        }

        if let Some(fmt) = format {
            self.format = Some(format!("{:?}", fmt).to_lowercase());
        }

        self
    }

    pub fn walk_through_config(&self) -> Result<WalkThroughConfig> {
        let dialect: SqlDialect = match &self.dialect {
            Some(name) => name.parse().map_err(|e: String| miette::miette!(e))?,
            None => SqlDialect::default(),
        };
        let mut config =
            WalkThroughConfig::new(dialect).with_check_integrity(self.check_integrity.unwrap_or(true));
        if let Some(limit) = self.max_index_keys {
            config = config.with_max_index_keys(limit);
        }
        Ok(config)
    }

    pub fn output_format(&self) -> OutputFormat {
        match self.format.as_deref() {
            Some("json") => OutputFormat::Json,
            Some("sarif") => OutputFormat::Sarif,
            _ => OutputFormat::Human,
        }
    }
}
