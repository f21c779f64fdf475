//! Layered configuration: defaults, then a TOML file, then environment.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use idgraph_graph::{GraphConfig, SyncOptions};
use idgraph_msgraph::MsGraphConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub neo4j: GraphConfig,
    pub msgraph: MsGraphConfig,
    pub sync: SyncOptions,
}

impl AppConfig {
    /// Load `path` if given (it must exist), else the default config file if
    /// present, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("idgraph").join("config.toml"))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let strings: [(&str, &mut String); 7] = [
            ("NEO4J_URI", &mut self.neo4j.uri),
            ("NEO4J_USER", &mut self.neo4j.user),
            ("NEO4J_PASSWORD", &mut self.neo4j.password),
            ("NEO4J_DATABASE", &mut self.neo4j.database),
            ("MSGRAPH_TENANT_ID", &mut self.msgraph.tenant_id),
            ("MSGRAPH_CLIENT_ID", &mut self.msgraph.client_id),
            ("MSGRAPH_CLIENT_SECRET", &mut self.msgraph.client_secret),
        ];
        for (key, field) in strings {
            if let Some(value) = lookup(key) {
                *field = value;
            }
        }

        if let Some(value) = lookup("IDGRAPH_REQUIRE_FULL_SUCCESS") {
            self.sync.require_full_success = parse_bool("IDGRAPH_REQUIRE_FULL_SUCCESS", &value)?;
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("{key} must be a boolean, got '{other}'"),
    }
}
