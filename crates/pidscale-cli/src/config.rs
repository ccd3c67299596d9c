//! Plugin-wide config file.
//!
//! ```toml
//! [strategy]
//! target = 50
//! proportional_factor = 0.5
//! output_coefficients = [0.0, 1.0]
//! output_quantification = "round"
//! ```
//!
//! Values may be written as TOML scalars; they are converted to the string
//! form the strategy expects. Arrays become comma-separated lists.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use pidscale_strategy::ConfigLayer;

#[derive(Debug, Default, Deserialize)]
pub struct PluginConfigFile {
    #[serde(default)]
    pub strategy: HashMap<String, toml::Value>,
}

impl PluginConfigFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Convert the `[strategy]` table into a config layer.
    pub fn to_layer(&self) -> Result<ConfigLayer> {
        let mut layer = ConfigLayer::new();
        for (key, value) in &self.strategy {
            let raw = match value {
                toml::Value::Array(items) => items
                    .iter()
                    .map(|item| scalar(key, item))
                    .collect::<Result<Vec<_>>>()?
                    .join(", "),
                other => scalar(key, other)?,
            };
            layer.insert(key.as_str(), raw);
        }
        Ok(layer)
    }
}

fn scalar(key: &str, value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        other => bail!("strategy.{key}: unsupported value type {}", other.type_str()),
    }
}
