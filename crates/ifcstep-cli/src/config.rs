//! Tool configuration, loaded from TOML.
//!
//! ```toml
//! [read]
//! parallel = true
//! link_inverses = true
//!
//! [write]
//! sort_by_id = false
//!
//! [copy]
//! fresh_guid_types = ["IfcGloballyUniqueId"]
//!
//! [copy.modes]
//! IfcOwnerHistory = "shallow"
//! IfcRepresentationContext = "shallow"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use ifcstep::schema::Schema;
use ifcstep::{CopyOptions, ReadOptions, WriteOptions};
use serde::{Deserialize, Serialize};

/// Options for every command, grouped by stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reader options.
    pub read: ReadOptions,
    /// Writer options.
    pub write: WriteOptions,
    /// Deep copy policy.
    pub copy: CopyOptions,
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Load a configuration file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Check every section; copy modes must name types of `schema`.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        self.read.validate()?;
        self.write.validate()?;
        self.copy.validate(schema)?;
        Ok(())
    }
}
