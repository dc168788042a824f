// Configuration for the engine and the `ifusergroup` tag, loadable from TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Drop the newline directly after a `{% ... %}` tag
    #[serde(default)]
    pub trim_blocks: bool,

    #[serde(default)]
    pub directive: DirectiveConfig,
}

/// Options for the `ifusergroup` tag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectiveConfig {
    #[serde(default = "default_tag_name")]
    pub tag_name: String,

    #[serde(default = "default_else_tag")]
    pub else_tag: String,

    #[serde(default = "default_end_tag")]
    pub end_tag: String,

    /// Stop checking the remaining groups as soon as one reference names
    /// neither a group nor a variable holding a group name. With `false`
    /// the unresolved reference is skipped instead.
    #[serde(default = "default_true")]
    pub stop_on_first_unresolved: bool,
}

fn default_tag_name() -> String {
    "ifusergroup".to_string()
}

fn default_else_tag() -> String {
    "else".to_string()
}

fn default_end_tag() -> String {
    "endifusergroup".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for DirectiveConfig {
    fn default() -> Self {
        Self {
            tag_name: default_tag_name(),
            else_tag: default_else_tag(),
            end_tag: default_end_tag(),
            stop_on_first_unresolved: true,
        }
    }
}

/// Read `path` as TOML. A missing or blank file yields the defaults.
fn load_toml<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {:?}: {}", path, e)))?;

    parse_toml(&content)
        .map_err(|e| Error::Config(format!("failed to parse {:?}: {}", path, e)))
}

fn parse_toml<T>(content: &str) -> std::result::Result<T, String>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    toml::from_str(content).map_err(|e| e.to_string())
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        parse_toml(content).map_err(Error::Config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_toml(path.as_ref())
    }
}

impl DirectiveConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        parse_toml(content).map_err(Error::Config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_toml(path.as_ref())
    }
}
