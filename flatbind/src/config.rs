//! Configuration types for `flatbind.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration.
///
/// Selection lists accept qualified (`geometry::Shape`) or unqualified
/// (`Shape`) names; a single `"*"` entry selects everything of that kind.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub output: OutputConfig,
    /// Program database file — the upstream analyzer's JSON dump of the
    /// entity model.
    pub database: PathBuf,
    /// Headers to `#include` verbatim at the top of the generated unit.
    /// Discovery and path relativization happen upstream.
    #[serde(default)]
    pub includes: Vec<String>,
    /// Classes to wrap.
    #[serde(default)]
    pub classes: Vec<String>,
    /// Global functions to wrap.
    #[serde(default)]
    pub functions: Vec<String>,
    /// Enumerated types to register.
    #[serde(default)]
    pub enums: Vec<String>,
    /// Typedefs to register (encapsulated or forwarded).
    #[serde(default)]
    pub typedefs: Vec<String>,
    #[serde(default)]
    pub interceptors: InterceptorConfig,
    /// Overrides the randomized wrapping namespace, for reproducible
    /// output (e.g. in tests or content-addressed build systems).
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Output file settings.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Generated C++ file path (e.g. `mylib_registration.cc`).
    #[serde(default = "default_output_file")]
    pub file: PathBuf,
}

fn default_output_file() -> PathBuf {
    PathBuf::from("flatbind_registration.cc")
}

/// Which classes get interceptor subclasses.
#[derive(Debug, Default, Deserialize)]
pub struct InterceptorConfig {
    /// List every polymorphic subject automatically.
    #[serde(default)]
    pub auto: bool,
    /// Explicitly requested classes, honored regardless of `auto`.
    #[serde(default)]
    pub classes: Vec<String>,
}

/// Load and parse a `flatbind.toml` configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {}", path.display(), e))?;
    Ok(config)
}
