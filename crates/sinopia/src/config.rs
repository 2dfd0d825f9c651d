//! Configuration file loading for sinopia.
//!
//! Reads `sinopia.config.json` from the current working directory.

use serde::{Deserialize, Serialize};
use sinopia_fresco::Environment;
use sinopia_relief::CompilerOptions;
use std::path::Path;
use tracing::warn;

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "sinopia.config.json";

/// Top-level sinopia configuration.
#[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SinopiaConfig {
    /// JSON Schema reference (for editor autocompletion).
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Template compiler configuration.
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Runtime configuration for `render`.
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Configuration for the `compile` command.
#[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerConfig {
    /// Fragment markers, e.g. `["{{", "}}"]`. Defaults to `["[[", "]]"]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markers: Option<(String, String)>,

    /// How diagnostics name their source file.
    #[serde(default)]
    pub origin: OriginStyle,
}

/// Source naming in diagnostics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginStyle {
    /// The path as given on the command line
    #[default]
    Path,
    /// The file name only
    Name,
}

/// Configuration for the `render` command.
#[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Global names visible to every evaluator.
    #[serde(default)]
    pub globals: serde_json::Map<String, serde_json::Value>,
}

impl SinopiaConfig {
    /// Compiler options for the template at `path`.
    pub fn compiler_options(&self, path: &Path) -> CompilerOptions {
        let origin = match self.compiler.origin {
            OriginStyle::Path => path.display().to_string(),
            OriginStyle::Name => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        };
        let mut options = CompilerOptions::with_origin(origin);
        if let Some(markers) = &self.compiler.markers {
            options.markers = markers.clone();
        }
        options
    }

    /// Runtime environment built from the configured globals.
    pub fn environment(&self) -> Environment {
        Environment {
            globals: self.runtime.globals.clone(),
        }
    }
}

/// Load `sinopia.config.json` from the given directory (or CWD if None).
///
/// A missing file yields the defaults; an unreadable or malformed one is
/// reported and also yields the defaults.
pub fn load_config(dir: Option<&Path>) -> SinopiaConfig {
    let base = dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    let config_path = base.join(CONFIG_FILE);

    if !config_path.exists() {
        return SinopiaConfig::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => parse_config(&content, &config_path),
        Err(e) => {
            warn!("Failed to read {}: {}", config_path.display(), e);
            SinopiaConfig::default()
        }
    }
}

fn parse_config(content: &str, config_path: &Path) -> SinopiaConfig {
    match serde_json::from_str(content) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to parse {}: {}", config_path.display(), e);
            SinopiaConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> SinopiaConfig {
        parse_config(content, Path::new(CONFIG_FILE))
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(parse("{}"), SinopiaConfig::default());
    }

    #[test]
    fn malformed_falls_back_to_default() {
        assert_eq!(parse("{ \"compiler\": "), SinopiaConfig::default());
        assert_eq!(parse(r#"{ "unknown": 1 }"#), SinopiaConfig::default());
    }

    #[test]
    fn markers_and_origin() {
        let config = parse(r#"{ "compiler": { "markers": ["{{", "}}"], "origin": "name" } }"#);
        let options = config.compiler_options(Path::new("site/pages/index.html"));
        assert_eq!(options.open_marker(), "{{");
        assert_eq!(options.close_marker(), "}}");
        assert_eq!(options.origin, "index.html");

        let options = SinopiaConfig::default().compiler_options(Path::new("site/index.html"));
        assert_eq!(options.open_marker(), "[[");
        assert_eq!(options.origin, "site/index.html");
    }

    #[test]
    fn globals_become_environment() {
        let config = parse(r#"{ "runtime": { "globals": { "title": "Home", "limit": 3 } } }"#);
        let env = config.environment();
        assert_eq!(env.globals.get("title"), Some(&serde_json::json!("Home")));
        assert_eq!(env.globals.get("limit"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn missing_file_is_default() {
        let dir = std::env::temp_dir().join("sinopia-config-missing");
        assert_eq!(load_config(Some(&dir)), SinopiaConfig::default());
    }
}
