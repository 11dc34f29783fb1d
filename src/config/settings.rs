use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ModsecError, Result};

/// Toolchain-level configuration, loaded from `.modsec.toml`.
///
/// Every field has a sensible default so modsec works out-of-the-box
/// without any settings file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root directory holding the `modular.*` templates.
    #[serde(default = "default_template_root")]
    pub template_root: String,

    /// Directory where key constructors persist and load key material.
    #[serde(default = "default_key_dir")]
    pub key_dir: String,

    /// Directory scanned for named constants (`_5_Ep` style symbols).
    #[serde(default = "default_user_dir")]
    pub user_dir: String,

    /// Directory the `generate` command writes artifacts into.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Per-scheme implementation version suffix for `.inc`/`.cpp` templates.
    ///
    /// Example: `seal = "_v2"` selects `modular.seal_v2.inc`.
    #[serde(default)]
    pub impl_versions: BTreeMap<String, String>,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_template_root() -> String {
    "templates".to_string()
}

fn default_key_dir() -> String {
    "keys".to_string()
}

fn default_user_dir() -> String {
    ".".to_string()
}

fn default_output_dir() -> String {
    "generated".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            template_root: default_template_root(),
            key_dir: default_key_dir(),
            user_dir: default_user_dir(),
            output_dir: default_output_dir(),
            impl_versions: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Name of the settings file we look for in the project root.
    const FILE_NAME: &'static str = ".modsec.toml";

    /// Load settings from `<project_dir>/.modsec.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            ModsecError::Config(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Version suffix for a scheme's declarations/implementation templates.
    ///
    /// Schemes without an entry get the empty suffix.
    pub fn impl_version(&self, scheme: &str) -> &str {
        self.impl_versions
            .get(scheme)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Resolve a settings directory relative to the project root.
    pub fn resolve(&self, project_dir: &Path, dir: &str) -> PathBuf {
        project_dir.join(dir)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.template_root, "templates");
        assert_eq!(s.key_dir, "keys");
        assert_eq!(s.user_dir, ".");
        assert_eq!(s.output_dir, "generated");
        assert!(s.impl_versions.is_empty());
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.key_dir, "keys");
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
template_root = "db"
key_dir = "secrets"
user_dir = "src"
output_dir = "out"

[impl_versions]
seal = "_v2"
"#;
        fs::write(tmp.path().join(".modsec.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.template_root, "db");
        assert_eq!(settings.key_dir, "secrets");
        assert_eq!(settings.user_dir, "src");
        assert_eq!(settings.output_dir, "out");
        assert_eq!(settings.impl_version("seal"), "_v2");
        assert_eq!(settings.impl_version("pila"), "");
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".modsec.toml"), "key_dir = \"k\"\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.key_dir, "k");
        // Rest should be defaults
        assert_eq!(settings.template_root, "templates");
        assert_eq!(settings.output_dir, "generated");
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".modsec.toml"), "not valid {{toml").unwrap();

        let result = Settings::load(tmp.path());
        assert!(matches!(result, Err(ModsecError::Config(_))));
    }

    #[test]
    fn resolve_joins_against_project_dir() {
        let s = Settings::default();
        let project = Path::new("/home/user/proj");
        assert_eq!(
            s.resolve(project, &s.key_dir),
            PathBuf::from("/home/user/proj/keys")
        );
    }
}
