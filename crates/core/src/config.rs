//! TOML-based configuration system for MergeFlow.
//!
//! Program names for the external editor and shell can be given directly or
//! looked up from environment variables named by the `_env` fields. Lookups
//! happen at runtime via [`MergeFlowConfig::resolve_env_vars`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeFlowConfig {
    /// Logging settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// How the `git` binary is invoked.
    #[serde(default)]
    pub git: GitConfig,

    /// External editor and shell.
    #[serde(default)]
    pub launch: LaunchConfig,
}

// ---------------------------------------------------------------------------
// General
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Git
// ---------------------------------------------------------------------------

/// Settings for the `git` command used to continue and abort operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Path or name of the git executable.
    #[serde(default = "default_git_binary")]
    pub binary: String,

    /// `GIT_EDITOR` while continuing, so git never stops for a message.
    #[serde(default = "default_continue_editor")]
    pub continue_editor: String,
}

fn default_git_binary() -> String {
    "git".into()
}
fn default_continue_editor() -> String {
    "true".into()
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            continue_editor: default_continue_editor(),
        }
    }
}

// ---------------------------------------------------------------------------
// Launch
// ---------------------------------------------------------------------------

/// External editor and shell settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Editor command line, e.g. `code --wait`. Falls back to `editor_env`.
    #[serde(default)]
    pub editor: Option<String>,

    /// Environment variable consulted when `editor` is unset.
    #[serde(default = "default_editor_env")]
    pub editor_env: String,

    /// Block until the editor exits (needed for terminal editors).
    #[serde(default = "default_true")]
    pub wait_for_editor: bool,

    /// Shell program. Falls back to `shell_env`.
    #[serde(default)]
    pub shell: Option<String>,

    /// Environment variable consulted when `shell` is unset.
    #[serde(default = "default_shell_env")]
    pub shell_env: String,
}

fn default_editor_env() -> String {
    "VISUAL".into()
}
fn default_shell_env() -> String {
    "SHELL".into()
}
fn default_true() -> bool {
    true
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            editor: None,
            editor_env: default_editor_env(),
            wait_for_editor: true,
            shell: None,
            shell_env: default_shell_env(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl MergeFlowConfig {
    /// Load a [`MergeFlowConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize back to TOML, e.g. to write a starter config file.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Fill unset editor / shell programs from their environment variables.
    ///
    /// Missing variables only log a warning; launching later reports
    /// [`LaunchError::NotConfigured`](crate::errors::LaunchError::NotConfigured).
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if self.launch.editor.is_none() {
            self.launch.editor = resolve_optional_env(&self.launch.editor_env, "launch.editor_env")
                .or_else(|| resolve_optional_env("EDITOR", "launch.editor_env"));
        }
        if self.launch.shell.is_none() {
            self.launch.shell = resolve_optional_env(&self.launch.shell_env, "launch.shell_env");
        }
        Ok(())
    }

    /// Validate the configuration, returning the first error found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".into(),
                detail: format!(
                    "'{}' is not one of {}",
                    self.general.log_level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }
        if self.git.binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "git.binary".into(),
                detail: "git binary must not be empty".into(),
            });
        }
        if self.git.continue_editor.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "git.continue_editor".into(),
                detail: "continue editor must not be empty".into(),
            });
        }
        if matches!(self.launch.editor.as_deref(), Some(e) if e.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "launch.editor".into(),
                detail: "editor must not be empty when set".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs and returns `None` if the variable is unset or empty.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.trim().is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            debug!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[general]
log_level = "debug"

[git]
binary = "/usr/bin/git"
continue_editor = ":"

[launch]
editor = "code --wait"
wait_for_editor = false
shell = "/bin/zsh"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config = MergeFlowConfig::from_toml_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.git.binary, "/usr/bin/git");
        assert_eq!(config.git.continue_editor, ":");
        assert_eq!(config.launch.editor.as_deref(), Some("code --wait"));
        assert!(!config.launch.wait_for_editor);
        assert_eq!(config.launch.shell.as_deref(), Some("/bin/zsh"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = MergeFlowConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.general.log_level, "debug");
    }

    #[test]
    fn test_file_not_found() {
        let result = MergeFlowConfig::load_from_file("/nonexistent/mergeflow.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = MergeFlowConfig::from_toml_str("[git\nbinary = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_rejects_bad_log_level() {
        let mut config = MergeFlowConfig::default();
        config.general.log_level = "loud".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "general.log_level"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_git_binary() {
        let mut config = MergeFlowConfig::default();
        config.git.binary = "  ".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "git.binary"
        ));
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("MERGEFLOW_TEST_EDITOR", "vim");
        std::env::set_var("MERGEFLOW_TEST_SHELL", "/bin/bash");

        let toml_str = r#"
[launch]
editor_env = "MERGEFLOW_TEST_EDITOR"
shell_env = "MERGEFLOW_TEST_SHELL"
"#;
        let mut config = MergeFlowConfig::from_toml_str(toml_str).unwrap();
        config.resolve_env_vars().unwrap();

        assert_eq!(config.launch.editor.as_deref(), Some("vim"));
        assert_eq!(config.launch.shell.as_deref(), Some("/bin/bash"));

        // Clean up
        std::env::remove_var("MERGEFLOW_TEST_EDITOR");
        std::env::remove_var("MERGEFLOW_TEST_SHELL");
    }

    #[test]
    fn test_explicit_editor_wins_over_env() {
        std::env::set_var("MERGEFLOW_TEST_EDITOR_2", "nano");
        let toml_str = r#"
[launch]
editor = "hx"
editor_env = "MERGEFLOW_TEST_EDITOR_2"
"#;
        let mut config = MergeFlowConfig::from_toml_str(toml_str).unwrap();
        config.resolve_env_vars().unwrap();
        assert_eq!(config.launch.editor.as_deref(), Some("hx"));
        std::env::remove_var("MERGEFLOW_TEST_EDITOR_2");
    }

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let config = MergeFlowConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = MergeFlowConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.general.log_level, "warn");
        assert_eq!(parsed.git.binary, "git");
        assert_eq!(parsed.git.continue_editor, "true");
        assert_eq!(parsed.launch.editor_env, "VISUAL");
        assert!(parsed.launch.wait_for_editor);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_load_and_resolve_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mergeflow.toml");

        std::fs::write(&path, "[general]\nlog_level = \"debug\"\n").unwrap();
        let config = MergeFlowConfig::load_and_resolve(&path).unwrap();
        assert_eq!(config.general.log_level, "debug");

        std::fs::write(&path, "[general]\nlog_level = \"chatty\"\n").unwrap();
        let err = MergeFlowConfig::load_and_resolve(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "general.log_level"));

        let missing = dir.path().join("absent.toml");
        assert!(MergeFlowConfig::load_and_resolve(&missing).is_err());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = MergeFlowConfig::from_toml_str("").unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.launch.shell_env, "SHELL");
    }
}
