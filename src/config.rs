use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::entry::{ComponentDecl, ComponentEntry};
use crate::errors::{ModsyncError, Result};
use crate::verify::VersionPolicyKind;

const APP_DIR: &str = "modsync";

/// Negotiation settings, read-only once a context is built.
///
/// Persisted as TOML in `config.toml` under [`NegotiationConfig::config_dir`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// When false no connection is ever negotiated.
    pub protocol_enabled: bool,
    /// Let peers that cannot take part in negotiation join anyway.
    pub allow_unrecognized_peers: bool,
    pub version_policy: VersionPolicyKind,
    /// Merged into the local canonical set alongside installed components.
    pub extra_required_components: Vec<ComponentDecl>,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            protocol_enabled: true,
            allow_unrecognized_peers: false,
            version_policy: VersionPolicyKind::Any,
            extra_required_components: Vec::new(),
        }
    }
}

impl NegotiationConfig {
    /// `modsync` under `%APPDATA%` on Windows, elsewhere under
    /// `$XDG_CONFIG_HOME` or `$HOME/.config`.
    pub fn config_dir() -> Result<PathBuf> {
        let base = if cfg!(target_os = "windows") {
            env::var_os("APPDATA").map(PathBuf::from)
        } else {
            env::var_os("XDG_CONFIG_HOME")
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
                })
        };
        base.map(|dir| dir.join(APP_DIR)).ok_or_else(|| {
            ModsyncError::Config("unable to determine config directory".to_owned())
        })
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Loads the configuration from the default location, falling back to
    /// defaults when no file exists.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_file()?)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content).map_err(|e| match e {
            ModsyncError::Config(msg) => ModsyncError::Config(format!(
                "failed to parse {}: {}",
                path.display(),
                msg
            )),
            other => other,
        })?;
        Ok(config)
    }

    /// Parses TOML and checks every configured component.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.extra_required_components()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Self::config_file()?)
    }

    /// Writes pretty TOML, creating the parent directory if needed.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn extra_required_components(&self) -> Result<Vec<ComponentEntry>> {
        self.extra_required_components
            .iter()
            .cloned()
            .map(ComponentEntry::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::RequirementLevel;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config =
            NegotiationConfig::load_from(dir.path().join("config.toml")).unwrap();
        assert_eq!(config, NegotiationConfig::default());
        assert!(config.protocol_enabled);
        assert!(!config.allow_unrecognized_peers);
    }

    #[test]
    fn parses_all_options() {
        let config = NegotiationConfig::parse(
            r#"
protocol_enabled = false
allow_unrecognized_peers = true
version_policy = "exact"

[[extra_required_components]]
id = "voicechat"
version = "2.4.0"
requirement = "REQUIRED_ON_EITHER"
"#,
        )
        .unwrap();

        assert!(!config.protocol_enabled);
        assert!(config.allow_unrecognized_peers);
        assert_eq!(config.version_policy, VersionPolicyKind::Exact);
        let extra = config.extra_required_components().unwrap();
        assert_eq!(extra.len(), 1);
        assert_eq!(extra[0].requirement(), RequirementLevel::RequiredOnEither);
    }

    #[test]
    fn malformed_component_fails_loading() {
        let result = NegotiationConfig::parse(
            r#"
[[extra_required_components]]
id = ""
version = "1.0"
requirement = "OPTIONAL"
"#,
        );
        assert!(matches!(result, Err(ModsyncError::MalformedEntry(_))));
    }

    #[test]
    fn unknown_requirement_is_a_config_error() {
        let result = NegotiationConfig::parse(
            r#"
[[extra_required_components]]
id = "x"
version = "1.0"
requirement = "SOMETIMES"
"#,
        );
        assert!(matches!(result, Err(ModsyncError::Config(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = NegotiationConfig {
            allow_unrecognized_peers: true,
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(NegotiationConfig::load_from(&path).unwrap(), config);
    }
}
