mod env_overrides;
pub mod log;
pub mod policy_set;

use config::{Config, File, FileFormat, FileSourceFile};
use envconfig::Envconfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::{
    env_overrides::{EnvVarOverrides, EnvVarOverridesError},
    log::LoggingConfig,
    policy_set::PolicySetConfig,
};

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct AuthzConfig {
    /// The logger configuration.
    #[serde(default)]
    pub log: LoggingConfig,

    /// Policy sets, registered in the order they are listed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_sets: Vec<PolicySetConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthzConfigLoadError {
    #[error("Failed to load configuration: {0}")]
    ConfigLoadError(#[from] config::ConfigError),
    #[error("Failed to apply configuration overrides: {0}")]
    EnvVarOverridesError(#[from] EnvVarOverridesError),
    #[error("Failed to load the environment variables: {0}")]
    EnvVarLoadError(#[from] envconfig::Error),
    #[error("Failed to parse the configuration file path: {0}")]
    ConfigPathParseError(Infallible),
}

static DEFAULT_FILE_NAMES: &[&str] = &[
    "authz.config.yaml",
    "authz.config.yml",
    "authz.config.json",
    "authz.config.json5",
];

/// Reads the configuration file and applies `LOG_*` environment overrides.
///
/// Without an explicit path, the first `authz.config.*` file found in the working
/// directory is used. No file at all yields the defaults.
pub fn load_config(override_config_path: Option<String>) -> Result<AuthzConfig, AuthzConfigLoadError> {
    let env_overrides = EnvVarOverrides::init_from_env()?;
    load_config_with_overrides(override_config_path, env_overrides)
}

fn load_config_with_overrides(
    override_config_path: Option<String>,
    env_overrides: EnvVarOverrides,
) -> Result<AuthzConfig, AuthzConfigLoadError> {
    let mut config = Config::builder();

    if let Some(path_str) = override_config_path {
        let path_buf = path_str
            .parse::<std::path::PathBuf>()
            .map_err(AuthzConfigLoadError::ConfigPathParseError)?;
        let as_file: File<FileSourceFile, _> = path_buf.into();

        config = config.add_source(as_file.required(true));
    } else {
        for name in DEFAULT_FILE_NAMES {
            config = config.add_source(File::with_name(name).required(false));
        }
    }

    config = env_overrides.apply_overrides(config)?;

    Ok(config.build()?.try_deserialize::<AuthzConfig>()?)
}

pub fn parse_yaml_config(config_raw: &str) -> Result<AuthzConfig, AuthzConfigLoadError> {
    Config::builder()
        .add_source(File::from_str(config_raw, FileFormat::Yaml))
        .build()?
        .try_deserialize::<AuthzConfig>()
        .map_err(AuthzConfigLoadError::ConfigLoadError)
}
