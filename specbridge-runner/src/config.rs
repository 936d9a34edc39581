// Copyright (c) The specbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for specbridge.
//!
//! The built-in [`BridgeConfig::DEFAULT_CONFIG`] is always loaded first, then overlaid with the
//! project's `.config/specbridge.toml` (or an explicitly chosen file).

use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

/// Overall specbridge configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeConfig {
    /// The process-wide root.
    pub engine: EngineConfig,

    /// How notifications are derived from outcomes.
    pub reporting: ReportingConfig,

    /// JUnit output.
    pub junit: JunitConfig,
}

/// The `[engine]` section.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineConfig {
    /// The value of the root segment in unique identifiers.
    pub id: String,

    /// The name shown for the root node.
    pub display_name: String,
}

/// The `[reporting]` section.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReportingConfig {
    /// What to report for a started node whose outcome resolves to ignored.
    pub started_ignored: StartedIgnoredPolicy,
}

/// What to report for a node that already started but resolved to ignored.
///
/// Consumers don't accept a skip for a node that started, so it has to finish one way or the
/// other.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartedIgnoredPolicy {
    /// Report the node as finished successfully.
    #[default]
    Successful,

    /// Report the node as failed, with the skip reason as the message.
    Failed,
}

/// The `[junit]` section.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JunitConfig {
    /// Where to write the report. Relative paths are resolved against the project root when
    /// the config is loaded.
    #[serde(default)]
    pub path: Option<Utf8PathBuf>,

    /// The name of the report.
    pub report_name: String,
}

impl BridgeConfig {
    /// The default location of the config file, relative to the project root.
    pub const CONFIG_PATH: &'static str = ".config/specbridge.toml";

    /// The default configuration, as TOML.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Loads config for a project rooted at `workspace_root`.
    ///
    /// If `config_file` is `None`, `.config/specbridge.toml` is used if it exists. An explicit
    /// `config_file` must exist.
    pub fn from_sources(
        workspace_root: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (
                file.to_owned(),
                File::new(file.as_str(), FileFormat::Toml),
            ),
            None => {
                let file = workspace_root.join(Self::CONFIG_PATH);
                let source = File::new(file.as_str(), FileFormat::Toml).required(false);
                (file, source)
            }
        };

        let config = Config::builder()
            .add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(source)
            .build()
            .map_err(|error| {
                ConfigParseError::new(
                    config_file.clone(),
                    ConfigParseErrorKind::BuildError(Box::new(error)),
                )
            })?;

        let mut config = Self::deserialize_config(config).map_err(|error| {
            ConfigParseError::new(
                config_file.clone(),
                ConfigParseErrorKind::DeserializeError(Box::new(error)),
            )
        })?;

        if let Some(path) = &mut config.junit.path
            && path.is_relative()
        {
            *path = workspace_root.join(&*path);
        }
        Ok(config)
    }

    fn deserialize_config(config: Config) -> Result<Self, config::ConfigError> {
        let mut ignored = BTreeSet::new();
        let config: BridgeConfig = serde_ignored::deserialize(config, |path| {
            ignored.insert(path.to_string());
        })?;
        for path in &ignored {
            warn!("ignoring unknown configuration key: {path}");
        }
        Ok(config)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                id: "specbridge".to_owned(),
                display_name: "Specbridge".to_owned(),
            },
            reporting: ReportingConfig {
                started_ignored: StartedIgnoredPolicy::Successful,
            },
            junit: JunitConfig {
                path: None,
                report_name: "specbridge-run".to_owned(),
            },
        }
    }
}
