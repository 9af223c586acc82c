//! LM provider configuration.
//!
//! Every setting is resolved independently through an ordered list of
//! sources; the first non-empty value wins:
//!
//! 1. command-line flags
//! 2. workspace config (`.charter/config.json`)
//! 3. user config (`<config dir>/charter-coach/config.json`)
//! 4. environment variables
//! 5. built-in defaults (base URL, model, timeout only)
//!
//! A resolved `lm_command` selects the command provider; otherwise an
//! `api_key` selects the HTTP provider. With neither, the LM is unavailable
//! and the workflow reports missing credentials instead of calling out.
use crate::lm::command::CommandProvider;
use crate::lm::http::HttpProvider;
use crate::lm::log::LoggedProvider;
use crate::lm::LmProvider;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const ENV_LM_COMMAND: &str = "CHARTER_LM_COMMAND";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_MODEL: &str = "OPENAI_DEPLOYMENT_NAME";
pub const ENV_TIMEOUT_SECS: &str = "CHARTER_LM_TIMEOUT_SECS";

/// One layer of provider settings; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LmSettingsLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl LmSettingsLayer {
    /// Read a layer from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let timeout_secs = match non_empty(lookup(ENV_TIMEOUT_SECS)) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("parse {ENV_TIMEOUT_SECS}={raw}"))?,
            ),
            None => None,
        };
        Ok(Self {
            lm_command: lookup(ENV_LM_COMMAND),
            api_key: lookup(ENV_API_KEY),
            base_url: lookup(ENV_BASE_URL),
            model: lookup(ENV_MODEL),
            timeout_secs,
        })
    }
}

/// Load a config layer from a JSON file; a missing file is an empty layer.
pub fn load_layer(path: &Path) -> Result<LmSettingsLayer> {
    if !path.is_file() {
        return Ok(LmSettingsLayer::default());
    }
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse config {}", path.display()))
}

/// User-level config path, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("charter-coach").join("config.json"))
}

/// Fully resolved provider choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LmSettings {
    Command {
        command: String,
    },
    Http {
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
    },
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn first_of<T>(layers: &[LmSettingsLayer], field: impl Fn(&LmSettingsLayer) -> Option<T>) -> Option<T> {
    layers.iter().find_map(field)
}

fn first_text(
    layers: &[LmSettingsLayer],
    field: impl Fn(&LmSettingsLayer) -> Option<String>,
) -> Option<String> {
    first_of(layers, |layer| non_empty(field(layer)))
}

/// Resolve provider settings from layers in priority order.
///
/// Returns `None` when neither a command nor an API key is configured.
pub fn resolve(layers: &[LmSettingsLayer]) -> Option<LmSettings> {
    if let Some(command) = first_text(layers, |l| l.lm_command.clone()) {
        return Some(LmSettings::Command { command });
    }
    let api_key = first_text(layers, |l| l.api_key.clone())?;
    let base_url = first_text(layers, |l| l.base_url.clone()).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let model = first_text(layers, |l| l.model.clone()).unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let timeout_secs = first_of(layers, |l| l.timeout_secs.filter(|secs| *secs > 0))
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Some(LmSettings::Http {
        api_key,
        base_url,
        model,
        timeout: Duration::from_secs(timeout_secs),
    })
}

/// Gather every layer for a workspace, highest priority first.
pub fn collect_layers(flags: LmSettingsLayer, workspace_config: &Path) -> Result<Vec<LmSettingsLayer>> {
    let mut layers = vec![flags, load_layer(workspace_config)?];
    if let Some(path) = user_config_path() {
        layers.push(load_layer(&path)?);
    }
    layers.push(LmSettingsLayer::from_env()?);
    Ok(layers)
}

/// Build the provider for resolved settings, wrapped with the LM log.
pub fn build_provider(settings: &LmSettings, lm_log: PathBuf) -> Result<Box<dyn LmProvider>> {
    let inner: Box<dyn LmProvider> = match settings {
        LmSettings::Command { command } => Box::new(
            CommandProvider::new(command).map_err(|err| anyhow!("LM command unusable: {err:#}"))?,
        ),
        LmSettings::Http {
            api_key,
            base_url,
            model,
            timeout,
        } => Box::new(HttpProvider::new(base_url, api_key, model, *timeout)),
    };
    Ok(Box::new(LoggedProvider::new(inner, lm_log)))
}

/// Human-readable provider description that never includes secrets.
pub fn describe(settings: Option<&LmSettings>) -> String {
    match settings {
        None => "not configured".to_string(),
        Some(LmSettings::Command { command }) => format!("command `{command}`"),
        Some(LmSettings::Http {
            base_url,
            model,
            timeout,
            ..
        }) => format!("{model} at {base_url} (timeout {}s)", timeout.as_secs()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn layer(api_key: Option<&str>, model: Option<&str>) -> LmSettingsLayer {
        LmSettingsLayer {
            api_key: api_key.map(str::to_string),
            model: model.map(str::to_string),
            ..LmSettingsLayer::default()
        }
    }

    #[test]
    fn nothing_configured_resolves_to_none() {
        assert_eq!(resolve(&[LmSettingsLayer::default(), LmSettingsLayer::default()]), None);
    }

    #[test]
    fn blank_values_do_not_count() {
        assert_eq!(resolve(&[layer(Some("  "), None)]), None);
    }

    #[test]
    fn fields_resolve_independently_by_priority() {
        let layers = [layer(None, Some("flag-model")), layer(Some("file-key"), Some("file-model"))];
        match resolve(&layers).unwrap() {
            LmSettings::Http {
                api_key,
                base_url,
                model,
                timeout,
            } => {
                assert_eq!(api_key, "file-key");
                assert_eq!(model, "flag-model");
                assert_eq!(base_url, DEFAULT_BASE_URL);
                assert_eq!(timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn command_wins_over_api_key_from_any_layer() {
        let layers = [
            layer(Some("key"), None),
            LmSettingsLayer {
                lm_command: Some("my-lm --json".to_string()),
                ..LmSettingsLayer::default()
            },
        ];
        assert_eq!(
            resolve(&layers),
            Some(LmSettings::Command {
                command: "my-lm --json".to_string()
            })
        );
    }

    #[test]
    fn zero_timeout_falls_through_to_default() {
        let mut first = layer(Some("k"), None);
        first.timeout_secs = Some(0);
        let second = LmSettingsLayer {
            timeout_secs: Some(30),
            ..LmSettingsLayer::default()
        };
        match resolve(&[first, second]).unwrap() {
            LmSettings::Http { timeout, .. } => assert_eq!(timeout, Duration::from_secs(30)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn env_layer_reads_known_variables() {
        let vars: BTreeMap<&str, &str> = [
            (ENV_API_KEY, "sk-test"),
            (ENV_BASE_URL, "http://localhost:1234/v1"),
            (ENV_MODEL, "local"),
            (ENV_TIMEOUT_SECS, " 15 "),
        ]
        .into_iter()
        .collect();
        let layer = LmSettingsLayer::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(layer.api_key.as_deref(), Some("sk-test"));
        assert_eq!(layer.model.as_deref(), Some("local"));
        assert_eq!(layer.timeout_secs, Some(15));
        assert!(layer.lm_command.is_none());
    }

    #[test]
    fn env_layer_rejects_bad_timeout() {
        let result = LmSettingsLayer::from_lookup(|k| (k == ENV_TIMEOUT_SECS).then(|| "soon".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn config_file_layer_loads_and_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert_eq!(load_layer(&path).unwrap(), LmSettingsLayer::default());

        fs::write(&path, r#"{"api_key": "k", "model": "m"}"#).unwrap();
        let loaded = load_layer(&path).unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("k"));

        fs::write(&path, r#"{"apikey": "k"}"#).unwrap();
        assert!(load_layer(&path).is_err());
    }

    #[test]
    fn describe_hides_api_key() {
        let settings = resolve(&[layer(Some("sk-secret"), None)]).unwrap();
        let text = describe(Some(&settings));
        assert!(!text.contains("sk-secret"));
        assert!(text.contains(DEFAULT_MODEL));
        assert_eq!(describe(None), "not configured");
    }
}
