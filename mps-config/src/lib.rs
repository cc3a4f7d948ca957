//! Loader for panel configuration with YAML + environment overlays.
//!
//! Sources are merged in the order they are added; `MPS__`-prefixed environment
//! variables are always present (for example `MPS__PANEL__FEED_VIEW=timeline`).
//! String values may reference `${VAR}` placeholders, expanded after merging.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct PanelConfig {
    pub version: Option<String>,
    #[serde(default)]
    pub panel: PanelSettings,
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub services: Vec<ServiceSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanelSettings {
    /// Name of the view each feed pane opens on its service.
    #[serde(default = "default_feed_view")]
    pub feed_view: String,
    /// Avatar shown on cards whose item carries no `authoricon`.
    #[serde(default = "default_avatar")]
    pub default_avatar: String,
    /// Mailbox capacity of the panel actor.
    #[serde(default = "default_mailbox")]
    pub mailbox: usize,
    /// Initial connectivity reported to the online monitor.
    #[serde(default = "default_true")]
    pub start_online: bool,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            feed_view: default_feed_view(),
            default_avatar: default_avatar(),
            mailbox: default_mailbox(),
            start_online: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub stderr: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: None,
            format: default_log_format(),
            filter: default_log_filter(),
            stderr: false,
        }
    }
}

/// Shared fields + the per-kind details.
#[derive(Debug, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub details: ServiceDetails,
}

/// The tag is `kind`; the payload lives in `config`.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
pub enum ServiceDetails {
    #[serde(rename = "memory")]
    Memory { config: MemoryServiceConfig },
}

#[derive(Debug, Default, Deserialize)]
pub struct MemoryServiceConfig {
    #[serde(default)]
    pub static_caps: Vec<String>,
    #[serde(default)]
    pub dynamic_caps: Vec<String>,
    /// View names the service accepts; empty keeps the service default.
    #[serde(default)]
    pub views: Vec<String>,
    /// Items already present in the feed, newest first.
    #[serde(default)]
    pub items: Vec<ItemSpec>,
}

#[derive(Debug, Deserialize)]
pub struct ItemSpec {
    pub id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

fn default_feed_view() -> String {
    "feed".into()
}
fn default_avatar() -> String {
    "/usr/share/mps/theme/avatar_icon.png".into()
}
fn default_mailbox() -> usize {
    256
}
fn default_true() -> bool {
    true
}
fn default_log_format() -> String {
    "text".into()
}
fn default_log_filter() -> String {
    "info".into()
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) if s.contains('$') => {
            let mut cur = std::mem::take(s);
            for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                let expanded = shellexpand::env(&cur)
                    .map(|cow| cow.into_owned())
                    .unwrap_or_else(|_| cur.clone());
                if expanded == cur {
                    break;
                }
                cur = expanded;
            }
            *s = cur;
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (files + env overrides).
pub struct PanelConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for PanelConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelConfigLoader {
    /// Start with `MPS__` environment overrides only.
    ///
    /// ```
    /// use mps_config::PanelConfigLoader;
    ///
    /// let config = PanelConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.panel.feed_view, "feed");
    /// assert!(config.services.is_empty());
    /// ```
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("MPS").separator("__"));
        Self { builder }
    }

    /// Attach a required YAML/TOML/JSON file; the format is inferred from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be missing, so the panel can run on defaults.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use mps_config::{PanelConfigLoader, ServiceDetails};
    ///
    /// let cfg = PanelConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// services:
    ///   - name: "twitter"
    ///     kind: "memory"
    ///     config:
    ///       static_caps: ["can-update-status"]
    ///       dynamic_caps: ["can-update-status"]
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.services.len(), 1);
    /// let ServiceDetails::Memory { config } = &cfg.services[0].details;
    /// assert_eq!(config.static_caps, vec!["can-update-status".to_string()]);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Build the merged sources, expand `${VAR}` placeholders and deserialize.
    pub fn load(self) -> Result<PanelConfig, ConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
