use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Context;
use config::{File, FileFormat};
use mailer_models::{email_address::EmailAddress, template::MailTemplate, Sensitive};
use serde::Deserialize;

pub use duration::Duration;

mod duration;

pub const DEFAULT_CONFIG_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../config.toml");

/// Colon separated list of config files, later files override earlier ones.
pub const CONFIG_PATH_ENV: &str = "MAILER_CONFIG";

pub fn load() -> anyhow::Result<Config> {
    let paths = match std::env::var(CONFIG_PATH_ENV) {
        Ok(paths) => paths
            .split(':')
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
            .collect(),
        Err(_) => vec![PathBuf::from(DEFAULT_CONFIG_PATH)],
    };
    load_paths(&paths)
}

pub fn load_paths(paths: &[impl AsRef<Path>]) -> anyhow::Result<Config> {
    let sources = paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file at {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    load_sources(&sources)
}

/// Merges the given TOML documents in order.
pub fn load_sources(sources: &[impl AsRef<str>]) -> anyhow::Result<Config> {
    sources
        .iter()
        .fold(config::Config::builder(), |builder, source| {
            builder.add_source(File::from_str(source.as_ref(), FileFormat::Toml))
        })
        .build()?
        .try_deserialize()
        .context("Failed to load config")
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub mail: MailConfig,
}

#[derive(Debug, Deserialize)]
pub struct MailConfig {
    /// Value of the `X-Mailer` header.
    pub mailer: Option<String>,
    pub default_lang: String,
    pub max_concurrent_deliveries: usize,
    /// Directory containing the templates referenced by `templates`.
    pub templates_path: Option<PathBuf>,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub templates: BTreeMap<String, MailTemplate>,
}

#[derive(Debug, Deserialize)]
pub struct SmtpConfig {
    pub host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<Sensitive<String>>,
    #[serde(default)]
    pub security: SmtpSecurity,
    pub timeout: Option<Duration>,
    pub sender: Option<EmailAddress>,
    pub sender_name: Option<String>,
    #[serde(default = "default_true")]
    pub use_sender_and_envelope_from: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_smtp_port(),
            user: None,
            password: None,
            security: SmtpSecurity::default(),
            timeout: None,
            sender: None,
            sender_name: None,
            use_sender_and_envelope_from: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    #[default]
    None,
    StartTls,
    Tls,
}

fn default_smtp_port() -> u16 {
    25
}

fn default_true() -> bool {
    true
}
