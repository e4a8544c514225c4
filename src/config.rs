//! Configuration schema for natter.
//!
//! YAML config: global logging, api endpoint and credentials, form element ids.
//! Env overrides: NATTER_*.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Root config (natter.yaml).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub form: FormConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Log level (e.g. "info", "debug"). Env NATTER_LOG_LEVEL overrides when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "json" or "pretty". Env NATTER_LOG_FORMAT overrides.
    #[serde(default)]
    pub log_format: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// The Natter API the form posts to.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Location the page is replaced with on 401.
    #[serde(default = "default_login_page")]
    pub login_page: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Trust any server certificate (local server runs on a self-signed keystore).
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Extra PEM root certificate to trust.
    #[serde(default)]
    pub ca_cert_file: Option<String>,

    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,

    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_page: default_login_page(),
            timeout_secs: default_timeout_secs(),
            accept_invalid_certs: false,
            ca_cert_file: None,
            credentials: None,
            headers: None,
        }
    }
}

fn default_base_url() -> String {
    "https://localhost:4567".to_string()
}
fn default_login_page() -> String {
    "/login.html".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl ApiConfig {
    /// `<base_url>/spaces`, tolerating a trailing slash on the base.
    pub fn spaces_url(&self) -> String {
        format!("{}/spaces", self.base_url.trim_end_matches('/'))
    }
}

/// Ambient credentials attached to every request.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum CredentialsConfig {
    /// Session cookie, sent as a `Cookie` header value (e.g. "JSESSIONID=abc").
    Cookie {
        cookie_env: String,
        #[serde(default)]
        cookie_file: Option<String>,
    },
    Basic {
        user_env: String,
        #[serde(default)]
        user_file: Option<String>,
        password_env: String,
        #[serde(default)]
        password_file: Option<String>,
    },
}

/// Element ids of the create-space form.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormConfig {
    #[serde(default = "default_form_id")]
    pub form_id: String,
    #[serde(default = "default_name_field")]
    pub name_field: String,
    #[serde(default = "default_owner_field")]
    pub owner_field: String,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            form_id: default_form_id(),
            name_field: default_name_field(),
            owner_field: default_owner_field(),
        }
    }
}

fn default_form_id() -> String {
    "createSpace".to_string()
}
fn default_name_field() -> String {
    "spaceName".to_string()
}
fn default_owner_field() -> String {
    "owner".to_string()
}

/// Resolve a secret from file path (if set) or environment variable. File takes precedence.
pub fn read_secret(file_path: Option<&str>, env_var: &str) -> anyhow::Result<String> {
    if let Some(p) = file_path {
        if !p.is_empty() {
            let s = std::fs::read_to_string(Path::new(p))
                .with_context(|| format!("read secret file {:?}", p))?;
            return Ok(s.trim().to_string());
        }
    }
    std::env::var(env_var).with_context(|| format!("env {} not set", env_var))
}

impl Config {
    /// Load and parse config from path. Expands env vars (`$VAR`, `${VAR}`, `${VAR:-default}`) via shellexpand.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read config {:?}", path))?;
        Self::from_yaml(&s)
    }

    /// Parse config from YAML text, expand env vars, apply NATTER_BASE_URL and validate.
    pub fn from_yaml(s: &str) -> anyhow::Result<Self> {
        let expanded = expand_env_vars(s)?;
        let mut config: Config = if expanded.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml_ng::from_str(&expanded).context("parse config")?
        };
        if let Ok(url) = std::env::var("NATTER_BASE_URL") {
            if !url.trim().is_empty() {
                config.api.base_url = url.trim().to_string();
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = reqwest::Url::parse(&self.api.base_url)
            .with_context(|| format!("api.base_url is not a valid URL: {:?}", self.api.base_url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("api.base_url must be http or https, got {:?}", url.scheme());
        }
        if self.api.login_page.trim().is_empty() {
            anyhow::bail!("api.login_page must not be empty");
        }
        for (key, value) in [
            ("form.form_id", &self.form.form_id),
            ("form.name_field", &self.form.name_field),
            ("form.owner_field", &self.form.owner_field),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} must not be empty", key);
            }
        }
        Ok(())
    }
}

/// Expand env vars in config: `$VAR`, `${VAR}`, `${VAR:-default}`. Unset vars expand to empty.
fn expand_env_vars(s: &str) -> anyhow::Result<String> {
    fn context(var: &str) -> Result<Option<std::borrow::Cow<'static, str>>, std::env::VarError> {
        match std::env::var(var) {
            Ok(v) => Ok(Some(v.into())),
            Err(std::env::VarError::NotPresent) => Ok(Some("".into())),
            Err(e) => Err(e),
        }
    }
    shellexpand::env_with_context(s, context)
        .map(|cow| cow.into_owned())
        .map_err(|e| anyhow::anyhow!("config env expansion: {} ({})", e.var_name, e.cause))
}
