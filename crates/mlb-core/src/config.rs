use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{errors::Error, store::ConfigStore, Result};

/// Scope under which the plugin's durable settings are stored.
pub const STORE_SCOPE: &str = "mailman";

pub const DEFAULT_API_URL: &str = "http://localhost:8001/3.1/";
pub const DEFAULT_API_USERNAME: &str = "restadmin";
pub const DEFAULT_API_PASSWORD: &str = "";
pub const DEFAULT_DOMAIN: &str = "example.com";
pub const DEFAULT_COMMAND_PREFIX: &str = "";

/// Connection settings for the mailing-list REST API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

/// Typed configuration, built once at startup and shared as `Arc<Config>`.
#[derive(Clone, Debug)]
pub struct Config {
    // Transport
    pub telegram_bot_token: String,
    pub telegram_allowed_users: Vec<i64>,
    pub telegram_safe_limit: usize,

    // Bot identity
    pub admins: Vec<String>,
    pub bot_address: String,

    // Durable plugin settings
    pub store_path: PathBuf,
    pub api: ApiConfig,
    pub domain: String,
    pub command_prefix: String,
}

impl Config {
    /// Read settings from the process environment. Call [`load_dotenv_if_present`]
    /// first, before any threads are spawned, to pick up a `.env` file.
    pub fn load() -> Result<Self> {
        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        let telegram_allowed_users = parse_csv_i64(env_str("TELEGRAM_ALLOWED_USERS"));
        let telegram_safe_limit = env_usize("TELEGRAM_SAFE_LIMIT").unwrap_or(4000);
        let admins = parse_csv_lower(env_str("MLB_ADMINS"));

        let store_path = env_path("MLB_STORE_PATH").unwrap_or_else(default_store_path);
        let mut store = ConfigStore::open(&store_path, STORE_SCOPE)?;
        let settings = PluginSettings::resolve(&mut store, &EnvOverrides::from_env())?;

        let bot_address = env_str("MLB_BOT_ADDRESS")
            .and_then(non_empty)
            .unwrap_or_else(|| format!("bot@{}", settings.domain));

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            telegram_safe_limit,
            admins,
            bot_address,
            store_path,
            api: settings.api,
            domain: settings.domain,
            command_prefix: settings.command_prefix,
        })
    }

    /// Global administrators are matched case-insensitively by address.
    pub fn is_admin(&self, address: &str) -> bool {
        let address = address.trim().to_lowercase();
        self.admins.iter().any(|a| *a == address)
    }
}

/// Plugin-scoped settings read from (and defaulted into) the [`ConfigStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginSettings {
    pub api: ApiConfig,
    pub domain: String,
    pub command_prefix: String,
}

/// Environment values that take precedence over the store and are written back to it.
#[derive(Clone, Debug, Default)]
pub struct EnvOverrides {
    pub api_url: Option<String>,
    pub api_username: Option<String>,
    pub api_password: Option<String>,
    pub domain: Option<String>,
    pub command_prefix: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            api_url: env_str("MLB_API_URL").and_then(non_empty),
            api_username: env_str("MLB_API_USERNAME").and_then(non_empty),
            api_password: env_str("MLB_API_PASSWORD"),
            domain: env_str("MLB_DOMAIN").and_then(non_empty),
            command_prefix: env_str("MLB_COMMAND_PREFIX"),
        }
    }
}

impl PluginSettings {
    pub fn resolve(store: &mut ConfigStore, overrides: &EnvOverrides) -> Result<Self> {
        let url = setting(store, "api_url", DEFAULT_API_URL, &overrides.api_url)?;
        let username = setting(
            store,
            "api_username",
            DEFAULT_API_USERNAME,
            &overrides.api_username,
        )?;
        let password = setting(
            store,
            "api_password",
            DEFAULT_API_PASSWORD,
            &overrides.api_password,
        )?;
        let domain = setting(store, "domain", DEFAULT_DOMAIN, &overrides.domain)?;
        let command_prefix = setting(
            store,
            "command_prefix",
            DEFAULT_COMMAND_PREFIX,
            &overrides.command_prefix,
        )?;

        Ok(Self {
            api: ApiConfig {
                url,
                username,
                password,
            },
            domain: domain.trim().to_lowercase(),
            command_prefix: command_prefix.trim().to_string(),
        })
    }
}

fn setting(
    store: &mut ConfigStore,
    key: &str,
    default: &str,
    overridden: &Option<String>,
) -> Result<String> {
    if let Some(v) = overridden {
        if store.get(key) != Some(v.as_str()) {
            store.set(key, v)?;
        }
        return Ok(v.clone());
    }
    store.get_or_init(key, default)
}

fn default_store_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".config/mlb/settings.json"),
        None => PathBuf::from("mlb-settings.json"),
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Export `KEY=value` lines from `path` into the environment, never overriding
/// variables that are already set. Mutates process-wide state, so it must run
/// while the process is still single-threaded.
pub fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn parse_csv_lower(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        telegram_bot_token: "x".to_string(),
        telegram_allowed_users: vec![],
        telegram_safe_limit: 4000,
        admins: vec!["admin@example.com".to_string()],
        bot_address: "bot@example.com".to_string(),
        store_path: "/tmp/mlb-test-settings.json".into(),
        api: ApiConfig {
            url: DEFAULT_API_URL.to_string(),
            username: DEFAULT_API_USERNAME.to_string(),
            password: String::new(),
        },
        domain: "example.com".to_string(),
        command_prefix: String::new(),
    }
}
