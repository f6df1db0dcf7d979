use std::path::PathBuf;

use anyhow::anyhow;

use crate::session::Actor;

pub const ENV_DB: &str = "BROKERDESK_DB";
pub const ENV_LOG: &str = "BROKERDESK_LOG";
pub const ENV_LOG_FORMAT: &str = "BROKERDESK_LOG_FORMAT";
pub const ENV_LOG_DIR: &str = "BROKERDESK_LOG_DIR";
pub const ENV_ACTOR: &str = "BROKERDESK_ACTOR";
pub const ENV_ACTOR_EMAIL: &str = "BROKERDESK_ACTOR_EMAIL";

pub const DEFAULT_LOG_FILTER: &str = "brokerdesk=info,sqlx=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_filter: String,
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
    pub actor: Option<Actor>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so tests don't
    /// have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let db_path = match non_empty(ENV_DB) {
            Some(path) => PathBuf::from(path),
            None => default_db_path()?,
        };
        let actor = non_empty(ENV_ACTOR).map(|id| Actor::new(id, non_empty(ENV_ACTOR_EMAIL)));

        Ok(Self {
            db_path,
            log_filter: non_empty(ENV_LOG).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_format: non_empty(ENV_LOG_FORMAT)
                .map(|raw| LogFormat::parse(&raw))
                .unwrap_or_default(),
            log_dir: non_empty(ENV_LOG_DIR).map(PathBuf::from),
            actor,
        })
    }
}

pub fn default_db_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| std::env::current_dir().ok())
        .ok_or_else(|| anyhow!("failed to resolve application data directory"))?;
    Ok(base.join("brokerdesk").join("brokerdesk.sqlite3"))
}
