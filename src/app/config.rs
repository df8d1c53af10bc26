use eyre::{Context, eyre};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use tokio::io::AsyncWriteExt;
use url::Url;

const BASE_CONFIG_PATH: &str = "config/app_config.toml";
const ENV_PREFIX: &str = "INCIDENT_CHAT_";

/// The incident the chat is attached to, as supplied by the dispatch page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IncidentContext {
    pub id: u64,
    pub title: String,
    pub incident: String,
    pub time: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub server_host: String,
    pub secure: bool,
    pub chat_path: String,
    pub username: Option<String>,
    pub camera_settle_ms: u64,
    pub camera_index: u32,
    pub font_size: f32,
    pub enable_cjk_font: bool,
    pub show_timestamps: bool,
    pub incident: Option<IncidentContext>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "localhost:8000".to_string(),
            secure: true,
            chat_path: "/api/ws/chat/".to_string(),
            username: None,
            camera_settle_ms: 500,
            camera_index: 0,
            font_size: 14.0,
            enable_cjk_font: false,
            show_timestamps: true,
            incident: None,
        }
    }
}

impl Config {
    /// The websocket URL of the chat channel.
    pub fn chat_endpoint(&self) -> Result<Url, eyre::Report> {
        let scheme = if self.secure { "wss" } else { "ws" };
        let raw = format!("{}://{}{}", scheme, self.server_host, self.chat_path);
        let url = Url::parse(&raw).with_context(|| format!("Invalid chat endpoint {raw:?}"))?;
        if url.host_str().is_none() {
            return Err(eyre!("Chat endpoint {raw:?} has no host"));
        }
        Ok(url)
    }

    pub fn camera_settle(&self) -> Duration {
        Duration::from_millis(self.camera_settle_ms)
    }

    fn figment(user_config_path: &PathBuf) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(BASE_CONFIG_PATH))
            .merge(Toml::file(user_config_path))
            .merge(Env::prefixed(ENV_PREFIX))
    }
}

fn get_config_path() -> Result<PathBuf, eyre::Report> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| eyre!("Could not find a config directory"))?
        .join(env!("CARGO_PKG_NAME"));

    Ok(config_dir.join("app_config.toml"))
}

pub async fn load() -> Result<Config, eyre::Report> {
    let user_config_path = get_config_path()?;
    tracing::info!("Loading user config from {:?}", user_config_path);
    tracing::info!("Loading base config from {:?}", BASE_CONFIG_PATH);

    let config: Config = Config::figment(&user_config_path)
        .extract()
        .context("Could not load config")?;

    if !user_config_path.exists() {
        if let Err(e) = save(&config).await {
            tracing::warn!("Failed to save initial config: {}", e);
        }
    }

    Ok(config)
}

pub async fn save(config: &Config) -> Result<(), eyre::Report> {
    let path = get_config_path()?;
    tracing::info!("Saving config to {:?}", path);

    let bytes = toml::to_string_pretty(config).context("Failed to serialize config")?;

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }
    }

    let mut file = tokio::fs::File::create(path)
        .await
        .context("Failed to create config file")?;

    file.write_all(bytes.as_bytes())
        .await
        .context("Failed to write config to file")?;

    Ok(())
}
