use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

pub const WEATHER_API_KEY_ENV: &str = "OPENWEATHER_API_KEY";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const IMAGES_DIR_ENV: &str = "IMAGES_DIR";

/// HTTP bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000 }
    }
}

/// OpenWeather settings (level 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Language of the `description` field returned by the provider.
    pub lang: String,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            lang: "es".to_string(),
            timeout_secs: 10,
        }
    }
}

impl WeatherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Text-to-image provider and output directory (levels 2 and 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub dir: PathBuf,
    pub provider_url: String,
    pub timeout_secs: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("generated_images"),
            provider_url: "https://image.pollinations.ai/prompt".to_string(),
            timeout_secs: 60,
        }
    }
}

impl ImagesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level configuration stored on disk.
///
/// Loaded once at startup and handed to each component; nothing reads it as
/// global state.
///
/// Example TOML:
/// [weather]
/// api_key = "..."
///
/// [images]
/// dir = "generated_images"
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub weather: WeatherConfig,
    pub images: ImagesConfig,
}

impl Config {
    /// Load config from `path`, or return defaults if it doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "multilevel", "multilevel-api")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay process environment variables on top of the file values.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = lookup(WEATHER_API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.weather.api_key = Some(key);
        }

        if let Some(host) = lookup(HOST_ENV) {
            self.server.host = host;
        }

        if let Some(port) = lookup(PORT_ENV) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("{PORT_ENV} must be a port number, got '{port}'"))?;
        }

        if let Some(dir) = lookup(IMAGES_DIR_ENV) {
            self.images.dir = PathBuf::from(dir);
        }

        Ok(())
    }

    /// Set/replace the weather API key.
    pub fn upsert_weather_api_key(&mut self, api_key: String) {
        self.weather.api_key = Some(api_key);
    }

    /// Returns the weather API key, if present and non-blank.
    pub fn weather_api_key(&self) -> Option<&str> {
        self.weather.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn is_weather_configured(&self) -> bool {
        self.weather_api_key().is_some()
    }

    /// Human-readable problems that will make some endpoints fail.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if !self.is_weather_configured() {
            problems.push(format!(
                "{WEATHER_API_KEY_ENV} is not configured; the weather endpoint will fail.\n\
                 Hint: run `multilevel-api configure` or export {WEATHER_API_KEY_ENV}."
            ));
        }

        problems
    }
}
