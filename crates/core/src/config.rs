use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub chat_backend: ChatBackendConfig,
    pub weather: WeatherConfig,
    pub assets: AssetsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ChatBackendConfig {
    pub base_url: String,
    pub service_token: SecretString,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WeatherConfig {
    pub forecast_url: String,
    pub geocoding_url: String,
    pub default_city: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AssetsConfig {
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidEnvOverride {
                key: "logging.format".to_string(),
                value: raw.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub chat_backend_url: Option<String>,
    pub service_token: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://scentpick.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            chat_backend: ChatBackendConfig {
                base_url: "http://localhost:8000/chat.run".to_string(),
                service_token: String::new().into(),
                timeout_secs: 30,
            },
            weather: WeatherConfig {
                forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
                geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
                default_city: "Seoul".to_string(),
                timeout_secs: 5,
            },
            assets: AssetsConfig {
                base_url: "https://scentpick-images.s3.ap-northeast-2.amazonaws.com".to_string(),
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 8080,
                health_check_port: 8081,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("scentpick.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(chat_backend) = patch.chat_backend {
            if let Some(base_url) = chat_backend.base_url {
                self.chat_backend.base_url = base_url;
            }
            if let Some(token_value) = chat_backend.service_token {
                self.chat_backend.service_token = token_value.into();
            }
            if let Some(timeout_secs) = chat_backend.timeout_secs {
                self.chat_backend.timeout_secs = timeout_secs;
            }
        }

        if let Some(weather) = patch.weather {
            if let Some(forecast_url) = weather.forecast_url {
                self.weather.forecast_url = forecast_url;
            }
            if let Some(geocoding_url) = weather.geocoding_url {
                self.weather.geocoding_url = geocoding_url;
            }
            if let Some(default_city) = weather.default_city {
                self.weather.default_city = default_city;
            }
            if let Some(timeout_secs) = weather.timeout_secs {
                self.weather.timeout_secs = timeout_secs;
            }
        }

        if let Some(assets) = patch.assets {
            if let Some(base_url) = assets.base_url {
                self.assets.base_url = base_url;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SCENTPICK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SCENTPICK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SCENTPICK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SCENTPICK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SCENTPICK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SCENTPICK_CHAT_BACKEND_URL") {
            self.chat_backend.base_url = value;
        }
        if let Some(value) = read_env("SCENTPICK_SERVICE_TOKEN") {
            self.chat_backend.service_token = value.into();
        }
        if let Some(value) = read_env("SCENTPICK_CHAT_TIMEOUT_SECS") {
            self.chat_backend.timeout_secs = parse_u64("SCENTPICK_CHAT_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SCENTPICK_WEATHER_FORECAST_URL") {
            self.weather.forecast_url = value;
        }
        if let Some(value) = read_env("SCENTPICK_WEATHER_GEOCODING_URL") {
            self.weather.geocoding_url = value;
        }
        if let Some(value) = read_env("SCENTPICK_WEATHER_DEFAULT_CITY") {
            self.weather.default_city = value;
        }

        if let Some(value) = read_env("SCENTPICK_ASSETS_BASE_URL") {
            self.assets.base_url = value;
        }

        if let Some(value) = read_env("SCENTPICK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SCENTPICK_SERVER_PORT") {
            self.server.port = parse_u16("SCENTPICK_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SCENTPICK_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("SCENTPICK_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        if let Some(value) = read_env("SCENTPICK_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("SCENTPICK_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(chat_backend_url) = overrides.chat_backend_url {
            self.chat_backend.base_url = chat_backend_url;
        }
        if let Some(service_token) = overrides.service_token {
            self.chat_backend.service_token = service_token.into();
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_chat_backend(&self.chat_backend)?;
        validate_weather(&self.weather)?;
        validate_assets(&self.assets)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("scentpick.toml"), PathBuf::from("config/scentpick.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_chat_backend(chat_backend: &ChatBackendConfig) -> Result<(), ConfigError> {
    if chat_backend.base_url.trim().is_empty() {
        return Err(ConfigError::Validation("chat_backend.base_url is required".to_string()));
    }
    if !chat_backend.base_url.starts_with("http://")
        && !chat_backend.base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "chat_backend.base_url must be an http(s) URL".to_string(),
        ));
    }
    if chat_backend.service_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "chat_backend.service_token is required (set SCENTPICK_SERVICE_TOKEN)".to_string(),
        ));
    }
    if chat_backend.timeout_secs == 0 || chat_backend.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "chat_backend.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    Ok(())
}

fn validate_weather(weather: &WeatherConfig) -> Result<(), ConfigError> {
    if weather.forecast_url.trim().is_empty() || weather.geocoding_url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "weather.forecast_url and weather.geocoding_url are required".to_string(),
        ));
    }
    if weather.timeout_secs == 0 || weather.timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "weather.timeout_secs must be in range 1..=60".to_string(),
        ));
    }
    Ok(())
}

fn validate_assets(assets: &AssetsConfig) -> Result<(), ConfigError> {
    if assets.base_url.trim().is_empty() {
        return Err(ConfigError::Validation("assets.base_url is required".to_string()));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    chat_backend: Option<ChatBackendPatch>,
    weather: Option<WeatherPatch>,
    assets: Option<AssetsPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatBackendPatch {
    base_url: Option<String>,
    service_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WeatherPatch {
    forecast_url: Option<String>,
    geocoding_url: Option<String>,
    default_city: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AssetsPatch {
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
