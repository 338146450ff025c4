use serde::Deserialize;
use std::{env, fmt, path::Path, str::FromStr};
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "SYNC_CONFIG_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid value for `{field}`: {value}")]
    Invalid { field: &'static str, value: String },
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub shop: ShopConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub events_shared_secret: Option<String>,
}

/// Commerce site credentials: the REST key pair for products and the
/// application password for the media library.
#[derive(Clone, Deserialize)]
pub struct ShopConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub media_user: String,
    pub media_password: String,
}

impl fmt::Debug for ShopConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShopConfig")
            .field("base_url", &self.base_url)
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("media_user", &self.media_user)
            .field("media_password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub processed_markers: Vec<String>,
    pub delete_previous_images: bool,
    pub seo_rename: bool,
    pub source_disposition: SourceDisposition,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            processed_markers: vec!["traite".into(), "traité".into()],
            delete_previous_images: true,
            seo_rename: true,
            source_disposition: SourceDisposition::Delete,
        }
    }
}

/// What happens to a bucket object once its media item exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceDisposition {
    #[default]
    Delete,
    Keep,
    /// Copy under the first processed marker, then delete the original.
    Archive,
}

impl FromStr for SourceDisposition {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "delete" => Ok(Self::Delete),
            "keep" => Ok(Self::Keep),
            "archive" => Ok(Self::Archive),
            other => Err(ConfigError::Invalid {
                field: "SOURCE_DISPOSITION",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

impl AppConfig {
    /// YAML file when `SYNC_CONFIG_PATH` is set, process environment otherwise.
    pub fn load() -> Result<Self, ConfigError> {
        match env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_yaml_file(path.trim()),
            _ => Self::from_lookup(|name| env::var(name).ok()),
        }
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = serde_yaml::from_str(raw)?;
        config.shop.base_url = config.shop.base_url.trim().trim_end_matches('/').to_string();
        config.validate()?;
        Ok(config)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| value(name).ok_or(ConfigError::Missing(name));

        let shop = ShopConfig {
            base_url: required("SHOP_URL")?.trim_end_matches('/').to_string(),
            consumer_key: required("WC_CONSUMER_KEY")?,
            consumer_secret: required("WC_CONSUMER_SECRET")?,
            media_user: required("WP_USER")?,
            media_password: required("WP_APP_PASSWORD")?,
        };

        let defaults = PipelineSettings::default();
        let processed_markers = value("PROCESSED_MARKERS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|markers| !markers.is_empty())
            .unwrap_or(defaults.processed_markers);
        let pipeline = PipelineSettings {
            processed_markers,
            delete_previous_images: parse_bool(
                "DELETE_PREVIOUS_IMAGES",
                value("DELETE_PREVIOUS_IMAGES"),
                defaults.delete_previous_images,
            )?,
            seo_rename: parse_bool("SEO_RENAME", value("SEO_RENAME"), defaults.seo_rename)?,
            source_disposition: value("SOURCE_DISPOSITION")
                .map(|raw| raw.parse::<SourceDisposition>())
                .transpose()?
                .unwrap_or_default(),
        };

        let http_defaults = HttpSettings::default();
        let http = HttpSettings {
            timeout_secs: parse_secs(value("HTTP_TIMEOUT_SECS"), http_defaults.timeout_secs),
            connect_timeout_secs: parse_secs(
                value("HTTP_CONNECT_TIMEOUT_SECS"),
                http_defaults.connect_timeout_secs,
            ),
        };

        let config = Self {
            shop,
            pipeline,
            storage: StorageConfig {
                region: value("AWS_REGION"),
                endpoint_url: value("S3_ENDPOINT_URL"),
            },
            http,
            events_shared_secret: value("EVENTS_SHARED_SECRET"),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let shop = &self.shop;
        for (field, value) in [
            ("shop.base_url", &shop.base_url),
            ("shop.consumer_key", &shop.consumer_key),
            ("shop.consumer_secret", &shop.consumer_secret),
            ("shop.media_user", &shop.media_user),
            ("shop.media_password", &shop.media_password),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(field));
            }
        }
        if self.pipeline.processed_markers.iter().all(|m| m.trim().is_empty()) {
            return Err(ConfigError::Missing("pipeline.processed_markers"));
        }
        Ok(())
    }
}

fn parse_bool(
    field: &'static str,
    value: Option<String>,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { field, value: raw }),
    }
}

fn parse_secs(value: Option<String>, default: u64) -> u64 {
    value
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
