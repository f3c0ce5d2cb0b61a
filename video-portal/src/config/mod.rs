use serde::Deserialize;
use std::time::Duration;

/// 5 GiB.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024 * 1024;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub server: ServerSettings,
    pub api: ApiSettings,
    #[serde(default)]
    pub upload: UploadSettings,
    #[serde(default)]
    pub library: LibrarySettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApiSettings {
    /// Base URL of the video platform REST API (e.g. http://localhost:5000/api).
    pub base_url: String,
    /// Base URL used for playback links. Falls back to `base_url`.
    #[serde(default)]
    pub stream_base_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ApiSettings {
    pub fn stream_base_url(&self) -> &str {
        self.stream_base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(&self.base_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct UploadSettings {
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,
    #[serde(default = "default_allowed_media_types")]
    pub allowed_media_types: Vec<String>,
}

fn default_max_file_size_bytes() -> u64 {
    DEFAULT_MAX_FILE_SIZE_BYTES
}

fn default_allowed_media_types() -> Vec<String> {
    ["video/mp4", "video/quicktime", "video/x-msvideo", "video/webm"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size_bytes(),
            allowed_media_types: default_allowed_media_types(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct LibrarySettings {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_recent_limit() -> usize {
    5
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            recent_limit: default_recent_limit(),
        }
    }
}

impl LibrarySettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP/gRPC collector endpoint; empty disables span export.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("No working directory: {}", e)))?;

    // Works both from the workspace root and from inside video-portal/
    let configuration_directory = if base_path.ends_with("video-portal") {
        base_path.join("config")
    } else {
        base_path.join("video-portal").join("config")
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_defaults_cover_four_containers() {
        let upload = UploadSettings::default();
        assert_eq!(upload.max_file_size_bytes, 5_368_709_120);
        assert_eq!(upload.allowed_media_types.len(), 4);
        assert!(upload
            .allowed_media_types
            .contains(&"video/x-msvideo".to_string()));
    }

    #[test]
    fn stream_base_falls_back_to_api_base() {
        let api = ApiSettings {
            base_url: "http://localhost:5000/api".to_string(),
            stream_base_url: Some(String::new()),
            request_timeout_secs: 30,
        };
        assert_eq!(api.stream_base_url(), "http://localhost:5000/api");
    }
}
