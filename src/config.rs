use crate::error::{GatewayError, Result};
use crate::regions::RegionPreset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Overrides the region host, e.g. for a dedicated deployment or tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_catalog_version")]
    pub catalog_version: String,
    #[serde(default = "default_catalog_limit")]
    pub catalog_limit: u32,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default = "default_iam_url")]
    pub iam_url: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_refresh_margin")]
    pub token_refresh_margin_secs: u64,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Upper bound on establishing any upstream connection.
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
    /// Total time allowed for a buffered call (token, catalog, generation, chat).
    #[serde(default = "default_request_secs")]
    pub request_secs: u64,
    /// Total time allowed for one streamed chat completion.
    #[serde(default = "default_stream_secs")]
    pub stream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: default_connect_secs(),
            request_secs: default_request_secs(),
            stream_secs: default_stream_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn stream(&self) -> Duration {
        Duration::from_secs(self.stream_secs)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_api_version() -> String {
    "2023-05-29".to_string()
}

fn default_catalog_version() -> String {
    "2024-09-16".to_string()
}

fn default_catalog_limit() -> u32 {
    200
}

fn default_api_key_env() -> String {
    "WATSONX_IAM_APIKEY".to_string()
}

fn default_iam_url() -> String {
    "https://iam.cloud.ibm.com/identity/token".to_string()
}

fn default_model() -> String {
    "ibm/granite-20b-multilingual".to_string()
}

fn default_refresh_margin() -> u64 {
    600
}

fn default_connect_secs() -> u64 {
    10
}

fn default_request_secs() -> u64 {
    120
}

fn default_stream_secs() -> u64 {
    300
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            region: None,
            base_url: None,
            api_version: default_api_version(),
            catalog_version: default_catalog_version(),
            catalog_limit: default_catalog_limit(),
            api_key_env: default_api_key_env(),
            project_id: None,
            iam_url: default_iam_url(),
            default_model: default_model(),
            token_refresh_margin_secs: default_refresh_margin(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file, falling back to defaults.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::debug!("No config file found, using defaults and environment");
        Ok(Self::default())
    }

    /// Apply the `WATSONX_*` environment variables on top of file values.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(region) = non_empty("WATSONX_REGION") {
            self.region = Some(region);
        }
        if let Some(version) = non_empty("WATSONX_VERSION") {
            self.api_version = version;
        }
        if let Some(project_id) = non_empty("WATSONX_PROJECT_ID") {
            self.project_id = Some(project_id);
        }
        if let Some(url) = non_empty("WATSONX_BASE_URL") {
            self.base_url = Some(url);
        }
    }

    /// Resolve the regional API host (explicit `base_url` wins over the region preset).
    pub fn effective_base_url(&self) -> Result<String> {
        if let Some(ref url) = self.base_url {
            return Ok(url.trim_end_matches('/').to_string());
        }

        let region = self.region.as_deref().ok_or_else(|| {
            GatewayError::config(format!(
                "WATSONX_REGION is required. Supported regions are: {}.",
                RegionPreset::names()
            ))
        })?;

        RegionPreset::from_name(region)
            .map(|preset| preset.base_url.to_string())
            .ok_or_else(|| {
                GatewayError::config(format!(
                    "Unknown region '{}'. Supported regions are: {}.",
                    region,
                    RegionPreset::names()
                ))
            })
    }

    /// Resolve the IBM Cloud API key from the configured environment variable.
    pub fn resolve_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::config(format!(
                    "IBM API key is required. Set the {} environment variable.",
                    self.api_key_env
                ))
            })
    }

    pub fn require_project_id(&self) -> Result<String> {
        self.project_id
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::config(
                    "Watsonx.ai project ID is required. Set the WATSONX_PROJECT_ID environment variable.",
                )
            })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("watsonx-gateway.toml")];

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("watsonx-gateway").join("config.toml"));
    }
    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join("watsonx-gateway").join("config.toml"));
        paths.push(home.join(".watsonx-gateway.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 9000
region = "eu-de"
project_id = "proj-123"
default_model = "ibm/granite-13b-chat-v2"

[timeouts]
stream_secs = 600
"#
        )
        .unwrap();

        let config = GatewayConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.region.as_deref(), Some("eu-de"));
        assert_eq!(config.project_id.as_deref(), Some("proj-123"));
        assert_eq!(config.default_model, "ibm/granite-13b-chat-v2");
        assert_eq!(config.timeouts.stream_secs, 600);
        assert_eq!(config.timeouts.connect_secs, 10);
        assert_eq!(config.api_version, "2023-05-29");
    }

    #[test]
    fn test_effective_base_url_from_region() {
        let config = GatewayConfig {
            region: Some("jp-tok".to_string()),
            ..GatewayConfig::default()
        };
        assert_eq!(
            config.effective_base_url().unwrap(),
            "https://jp-tok.ml.cloud.ibm.com"
        );
    }

    #[test]
    fn test_effective_base_url_override() {
        let config = GatewayConfig {
            region: Some("nowhere".to_string()),
            base_url: Some("http://127.0.0.1:9999/".to_string()),
            ..GatewayConfig::default()
        };
        assert_eq!(config.effective_base_url().unwrap(), "http://127.0.0.1:9999");
    }

    #[test]
    fn test_unknown_region_is_rejected() {
        let config = GatewayConfig {
            region: Some("mars-north".to_string()),
            ..GatewayConfig::default()
        };
        let err = config.effective_base_url().unwrap_err();
        assert!(err.to_string().contains("us-south, eu-gb, jp-tok, eu-de"));
    }

    #[test]
    fn test_missing_region_is_rejected() {
        assert!(GatewayConfig::default().effective_base_url().is_err());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("WATSONX_REGION", "eu-gb"),
            ("WATSONX_VERSION", "2024-05-01"),
            ("WATSONX_PROJECT_ID", "env-project"),
            ("WATSONX_BASE_URL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = GatewayConfig {
            region: Some("us-south".to_string()),
            project_id: Some("file-project".to_string()),
            ..GatewayConfig::default()
        };
        config.apply_env_from(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.region.as_deref(), Some("eu-gb"));
        assert_eq!(config.api_version, "2024-05-01");
        assert_eq!(config.project_id.as_deref(), Some("env-project"));
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_missing_project_id_fails_fast() {
        let err = GatewayConfig::default().require_project_id().unwrap_err();
        assert!(matches!(err, GatewayError::Config { .. }));
    }

    #[test]
    fn test_missing_api_key_env_fails_fast() {
        let config = GatewayConfig {
            api_key_env: "WATSONX_GATEWAY_TEST_UNSET_KEY".to_string(),
            ..GatewayConfig::default()
        };
        assert!(config.resolve_api_key().is_err());
    }
}
