//! Application configuration module / 应用配置模块
//!
//! Manages application configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::indexer::IndexPolicy;

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// Search backend connection / 搜索后端配置
    #[serde(default)]
    pub backend: BackendConfig,
    /// Collection and query settings / 搜索配置
    #[serde(default)]
    pub search: SearchConfig,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    pub host: String,
    /// Server port / 服务器端口
    pub port: u16,
}

/// Which engine implementation to use / 后端引擎类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendEngine {
    Elasticsearch,
    /// In-process engine, nothing survives a restart / 内存引擎
    Memory,
}

/// Search backend configuration / 搜索后端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub engine: BackendEngine,
    /// Engine base URL / 引擎地址
    pub url: String,
    /// Per-request timeout (seconds) / 请求超时
    pub request_timeout_secs: u64,
    /// Connect timeout (seconds) / 连接超时
    pub connect_timeout_secs: u64,
}

/// Search configuration / 搜索配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Collection served by GET /search / 对外搜索的集合
    pub collection: String,
    /// Second collection populated by the seed tool / 种子工具使用的第二个集合
    pub secondary_collection: String,
    /// Max hits per search / 单次搜索最大返回数
    pub max_hits: usize,
    /// Max facet buckets / 分面桶上限
    pub facet_size: usize,
    /// Bulk indexing failure policy / 批量索引失败策略
    pub index_policy: IndexPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            engine: BackendEngine::Elasticsearch,
            url: "http://localhost:9200".to_string(),
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            collection: "Hash_Sowandarya".to_string(),
            secondary_collection: "Hash_8087".to_string(),
            max_hits: 100,
            facet_size: 100,
            index_policy: IndexPolicy::BestEffort,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl AppConfig {
    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Apply BACKEND_URL / PORT environment overrides / 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) -> Result<(), String> {
        if let Ok(url) = std::env::var("BACKEND_URL") {
            self.backend.url = url;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| format!("Invalid PORT '{}': {}", port, e))?;
        }
        Ok(())
    }

    /// Check values that would only fail later at runtime / 校验配置
    pub fn validate(&self) -> Result<(), String> {
        let url = url::Url::parse(&self.backend.url)
            .map_err(|e| format!("Invalid backend url '{}': {}", self.backend.url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("Backend url must be http(s): {}", self.backend.url));
        }
        if self.backend.request_timeout_secs == 0 {
            return Err("backend.request_timeout_secs must be positive".to_string());
        }
        if self.backend.connect_timeout_secs == 0 {
            return Err("backend.connect_timeout_secs must be positive".to_string());
        }
        if self.search.max_hits == 0 || self.search.facet_size == 0 {
            return Err("search.max_hits and search.facet_size must be positive".to_string());
        }
        if self.search.collection.trim().is_empty() {
            return Err("search.collection must not be empty".to_string());
        }
        if self.search.secondary_collection.trim().is_empty() {
            return Err("search.secondary_collection must not be empty".to_string());
        }
        Ok(())
    }
}

/// Get the config file path (APP_CONFIG overrides) / 获取配置文件路径
fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("APP_CONFIG") {
        return PathBuf::from(path);
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration, apply env overrides and validate / 加载配置
pub fn load_config() -> Result<AppConfig, String> {
    let mut config = load_config_from(&get_config_path())?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config_from(config_path: &Path) -> Result<AppConfig, String> {
    if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        let config = AppConfig::default();
        save_config(config_path, &config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(config_path: &Path, config: &AppConfig) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.get_bind_address(), "0.0.0.0:3000");
        assert_eq!(config.backend.url, "http://localhost:9200");
        assert_eq!(config.search.index_policy, IndexPolicy::BestEffort);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_creates_default_file_then_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let created = load_config_from(&path).unwrap();
        assert!(path.exists());

        let reloaded = load_config_from(&path).unwrap();
        assert_eq!(reloaded.search.collection, created.search.collection);
        assert_eq!(reloaded.server.port, 3000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"backend": {"engine": "memory", "url": "http://es:9200",
                "request_timeout_secs": 2, "connect_timeout_secs": 1}}"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.backend.engine, BackendEngine::Memory);
        assert_eq!(config.backend.request_timeout(), Duration::from_secs(2));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.search.facet_size, 100);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.backend.url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.backend.url = "ftp://localhost:9200".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.search.facet_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_connect_timeout_and_blank_secondary() {
        let mut config = AppConfig::default();
        config.backend.connect_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("connect_timeout_secs"));

        let mut config = AppConfig::default();
        config.search.secondary_collection = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.contains("secondary_collection"));
    }
}
