//! 服务配置（JSON），加载时做显式校验，失败即拒绝启动
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    scriptdir: String,
    #[serde(default)]
    serveraddr: String,
    serverport: u16,
    jwtsecret: String,
    #[serde(default)]
    rules: Option<PathBuf>,
}

/// 已校验的服务配置
#[derive(Clone)]
pub struct ServerConfig {
    pub script_dir: PathBuf,
    pub bind_addr: String,
    pub bind_port: u16,
    pub signing_secret: String,
    /// 追加的规则文件
    pub rules_path: Option<PathBuf>,
}

// 不把密钥打进日志
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("script_dir", &self.script_dir)
            .field("bind_addr", &self.bind_addr)
            .field("bind_port", &self.bind_port)
            .field("signing_secret", &"<redacted>")
            .field("rules_path", &self.rules_path)
            .finish()
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let txt = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&txt)
    }

    pub fn from_json(src: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(src)?;
        if raw.scriptdir.trim().is_empty() {
            return Err(ConfigError::Invalid("scriptdir must not be empty".into()));
        }
        if raw.serverport == 0 {
            return Err(ConfigError::Invalid("serverport must be in 1..=65535".into()));
        }
        if raw.jwtsecret.is_empty() {
            return Err(ConfigError::Invalid("jwtsecret must not be empty".into()));
        }
        let bind_addr = match raw.serveraddr.trim() {
            "" => "0.0.0.0".to_string(),
            a => a.to_string(),
        };
        Ok(Self {
            script_dir: PathBuf::from(raw.scriptdir),
            bind_addr,
            bind_port: raw.serverport,
            signing_secret: raw.jwtsecret,
            rules_path: raw.rules,
        })
    }

    pub fn bind_target(&self) -> String {
        format!("{}:{}", self.bind_addr, self.bind_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_original_key_names() {
        let cfg = ServerConfig::from_json(
            r#"{"scriptdir":"./scripts","serveraddr":"127.0.0.1","serverport":8080,"jwtsecret":"s"}"#,
        )
        .unwrap();
        assert_eq!(cfg.script_dir, PathBuf::from("./scripts"));
        assert_eq!(cfg.bind_target(), "127.0.0.1:8080");
        assert!(cfg.rules_path.is_none());
        assert!(!format!("{cfg:?}").contains("\"s\""));
    }

    #[test]
    fn empty_address_binds_all_interfaces() {
        let cfg = ServerConfig::from_json(r#"{"scriptdir":"d","serverport":1,"jwtsecret":"s"}"#).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0");
    }

    #[test]
    fn rejects_bad_values() {
        for src in [
            r#"{"scriptdir":"","serverport":1,"jwtsecret":"s"}"#,
            r#"{"scriptdir":"d","serverport":0,"jwtsecret":"s"}"#,
            r#"{"scriptdir":"d","serverport":1,"jwtsecret":""}"#,
        ] {
            assert!(matches!(ServerConfig::from_json(src), Err(ConfigError::Invalid(_))), "{src}");
        }
        for src in [
            r#"{"scriptdir":"d","serverport":70000,"jwtsecret":"s"}"#,
            r#"{"scriptdir":"d","serverport":"80","jwtsecret":"s"}"#,
            r#"{"scriptdir":"d","serverport":1,"jwtsecret":"s","extra":true}"#,
            r#"{"serverport":1,"jwtsecret":"s"}"#,
            "not json",
        ] {
            assert!(matches!(ServerConfig::from_json(src), Err(ConfigError::Parse(_))), "{src}");
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ServerConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
