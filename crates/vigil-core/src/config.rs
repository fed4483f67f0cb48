//! 统一配置（文件 + 环境变量覆盖）

use crate::constants::DEFAULT_HEARTBEAT_INTERVAL_SECS;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "vigil.toml";

/// 进程级统一配置。server 与 agent 共用同一结构，各取所需的 section。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub nats: NatsSection,
    pub http: HttpSection,
    pub agent: AgentSection,
    pub telemetry: TelemetrySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsSection {
    pub url: String,
}

impl Default for NatsSection {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub listen_addr: String,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 未配置时启动随机生成
    pub uid: Option<String>,
    pub heartbeat_interval_secs: u64,
    /// 本地策略配置文件（JSON 编码的 PolicyConfig），启动时装载
    pub policy_file: Option<PathBuf>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            uid: None,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            policy_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySection {
    pub log_level: String,
    pub log_format: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl VigilConfig {
    /// 加载配置：显式路径 > 当前目录的 vigil.toml > 全默认值。
    /// 环境变量覆盖最后生效。
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(Path::new(p))?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::config_error(format!("read {}: {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| CoreError::config_error(format!("parse {}: {e}", path.display())))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("VIGIL_NATS_URL") {
            self.nats.url = url;
        }
        if let Ok(addr) = std::env::var("VIGIL_HTTP_ADDR") {
            self.http.listen_addr = addr;
        }
        if let Ok(uid) = std::env::var("VIGIL_AGENT_UID") {
            self.agent.uid = Some(uid);
        }
        if let Ok(level) = std::env::var("VIGIL_LOG_LEVEL") {
            self.telemetry.log_level = level;
        }
    }
}
