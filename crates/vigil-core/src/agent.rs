//! Agent 记录与在线状态推导

use crate::constants::LIVENESS_THRESHOLD_SECS;
use crate::core_types::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 受管的远端监控守护进程。
///
/// 在线状态不落盘：读取时由 `updated_at` 的新鲜度推导。
/// `updated_at` 在每次指标/心跳到达时刷新。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub uid: AgentId,
    pub host_name: String,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(uid: impl Into<AgentId>, host_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: uid.into(),
            host_name: host_name.into(),
            registered_at: now,
            updated_at: now,
        }
    }

    /// 按默认在线判定窗口（10 秒）推导当前状态
    pub fn status(&self) -> AgentStatus {
        self.status_at(Utc::now(), Duration::from_secs(LIVENESS_THRESHOLD_SECS))
    }

    /// 纯函数：`now - updated_at <= threshold` 即在线。
    /// 边界取闭区间：恰好等于窗口长度仍视为在线。
    pub fn status_at(&self, now: DateTime<Utc>, threshold: Duration) -> AgentStatus {
        let age = now.signed_duration_since(self.updated_at);
        let threshold = chrono::Duration::from_std(threshold)
            .unwrap_or_else(|_| chrono::Duration::seconds(LIVENESS_THRESHOLD_SECS as i64));
        if age <= threshold {
            AgentStatus::Online
        } else {
            AgentStatus::Offline
        }
    }
}

/// 强类型的 Agent 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    Offline,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent 上报的松散类型测量载荷。
/// 到达本身即是心跳：采集侧会同步刷新 Agent 的 `updated_at`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub agent_uid: AgentId,
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl Metric {
    pub fn new(agent_uid: impl Into<AgentId>, data: serde_json::Value) -> Self {
        Self {
            agent_uid: agent_uid.into(),
            time: Utc::now(),
            data,
        }
    }
}

/// Agent 注册请求（总线与 HTTP 边界共用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub uid: String,
    #[serde(default)]
    pub host_name: String,
}

/// 注册应答：成功时携带消息总线地址，失败时携带错误消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterReply {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nats_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl RegisterReply {
    pub fn ok(nats_url: impl Into<String>) -> Self {
        Self {
            nats_url: Some(nats_url.into()),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            nats_url: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
