//! 统一错误处理系统

use crate::core_types::AgentId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 核心错误类型 - 统一的错误处理
///
/// 所有变体对发起调用都是终止性的：核心内部不做任何自动重试。
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum CoreError {
    // === 输入校验错误 ===
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // === 实体缺失 ===
    #[error("Not found: {entity}")]
    NotFound { entity: String },

    #[error("Unknown agent: {agent_uid}")]
    UnknownAgent { agent_uid: AgentId },

    // === 派发前置条件 ===
    #[error("Agent offline: {agent_uid}")]
    AgentOffline { agent_uid: AgentId },

    #[error("Unsupported policy type: {policy_type}")]
    UnsupportedPolicyType { policy_type: String },

    // === 派发传输 ===
    #[error("Dispatch timed out on {subject}: {message}")]
    DispatchTimeout { subject: String, message: String },

    #[error("Policy rejected by agent: {message}")]
    PolicyRejected { message: String },

    // === 基础设施错误 ===
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    #[error("Config error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CoreError {
    /// 创建输入校验错误
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
        }
    }

    /// 创建实体缺失错误
    pub fn not_found(entity: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
        }
    }

    /// 创建 Agent 未知错误（派发目标不存在）
    pub fn unknown_agent(agent_uid: impl Into<AgentId>) -> Self {
        CoreError::UnknownAgent {
            agent_uid: agent_uid.into(),
        }
    }

    /// 创建 Agent 离线错误
    pub fn agent_offline(agent_uid: impl Into<AgentId>) -> Self {
        CoreError::AgentOffline {
            agent_uid: agent_uid.into(),
        }
    }

    /// 创建未注册策略类型错误
    pub fn unsupported_policy_type(policy_type: impl Into<String>) -> Self {
        CoreError::UnsupportedPolicyType {
            policy_type: policy_type.into(),
        }
    }

    /// 创建远端拒绝错误（携带远端消息）
    pub fn policy_rejected(message: impl Into<String>) -> Self {
        CoreError::PolicyRejected {
            message: message.into(),
        }
    }

    /// 创建传输错误
    pub fn transport(message: impl Into<String>) -> Self {
        CoreError::Transport {
            message: message.into(),
        }
    }

    /// 创建存储错误
    pub fn store(message: impl Into<String>) -> Self {
        CoreError::Store {
            message: message.into(),
        }
    }

    /// 创建配置错误
    pub fn config_error(message: impl Into<String>) -> Self {
        CoreError::Config {
            message: message.into(),
        }
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal {
            message: message.into(),
        }
    }
}

/// Core 操作的 Result 类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        let message = err.to_string();
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::ConnectionRefused => {
                CoreError::Transport { message }
            }
            _ => CoreError::Internal { message },
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Internal {
            message: err.to_string(),
        }
    }
}
