//! 策略与事件的领域模型
//!
//! Policy 是发给单个 Agent 的具名检查定义；它是瞬态消息，不落盘。
//! Event 是一次 tick 的不可变结果记录，只追加。

use crate::constants::POLICY_ACK;
use crate::core_types::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 所有策略类型的公共必填参数键
pub const ALIAS_KEY: &str = "alias";

/// 监控策略类型标签
///
/// e.g. "tcp"
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyType(String);

impl PolicyType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PolicyType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PolicyType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 具名检查定义。
///
/// `parameters` 的键集合由类型决定；所有策略必须携带 `alias` 键，
/// 供操作员标识该策略（如 "web-port-check"）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub policy_type: PolicyType,
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub agent_uid: AgentId,
}

impl Policy {
    pub fn new(policy_type: impl Into<PolicyType>, agent_uid: impl Into<AgentId>) -> Self {
        Self {
            policy_type: policy_type.into(),
            parameters: BTreeMap::new(),
            agent_uid: agent_uid.into(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn alias(&self) -> Option<&str> {
        self.parameter(ALIAS_KEY)
    }
}

/// 按类型分组的策略集合，用于批量装载/描述
pub type PolicyConfig = BTreeMap<PolicyType, Vec<Policy>>;

/// 一次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次 tick 的不可变结果记录。写入后永不变更。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub policy: Policy,
    pub time: DateTime<Utc>,
    pub outcome: Outcome,
    /// 失败时的错误消息；成功时为空
    #[serde(default)]
    pub detail: String,
}

impl Event {
    pub fn success(policy: Policy) -> Self {
        Self {
            policy,
            time: Utc::now(),
            outcome: Outcome::Success,
            detail: String::new(),
        }
    }

    pub fn failure(policy: Policy, detail: impl Into<String>) -> Self {
        Self {
            policy,
            time: Utc::now(),
            outcome: Outcome::Failure,
            detail: detail.into(),
        }
    }

    pub fn alias(&self) -> Option<&str> {
        self.policy.alias()
    }
}

/// 策略安装的应答。
/// 只有 `status == "policy ack"` 且不含错误才算成功安装。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyReply {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl PolicyReply {
    pub fn ack() -> Self {
        Self {
            status: POLICY_ACK.to_string(),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            status: "rejected".to_string(),
            error: Some(error.into()),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.error.is_none() && self.status == POLICY_ACK
    }

    /// 拒绝时的远端消息；状态非规范值但无错误字段时给出兜底描述
    pub fn error_message(&self) -> String {
        match &self.error {
            Some(e) => e.clone(),
            None => format!("unexpected reply status: {:?}", self.status),
        }
    }
}
