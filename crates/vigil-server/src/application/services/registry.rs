//! Agent 注册表
//!
//! 已知 Agent 的权威记录。在线状态从不落盘，读取时按心跳新鲜度推导。

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use vigil_core::agent::{Agent, AgentStatus};
use vigil_core::constants::liveness_threshold;
use vigil_core::error::{CoreError, Result};

use crate::application::ports::AgentRepository;

pub struct AgentRegistry {
    repo: Arc<dyn AgentRepository>,
    liveness_threshold: Duration,
}

impl AgentRegistry {
    pub fn new(repo: Arc<dyn AgentRepository>) -> Self {
        Self::with_threshold(repo, liveness_threshold())
    }

    /// 自定义在线判定窗口（默认 10 秒）
    pub fn with_threshold(repo: Arc<dyn AgentRepository>, liveness_threshold: Duration) -> Self {
        Self {
            repo,
            liveness_threshold,
        }
    }

    /// 注册或刷新一个 Agent。
    ///
    /// 同 uid 重复注册是幂等的 upsert：保留 `registered_at`，
    /// 刷新 `updated_at` 与 `host_name`，不产生重复记录。
    pub async fn register(&self, uid: &str, host_name: &str) -> Result<Agent> {
        if uid.is_empty() {
            return Err(CoreError::validation("UID can't be empty"));
        }

        let agent = match self.repo.find(uid).await? {
            Some(mut existing) => {
                existing.updated_at = Utc::now();
                existing.host_name = host_name.to_string();
                existing
            }
            None => {
                info!(uid, host_name, "Registering new agent");
                Agent::new(uid, host_name)
            }
        };

        self.repo.upsert(agent.clone()).await?;
        Ok(agent)
    }

    /// 刷新心跳时间戳。uid 未知时报 NotFound。
    pub async fn touch(&self, uid: &str) -> Result<()> {
        let mut agent = self.get(uid).await?;
        agent.updated_at = Utc::now();
        self.repo.upsert(agent).await
    }

    pub async fn get(&self, uid: &str) -> Result<Agent> {
        self.repo
            .find(uid)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("agent {uid}")))
    }

    pub async fn list(&self) -> Result<Vec<Agent>> {
        self.repo.list().await
    }

    /// 按注册表配置的窗口推导状态
    pub fn status(&self, agent: &Agent) -> AgentStatus {
        agent.status_at(Utc::now(), self.liveness_threshold)
    }
}
