//! 内存仓储实现
//!
//! 文档存储引擎是边界外协作者；进程内实现满足同样的端口契约，
//! 既作为默认运行形态，也作为测试替身。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
use vigil_core::agent::{Agent, Metric};
use vigil_core::error::CoreError;
use vigil_core::policy::Event;

use crate::application::ports::{AgentRepository, EventRepository, MetricRepository};

/// DashMap 支撑的 Agent 仓储；整条记录原子替换，读者不会看到半写状态
#[derive(Default)]
pub struct MemoryAgentRepository {
    agents: DashMap<String, Agent>,
}

impl MemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentRepository for MemoryAgentRepository {
    async fn find(&self, uid: &str) -> Result<Option<Agent>, CoreError> {
        Ok(self.agents.get(uid).map(|entry| entry.value().clone()))
    }

    async fn upsert(&self, agent: Agent) -> Result<(), CoreError> {
        self.agents.insert(agent.uid.as_str().to_string(), agent);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Agent>, CoreError> {
        Ok(self
            .agents
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}

/// 只追加的事件日志
#[derive(Default)]
pub struct MemoryEventRepository {
    events: RwLock<Vec<Event>>,
}

impl MemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventRepository for MemoryEventRepository {
    async fn insert(&self, event: Event) -> Result<(), CoreError> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn query(
        &self,
        agent_uid: &str,
        alias: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<Event>, CoreError> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| {
                e.policy.agent_uid.as_str() == agent_uid
                    && e.alias() == Some(alias)
                    && e.time > after
            })
            .cloned()
            .collect())
    }
}

/// 只追加的指标日志
#[derive(Default)]
pub struct MemoryMetricRepository {
    metrics: RwLock<Vec<Metric>>,
}

impl MemoryMetricRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricRepository for MemoryMetricRepository {
    async fn insert(&self, metric: Metric) -> Result<(), CoreError> {
        self.metrics.write().await.push(metric);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Metric>, CoreError> {
        Ok(self.metrics.read().await.clone())
    }
}
