//! 存储端口
//!
//! Registry 与采集组件只通过这些接口触达持久化，方便注入内存替身测试。
//! 接口刻意收窄到 find/upsert/insert/query：底层引擎只需是一个带键的
//! 文档存储。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vigil_core::agent::{Agent, Metric};
use vigil_core::error::CoreError;
use vigil_core::policy::Event;

/// Agent 仓储接口
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// 按 uid 查找
    async fn find(&self, uid: &str) -> Result<Option<Agent>, CoreError>;

    /// 按 uid 插入或整体覆盖（最后写入获胜）
    async fn upsert(&self, agent: Agent) -> Result<(), CoreError>;

    async fn list(&self) -> Result<Vec<Agent>, CoreError>;
}

/// 事件仓储接口：只追加，不变更
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn insert(&self, event: Event) -> Result<(), CoreError>;

    /// 查询指定 Agent、指定策略别名、时间严格晚于 `after` 的事件
    async fn query(
        &self,
        agent_uid: &str,
        alias: &str,
        after: DateTime<Utc>,
    ) -> Result<Vec<Event>, CoreError>;
}

/// 指标仓储接口：只追加
#[async_trait]
pub trait MetricRepository: Send + Sync {
    async fn insert(&self, metric: Metric) -> Result<(), CoreError>;

    async fn list(&self) -> Result<Vec<Metric>, CoreError>;
}
