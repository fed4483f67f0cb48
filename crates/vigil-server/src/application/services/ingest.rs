//! 事件/指标采集与查询
//!
//! 事件与指标都是只追加的记录。指标到达兼作心跳：
//! 先落盘，再刷新注册表时间戳，两步串行、不回滚。

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use vigil_core::agent::Metric;
use vigil_core::error::{CoreError, Result};
use vigil_core::policy::Event;

use super::registry::AgentRegistry;
use crate::application::ports::{EventRepository, MetricRepository};

pub struct IngestionService {
    registry: Arc<AgentRegistry>,
    events: Arc<dyn EventRepository>,
    metrics: Arc<dyn MetricRepository>,
}

impl IngestionService {
    pub fn new(
        registry: Arc<AgentRegistry>,
        events: Arc<dyn EventRepository>,
        metrics: Arc<dyn MetricRepository>,
    ) -> Self {
        Self {
            registry,
            events,
            metrics,
        }
    }

    /// 追加一条事件记录
    pub async fn ingest_event(&self, event: Event) -> Result<()> {
        debug!(
            agent_uid = event.policy.agent_uid.as_str(),
            alias = event.alias().unwrap_or_default(),
            outcome = %event.outcome,
            "Ingesting event"
        );
        self.events.insert(event).await
    }

    /// 追加一条指标并刷新对应 Agent 的心跳。
    ///
    /// 未注册 Agent 的指标是前置条件违反：错误向边界层传播，
    /// 但已写入的指标不回滚。
    pub async fn ingest_metric(&self, metric: Metric) -> Result<()> {
        let uid = metric.agent_uid.as_str().to_string();
        self.metrics.insert(metric).await?;
        self.registry.touch(&uid).await
    }

    pub async fn list_metrics(&self) -> Result<Vec<Metric>> {
        self.metrics.list().await
    }

    /// 查询时间窗口内的事件：`time > now - since`，严格大于。
    pub async fn query_events(&self, agent_uid: &str, alias: &str, since: Duration) -> Result<Vec<Event>> {
        let since = chrono::Duration::from_std(since)
            .map_err(|e| CoreError::validation(format!("time window out of range: {e}")))?;
        let after = Utc::now() - since;
        self.events.query(agent_uid, alias, after).await
    }
}
