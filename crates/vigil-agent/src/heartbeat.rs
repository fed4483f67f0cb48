//! 心跳服务
//!
//! 按固定间隔（默认 5 秒，即在线判定窗口的一半）发布一条携带主机事实的
//! 指标。指标到达 master 即刷新本 Agent 的 `updated_at`。

use std::sync::Arc;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use vigil_core::agent::Metric;
use vigil_core::backoff::{execute_with_backoff, heartbeat_backoff};
use vigil_core::constants::METRICS_SUBJECT;
use vigil_core::core_types::AgentId;
use vigil_core::error::Result;
use vigil_core::transport::MessageBus;

use crate::collector::FactCollector;

pub struct HeartbeatService {
    agent_uid: AgentId,
    bus: Arc<dyn MessageBus>,
    collector: Arc<FactCollector>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl HeartbeatService {
    pub fn new(
        agent_uid: impl Into<AgentId>,
        bus: Arc<dyn MessageBus>,
        collector: Arc<FactCollector>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            agent_uid: agent_uid.into(),
            bus,
            collector,
            interval,
            shutdown,
        }
    }

    pub async fn run(self) {
        let mut timer = interval(self.interval);
        let mut sequence = 0u64;

        info!(interval_ms = self.interval.as_millis() as u64, "Starting heartbeat service");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Heartbeat service received shutdown");
                    break;
                }
                _ = timer.tick() => {
                    if let Err(e) = self.send_heartbeat(sequence).await {
                        error!("Failed to send heartbeat: {}", e);
                    } else {
                        debug!("Heartbeat sent (sequence: {})", sequence);
                        sequence = sequence.wrapping_add(1);
                    }
                }
            }
        }
    }

    async fn send_heartbeat(&self, sequence: u64) -> Result<()> {
        let mut data = self.collector.collect();
        if let Some(map) = data.as_object_mut() {
            map.insert("sequence".to_string(), serde_json::json!(sequence));
        }

        let metric = Metric::new(self.agent_uid.clone(), data);
        let payload = serde_json::to_vec(&metric)?;

        execute_with_backoff(
            || async {
                self.bus
                    .publish(METRICS_SUBJECT, payload.clone().into())
                    .await
            },
            heartbeat_backoff(),
        )
        .await
    }
}
