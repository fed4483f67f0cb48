//! 事件上报
//!
//! 执行引擎通过 [`EventSink`] 端口上报 tick 结果；
//! 总线实现带退避重试，测试注入通道替身。

use async_trait::async_trait;
use std::sync::Arc;
use vigil_core::backoff::{execute_with_backoff, network_publish_backoff};
use vigil_core::constants::events_subject_for;
use vigil_core::core_types::AgentId;
use vigil_core::error::Result;
use vigil_core::policy::Event;
use vigil_core::transport::MessageBus;

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn report(&self, event: &Event) -> Result<()>;
}

/// 将事件以 JSON 发布到 vigil.events.<uid>
pub struct BusEventSink {
    bus: Arc<dyn MessageBus>,
    agent_uid: AgentId,
}

impl BusEventSink {
    pub fn new(bus: Arc<dyn MessageBus>, agent_uid: impl Into<AgentId>) -> Self {
        Self {
            bus,
            agent_uid: agent_uid.into(),
        }
    }
}

#[async_trait]
impl EventSink for BusEventSink {
    async fn report(&self, event: &Event) -> Result<()> {
        let subject = events_subject_for(self.agent_uid.as_str());
        let payload = serde_json::to_vec(event)?;

        execute_with_backoff(
            || async {
                self.bus
                    .publish(&subject, payload.clone().into())
                    .await
            },
            network_publish_backoff(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use vigil_core::policy::Policy;
    use vigil_core::transport::MemoryBus;

    #[tokio::test]
    async fn test_report_publishes_on_agent_subject() {
        let bus = Arc::new(MemoryBus::new());
        let mut stream = bus.subscribe("vigil.events.a1").await.unwrap();

        let sink = BusEventSink::new(bus.clone(), "a1");
        let event = Event::success(
            Policy::new("tcp", "a1")
                .with_parameter("alias", "x")
                .with_parameter("port", "80")
                .with_parameter("frequency", "1s"),
        );
        sink.report(&event).await.unwrap();

        let msg = stream.next().await.unwrap();
        let received: Event = serde_json::from_slice(&msg.payload).unwrap();
        assert_eq!(received.alias(), Some("x"));
    }
}
