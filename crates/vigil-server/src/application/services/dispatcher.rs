//! 策略派发协议（master 侧）
//!
//! 单发、至多一次的推送：校验 → 在线门控 → 定址请求/应答 → 解读确认。
//! 任何一步失败都终止本次调用，核心内不做自动重试；
//! 对同一 Agent 的并发派发不做排序。

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use vigil_core::agent::AgentStatus;
use vigil_core::check::CheckRegistry;
use vigil_core::constants::{dispatch_timeout, policy_subject_for};
use vigil_core::error::{CoreError, Result};
use vigil_core::policy::{Policy, PolicyReply};
use vigil_core::transport::MessageBus;

use super::registry::AgentRegistry;

pub struct PolicyDispatcher {
    registry: Arc<AgentRegistry>,
    checks: Arc<CheckRegistry>,
    bus: Arc<dyn MessageBus>,
    timeout: Duration,
}

impl PolicyDispatcher {
    pub fn new(
        registry: Arc<AgentRegistry>,
        checks: Arc<CheckRegistry>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self::with_timeout(registry, checks, bus, dispatch_timeout())
    }

    pub fn with_timeout(
        registry: Arc<AgentRegistry>,
        checks: Arc<CheckRegistry>,
        bus: Arc<dyn MessageBus>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            checks,
            bus,
            timeout,
        }
    }

    /// 将一条策略推送给目标 Agent 并等待确认。
    pub async fn dispatch(&self, policy: &Policy) -> Result<()> {
        let uid = policy.agent_uid.as_str();
        if uid.is_empty() {
            return Err(CoreError::validation("UID can't be empty"));
        }

        // 在触达总线之前完成全部本地校验（接收侧会再校验一次）
        self.checks.validate(policy)?;

        let agent = self.registry.get(uid).await.map_err(|e| match e {
            CoreError::NotFound { .. } => CoreError::unknown_agent(uid),
            other => other,
        })?;

        // 不向推定不可达的 Agent 派发策略
        if self.registry.status(&agent) == AgentStatus::Offline {
            warn!(agent_uid = uid, "Refusing to dispatch to offline agent");
            return Err(CoreError::agent_offline(uid));
        }

        let subject = policy_subject_for(uid);
        let payload = serde_json::to_vec(policy)?;

        let reply_bytes = self
            .bus
            .request(&subject, payload.into(), self.timeout)
            .await
            .map_err(|e| CoreError::DispatchTimeout {
                subject: subject.clone(),
                message: e.to_string(),
            })?;

        let reply: PolicyReply = serde_json::from_slice(&reply_bytes)
            .map_err(|e| CoreError::policy_rejected(format!("unreadable reply: {e}")))?;
        if !reply.is_ack() {
            return Err(CoreError::policy_rejected(reply.error_message()));
        }

        info!(
            agent_uid = uid,
            alias = policy.alias().unwrap_or_default(),
            policy_type = %policy.policy_type,
            "Policy dispatched and acknowledged"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::AgentRepository;
    use crate::infrastructure::persistence::memory::MemoryAgentRepository;
    use bytes::Bytes;
    use chrono::Utc;
    use futures::StreamExt;
    use vigil_core::transport::MemoryBus;

    fn tcp_policy(uid: &str) -> Policy {
        Policy::new("tcp", uid)
            .with_parameter("alias", "x")
            .with_parameter("port", "8080")
            .with_parameter("frequency", "1s")
    }

    struct Fixture {
        registry: Arc<AgentRegistry>,
        bus: Arc<MemoryBus>,
        dispatcher: PolicyDispatcher,
    }

    fn fixture() -> Fixture {
        fixture_with_timeout(Duration::from_secs(5))
    }

    fn fixture_with_timeout(timeout: Duration) -> Fixture {
        let registry = Arc::new(AgentRegistry::new(Arc::new(MemoryAgentRepository::new())));
        let bus = Arc::new(MemoryBus::new());
        let dispatcher = PolicyDispatcher::with_timeout(
            registry.clone(),
            Arc::new(CheckRegistry::with_builtin()),
            bus.clone(),
            timeout,
        );
        Fixture {
            registry,
            bus,
            dispatcher,
        }
    }

    /// 在 a1_policy 上挂一个固定应答的响应者
    async fn spawn_responder(bus: Arc<MemoryBus>, reply: PolicyReply) {
        let mut stream = bus.subscribe("a1_policy").await.unwrap();
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                if let Some(reply_to) = msg.reply {
                    let payload = serde_json::to_vec(&reply).unwrap();
                    let _ = bus.publish(&reply_to, payload.into()).await;
                }
            }
        });
    }

    #[tokio::test]
    async fn test_empty_uid_rejected() {
        let f = fixture();
        let err = f.dispatcher.dispatch(&tcp_policy("")).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_invalid_policy_rejected_before_bus() {
        let f = fixture();
        f.registry.register("a1", "host1").await.unwrap();
        let mut stream = f.bus.subscribe("a1_policy").await.unwrap();

        let mut policy = tcp_policy("a1");
        policy.parameters.remove("frequency");
        let err = f.dispatcher.dispatch(&policy).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));

        // 校验失败不得触达总线
        let probe = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
        assert!(probe.is_err());
    }

    #[tokio::test]
    async fn test_unsupported_type_rejected_before_bus() {
        let f = fixture();
        f.registry.register("a1", "host1").await.unwrap();
        let policy = Policy::new("icmp", "a1").with_parameter("alias", "x");
        let err = f.dispatcher.dispatch(&policy).await.unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedPolicyType { .. }));
    }

    #[tokio::test]
    async fn test_unknown_agent() {
        let f = fixture();
        let mut stream = f.bus.subscribe("a1_policy").await.unwrap();

        let err = f.dispatcher.dispatch(&tcp_policy("a1")).await.unwrap_err();
        assert!(matches!(err, CoreError::UnknownAgent { .. }));

        let probe = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
        assert!(probe.is_err());
    }

    #[tokio::test]
    async fn test_offline_agent() {
        let f = fixture();
        let repo = Arc::new(MemoryAgentRepository::new());
        let registry = Arc::new(AgentRegistry::new(repo.clone()));
        let dispatcher = PolicyDispatcher::new(
            registry.clone(),
            Arc::new(CheckRegistry::with_builtin()),
            f.bus.clone(),
        );

        let mut agent = registry.register("a1", "host1").await.unwrap();
        agent.updated_at = Utc::now() - chrono::Duration::seconds(30);
        repo.upsert(agent).await.unwrap();

        let mut stream = f.bus.subscribe("a1_policy").await.unwrap();
        let err = dispatcher.dispatch(&tcp_policy("a1")).await.unwrap_err();
        assert!(matches!(err, CoreError::AgentOffline { .. }));

        let probe = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
        assert!(probe.is_err());
    }

    #[tokio::test]
    async fn test_no_responder_is_dispatch_timeout() {
        let f = fixture();
        f.registry.register("a1", "host1").await.unwrap();
        let err = f.dispatcher.dispatch(&tcp_policy("a1")).await.unwrap_err();
        assert!(matches!(err, CoreError::DispatchTimeout { .. }));
    }

    #[tokio::test]
    async fn test_silent_responder_is_dispatch_timeout() {
        let f = fixture_with_timeout(Duration::from_millis(100));
        f.registry.register("a1", "host1").await.unwrap();
        // 订阅但从不应答
        let _stream = f.bus.subscribe("a1_policy").await.unwrap();

        let err = f.dispatcher.dispatch(&tcp_policy("a1")).await.unwrap_err();
        assert!(matches!(err, CoreError::DispatchTimeout { .. }));
    }

    #[tokio::test]
    async fn test_rejection_reply_surfaces_remote_message() {
        let f = fixture();
        f.registry.register("a1", "host1").await.unwrap();
        spawn_responder(
            f.bus.clone(),
            PolicyReply::rejected("\"port\" key missing in tcp policy"),
        )
        .await;

        let err = f.dispatcher.dispatch(&tcp_policy("a1")).await.unwrap_err();
        match err {
            CoreError::PolicyRejected { message } => {
                assert!(message.contains("\"port\" key missing"));
            }
            other => panic!("expected PolicyRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_canonical_ack_is_rejection() {
        let f = fixture();
        f.registry.register("a1", "host1").await.unwrap();
        spawn_responder(
            f.bus.clone(),
            PolicyReply {
                status: "installed".to_string(),
                error: None,
            },
        )
        .await;

        let err = f.dispatcher.dispatch(&tcp_policy("a1")).await.unwrap_err();
        assert!(matches!(err, CoreError::PolicyRejected { .. }));
    }

    #[tokio::test]
    async fn test_canonical_ack_succeeds() {
        let f = fixture();
        f.registry.register("a1", "host1").await.unwrap();
        spawn_responder(f.bus.clone(), PolicyReply::ack()).await;

        f.dispatcher.dispatch(&tcp_policy("a1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_garbled_reply_is_rejection() {
        let f = fixture();
        f.registry.register("a1", "host1").await.unwrap();

        let bus = f.bus.clone();
        let mut stream = bus.subscribe("a1_policy").await.unwrap();
        tokio::spawn(async move {
            let msg = stream.next().await.unwrap();
            let _ = bus
                .publish(&msg.reply.unwrap(), Bytes::from_static(b"not json"))
                .await;
        });

        let err = f.dispatcher.dispatch(&tcp_policy("a1")).await.unwrap_err();
        assert!(matches!(err, CoreError::PolicyRejected { .. }));
    }
}
