//! 策略执行引擎（agent 侧）
//!
//! 在 <uid>_policy 上以请求/应答方式接收策略：重新校验（纵深防御），
//! 失败回复错误、绝不安装；成功先回复规范确认值，再启动独立的周期任务。
//! 确认先于任何检查结果，安装成功不代表检查成功。
//!
//! 每个已安装策略是一个带取消令牌的显式任务，按 alias 索引；
//! tick 在任务内同步执行，跑长了会推迟、但不会跳过下一个 tick。

use dashmap::DashMap;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vigil_core::check::CheckRegistry;
use vigil_core::constants::policy_subject_for;
use vigil_core::core_types::AgentId;
use vigil_core::error::Result;
use vigil_core::policy::{Event, Policy, PolicyConfig, PolicyReply};
use vigil_core::transport::{BusMessage, MessageBus};

use crate::reporter::EventSink;

/// 一个已安装策略的运行句柄
struct PolicyTask {
    token: CancellationToken,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

pub struct PolicyEngine {
    agent_uid: AgentId,
    bus: Arc<dyn MessageBus>,
    checks: Arc<CheckRegistry>,
    sink: Arc<dyn EventSink>,
    /// alias -> 运行中的任务
    tasks: DashMap<String, PolicyTask>,
    shutdown: CancellationToken,
}

impl PolicyEngine {
    pub fn new(
        agent_uid: impl Into<AgentId>,
        bus: Arc<dyn MessageBus>,
        checks: Arc<CheckRegistry>,
        sink: Arc<dyn EventSink>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            agent_uid: agent_uid.into(),
            bus,
            checks,
            sink,
            tasks: DashMap::new(),
            shutdown,
        }
    }

    /// 监听本 Agent 的定址策略通道，直到停机
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let subject = policy_subject_for(self.agent_uid.as_str());
        let mut stream = self.bus.subscribe(&subject).await?;
        info!(subject, "Policy listener started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Policy listener received shutdown");
                    break;
                }
                msg = stream.next() => match msg {
                    Some(msg) => self.handle_message(msg).await,
                    None => {
                        warn!("Policy stream ended");
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    async fn handle_message(&self, msg: BusMessage) {
        let validated = serde_json::from_slice::<Policy>(&msg.payload)
            .map_err(|e| vigil_core::error::CoreError::validation(format!(
                "unable to decode policy: {e}"
            )))
            .and_then(|policy| {
                let interval = self.checks.validate(&policy)?;
                Ok((policy, interval))
            });

        match validated {
            Err(e) => {
                warn!(error = %e, "Rejecting policy");
                self.reply(msg.reply, PolicyReply::rejected(e.to_string()))
                    .await;
            }
            Ok((policy, interval)) => {
                // 确认先行：安装的成功不含任何检查结果
                self.reply(msg.reply, PolicyReply::ack()).await;
                self.install(policy, interval);
            }
        }
    }

    async fn reply(&self, reply_to: Option<String>, reply: PolicyReply) {
        let Some(subject) = reply_to else {
            return;
        };
        match serde_json::to_vec(&reply) {
            Ok(payload) => {
                if let Err(e) = self.bus.publish(&subject, payload.into()).await {
                    error!(error = %e, "Failed to send policy reply");
                }
            }
            Err(e) => error!(error = %e, "Failed to encode policy reply"),
        }
    }

    /// 启动一条已校验策略的周期任务。
    /// 同 alias 重复安装会取消并替换旧任务。
    pub fn install(&self, policy: Policy, interval: Duration) {
        let alias = policy.alias().unwrap_or_default().to_string();
        let token = self.shutdown.child_token();
        let handle = tokio::spawn(tick_loop(
            policy,
            interval,
            self.checks.clone(),
            self.sink.clone(),
            token.clone(),
        ));

        if let Some(previous) = self.tasks.insert(alias.clone(), PolicyTask { token, handle }) {
            previous.token.cancel();
            info!(alias, "Replaced running policy task");
        } else {
            info!(alias, "Installed policy task");
        }
    }

    /// 批量装载本地策略配置（启动时使用；不经过总线、没有应答方）。
    /// 单条非法策略记日志跳过，不影响其余条目。
    pub fn install_config(&self, config: PolicyConfig) {
        for (policy_type, policies) in config {
            for mut policy in policies {
                policy.policy_type = policy_type.clone();
                match self.checks.validate(&policy) {
                    Ok(interval) => self.install(policy, interval),
                    Err(e) => {
                        error!(
                            policy_type = %policy_type,
                            alias = policy.alias().unwrap_or_default(),
                            error = %e,
                            "Skipping invalid policy from local config"
                        );
                    }
                }
            }
        }
    }

    /// 当前运行中的任务数
    pub fn installed_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_installed(&self, alias: &str) -> bool {
        self.tasks.contains_key(alias)
    }
}

/// 单条策略的周期执行循环。
/// 每个 tick 恰好执行一次检查并上报一条事件；上报失败记日志后继续。
async fn tick_loop(
    policy: Policy,
    interval: Duration,
    checks: Arc<CheckRegistry>,
    sink: Arc<dyn EventSink>,
    token: CancellationToken,
) {
    let alias = policy.alias().unwrap_or_default().to_string();
    let kind = match checks.get(policy.policy_type.as_str()) {
        Ok(kind) => kind,
        // 安装前已校验；能走到这里说明注册表被并发改动了
        Err(e) => {
            error!(alias, error = %e, "Check kind vanished before first tick");
            return;
        }
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(alias, policy_type = %policy.policy_type, interval_ms = interval.as_millis() as u64, "Policy task started");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!(alias, "Policy task stopped");
                break;
            }
            _ = ticker.tick() => {
                let event = match kind.run_once(&policy.parameters, interval).await {
                    Ok(()) => Event::success(policy.clone()),
                    Err(detail) => Event::failure(policy.clone(), detail),
                };
                if let Err(e) = sink.report(&event).await {
                    // 上报失败不升级：保持周期任务存活
                    warn!(alias, error = %e, "Failed to report event");
                }
            }
        }
    }
}
