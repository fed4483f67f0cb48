//! 总线监听器
//!
//! 三个独立的后台循环：注册应答、指标采集、事件采集。
//! 每个循环持有自己的子取消令牌；采集错误记日志不中断循环。

use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vigil_core::agent::{Metric, RegisterReply, RegisterRequest};
use vigil_core::constants::{events_wildcard_subject, METRICS_SUBJECT, REGISTER_SUBJECT};
use vigil_core::error::Result;
use vigil_core::policy::Event;
use vigil_core::transport::{BusMessage, MessageBus};

use crate::application::services::ingest::IngestionService;
use crate::application::services::registry::AgentRegistry;

pub struct BusListeners {
    bus: Arc<dyn MessageBus>,
    registry: Arc<AgentRegistry>,
    ingest: Arc<IngestionService>,
    /// 注册应答中回发给 Agent 的总线地址
    nats_url: String,
    shutdown: CancellationToken,
}

impl BusListeners {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        registry: Arc<AgentRegistry>,
        ingest: Arc<IngestionService>,
        nats_url: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            bus,
            registry,
            ingest,
            nats_url,
            shutdown,
        }
    }

    /// 订阅全部主题并启动监听循环
    pub async fn spawn_all(self) -> Result<Vec<JoinHandle<()>>> {
        let register_stream = self.bus.subscribe(REGISTER_SUBJECT).await?;
        let metrics_stream = self.bus.subscribe(METRICS_SUBJECT).await?;
        let events_stream = self.bus.subscribe(&events_wildcard_subject()).await?;

        let registration = {
            let bus = self.bus.clone();
            let registry = self.registry.clone();
            let nats_url = self.nats_url.clone();
            let token = self.shutdown.clone();
            tokio::spawn(async move {
                info!("Registration responder started");
                let mut stream = register_stream;
                loop {
                    tokio::select! {
                        _ = token.cancelled() => {
                            info!("Registration responder stopped");
                            break;
                        }
                        msg = stream.next() => match msg {
                            Some(msg) => handle_registration(&bus, &registry, &nats_url, msg).await,
                            None => {
                                warn!("Registration stream ended");
                                break;
                            }
                        }
                    }
                }
            })
        };

        let metrics = {
            let ingest = self.ingest.clone();
            let token = self.shutdown.clone();
            tokio::spawn(async move {
                info!("Metrics monitor started");
                let mut stream = metrics_stream;
                loop {
                    tokio::select! {
                        _ = token.cancelled() => {
                            info!("Metrics monitor stopped");
                            break;
                        }
                        msg = stream.next() => match msg {
                            Some(msg) => handle_metric(&ingest, msg).await,
                            None => {
                                warn!("Metrics stream ended");
                                break;
                            }
                        }
                    }
                }
            })
        };

        let events = {
            let ingest = self.ingest.clone();
            let token = self.shutdown.clone();
            tokio::spawn(async move {
                info!("Events monitor started");
                let mut stream = events_stream;
                loop {
                    tokio::select! {
                        _ = token.cancelled() => {
                            info!("Events monitor stopped");
                            break;
                        }
                        msg = stream.next() => match msg {
                            Some(msg) => handle_event(&ingest, msg).await,
                            None => {
                                warn!("Events stream ended");
                                break;
                            }
                        }
                    }
                }
            })
        };

        Ok(vec![registration, metrics, events])
    }
}

async fn handle_registration(
    bus: &Arc<dyn MessageBus>,
    registry: &Arc<AgentRegistry>,
    nats_url: &str,
    msg: BusMessage,
) {
    let reply = match serde_json::from_slice::<RegisterRequest>(&msg.payload) {
        Ok(req) => match registry.register(&req.uid, &req.host_name).await {
            Ok(agent) => {
                info!(uid = agent.uid.as_str(), "Agent registered over bus");
                RegisterReply::ok(nats_url)
            }
            Err(e) => {
                warn!(error = %e, "Registration rejected");
                RegisterReply::rejected(e.to_string())
            }
        },
        Err(e) => {
            warn!(error = %e, "Unreadable registration request");
            RegisterReply::rejected(format!("unable to decode request: {e}"))
        }
    };

    let Some(reply_to) = msg.reply else {
        return;
    };
    match serde_json::to_vec(&reply) {
        Ok(payload) => {
            if let Err(e) = bus.publish(&reply_to, payload.into()).await {
                warn!(error = %e, "Failed to send registration reply");
            }
        }
        Err(e) => warn!(error = %e, "Failed to encode registration reply"),
    }
}

async fn handle_metric(ingest: &Arc<IngestionService>, msg: BusMessage) {
    match serde_json::from_slice::<Metric>(&msg.payload) {
        Ok(metric) => {
            if let Err(e) = ingest.ingest_metric(metric).await {
                warn!(error = %e, "Failed to ingest metric");
            }
        }
        Err(e) => warn!(error = %e, subject = msg.subject, "Unreadable metric payload"),
    }
}

async fn handle_event(ingest: &Arc<IngestionService>, msg: BusMessage) {
    match serde_json::from_slice::<Event>(&msg.payload) {
        Ok(event) => {
            if let Err(e) = ingest.ingest_event(event).await {
                warn!(error = %e, "Failed to ingest event");
            }
        }
        Err(e) => warn!(error = %e, subject = msg.subject, "Unreadable event payload"),
    }
}
