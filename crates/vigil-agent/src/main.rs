use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use vigil_agent::collector::FactCollector;
use vigil_agent::engine::PolicyEngine;
use vigil_agent::heartbeat::HeartbeatService;
use vigil_agent::reporter::BusEventSink;
use vigil_core::agent::{RegisterReply, RegisterRequest};
use vigil_core::check::CheckRegistry;
use vigil_core::config::VigilConfig;
use vigil_core::constants::REGISTER_SUBJECT;
use vigil_core::policy::PolicyConfig;
use vigil_core::shutdown::GracefulShutdown;
use vigil_core::transport::{MessageBus, NatsBus};

#[derive(Parser)]
#[command(name = "vigil-agent")]
#[command(about = "Vigil monitoring daemon")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = VigilConfig::load(args.config.as_deref())?;

    vigil_core::telemetry::init_tracing_with(&vigil_core::telemetry::LogConfig {
        level: cfg.telemetry.log_level.clone(),
        format: cfg.telemetry.log_format.clone(),
        no_ansi: false,
    });

    info!("Starting Vigil Agent...");
    info!("  NATS URL: {}", cfg.nats.url);

    let bus: Arc<dyn MessageBus> = Arc::new(NatsBus::connect(&cfg.nats.url, "vigil-agent").await?);

    // 未配置 uid 时启动随机生成
    let agent_uid = cfg
        .agent
        .uid
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    info!("Agent UID: {}", agent_uid);

    let collector = Arc::new(FactCollector::new());
    let shutdown = GracefulShutdown::new();

    // 向 master 注册（请求/应答，一次性；失败即退出）
    let request = RegisterRequest {
        uid: agent_uid.clone(),
        host_name: collector.host_name(),
    };
    let reply_bytes = bus
        .request(
            REGISTER_SUBJECT,
            serde_json::to_vec(&request)?.into(),
            Duration::from_secs(5),
        )
        .await?;
    let reply: RegisterReply = serde_json::from_slice(&reply_bytes)?;
    if let Some(error) = reply.error {
        anyhow::bail!("registration rejected by master: {error}");
    }
    info!(
        "Registered with master (bus: {})",
        reply.nats_url.unwrap_or_default()
    );

    let heartbeat = HeartbeatService::new(
        agent_uid.clone(),
        bus.clone(),
        collector.clone(),
        Duration::from_secs(cfg.agent.heartbeat_interval_secs),
        shutdown.child_token(),
    );

    let sink = Arc::new(BusEventSink::new(bus.clone(), agent_uid.clone()));
    let engine = Arc::new(PolicyEngine::new(
        agent_uid.clone(),
        bus,
        Arc::new(CheckRegistry::with_builtin()),
        sink,
        shutdown.child_token(),
    ));

    // 本地策略配置：启动时装载（与总线安装走同一条校验路径）
    if let Some(path) = &cfg.agent.policy_file {
        let raw = std::fs::read_to_string(path)?;
        let config: PolicyConfig = serde_json::from_str(&raw)?;
        engine.install_config(config);
        info!("Loaded local policy config from {}", path.display());
    }

    let heartbeat_handle = tokio::spawn(heartbeat.run());
    let engine_handle = tokio::spawn({
        let engine = engine.clone();
        async move {
            if let Err(e) = engine.run().await {
                tracing::error!("Policy engine failed: {}", e);
            }
        }
    });

    info!("Agent started with uid: {}", agent_uid);

    shutdown.wait_for_signal().await;
    info!("Shutdown signal received, stopping services...");

    let _ = futures::future::join(heartbeat_handle, engine_handle).await;
    info!("Agent shut down gracefully");
    Ok(())
}
