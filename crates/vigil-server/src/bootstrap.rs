//! 服务器装配与生命周期
//!
//! 启动时打开总线与存储并装配各组件；停机时取消全部后台任务并等待收尾。

use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;
use vigil_core::check::CheckRegistry;
use vigil_core::config::VigilConfig;
use vigil_core::shutdown::GracefulShutdown;
use vigil_core::transport::{MessageBus, NatsBus};

use crate::application::services::dispatcher::PolicyDispatcher;
use crate::application::services::ingest::IngestionService;
use crate::application::services::registry::AgentRegistry;
use crate::infrastructure::monitor::listeners::BusListeners;
use crate::infrastructure::persistence::memory::{
    MemoryAgentRepository, MemoryEventRepository, MemoryMetricRepository,
};
use crate::interface::http::{router, AppState};

pub struct ServerBootstrapper {
    cfg: VigilConfig,
}

impl ServerBootstrapper {
    pub fn new(cfg: VigilConfig) -> Self {
        Self { cfg }
    }

    pub async fn start(self) -> Result<RunningServer> {
        let shutdown = GracefulShutdown::new();

        let bus: Arc<dyn MessageBus> =
            Arc::new(NatsBus::connect(&self.cfg.nats.url, "vigil-server").await?);

        // 存储端口：进程内实现（文档存储绑定实现同一组端口）
        let registry = Arc::new(AgentRegistry::new(Arc::new(MemoryAgentRepository::new())));
        let ingest = Arc::new(IngestionService::new(
            registry.clone(),
            Arc::new(MemoryEventRepository::new()),
            Arc::new(MemoryMetricRepository::new()),
        ));
        let dispatcher = Arc::new(PolicyDispatcher::new(
            registry.clone(),
            Arc::new(CheckRegistry::with_builtin()),
            bus.clone(),
        ));

        let mut handles = BusListeners::new(
            bus,
            registry.clone(),
            ingest.clone(),
            self.cfg.nats.url.clone(),
            shutdown.child_token(),
        )
        .spawn_all()
        .await?;

        let app = router(AppState {
            registry,
            dispatcher,
            ingest,
            nats_url: self.cfg.nats.url.clone(),
        });
        let listener = tokio::net::TcpListener::bind(&self.cfg.http.listen_addr).await?;
        info!("HTTP API listening on http://{}", self.cfg.http.listen_addr);

        let http_token = shutdown.child_token();
        handles.push(tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { http_token.cancelled().await })
                .await;
            if let Err(e) = result {
                tracing::error!("HTTP server error: {}", e);
            }
        }));

        Ok(RunningServer { shutdown, handles })
    }
}

pub struct RunningServer {
    shutdown: GracefulShutdown,
    handles: Vec<JoinHandle<()>>,
}

impl RunningServer {
    /// 阻塞到收到停机信号，然后等待全部后台任务退出
    pub async fn wait_for_shutdown(self) -> Result<()> {
        self.shutdown.wait_for_signal().await;
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("Server shut down gracefully");
        Ok(())
    }
}
