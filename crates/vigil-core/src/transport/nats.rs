//! NATS 总线绑定
//!
//! 封装连接选项与事件回调日志，消除 server 和 agent 中的重复代码。

use super::{BusMessage, MessageBus, MessageStream};
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::time::Duration;
use tracing::info;

pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// 建立 NATS 连接。
    ///
    /// `client_name` 用于日志与连接标识。
    pub async fn connect(url: &str, client_name: &str) -> Result<Self> {
        let options = async_nats::ConnectOptions::new()
            .name(client_name)
            .retry_on_initial_connect()
            .connection_timeout(Duration::from_secs(30))
            .event_callback(|ev| async move {
                match ev {
                    async_nats::Event::Connected => {
                        tracing::info!("NATS connected successfully");
                    }
                    async_nats::Event::Disconnected => {
                        tracing::warn!("NATS disconnected - connection lost");
                    }
                    async_nats::Event::ClientError(e) => {
                        tracing::error!("NATS client error: {}", e);
                    }
                    _ => {
                        tracing::debug!("NATS event: {:?}", ev);
                    }
                }
            });

        let client = async_nats::connect_with_options(url, options)
            .await
            .map_err(|e| CoreError::transport(format!("connect {url}: {e}")))?;

        info!(url, client_name, "Connected to NATS");
        Ok(Self { client })
    }

    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<()> {
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| CoreError::transport(format!("publish {subject}: {e}")))?;
        Ok(())
    }

    async fn request(&self, subject: &str, payload: Bytes, timeout: Duration) -> Result<Bytes> {
        // 自带超时上限，独立于客户端内部的重连/重试行为
        let response = tokio::time::timeout(
            timeout,
            self.client.request(subject.to_string(), payload),
        )
        .await
        .map_err(|_| {
            CoreError::transport(format!(
                "request {subject}: timed out after {}ms",
                timeout.as_millis()
            ))
        })?
        .map_err(|e| CoreError::transport(format!("request {subject}: {e}")))?;

        Ok(response.payload)
    }

    async fn subscribe(&self, subject: &str) -> Result<MessageStream> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| CoreError::transport(format!("subscribe {subject}: {e}")))?;

        let stream = subscriber.map(|msg| BusMessage {
            subject: msg.subject.to_string(),
            payload: msg.payload,
            reply: msg.reply.map(|r| r.to_string()),
        });

        Ok(Box::pin(stream))
    }
}
