//! 进程内消息总线
//!
//! 与 NATS 绑定实现同一套 [`MessageBus`] 契约：无订阅者的发布静默丢弃，
//! 无应答者的请求立即报错，应答通过一次性 `_INBOX` subject 回送。
//! 测试将其注入派发协议与执行引擎，替代真实传输。

use super::{BusMessage, MessageBus, MessageStream};
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

pub struct MemoryBus {
    subscribers: DashMap<String, Vec<mpsc::UnboundedSender<BusMessage>>>,
    inbox_seq: AtomicU64,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            inbox_seq: AtomicU64::new(0),
        }
    }

    /// 尾部 '>' 通配符：匹配前缀之后的任意后缀
    fn pattern_matches(pattern: &str, subject: &str) -> bool {
        match pattern.strip_suffix('>') {
            Some(prefix) => subject.starts_with(prefix),
            None => pattern == subject,
        }
    }

    /// 投递到所有匹配的订阅者；返回是否至少投递了一次。
    /// 顺带清理已关闭的接收端。
    fn deliver(&self, msg: &BusMessage) -> bool {
        let mut delivered = false;
        for mut entry in self.subscribers.iter_mut() {
            if !Self::pattern_matches(entry.key(), &msg.subject) {
                continue;
            }
            entry
                .value_mut()
                .retain(|tx| match tx.send(msg.clone()) {
                    Ok(()) => {
                        delivered = true;
                        true
                    }
                    Err(_) => false,
                });
        }
        delivered
    }

    fn add_subscriber(&self, pattern: &str) -> mpsc::UnboundedReceiver<BusMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .entry(pattern.to_string())
            .or_default()
            .push(tx);
        rx
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<()> {
        self.deliver(&BusMessage {
            subject: subject.to_string(),
            payload,
            reply: None,
        });
        Ok(())
    }

    async fn request(&self, subject: &str, payload: Bytes, timeout: Duration) -> Result<Bytes> {
        let inbox = format!(
            "_INBOX.{}",
            self.inbox_seq.fetch_add(1, Ordering::Relaxed)
        );
        let mut rx = self.add_subscriber(&inbox);

        let delivered = self.deliver(&BusMessage {
            subject: subject.to_string(),
            payload,
            reply: Some(inbox.clone()),
        });
        if !delivered {
            self.subscribers.remove(&inbox);
            return Err(CoreError::transport(format!(
                "request {subject}: no responders"
            )));
        }

        let reply = tokio::time::timeout(timeout, rx.recv()).await;
        self.subscribers.remove(&inbox);

        match reply {
            Ok(Some(msg)) => Ok(msg.payload),
            Ok(None) => Err(CoreError::transport(format!(
                "request {subject}: reply channel closed"
            ))),
            Err(_) => Err(CoreError::transport(format!(
                "request {subject}: timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn subscribe(&self, subject: &str) -> Result<MessageStream> {
        let rx = self.add_subscriber(subject);
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });
        Ok(Box::pin(stream))
    }
}
