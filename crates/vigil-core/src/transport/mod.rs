//! 消息总线抽象
//!
//! 核心只要求三个原语：发布、带超时的请求/应答、带应答地址的订阅。
//! [`nats::NatsBus`] 是生产绑定；[`memory::MemoryBus`] 是进程内替身，
//! 供测试注入使用。

pub mod memory;
pub mod nats;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;

pub use memory::MemoryBus;
pub use nats::NatsBus;

/// 订阅流上收到的一条消息
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub subject: String,
    pub payload: Bytes,
    /// 请求方期待应答时携带的应答 subject
    pub reply: Option<String>,
}

pub type MessageStream = Pin<Box<dyn Stream<Item = BusMessage> + Send>>;

/// 定址的消息总线。
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// 发布消息（即发即弃，无订阅者不算错误）
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<()>;

    /// 请求/应答，等待上限为 `timeout`。
    /// 超时与传输故障同样以 Err 返回；是否重试由调用方决定。
    async fn request(&self, subject: &str, payload: Bytes, timeout: Duration) -> Result<Bytes>;

    /// 订阅 subject；尾部 '>' 通配符匹配任意后缀
    async fn subscribe(&self, subject: &str) -> Result<MessageStream>;
}
