//! TCP 可达性检查
//!
//! 每个 tick 向配置的端点发起一次 TCP 连接，超时上限取执行间隔本身。
//! 连接成功/失败即为该 tick 的成功/失败。

use super::{require_exact_keys, CheckKind};
use crate::duration::parse_duration;
use crate::error::{CoreError, Result};
use crate::policy::ALIAS_KEY;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::net::TcpStream;

const FREQUENCY_KEY: &str = "frequency";
const PORT_KEY: &str = "port";
const REQUIRED_KEYS: &[&str] = &[ALIAS_KEY, PORT_KEY, FREQUENCY_KEY];

pub struct TcpCheck;

/// `port` 参数接受 "host:port"、":port" 或裸端口号；
/// 后两种形式连接 127.0.0.1。
fn dial_target(port: &str) -> String {
    if let Some(stripped) = port.strip_prefix(':') {
        format!("127.0.0.1:{stripped}")
    } else if port.contains(':') {
        port.to_string()
    } else {
        format!("127.0.0.1:{port}")
    }
}

#[async_trait]
impl CheckKind for TcpCheck {
    fn type_tag(&self) -> &'static str {
        "tcp"
    }

    fn validate(&self, parameters: &BTreeMap<String, String>) -> Result<Duration> {
        require_exact_keys(self.type_tag(), parameters, REQUIRED_KEYS)?;

        // require_exact_keys 已保证键存在
        let freq = parameters
            .get(FREQUENCY_KEY)
            .ok_or_else(|| CoreError::validation("\"frequency\" key missing in tcp policy"))?;
        let interval = parse_duration(freq)?;

        // 非严格正的间隔会退化成不终止的立即触发循环
        if interval.is_zero() {
            return Err(CoreError::validation(
                "frequency must be a positive quantity",
            ));
        }

        Ok(interval)
    }

    async fn run_once(
        &self,
        parameters: &BTreeMap<String, String>,
        interval: Duration,
    ) -> std::result::Result<(), String> {
        let port = parameters
            .get(PORT_KEY)
            .map(String::as_str)
            .unwrap_or_default();
        let target = dial_target(port);

        match tokio::time::timeout(interval, TcpStream::connect(&target)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(format!("connect {target}: {e}")),
            Err(_) => Err(format!(
                "connect {target}: timed out after {}ms",
                interval.as_millis()
            )),
        }
    }
}
