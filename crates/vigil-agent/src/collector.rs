//! 主机事实采集
//!
//! 心跳指标的载荷来源：主机名、操作系统、CPU/内存概况。

use serde_json::json;
use sysinfo::System;

pub struct FactCollector {
    system: std::sync::Mutex<System>,
}

impl FactCollector {
    pub fn new() -> Self {
        Self {
            system: std::sync::Mutex::new(System::new_all()),
        }
    }

    pub fn host_name(&self) -> String {
        System::host_name().unwrap_or_else(|| "unknown".to_string())
    }

    /// 采集一次主机事实快照
    pub fn collect(&self) -> serde_json::Value {
        let (cpu_count, total_memory) = match self.system.lock() {
            Ok(mut system) => {
                system.refresh_memory();
                (system.cpus().len(), system.total_memory())
            }
            Err(_) => (0, 0),
        };

        json!({
            "hostname": self.host_name(),
            "os_name": System::name().unwrap_or_default(),
            "os_version": System::os_version().unwrap_or_default(),
            "kernel_version": System::kernel_version().unwrap_or_default(),
            "cpu_count": cpu_count,
            "memory_total_bytes": total_memory,
            "agent_version": env!("CARGO_PKG_VERSION"),
        })
    }
}

impl Default for FactCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_has_expected_keys() {
        let collector = FactCollector::new();
        let facts = collector.collect();
        assert!(facts.get("hostname").is_some());
        assert!(facts.get("cpu_count").is_some());
        assert!(facts.get("memory_total_bytes").is_some());
        assert_eq!(facts["agent_version"], env!("CARGO_PKG_VERSION"));
    }
}
