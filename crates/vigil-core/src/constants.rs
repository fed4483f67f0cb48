use std::time::Duration;

// 在线判定窗口：最近一次心跳距今不超过该值即视为在线。
// 系统级常量；Registry 构造时可覆盖，默认值保持 10 秒。
pub const LIVENESS_THRESHOLD_SECS: u64 = 10;

// 策略派发请求/应答的等待上限。超过即 DispatchTimeout，不重试。
pub const DISPATCH_TIMEOUT_SECS: u64 = 5;

// 事件查询的默认时间窗口（边界层未指定 t 时使用）
pub const DEFAULT_EVENT_WINDOW: &str = "5m";

// 策略安装的规范确认值；任何其他应答均视为拒绝
pub const POLICY_ACK: &str = "policy ack";

// 策略定址通道：<agent_uid> + 固定后缀
pub const POLICY_SUBJECT_SUFFIX: &str = "_policy";

// Agent 注册请求/应答 subject
pub const REGISTER_SUBJECT: &str = "vigil.agents.register";

// 心跳指标发布 subject（所有 Agent 共用，payload 内携带 agent_uid）
pub const METRICS_SUBJECT: &str = "vigil.metrics";

// 事件上报 subject 前缀（最终形如：vigil.events.<agentUid>）
pub const EVENTS_SUBJECT_PREFIX: &str = "vigil.events";

// Agent 心跳间隔，取在线判定窗口的一半
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 5;

pub fn liveness_threshold() -> Duration {
    Duration::from_secs(LIVENESS_THRESHOLD_SECS)
}

pub fn dispatch_timeout() -> Duration {
    Duration::from_secs(DISPATCH_TIMEOUT_SECS)
}

/// 生成策略派发 subject：<agentUid>_policy
pub fn policy_subject_for(agent_uid: &str) -> String {
    format!("{agent_uid}{POLICY_SUBJECT_SUFFIX}")
}

/// 生成事件上报 subject：vigil.events.<agentUid>
pub fn events_subject_for(agent_uid: &str) -> String {
    format!("{EVENTS_SUBJECT_PREFIX}.{agent_uid}")
}

/// Server 侧订阅全部事件的通配 subject
pub fn events_wildcard_subject() -> String {
    format!("{EVENTS_SUBJECT_PREFIX}.>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_subject_for() {
        assert_eq!(policy_subject_for("a1"), "a1_policy");
        assert_eq!(policy_subject_for("node-7"), "node-7_policy");
    }

    #[test]
    fn test_events_subjects() {
        assert_eq!(events_subject_for("a1"), "vigil.events.a1");
        assert_eq!(events_wildcard_subject(), "vigil.events.>");
    }

    #[test]
    fn test_timeouts() {
        assert_eq!(liveness_threshold(), Duration::from_secs(10));
        assert_eq!(dispatch_timeout(), Duration::from_secs(5));
    }
}
