//! 策略类型的校验/执行能力与类型分发表
//!
//! 每个策略类型注册一个 [`CheckKind`] 实现：校验参数并给出执行间隔，
//! 以及执行单次检查。新增类型只需注册一个实现，不需要改动分发逻辑。

pub mod tcp;

use crate::error::{CoreError, Result};
use crate::policy::{Policy, ALIAS_KEY};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

pub use tcp::TcpCheck;

/// 策略类型能力：参数校验 + 单次检查执行。
///
/// 执行引擎按校验得到的间隔驱动 `run_once`，每个 tick 恰好调用一次；
/// `Err` 携带失败详情，将作为失败事件的 detail 记录。
#[async_trait]
pub trait CheckKind: Send + Sync {
    /// 类型标签，e.g. "tcp"
    fn type_tag(&self) -> &'static str;

    /// 校验参数并解析执行间隔。
    /// 必填键缺失、存在多余键、频率格式错误或非严格正值均拒绝。
    fn validate(&self, parameters: &BTreeMap<String, String>) -> Result<Duration>;

    /// 执行一次检查，受 `interval` 作为超时上限约束
    async fn run_once(
        &self,
        parameters: &BTreeMap<String, String>,
        interval: Duration,
    ) -> std::result::Result<(), String>;
}

/// 类型标签到能力实现的查找表
pub struct CheckRegistry {
    kinds: HashMap<String, Arc<dyn CheckKind>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// 内置类型全量注册
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TcpCheck));
        registry
    }

    pub fn register(&mut self, kind: Arc<dyn CheckKind>) {
        self.kinds.insert(kind.type_tag().to_string(), kind);
    }

    /// 未注册的类型在任何执行尝试之前拒绝
    pub fn get(&self, policy_type: &str) -> Result<Arc<dyn CheckKind>> {
        self.kinds
            .get(policy_type)
            .cloned()
            .ok_or_else(|| CoreError::unsupported_policy_type(policy_type))
    }

    /// 完整校验一条策略：类型已注册、alias 存在、类型特定键集合合法。
    /// 派发侧与接收侧走同一条路径（纵深防御）。
    pub fn validate(&self, policy: &Policy) -> Result<Duration> {
        match policy.alias() {
            Some(alias) if !alias.is_empty() => {}
            _ => {
                return Err(CoreError::validation(format!(
                    "\"{ALIAS_KEY}\" key missing in policy"
                )))
            }
        }
        let kind = self.get(policy.policy_type.as_str())?;
        kind.validate(&policy.parameters)
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// 严格键集合校验：必填键缺失或出现未声明的键都视为非法。
pub(crate) fn require_exact_keys(
    type_tag: &str,
    parameters: &BTreeMap<String, String>,
    required: &[&str],
) -> Result<()> {
    for key in required {
        if !parameters.contains_key(*key) {
            return Err(CoreError::validation(format!(
                "\"{key}\" key missing in {type_tag} policy"
            )));
        }
    }
    for key in parameters.keys() {
        if !required.contains(&key.as_str()) {
            return Err(CoreError::validation(format!(
                "unexpected \"{key}\" key in {type_tag} policy"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;

    fn valid_tcp_policy() -> Policy {
        Policy::new("tcp", "a1")
            .with_parameter("alias", "x")
            .with_parameter("port", "8080")
            .with_parameter("frequency", "1s")
    }

    #[test]
    fn test_unknown_type_rejected() {
        let registry = CheckRegistry::with_builtin();
        let policy = Policy::new("icmp", "a1").with_parameter("alias", "x");
        let err = registry.validate(&policy).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedPolicyType { .. }));
    }

    #[test]
    fn test_missing_alias_rejected() {
        let registry = CheckRegistry::with_builtin();
        let mut policy = valid_tcp_policy();
        policy.parameters.remove("alias");
        let err = registry.validate(&policy).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn test_empty_alias_rejected() {
        let registry = CheckRegistry::with_builtin();
        let policy = valid_tcp_policy().with_parameter("alias", "");
        assert!(registry.validate(&policy).is_err());
    }

    #[test]
    fn test_valid_policy_yields_interval() {
        let registry = CheckRegistry::with_builtin();
        let interval = registry.validate(&valid_tcp_policy()).unwrap();
        assert_eq!(interval, Duration::from_secs(1));
    }

    #[test]
    fn test_require_exact_keys() {
        let mut params = BTreeMap::new();
        params.insert("alias".to_string(), "x".to_string());
        params.insert("port".to_string(), "80".to_string());
        assert!(require_exact_keys("tcp", &params, &["alias", "port"]).is_ok());

        // 缺键
        assert!(require_exact_keys("tcp", &params, &["alias", "port", "frequency"]).is_err());

        // 多键
        params.insert("extra".to_string(), "1".to_string());
        assert!(require_exact_keys("tcp", &params, &["alias", "port"]).is_err());
    }
}
