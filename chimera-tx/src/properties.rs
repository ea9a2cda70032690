//! 事务配置
//!
//! ```toml
//! [chimera.transaction]
//! manager-bean-name = "orderTransactionManager"
//! default-timeout = 30
//! ```

use chimera_core::config::Environment;
use chimera_core::constants::TRANSACTION_PROPERTIES_PREFIX;
use chimera_core::error::{ApplicationError, ApplicationResult};

/// 从 Environment 读取的事务配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionProperties {
    /// 默认事务管理器的 Bean 名称
    pub manager_bean_name: Option<String>,
    /// 未声明超时的事务使用的超时秒数
    pub default_timeout: Option<i32>,
}

impl TransactionProperties {
    pub fn from_environment(environment: &Environment) -> ApplicationResult<Self> {
        let key = |name: &str| format!("{}.{}", TRANSACTION_PROPERTIES_PREFIX, name);

        let manager_bean_name = environment
            .get_string(&key("manager-bean-name"))
            .map(|name| environment.resolve_required_placeholders(&name))
            .transpose()?
            .filter(|name| !name.trim().is_empty());

        let default_timeout = match environment.get_i64(&key("default-timeout")) {
            Some(seconds) => Some(i32::try_from(seconds).map_err(|_| {
                ApplicationError::ConfigLoadFailed(format!(
                    "{} is out of range: {}",
                    key("default-timeout"),
                    seconds
                ))
            })?),
            None => None,
        };

        Ok(Self {
            manager_bean_name,
            default_timeout,
        })
    }
}
