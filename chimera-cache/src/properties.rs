//! 缓存配置
//!
//! ```toml
//! [chimera.cache]
//! cache-names = ["users", "orders"]
//! allow-null-values = false
//! error-handler = "log"
//! ```

use chimera_core::config::Environment;
use chimera_core::constants::CACHE_PROPERTIES_PREFIX;
use chimera_core::error::{ApplicationError, ApplicationResult};

use crate::error_handler::ErrorHandlerKind;

/// 从 Environment 读取的缓存配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheProperties {
    /// 为空时按需创建缓存
    pub cache_names: Vec<String>,
    pub allow_null_values: bool,
    pub error_handler: ErrorHandlerKind,
}

impl Default for CacheProperties {
    fn default() -> Self {
        Self {
            cache_names: Vec::new(),
            allow_null_values: true,
            error_handler: ErrorHandlerKind::Rethrow,
        }
    }
}

impl CacheProperties {
    pub fn from_environment(environment: &Environment) -> ApplicationResult<Self> {
        let key = |name: &str| format!("{}.{}", CACHE_PROPERTIES_PREFIX, name);

        let cache_names = environment
            .get_string_array(&key("cache-names"))
            .unwrap_or_default()
            .into_iter()
            .map(|name| environment.resolve_required_placeholders(&name))
            .collect::<ApplicationResult<Vec<_>>>()?;

        let error_handler = match environment.get_string(&key("error-handler")) {
            Some(kind) => kind.parse().map_err(ApplicationError::ConfigLoadFailed)?,
            None => ErrorHandlerKind::default(),
        };

        Ok(Self {
            cache_names,
            allow_null_values: environment.get_bool_or(&key("allow-null-values"), true),
            error_handler,
        })
    }
}
