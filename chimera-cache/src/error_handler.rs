//! 缓存访问错误处理
//!
//! 处理器返回 Ok 时把这次访问当作未命中 / 已完成，返回 Err 时错误抛给调用方

use std::fmt;
use std::str::FromStr;

use chimera_aop::{Throwable, Value};

use crate::cache::Cache;
use crate::error::CacheError;

/// 缓存访问错误处理器
pub trait CacheErrorHandler: Send + Sync {
    fn handle_get_error(&self, error: CacheError, cache: &dyn Cache, key: &Value) -> Result<(), Throwable>;

    fn handle_put_error(
        &self,
        error: CacheError,
        cache: &dyn Cache,
        key: &Value,
        value: &Value,
    ) -> Result<(), Throwable>;

    fn handle_evict_error(&self, error: CacheError, cache: &dyn Cache, key: &Value) -> Result<(), Throwable>;

    fn handle_clear_error(&self, error: CacheError, cache: &dyn Cache) -> Result<(), Throwable>;
}

/// 原样抛出
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleCacheErrorHandler;

impl CacheErrorHandler for SimpleCacheErrorHandler {
    fn handle_get_error(&self, error: CacheError, _cache: &dyn Cache, _key: &Value) -> Result<(), Throwable> {
        Err(error.into())
    }

    fn handle_put_error(
        &self,
        error: CacheError,
        _cache: &dyn Cache,
        _key: &Value,
        _value: &Value,
    ) -> Result<(), Throwable> {
        Err(error.into())
    }

    fn handle_evict_error(&self, error: CacheError, _cache: &dyn Cache, _key: &Value) -> Result<(), Throwable> {
        Err(error.into())
    }

    fn handle_clear_error(&self, error: CacheError, _cache: &dyn Cache) -> Result<(), Throwable> {
        Err(error.into())
    }
}

/// 记录日志后继续
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCacheErrorHandler;

impl CacheErrorHandler for LoggingCacheErrorHandler {
    fn handle_get_error(&self, error: CacheError, cache: &dyn Cache, key: &Value) -> Result<(), Throwable> {
        tracing::warn!("Cache '{}' failed to get entry with key '{}': {}", cache.name(), key, error);
        Ok(())
    }

    fn handle_put_error(
        &self,
        error: CacheError,
        cache: &dyn Cache,
        key: &Value,
        _value: &Value,
    ) -> Result<(), Throwable> {
        tracing::warn!("Cache '{}' failed to put entry with key '{}': {}", cache.name(), key, error);
        Ok(())
    }

    fn handle_evict_error(&self, error: CacheError, cache: &dyn Cache, key: &Value) -> Result<(), Throwable> {
        tracing::warn!("Cache '{}' failed to evict entry with key '{}': {}", cache.name(), key, error);
        Ok(())
    }

    fn handle_clear_error(&self, error: CacheError, cache: &dyn Cache) -> Result<(), Throwable> {
        tracing::warn!("Cache '{}' failed to clear entries: {}", cache.name(), error);
        Ok(())
    }
}

/// 配置中选择的错误处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorHandlerKind {
    #[default]
    Rethrow,
    Log,
}

impl ErrorHandlerKind {
    pub fn handler(self) -> std::sync::Arc<dyn CacheErrorHandler> {
        match self {
            ErrorHandlerKind::Rethrow => std::sync::Arc::new(SimpleCacheErrorHandler),
            ErrorHandlerKind::Log => std::sync::Arc::new(LoggingCacheErrorHandler),
        }
    }
}

impl FromStr for ErrorHandlerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rethrow" => Ok(ErrorHandlerKind::Rethrow),
            "log" => Ok(ErrorHandlerKind::Log),
            other => Err(format!("Unknown cache error handler '{}', expected 'rethrow' or 'log'", other)),
        }
    }
}

impl fmt::Display for ErrorHandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorHandlerKind::Rethrow => write!(f, "rethrow"),
            ErrorHandlerKind::Log => write!(f, "log"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ConcurrentMapCache;
    use serde_json::json;

    #[test]
    fn test_handlers() {
        let cache = ConcurrentMapCache::new("users");
        let error = || CacheError::backend("users", "timeout");

        let rethrown = SimpleCacheErrorHandler
            .handle_get_error(error(), &cache, &json!(1))
            .unwrap_err();
        assert_eq!(rethrown.error_type().name(), "CacheException");

        assert!(LoggingCacheErrorHandler
            .handle_put_error(error(), &cache, &json!(1), &json!("ann"))
            .is_ok());
        assert!(LoggingCacheErrorHandler.handle_clear_error(error(), &cache).is_ok());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("LOG".parse::<ErrorHandlerKind>(), Ok(ErrorHandlerKind::Log));
        assert_eq!("rethrow".parse::<ErrorHandlerKind>(), Ok(ErrorHandlerKind::Rethrow));
        assert!("ignore".parse::<ErrorHandlerKind>().is_err());
        assert_eq!(ErrorHandlerKind::default().to_string(), "rethrow");
    }
}
