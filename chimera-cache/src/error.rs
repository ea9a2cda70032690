//! 缓存错误

use chimera_aop::{ErrorType, Throwable};
use chimera_core::ContainerError;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::expression::EvaluationError;

static CACHE_EXCEPTION: Lazy<ErrorType> =
    Lazy::new(|| ErrorType::new("CacheException", &ErrorType::runtime_exception()));
static EVALUATION_EXCEPTION: Lazy<ErrorType> =
    Lazy::new(|| ErrorType::new("EvaluationException", &ErrorType::runtime_exception()));

/// 缓存错误
#[derive(Debug, Error)]
pub enum CacheError {
    /// 缓存操作声明不合法
    #[error("Invalid cache operation configuration on '{target}': {message}")]
    InvalidOperation { target: String, message: String },

    /// 缓存管理器中没有该名称的缓存
    #[error("Cannot find cache named '{cache}' for {operation}")]
    CacheNotFound { cache: String, operation: String },

    /// 键表达式或键生成器返回了 null
    #[error("Null key returned for cache operation [{0}]")]
    NullKey(String),

    #[error("Cache '{0}' is configured to not allow null values but null was provided")]
    NullValueNotAllowed(String),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// 按名称或类型查找缓存基础设施失败
    #[error("Failed to resolve cache infrastructure bean: {0}")]
    BeanLookup(#[from] ContainerError),

    /// 缓存后端访问失败
    #[error("Cache '{cache}' failed: {message}")]
    Backend { cache: String, message: String },

    /// 配置错误
    #[error("{0}")]
    IllegalState(String),
}

impl CacheError {
    pub fn backend(cache: impl Into<String>, message: impl Into<String>) -> Self {
        CacheError::Backend {
            cache: cache.into(),
            message: message.into(),
        }
    }

    /// 转换为 Throwable 时使用的异常类型
    pub fn error_type(&self) -> ErrorType {
        match self {
            CacheError::CacheNotFound { .. }
            | CacheError::NullKey(_)
            | CacheError::NullValueNotAllowed(_) => ErrorType::illegal_argument(),
            CacheError::Evaluation(_) => EVALUATION_EXCEPTION.clone(),
            CacheError::Backend { .. } => CACHE_EXCEPTION.clone(),
            CacheError::InvalidOperation { .. }
            | CacheError::BeanLookup(_)
            | CacheError::IllegalState(_) => ErrorType::illegal_state(),
        }
    }
}

impl From<CacheError> for Throwable {
    fn from(error: CacheError) -> Self {
        let error_type = error.error_type();
        Throwable::from_error(error_type, error)
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
