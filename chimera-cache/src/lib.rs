//! Chimera Cache - 声明式缓存
//!
//! - 缓存操作：Cacheable、CachePut、CacheEvict 及其条件、unless 与键表达式
//! - 操作来源：静态声明与编译时注册
//! - 缓存与缓存管理器：基于并发 Map 的默认实现，支持同步加载
//! - 切面支持：命中、写入、清除与错误处理
//! - 拦截器与通知器

pub mod cache;
pub mod context;
pub mod error;
pub mod error_handler;
pub mod expression;
pub mod interceptor;
pub mod key;
pub mod manager;
pub mod operation;
pub mod properties;
pub mod resolver;
pub mod source;
pub mod support;

pub use cache::{Cache, ConcurrentMapCache, ValueLoader};
pub use context::{CacheOperationContext, CacheOperationContexts, CacheOperationMetadata};
pub use error::{CacheError, CacheResult};
pub use error_handler::{
    CacheErrorHandler, ErrorHandlerKind, LoggingCacheErrorHandler, SimpleCacheErrorHandler,
};
pub use expression::{
    CacheExpressionEvaluator, EvaluationContext, EvaluationError, NamedExpressionEvaluator,
    ResultState,
};
pub use interceptor::{CacheInterceptor, CacheOperationSourcePointcut};
pub use key::{CacheKey, KeyGenerator, SimpleKeyGenerator};
pub use manager::{CacheManager, ConcurrentMapCacheManager};
pub use operation::{CacheConfig, CacheOperation, OperationKind};
pub use properties::CacheProperties;
pub use resolver::{CacheInvocation, CacheResolver, NamedCacheResolver, SimpleCacheResolver};
pub use source::{
    CacheOperationSource, CachingRegistration, CompositeCacheOperationSource,
    DeclaredCacheOperationSource,
};
pub use support::CacheAspectSupport;

// 导出 inventory 供静态注册使用
pub use inventory;
