//! 缓存解析

use std::sync::Arc;

use chimera_aop::{Method, Value};

use crate::cache::Cache;
use crate::error::{CacheError, CacheResult};
use crate::manager::CacheManager;
use crate::operation::CacheOperation;

/// 解析缓存时可用的调用信息
#[derive(Debug, Clone, Copy)]
pub struct CacheInvocation<'a> {
    pub operation: &'a CacheOperation,
    pub method: &'a Method,
    pub target_type: &'a str,
    pub args: &'a [Value],
}

/// 缓存解析器
pub trait CacheResolver: Send + Sync {
    fn resolve_caches(&self, invocation: &CacheInvocation<'_>) -> CacheResult<Vec<Arc<dyn Cache>>>;
}

fn caches_by_name(
    manager: &dyn CacheManager,
    names: &[String],
    operation: &CacheOperation,
) -> CacheResult<Vec<Arc<dyn Cache>>> {
    names
        .iter()
        .map(|name| {
            manager.get_cache(name).ok_or_else(|| CacheError::CacheNotFound {
                cache: name.clone(),
                operation: operation.to_string(),
            })
        })
        .collect()
}

/// 按操作声明的缓存名称从管理器中取缓存
pub struct SimpleCacheResolver {
    cache_manager: Arc<dyn CacheManager>,
}

impl SimpleCacheResolver {
    pub fn new(cache_manager: Arc<dyn CacheManager>) -> Self {
        Self { cache_manager }
    }

    pub fn cache_manager(&self) -> &Arc<dyn CacheManager> {
        &self.cache_manager
    }
}

impl CacheResolver for SimpleCacheResolver {
    fn resolve_caches(&self, invocation: &CacheInvocation<'_>) -> CacheResult<Vec<Arc<dyn Cache>>> {
        caches_by_name(
            self.cache_manager.as_ref(),
            invocation.operation.cache_names(),
            invocation.operation,
        )
    }
}

/// 忽略操作声明，总是使用固定的缓存名称
pub struct NamedCacheResolver {
    cache_manager: Arc<dyn CacheManager>,
    cache_names: Vec<String>,
}

impl NamedCacheResolver {
    pub fn new<I, S>(cache_manager: Arc<dyn CacheManager>, cache_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cache_manager,
            cache_names: cache_names.into_iter().map(Into::into).collect(),
        }
    }
}

impl CacheResolver for NamedCacheResolver {
    fn resolve_caches(&self, invocation: &CacheInvocation<'_>) -> CacheResult<Vec<Arc<dyn Cache>>> {
        caches_by_name(self.cache_manager.as_ref(), &self.cache_names, invocation.operation)
    }
}
