//! 缓存管理器

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::{Cache, ConcurrentMapCache};
use crate::properties::CacheProperties;

/// 缓存管理器
pub trait CacheManager: Send + Sync {
    /// 按名称获取缓存，不存在时返回 None
    fn get_cache(&self, name: &str) -> Option<Arc<dyn Cache>>;

    fn cache_names(&self) -> Vec<String>;
}

/// 管理 [`ConcurrentMapCache`] 的缓存管理器
///
/// 默认按需创建缓存；指定了缓存名称后只提供这些缓存
pub struct ConcurrentMapCacheManager {
    caches: RwLock<HashMap<String, Arc<ConcurrentMapCache>>>,
    dynamic: bool,
    allow_null_values: bool,
}

impl ConcurrentMapCacheManager {
    pub fn new() -> Self {
        Self {
            caches: RwLock::new(HashMap::new()),
            dynamic: true,
            allow_null_values: true,
        }
    }

    /// 固定的缓存名称，之后不再按需创建
    pub fn with_cache_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        self.dynamic = names.is_empty();
        let allow_null_values = self.allow_null_values;
        let caches = self.caches.get_mut();
        caches.clear();
        for name in names {
            let cache = Arc::new(ConcurrentMapCache::with_null_values(name.clone(), allow_null_values));
            caches.insert(name, cache);
        }
        self
    }

    /// 修改后重新创建已有的缓存
    pub fn allow_null_values(mut self, allow: bool) -> Self {
        self.allow_null_values = allow;
        for (name, cache) in self.caches.get_mut().iter_mut() {
            *cache = Arc::new(ConcurrentMapCache::with_null_values(name.clone(), allow));
        }
        self
    }

    pub fn from_properties(properties: &CacheProperties) -> Self {
        Self::new()
            .allow_null_values(properties.allow_null_values)
            .with_cache_names(properties.cache_names.clone())
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }
}

impl Default for ConcurrentMapCacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheManager for ConcurrentMapCacheManager {
    fn get_cache(&self, name: &str) -> Option<Arc<dyn Cache>> {
        if let Some(cache) = self.caches.read().get(name) {
            return Some(Arc::clone(cache) as Arc<dyn Cache>);
        }
        if !self.dynamic {
            return None;
        }
        let cache = Arc::clone(
            self.caches
                .write()
                .entry(name.to_string())
                .or_insert_with(|| {
                    tracing::debug!("Creating cache '{}'", name);
                    Arc::new(ConcurrentMapCache::with_null_values(name, self.allow_null_values))
                }),
        );
        Some(cache as Arc<dyn Cache>)
    }

    fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_manager() {
        let manager = ConcurrentMapCacheManager::new();
        assert!(manager.is_dynamic());
        let users = manager.get_cache("users").unwrap();
        assert_eq!(users.name(), "users");
        assert!(Arc::ptr_eq(&users, &manager.get_cache("users").unwrap()));
        assert_eq!(manager.cache_names(), vec!["users"]);
    }

    #[test]
    fn test_dynamic_caches_follow_null_policy() {
        let manager = ConcurrentMapCacheManager::new().allow_null_values(false);
        let sessions = manager.get_cache("sessions").unwrap();
        assert!(sessions
            .put(&chimera_aop::Value::from("s1"), chimera_aop::Value::Null)
            .is_err());
        assert!(Arc::ptr_eq(&sessions, &manager.get_cache("sessions").unwrap()));

        let lenient = ConcurrentMapCacheManager::new();
        assert!(lenient
            .get_cache("sessions")
            .unwrap()
            .put(&chimera_aop::Value::from("s1"), chimera_aop::Value::Null)
            .is_ok());
    }

    #[test]
    fn test_static_manager() {
        let manager = ConcurrentMapCacheManager::new()
            .allow_null_values(false)
            .with_cache_names(["users", "orders"]);
        assert!(!manager.is_dynamic());
        assert!(manager.get_cache("users").is_some());
        assert!(manager.get_cache("missing").is_none());
        assert_eq!(manager.cache_names(), vec!["orders", "users"]);
        assert!(manager
            .get_cache("orders")
            .unwrap()
            .put(&chimera_aop::Value::from(1), chimera_aop::Value::Null)
            .is_err());
    }
}
