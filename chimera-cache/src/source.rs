//! 缓存操作来源

use std::collections::HashMap;
use std::sync::Arc;

use chimera_aop::Method;
use chimera_core::utils::class_names::qualified_method_name;
use parking_lot::RwLock;

use crate::error::CacheResult;
use crate::operation::{CacheConfig, CacheOperation};

/// 缓存操作来源
pub trait CacheOperationSource: Send + Sync {
    /// 类型是否可能声明了缓存操作
    fn is_candidate_type(&self, _target_type: &str) -> bool {
        true
    }

    /// 方法在目标类型上的缓存操作，None 表示没有
    fn get_cache_operations(&self, method: &Method, target_type: &str) -> Option<Vec<CacheOperation>>;
}

/// 缓存声明注册器
pub enum CachingRegistration {
    /// 类型级默认配置
    Config {
        type_name: &'static str,
        config: fn() -> CacheConfig,
    },
    /// `method_name` 为 None 时对类型上所有方法生效
    Operations {
        type_name: &'static str,
        method_name: Option<&'static str>,
        operations: fn() -> Vec<CacheOperation>,
    },
}

inventory::collect!(CachingRegistration);

type CacheKey = (Method, String);

/// 基于声明的操作来源
///
/// 方法级声明优先于类型级声明；目标类型上找不到时再查方法的声明类型。
/// 类型级 [`CacheConfig`] 作为默认值合并进每个操作。
#[derive(Default)]
pub struct DeclaredCacheOperationSource {
    configs: HashMap<String, CacheConfig>,
    type_level: HashMap<String, Vec<CacheOperation>>,
    method_level: HashMap<(String, String), Vec<CacheOperation>>,
    cache: RwLock<HashMap<CacheKey, Option<Vec<CacheOperation>>>>,
}

impl DeclaredCacheOperationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加载所有通过 inventory 注册的声明
    pub fn from_registry() -> CacheResult<Self> {
        let mut source = Self::new();
        for registration in inventory::iter::<CachingRegistration> {
            source = match registration {
                CachingRegistration::Config { type_name, config } => source.config(*type_name, config()),
                CachingRegistration::Operations {
                    type_name,
                    method_name: Some(method),
                    operations,
                } => source.declare_method(*type_name, *method, operations())?,
                CachingRegistration::Operations {
                    type_name,
                    method_name: None,
                    operations,
                } => source.declare_type(*type_name, operations())?,
            };
        }
        tracing::info!(
            "Loaded caching declarations for {} type(s) and {} method(s)",
            source.type_level.len(),
            source.method_level.len()
        );
        Ok(source)
    }

    pub fn config(mut self, type_name: impl Into<String>, config: CacheConfig) -> Self {
        self.configs.insert(type_name.into(), config);
        self.cache.write().clear();
        self
    }

    pub fn declare_type(
        mut self,
        type_name: impl Into<String>,
        operations: Vec<CacheOperation>,
    ) -> CacheResult<Self> {
        let type_name = type_name.into();
        for operation in &operations {
            operation.validate(&type_name)?;
        }
        self.type_level.insert(type_name, operations);
        self.cache.write().clear();
        Ok(self)
    }

    pub fn declare_method(
        mut self,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        operations: Vec<CacheOperation>,
    ) -> CacheResult<Self> {
        let type_name = type_name.into();
        let method_name = method_name.into();
        let target = qualified_method_name(&type_name, &method_name);
        for operation in &operations {
            operation.validate(&target)?;
        }
        self.method_level.insert((type_name, method_name), operations);
        self.cache.write().clear();
        Ok(self)
    }

    fn find(&self, type_name: &str, method: &Method) -> Option<Vec<CacheOperation>> {
        let declared = self
            .method_level
            .get(&(type_name.to_string(), method.name().to_string()))
            .or_else(|| self.type_level.get(type_name))?;
        if declared.is_empty() {
            return None;
        }

        let descriptor = qualified_method_name(type_name, method.name());
        let config = self.configs.get(type_name).cloned().unwrap_or_default();
        Some(
            declared
                .iter()
                .map(|operation| {
                    let mut operation = operation.clone().apply_config(&config);
                    if operation.name().is_empty() {
                        operation = operation.named(descriptor.clone());
                    }
                    operation
                })
                .collect(),
        )
    }

    fn compute(&self, method: &Method, target_type: &str) -> Option<Vec<CacheOperation>> {
        self.find(target_type, method).or_else(|| {
            if method.declaring_type() != target_type {
                self.find(method.declaring_type(), method)
            } else {
                None
            }
        })
    }
}

impl CacheOperationSource for DeclaredCacheOperationSource {
    fn get_cache_operations(&self, method: &Method, target_type: &str) -> Option<Vec<CacheOperation>> {
        let key = (method.clone(), target_type.to_string());
        if let Some(cached) = self.cache.read().get(&key) {
            return cached.clone();
        }

        let operations = self.compute(method, target_type);
        if let Some(operations) = &operations {
            tracing::trace!(
                "Adding cacheable method '{}' with {} operation(s)",
                qualified_method_name(target_type, method.name()),
                operations.len()
            );
        }
        self.cache.write().insert(key, operations.clone());
        operations
    }
}

/// 合并多个来源的操作
pub struct CompositeCacheOperationSource {
    sources: Vec<Arc<dyn CacheOperationSource>>,
}

impl CompositeCacheOperationSource {
    pub fn new(sources: Vec<Arc<dyn CacheOperationSource>>) -> Self {
        Self { sources }
    }
}

impl CacheOperationSource for CompositeCacheOperationSource {
    fn is_candidate_type(&self, target_type: &str) -> bool {
        self.sources
            .iter()
            .any(|source| source.is_candidate_type(target_type))
    }

    fn get_cache_operations(&self, method: &Method, target_type: &str) -> Option<Vec<CacheOperation>> {
        let operations: Vec<CacheOperation> = self
            .sources
            .iter()
            .filter_map(|source| source.get_cache_operations(method, target_type))
            .flatten()
            .collect();
        (!operations.is_empty()).then_some(operations)
    }
}
