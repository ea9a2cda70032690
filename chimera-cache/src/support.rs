//! 缓存切面支持
//!
//! 同步路径：唯一的 `sync` Cacheable 通过缓存的原子读取或加载执行方法。
//!
//! 一般路径：
//! 1. 执行调用前的清除
//! 2. 按声明顺序在 Cacheable 的缓存里查找，第一个命中即停止
//! 3. 未命中时为所有条件通过的 Cacheable 准备写入
//! 4. 命中且没有会执行的 CachePut 时直接使用缓存值，否则调用方法
//! 5. 为条件通过的 CachePut 准备写入，再按 unless 过滤后写入
//! 6. 执行调用后的清除

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chimera_aop::{Method, ResultShapes, Throwable, Value};
use chimera_core::bean_factory::{BeanFactory, BeanFactoryExt};
use chimera_core::error::{ApplicationError, ApplicationResult};
use chimera_core::lifecycle::{BeanFactoryAware, InitializingBean, SmartInitializingSingleton};
use chimera_core::utils::class_names::qualified_method_name;
use parking_lot::RwLock;

use crate::cache::Cache;
use crate::context::{CacheOperationContext, CacheOperationContexts, CacheOperationMetadata};
use crate::error::{CacheError, CacheResult};
use crate::error_handler::{CacheErrorHandler, SimpleCacheErrorHandler};
use crate::expression::{CacheExpressionEvaluator, EvaluationError, NamedExpressionEvaluator, ResultState};
use crate::key::{KeyGenerator, SimpleKeyGenerator};
use crate::manager::CacheManager;
use crate::operation::CacheOperation;
use crate::properties::CacheProperties;
use crate::resolver::{CacheResolver, SimpleCacheResolver};
use crate::source::CacheOperationSource;

type MetadataKey = (CacheOperation, Method, String);

/// 等待写入的缓存请求
struct CachePutRequest<'c, 'a> {
    context: &'c CacheOperationContext<'a>,
    key: Value,
}

/// 缓存切面支持
pub struct CacheAspectSupport {
    operation_source: Option<Arc<dyn CacheOperationSource>>,
    cache_resolver: RwLock<Option<Arc<dyn CacheResolver>>>,
    key_generator: Arc<dyn KeyGenerator>,
    error_handler: Arc<dyn CacheErrorHandler>,
    evaluator: Arc<dyn CacheExpressionEvaluator>,
    shapes: ResultShapes,
    bean_factory: RwLock<Option<Arc<dyn BeanFactory>>>,
    metadata_cache: RwLock<HashMap<MetadataKey, Arc<CacheOperationMetadata>>>,
    initialized: AtomicBool,
}

impl CacheAspectSupport {
    pub fn new() -> Self {
        Self {
            operation_source: None,
            cache_resolver: RwLock::new(None),
            key_generator: Arc::new(SimpleKeyGenerator),
            error_handler: Arc::new(SimpleCacheErrorHandler),
            evaluator: Arc::new(NamedExpressionEvaluator::new()),
            shapes: ResultShapes::default(),
            bean_factory: RwLock::new(None),
            metadata_cache: RwLock::new(HashMap::new()),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn with_operation_source(mut self, source: Arc<dyn CacheOperationSource>) -> Self {
        self.operation_source = Some(source);
        self
    }

    /// 默认缓存管理器，等同于以它构造的 [`SimpleCacheResolver`]
    pub fn with_cache_manager(self, cache_manager: Arc<dyn CacheManager>) -> Self {
        self.with_cache_resolver(Arc::new(SimpleCacheResolver::new(cache_manager)))
    }

    pub fn with_cache_resolver(self, resolver: Arc<dyn CacheResolver>) -> Self {
        *self.cache_resolver.write() = Some(resolver);
        self
    }

    pub fn with_key_generator(mut self, key_generator: Arc<dyn KeyGenerator>) -> Self {
        self.key_generator = key_generator;
        self
    }

    pub fn with_error_handler(mut self, error_handler: Arc<dyn CacheErrorHandler>) -> Self {
        self.error_handler = error_handler;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn CacheExpressionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_result_shapes(mut self, shapes: ResultShapes) -> Self {
        self.shapes = shapes;
        self
    }

    pub fn with_properties(mut self, properties: &CacheProperties) -> Self {
        self.error_handler = properties.error_handler.handler();
        self
    }

    pub fn operation_source(&self) -> Option<&Arc<dyn CacheOperationSource>> {
        self.operation_source.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn bean<T>(&self, name: &str) -> CacheResult<T>
    where
        T: std::any::Any + Clone + Send + Sync,
    {
        let bean_factory = self.bean_factory.read().clone().ok_or_else(|| {
            CacheError::IllegalState(format!(
                "BeanFactory must be set on cache aspect for '{}' retrieval",
                name
            ))
        })?;
        Ok(bean_factory.get_bean_of::<T>(name)?)
    }

    /// 操作的元数据：键生成器和缓存解析器，按 (操作, 方法, 目标类型) 缓存
    fn operation_metadata(
        &self,
        operation: &CacheOperation,
        method: &Method,
        target_type: &str,
    ) -> CacheResult<Arc<CacheOperationMetadata>> {
        let key = (operation.clone(), method.clone(), target_type.to_string());
        if let Some(metadata) = self.metadata_cache.read().get(&key) {
            return Ok(Arc::clone(metadata));
        }

        // 未加锁计算，并发时可能重复计算同一个条目
        let key_generator = match operation.key_generator_name() {
            Some(name) => self.bean::<Arc<dyn KeyGenerator>>(name)?,
            None => Arc::clone(&self.key_generator),
        };
        let cache_resolver = if let Some(name) = operation.cache_resolver_name() {
            self.bean::<Arc<dyn CacheResolver>>(name)?
        } else if let Some(name) = operation.cache_manager_name() {
            let manager = self.bean::<Arc<dyn CacheManager>>(name)?;
            Arc::new(SimpleCacheResolver::new(manager)) as Arc<dyn CacheResolver>
        } else {
            self.cache_resolver.read().clone().ok_or_else(|| {
                CacheError::IllegalState(format!(
                    "No CacheResolver specified for {}: set a cache manager or cache resolver on the cache aspect",
                    operation
                ))
            })?
        };

        let metadata = Arc::new(CacheOperationMetadata {
            operation: operation.clone(),
            method: method.clone(),
            target_type: target_type.to_string(),
            key_generator,
            cache_resolver,
        });
        self.metadata_cache.write().insert(key, Arc::clone(&metadata));
        Ok(metadata)
    }

    /// 在缓存操作下执行调用
    pub fn execute(
        &self,
        method: &Method,
        target_type: &str,
        args: &[Value],
        invocation: &mut dyn FnMut() -> Result<Value, Throwable>,
    ) -> Result<Value, Throwable> {
        if !self.is_initialized() {
            tracing::trace!(
                "Cache aspect not initialized yet, invoking '{}' directly",
                qualified_method_name(target_type, method.name())
            );
            return invocation();
        }

        let operations = self
            .operation_source
            .as_ref()
            .and_then(|source| source.get_cache_operations(method, target_type))
            .unwrap_or_default();
        if operations.is_empty() {
            return invocation();
        }

        let evaluator = self.evaluator.as_ref();
        let contexts = operations
            .iter()
            .map(|operation| {
                let metadata = self.operation_metadata(operation, method, target_type)?;
                CacheOperationContext::new(metadata, args, evaluator)
            })
            .collect::<CacheResult<Vec<_>>>()?;
        let contexts = CacheOperationContexts::new(contexts, method)?;

        if contexts.is_synchronized() {
            self.execute_synchronized(method, &contexts.cacheable()[0], invocation)
        } else {
            self.execute_contexts(method, &contexts, invocation)
        }
    }

    fn execute_synchronized(
        &self,
        method: &Method,
        context: &CacheOperationContext<'_>,
        invocation: &mut dyn FnMut() -> Result<Value, Throwable>,
    ) -> Result<Value, Throwable> {
        if !context.is_condition_passing(ResultState::NoResult)? {
            return invocation();
        }
        let key = context.generate_key(ResultState::NoResult)?;
        let cache = &context.caches()[0];

        // 携带失败的返回值不进入缓存，直接返回给调用方
        let mut uncacheable: Option<Value> = None;
        let loaded = cache.get_or_load(&key, &mut || {
            let value = invocation()?;
            match self.shapes.unwrap(method, &value) {
                Some(inner) => Ok(inner),
                None => {
                    uncacheable = Some(value);
                    Err(Throwable::illegal_state("result is not cacheable"))
                }
            }
        });
        if let Some(value) = uncacheable {
            return Ok(value);
        }
        Ok(self.shapes.wrap(method, loaded?))
    }

    fn execute_contexts(
        &self,
        method: &Method,
        contexts: &CacheOperationContexts<'_>,
        invocation: &mut dyn FnMut() -> Result<Value, Throwable>,
    ) -> Result<Value, Throwable> {
        self.process_cache_evicts(contexts, true, ResultState::NoResult)?;

        let cache_hit = self.find_cached_item(contexts.cacheable())?;

        let mut put_requests = Vec::new();
        if cache_hit.is_none() {
            self.collect_put_requests(contexts.cacheable(), ResultState::NoResult, &mut put_requests)?;
        }

        let (return_value, cache_value) = match cache_hit {
            Some(hit) if !self.has_cache_put(contexts)? => (self.shapes.wrap(method, hit.clone()), Some(hit)),
            _ => {
                let value = invocation()?;
                let unwrapped = self.shapes.unwrap(method, &value);
                (value, unwrapped)
            }
        };

        match &cache_value {
            Some(cache_value) => {
                self.collect_put_requests(
                    contexts.put(),
                    ResultState::Available(cache_value),
                    &mut put_requests,
                )?;
                for request in &put_requests {
                    self.apply_put_request(request, cache_value)?;
                }
                self.process_cache_evicts(contexts, false, ResultState::Available(cache_value))?;
            }
            None => {
                tracing::trace!("Result of '{}' carries a failure, skipping cache puts", method);
                self.process_cache_evicts(contexts, false, ResultState::NoResult)?;
            }
        }
        Ok(return_value)
    }

    fn find_cached_item(&self, contexts: &[CacheOperationContext<'_>]) -> Result<Option<Value>, Throwable> {
        for context in contexts {
            if context.is_condition_passing(ResultState::NoResult)? {
                let key = context.generate_key(ResultState::NoResult)?;
                if let Some(hit) = self.find_in_caches(context, &key)? {
                    return Ok(Some(hit));
                }
                tracing::trace!("No cache entry for key '{}' in cache(s) {:?}", key, context.cache_names());
            }
        }
        Ok(None)
    }

    fn find_in_caches(&self, context: &CacheOperationContext<'_>, key: &Value) -> Result<Option<Value>, Throwable> {
        for cache in context.caches() {
            if let Some(hit) = self.do_get(cache.as_ref(), key)? {
                tracing::trace!("Cache entry for key '{}' found in cache '{}'", key, cache.name());
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    /// 是否有 CachePut 会执行
    ///
    /// 逐个求值所有 CachePut 的条件，不在第一个通过时提前结束；
    /// 条件引用了还拿不到的返回值时视为通过
    fn has_cache_put(&self, contexts: &CacheOperationContexts<'_>) -> CacheResult<bool> {
        let mut excluded = 0;
        for context in contexts.put() {
            match context.is_condition_passing(ResultState::Unavailable) {
                Ok(true) => {}
                Ok(false) => excluded += 1,
                Err(CacheError::Evaluation(EvaluationError::VariableNotAvailable(_))) => {}
                Err(error) => return Err(error),
            }
        }
        Ok(contexts.put().len() != excluded)
    }

    fn collect_put_requests<'c, 'a>(
        &self,
        contexts: &'c [CacheOperationContext<'a>],
        result: ResultState<'_>,
        requests: &mut Vec<CachePutRequest<'c, 'a>>,
    ) -> CacheResult<()> {
        for context in contexts {
            if context.is_condition_passing(result)? {
                let key = context.generate_key(result)?;
                requests.push(CachePutRequest { context, key });
            }
        }
        Ok(())
    }

    fn apply_put_request(&self, request: &CachePutRequest<'_, '_>, value: &Value) -> Result<(), Throwable> {
        if !request.context.can_put_to_cache(value)? {
            return Ok(());
        }
        for cache in request.context.caches() {
            self.do_put(cache.as_ref(), &request.key, value)?;
        }
        Ok(())
    }

    fn process_cache_evicts(
        &self,
        contexts: &CacheOperationContexts<'_>,
        before_invocation: bool,
        result: ResultState<'_>,
    ) -> Result<(), Throwable> {
        for context in contexts.evict() {
            let operation = context.operation();
            if operation.is_before_invocation() == before_invocation && context.is_condition_passing(result)? {
                self.perform_cache_evict(context, operation, result)?;
            }
        }
        Ok(())
    }

    fn perform_cache_evict(
        &self,
        context: &CacheOperationContext<'_>,
        operation: &CacheOperation,
        result: ResultState<'_>,
    ) -> Result<(), Throwable> {
        for cache in context.caches() {
            if operation.is_all_entries() {
                tracing::trace!("Invalidating entire cache for operation {} on method {}", operation, context.method());
                self.do_clear(cache.as_ref())?;
            } else {
                let key = context.generate_key(result)?;
                tracing::trace!("Invalidating cache key [{}] for operation {} on method {}", key, operation, context.method());
                self.do_evict(cache.as_ref(), &key)?;
            }
        }
        Ok(())
    }

    fn do_get(&self, cache: &dyn Cache, key: &Value) -> Result<Option<Value>, Throwable> {
        match cache.get(key) {
            Ok(value) => Ok(value),
            Err(error) => {
                self.error_handler.handle_get_error(error, cache, key)?;
                Ok(None)
            }
        }
    }

    fn do_put(&self, cache: &dyn Cache, key: &Value, value: &Value) -> Result<(), Throwable> {
        if let Err(error) = cache.put(key, value.clone()) {
            self.error_handler.handle_put_error(error, cache, key, value)?;
        }
        Ok(())
    }

    fn do_evict(&self, cache: &dyn Cache, key: &Value) -> Result<(), Throwable> {
        if let Err(error) = cache.evict(key) {
            self.error_handler.handle_evict_error(error, cache, key)?;
        }
        Ok(())
    }

    fn do_clear(&self, cache: &dyn Cache) -> Result<(), Throwable> {
        if let Err(error) = cache.clear() {
            self.error_handler.handle_clear_error(error, cache)?;
        }
        Ok(())
    }
}

impl Default for CacheAspectSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanFactoryAware for CacheAspectSupport {
    fn set_bean_factory(&self, bean_factory: Arc<dyn BeanFactory>) {
        *self.bean_factory.write() = Some(bean_factory);
        self.metadata_cache.write().clear();
    }
}

impl InitializingBean for CacheAspectSupport {
    fn after_properties_set(&self) -> ApplicationResult<()> {
        if self.operation_source.is_none() {
            return Err(ApplicationError::InitializationFailed(
                "The 'cache_operation_source' property is required: \
                 If there are no cacheable methods, then don't use a cache aspect."
                    .into(),
            ));
        }
        Ok(())
    }
}

impl SmartInitializingSingleton for CacheAspectSupport {
    /// 没有显式的解析器时从 BeanFactory 中查找唯一的 CacheManager
    fn after_singletons_instantiated(&self) -> ApplicationResult<()> {
        self.after_properties_set()?;
        if self.cache_resolver.read().is_none() {
            let bean_factory = self.bean_factory.read().clone();
            let Some(bean_factory) = bean_factory else {
                return Err(ApplicationError::InitializationFailed(
                    "No CacheResolver specified, and no BeanFactory to look up a CacheManager from".into(),
                ));
            };
            let manager = bean_factory
                .get_unique_bean::<Arc<dyn CacheManager>>()
                .map_err(|error| {
                    ApplicationError::InitializationFailed(format!(
                        "No CacheResolver specified, and no unique bean of type CacheManager found. \
                         Mark one as primary or declare a specific CacheManager to use: {}",
                        error
                    ))
                })?;
            *self.cache_resolver.write() = Some(Arc::new(SimpleCacheResolver::new(manager)));
        }
        self.initialized.store(true, Ordering::Release);
        tracing::debug!("Cache aspect initialized");
        Ok(())
    }
}
