//! 缓存操作上下文
//!
//! [`CacheOperationContext`] 把一个操作绑定到一次调用的参数和解析出的缓存上。
//! 一次调用会多次询问同一个上下文的条件和键，结果只计算一次：
//! 条件按"结果是否可用"分两格缓存，键和 unless 各缓存一次。

use std::sync::Arc;

use chimera_aop::{Method, Value};
use once_cell::sync::OnceCell;

use crate::cache::Cache;
use crate::error::{CacheError, CacheResult};
use crate::expression::{CacheExpressionEvaluator, EvaluationContext, ResultState};
use crate::key::KeyGenerator;
use crate::operation::CacheOperation;
use crate::resolver::{CacheInvocation, CacheResolver};

/// 与调用参数无关的操作元数据，按 (操作, 方法, 目标类型) 缓存
pub struct CacheOperationMetadata {
    pub operation: CacheOperation,
    pub method: Method,
    pub target_type: String,
    pub key_generator: Arc<dyn KeyGenerator>,
    pub cache_resolver: Arc<dyn CacheResolver>,
}

/// 一次调用中的操作上下文
pub struct CacheOperationContext<'a> {
    metadata: Arc<CacheOperationMetadata>,
    args: &'a [Value],
    evaluator: &'a dyn CacheExpressionEvaluator,
    caches: Vec<Arc<dyn Cache>>,
    condition_without_result: OnceCell<bool>,
    condition_with_result: OnceCell<bool>,
    key: OnceCell<Value>,
    unless: OnceCell<bool>,
}

impl<'a> CacheOperationContext<'a> {
    /// 解析缓存，一个缓存都没有时报错
    pub fn new(
        metadata: Arc<CacheOperationMetadata>,
        args: &'a [Value],
        evaluator: &'a dyn CacheExpressionEvaluator,
    ) -> CacheResult<Self> {
        let invocation = CacheInvocation {
            operation: &metadata.operation,
            method: &metadata.method,
            target_type: &metadata.target_type,
            args,
        };
        let caches = metadata.cache_resolver.resolve_caches(&invocation)?;
        if caches.is_empty() {
            return Err(CacheError::IllegalState(format!(
                "No cache could be resolved for '{}'. At least one cache should be provided per cache operation.",
                metadata.operation
            )));
        }
        Ok(Self {
            metadata,
            args,
            evaluator,
            caches,
            condition_without_result: OnceCell::new(),
            condition_with_result: OnceCell::new(),
            key: OnceCell::new(),
            unless: OnceCell::new(),
        })
    }

    pub fn operation(&self) -> &CacheOperation {
        &self.metadata.operation
    }

    pub fn method(&self) -> &Method {
        &self.metadata.method
    }

    pub fn caches(&self) -> &[Arc<dyn Cache>] {
        &self.caches
    }

    pub fn cache_names(&self) -> Vec<&str> {
        self.caches.iter().map(|cache| cache.name()).collect()
    }

    fn evaluation_context<'r>(&'r self, result: ResultState<'r>) -> EvaluationContext<'r> {
        EvaluationContext {
            method: &self.metadata.method,
            target_type: &self.metadata.target_type,
            args: self.args,
            result,
        }
    }

    /// 条件是否通过，没有条件时总是通过
    pub fn is_condition_passing(&self, result: ResultState<'_>) -> CacheResult<bool> {
        let Some(condition) = self.metadata.operation.condition_expression() else {
            return Ok(true);
        };
        let memo = if result.is_available() {
            &self.condition_with_result
        } else {
            &self.condition_without_result
        };
        memo.get_or_try_init(|| {
            self.evaluator
                .condition(condition, &self.evaluation_context(result))
                .map_err(CacheError::from)
        })
        .copied()
    }

    /// 缓存键：有键表达式时求值，否则使用键生成器；null 键是错误
    pub fn generate_key(&self, result: ResultState<'_>) -> CacheResult<Value> {
        self.key
            .get_or_try_init(|| -> CacheResult<Value> {
                let key = match self.metadata.operation.key_expression() {
                    Some(expression) => self
                        .evaluator
                        .key(expression, &self.evaluation_context(result))?,
                    None => self.metadata.key_generator.generate(
                        &self.metadata.target_type,
                        &self.metadata.method,
                        self.args,
                    ),
                };
                if key.is_null() {
                    return Err(CacheError::NullKey(self.metadata.operation.to_string()));
                }
                Ok(key)
            })
            .cloned()
    }

    /// unless 不成立时可以写入缓存
    pub fn can_put_to_cache(&self, value: &Value) -> CacheResult<bool> {
        let Some(unless) = self.metadata.operation.unless_expression() else {
            return Ok(true);
        };
        let veto = self.unless.get_or_try_init(|| {
            self.evaluator
                .unless(unless, &self.evaluation_context(ResultState::Available(value)))
                .map_err(CacheError::from)
        })?;
        Ok(!veto)
    }
}

/// 一次调用上所有操作的上下文，按类型分组并保持声明顺序
pub struct CacheOperationContexts<'a> {
    cacheable: Vec<CacheOperationContext<'a>>,
    put: Vec<CacheOperationContext<'a>>,
    evict: Vec<CacheOperationContext<'a>>,
    sync: bool,
}

impl<'a> CacheOperationContexts<'a> {
    pub fn new(contexts: Vec<CacheOperationContext<'a>>, method: &Method) -> CacheResult<Self> {
        let mut grouped = Self {
            cacheable: Vec::new(),
            put: Vec::new(),
            evict: Vec::new(),
            sync: false,
        };
        for context in contexts {
            if context.operation().is_cacheable() {
                grouped.cacheable.push(context);
            } else if context.operation().is_put() {
                grouped.put.push(context);
            } else {
                grouped.evict.push(context);
            }
        }
        grouped.sync = grouped.determine_sync_flag(method)?;
        Ok(grouped)
    }

    fn determine_sync_flag(&self, method: &Method) -> CacheResult<bool> {
        if !self.cacheable.iter().any(|context| context.operation().is_sync()) {
            return Ok(false);
        }
        if !self.put.is_empty() || !self.evict.is_empty() {
            return Err(CacheError::IllegalState(format!(
                "A sync=true operation cannot be combined with other cache operations on '{}'",
                method
            )));
        }
        if self.cacheable.len() > 1 {
            return Err(CacheError::IllegalState(format!(
                "Only one sync=true operation is allowed on '{}'",
                method
            )));
        }
        let context = &self.cacheable[0];
        if context.caches().len() > 1 {
            return Err(CacheError::IllegalState(format!(
                "A sync=true operation is restricted to a single cache on '{}'",
                context.operation()
            )));
        }
        if context.operation().unless_expression().is_some() {
            return Err(CacheError::IllegalState(format!(
                "A sync=true operation does not support the unless attribute on '{}'",
                context.operation()
            )));
        }
        Ok(true)
    }

    pub fn is_synchronized(&self) -> bool {
        self.sync
    }

    pub fn cacheable(&self) -> &[CacheOperationContext<'a>] {
        &self.cacheable
    }

    pub fn put(&self) -> &[CacheOperationContext<'a>] {
        &self.put
    }

    pub fn evict(&self) -> &[CacheOperationContext<'a>] {
        &self.evict
    }
}
