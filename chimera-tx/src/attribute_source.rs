//! 事务属性来源
//!
//! - [`DeclaredTransactionAttributeSource`]：方法级 / 类型级的 [`Transactional`] 声明，
//!   可通过 inventory 静态注册
//! - [`MethodMapTransactionAttributeSource`]：`Type.method` 形式的映射
//! - [`NameMatchTransactionAttributeSource`]：按方法名模式匹配（`get*`、`*Query`）
//! - [`CompositeTransactionAttributeSource`]：依次询问多个来源

use std::collections::HashMap;
use std::sync::Arc;

use chimera_aop::pointcut::wildcard_match;
use chimera_aop::Method;
use chimera_core::utils::class_names::qualified_method_name;
use parking_lot::RwLock;

use crate::attribute::{TransactionAttribute, Transactional};
use crate::error::TransactionResult;

/// 事务属性来源
pub trait TransactionAttributeSource: Send + Sync {
    /// 类型是否可能带有事务属性，返回 false 时不再检查其方法
    fn is_candidate_type(&self, _target_type: &str) -> bool {
        true
    }

    /// 方法在目标类型上的事务属性，None 表示非事务方法
    fn get_transaction_attribute(
        &self,
        method: &Method,
        target_type: &str,
    ) -> Option<TransactionAttribute>;
}

// ============================================================================
// 静态注册
// ============================================================================

/// 事务声明注册器
///
/// `method_name` 为 None 时表示类型级声明
pub struct TransactionalRegistration {
    pub type_name: &'static str,
    pub method_name: Option<&'static str>,
    pub declaration: fn() -> Transactional,
}

impl TransactionalRegistration {
    pub const fn for_type(type_name: &'static str, declaration: fn() -> Transactional) -> Self {
        Self {
            type_name,
            method_name: None,
            declaration,
        }
    }

    pub const fn for_method(
        type_name: &'static str,
        method_name: &'static str,
        declaration: fn() -> Transactional,
    ) -> Self {
        Self {
            type_name,
            method_name: Some(method_name),
            declaration,
        }
    }
}

inventory::collect!(TransactionalRegistration);

// ============================================================================
// 声明式来源
// ============================================================================

type CacheKey = (Method, String);

/// 基于 [`Transactional`] 声明的属性来源
///
/// 查找顺序：目标类型上的方法声明 > 目标类型声明 > 声明方法的类型上的方法声明 > 声明方法的类型声明。
/// 结果按 (方法, 目标类型) 缓存，包括“没有属性”的结果。
#[derive(Default)]
pub struct DeclaredTransactionAttributeSource {
    type_level: HashMap<String, TransactionAttribute>,
    method_level: HashMap<(String, String), TransactionAttribute>,
    cache: RwLock<HashMap<CacheKey, Option<TransactionAttribute>>>,
}

impl DeclaredTransactionAttributeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加载所有通过 inventory 注册的声明
    pub fn from_registry() -> TransactionResult<Self> {
        let mut source = Self::new();
        for registration in inventory::iter::<TransactionalRegistration> {
            let declaration = (registration.declaration)();
            source = match registration.method_name {
                Some(method) => source.declare_method(registration.type_name, method, &declaration)?,
                None => source.declare_type(registration.type_name, &declaration)?,
            };
        }
        tracing::info!(
            "Loaded {} type-level and {} method-level transactional declaration(s)",
            source.type_level.len(),
            source.method_level.len()
        );
        Ok(source)
    }

    /// 类型级声明
    pub fn declare_type(
        mut self,
        type_name: impl Into<String>,
        declaration: &Transactional,
    ) -> TransactionResult<Self> {
        self.type_level.insert(type_name.into(), declaration.to_attribute()?);
        self.cache.write().clear();
        Ok(self)
    }

    /// 方法级声明
    pub fn declare_method(
        mut self,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        declaration: &Transactional,
    ) -> TransactionResult<Self> {
        self.method_level
            .insert((type_name.into(), method_name.into()), declaration.to_attribute()?);
        self.cache.write().clear();
        Ok(self)
    }

    fn find(&self, type_name: &str, method_name: &str) -> Option<&TransactionAttribute> {
        self.method_level
            .get(&(type_name.to_string(), method_name.to_string()))
            .or_else(|| self.type_level.get(type_name))
    }

    fn compute(&self, method: &Method, target_type: &str) -> Option<TransactionAttribute> {
        let found = self.find(target_type, method.name()).or_else(|| {
            if method.declaring_type() != target_type {
                self.find(method.declaring_type(), method.name())
            } else {
                None
            }
        })?;

        let mut attribute = found.clone();
        if attribute.descriptor().is_none() {
            attribute = attribute.with_descriptor(qualified_method_name(target_type, method.name()));
        }
        Some(attribute)
    }
}

impl TransactionAttributeSource for DeclaredTransactionAttributeSource {
    fn get_transaction_attribute(
        &self,
        method: &Method,
        target_type: &str,
    ) -> Option<TransactionAttribute> {
        let key = (method.clone(), target_type.to_string());
        if let Some(cached) = self.cache.read().get(&key) {
            return cached.clone();
        }

        // 未加锁计算，并发时可能重复计算同一个条目
        let attribute = self.compute(method, target_type);
        match &attribute {
            Some(attribute) => tracing::trace!(
                "Adding transactional method '{}' with attribute: {}",
                qualified_method_name(target_type, method.name()),
                attribute
            ),
            None => tracing::trace!(
                "Method '{}' is not transactional",
                qualified_method_name(target_type, method.name())
            ),
        }
        self.cache.write().insert(key, attribute.clone());
        attribute
    }
}

// ============================================================================
// 名称映射来源
// ============================================================================

/// 在多个匹配的模式中选出最具体的：完全相同优先，其次是最长的模式
fn best_match<'a, V>(
    entries: impl Iterator<Item = (&'a String, &'a V)>,
    name: &str,
) -> Option<&'a V>
where
    V: 'a,
{
    let mut best: Option<(&String, &V)> = None;
    for (pattern, value) in entries {
        if pattern == name {
            return Some(value);
        }
        if wildcard_match(pattern, name)
            && best.map_or(true, |(current, _)| pattern.len() > current.len())
        {
            best = Some((pattern, value));
        }
    }
    best.map(|(_, value)| value)
}

/// `Type.method` 映射
///
/// 方法名部分支持 `*` 通配符
#[derive(Debug, Default, Clone)]
pub struct MethodMapTransactionAttributeSource {
    by_type: HashMap<String, Vec<(String, TransactionAttribute)>>,
}

impl MethodMapTransactionAttributeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加映射，`name` 形如 `OrderService.place*`
    pub fn add_method(mut self, name: &str, attribute: TransactionAttribute) -> Self {
        let (type_name, method) = match name.rfind('.') {
            Some(index) => (&name[..index], &name[index + 1..]),
            None => {
                tracing::warn!("Ignoring transactional method mapping '{}': expected 'Type.method'", name);
                return self;
            }
        };
        tracing::debug!("Adding transactional method [{}] with attribute [{}]", name, attribute);
        self.by_type
            .entry(type_name.to_string())
            .or_default()
            .push((method.to_string(), attribute));
        self
    }

    fn lookup(&self, type_name: &str, method_name: &str) -> Option<TransactionAttribute> {
        let mappings = self.by_type.get(type_name)?;
        best_match(mappings.iter().map(|(p, a)| (p, a)), method_name).cloned()
    }
}

impl TransactionAttributeSource for MethodMapTransactionAttributeSource {
    fn get_transaction_attribute(
        &self,
        method: &Method,
        target_type: &str,
    ) -> Option<TransactionAttribute> {
        self.lookup(target_type, method.name())
            .or_else(|| self.lookup(method.declaring_type(), method.name()))
    }
}

/// 按方法名匹配，与类型无关
#[derive(Debug, Default, Clone)]
pub struct NameMatchTransactionAttributeSource {
    name_map: Vec<(String, TransactionAttribute)>,
}

impl NameMatchTransactionAttributeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transactional_method(mut self, pattern: impl Into<String>, attribute: TransactionAttribute) -> Self {
        self.name_map.push((pattern.into(), attribute));
        self
    }

    /// 从 `模式 -> 文本属性` 的映射构建
    pub fn from_properties<'a>(
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> TransactionResult<Self> {
        let mut source = Self::new();
        for (pattern, text) in entries {
            source = source.add_transactional_method(pattern, text.parse()?);
        }
        Ok(source)
    }
}

impl TransactionAttributeSource for NameMatchTransactionAttributeSource {
    fn get_transaction_attribute(
        &self,
        method: &Method,
        _target_type: &str,
    ) -> Option<TransactionAttribute> {
        best_match(self.name_map.iter().map(|(p, a)| (p, a)), method.name()).cloned()
    }
}

/// 组合来源，返回第一个非空结果
#[derive(Default, Clone)]
pub struct CompositeTransactionAttributeSource {
    sources: Vec<Arc<dyn TransactionAttributeSource>>,
}

impl CompositeTransactionAttributeSource {
    pub fn new(sources: Vec<Arc<dyn TransactionAttributeSource>>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[Arc<dyn TransactionAttributeSource>] {
        &self.sources
    }
}

impl TransactionAttributeSource for CompositeTransactionAttributeSource {
    fn is_candidate_type(&self, target_type: &str) -> bool {
        self.sources.iter().any(|s| s.is_candidate_type(target_type))
    }

    fn get_transaction_attribute(
        &self,
        method: &Method,
        target_type: &str,
    ) -> Option<TransactionAttribute> {
        self.sources
            .iter()
            .find_map(|source| source.get_transaction_attribute(method, target_type))
    }
}
