//! 缓存操作
//!
//! 一个方法上可以声明多个操作：
//!
//! ```ignore
//! let operations = vec![
//!     CacheOperation::cacheable(["users"]).key("#p0").unless("#result == null"),
//!     CacheOperation::evict(["userPages"]).all_entries(),
//! ];
//! ```

use std::fmt;

use crate::error::{CacheError, CacheResult};

/// 操作类型及其特有的属性
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Cacheable { unless: Option<String>, sync: bool },
    Put { unless: Option<String> },
    Evict { all_entries: bool, before_invocation: bool },
}

/// 缓存操作
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheOperation {
    name: String,
    cache_names: Vec<String>,
    key: Option<String>,
    key_generator: Option<String>,
    cache_manager: Option<String>,
    cache_resolver: Option<String>,
    condition: Option<String>,
    kind: OperationKind,
}

impl CacheOperation {
    fn new<I, S>(cache_names: I, kind: OperationKind) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: String::new(),
            cache_names: cache_names.into_iter().map(Into::into).collect(),
            key: None,
            key_generator: None,
            cache_manager: None,
            cache_resolver: None,
            condition: None,
            kind,
        }
    }

    /// 先查缓存，未命中时执行方法并写入
    pub fn cacheable<I, S>(cache_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(cache_names, OperationKind::Cacheable { unless: None, sync: false })
    }

    /// 总是执行方法并写入结果
    pub fn put<I, S>(cache_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(cache_names, OperationKind::Put { unless: None })
    }

    /// 删除条目，默认在方法成功返回后执行
    pub fn evict<I, S>(cache_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            cache_names,
            OperationKind::Evict {
                all_entries: false,
                before_invocation: false,
            },
        )
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn key(mut self, expression: impl Into<String>) -> Self {
        self.key = Some(expression.into());
        self
    }

    pub fn key_generator(mut self, bean_name: impl Into<String>) -> Self {
        self.key_generator = Some(bean_name.into());
        self
    }

    pub fn cache_manager(mut self, bean_name: impl Into<String>) -> Self {
        self.cache_manager = Some(bean_name.into());
        self
    }

    pub fn cache_resolver(mut self, bean_name: impl Into<String>) -> Self {
        self.cache_resolver = Some(bean_name.into());
        self
    }

    pub fn condition(mut self, expression: impl Into<String>) -> Self {
        self.condition = Some(expression.into());
        self
    }

    /// 对 Cacheable / Put 有效
    pub fn unless(mut self, expression: impl Into<String>) -> Self {
        match &mut self.kind {
            OperationKind::Cacheable { unless, .. } | OperationKind::Put { unless } => {
                *unless = Some(expression.into());
            }
            OperationKind::Evict { .. } => {}
        }
        self
    }

    /// 对 Cacheable 有效
    pub fn sync(mut self) -> Self {
        if let OperationKind::Cacheable { sync, .. } = &mut self.kind {
            *sync = true;
        }
        self
    }

    /// 对 Evict 有效
    pub fn all_entries(mut self) -> Self {
        if let OperationKind::Evict { all_entries, .. } = &mut self.kind {
            *all_entries = true;
        }
        self
    }

    /// 对 Evict 有效
    pub fn before_invocation(mut self) -> Self {
        if let OperationKind::Evict {
            before_invocation, ..
        } = &mut self.kind
        {
            *before_invocation = true;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache_names(&self) -> &[String] {
        &self.cache_names
    }

    pub fn key_expression(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn key_generator_name(&self) -> Option<&str> {
        self.key_generator.as_deref()
    }

    pub fn cache_manager_name(&self) -> Option<&str> {
        self.cache_manager.as_deref()
    }

    pub fn cache_resolver_name(&self) -> Option<&str> {
        self.cache_resolver.as_deref()
    }

    pub fn condition_expression(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn unless_expression(&self) -> Option<&str> {
        match &self.kind {
            OperationKind::Cacheable { unless, .. } | OperationKind::Put { unless } => unless.as_deref(),
            OperationKind::Evict { .. } => None,
        }
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    pub fn is_cacheable(&self) -> bool {
        matches!(self.kind, OperationKind::Cacheable { .. })
    }

    pub fn is_put(&self) -> bool {
        matches!(self.kind, OperationKind::Put { .. })
    }

    pub fn is_evict(&self) -> bool {
        matches!(self.kind, OperationKind::Evict { .. })
    }

    pub fn is_sync(&self) -> bool {
        matches!(self.kind, OperationKind::Cacheable { sync: true, .. })
    }

    pub fn is_all_entries(&self) -> bool {
        matches!(self.kind, OperationKind::Evict { all_entries: true, .. })
    }

    pub fn is_before_invocation(&self) -> bool {
        matches!(
            self.kind,
            OperationKind::Evict {
                before_invocation: true,
                ..
            }
        )
    }

    /// 合并类型级默认配置
    pub fn apply_config(mut self, config: &CacheConfig) -> Self {
        if self.cache_names.is_empty() {
            self.cache_names = config.cache_names.clone();
        }
        if self.key.is_none() && self.key_generator.is_none() {
            self.key_generator = config.key_generator.clone();
        }
        // 方法上声明了其中一个时不再继承
        if self.cache_manager.is_none() && self.cache_resolver.is_none() {
            if config.cache_resolver.is_some() {
                self.cache_resolver = config.cache_resolver.clone();
            } else {
                self.cache_manager = config.cache_manager.clone();
            }
        }
        self
    }

    /// 检查互斥的属性
    pub fn validate(&self, target: &str) -> CacheResult<()> {
        let invalid = |message: &str| CacheError::InvalidOperation {
            target: target.to_string(),
            message: message.to_string(),
        };
        if self.key.is_some() && self.key_generator.is_some() {
            return Err(invalid(
                "Both 'key' and 'key_generator' attributes have been set. These attributes are mutually exclusive: \
                 either set the expression used to compute the key at runtime or set the name of the KeyGenerator bean to use.",
            ));
        }
        if self.cache_manager.is_some() && self.cache_resolver.is_some() {
            return Err(invalid(
                "Both 'cache_manager' and 'cache_resolver' attributes have been set. These attributes are mutually exclusive: \
                 the cache manager is used to configure a default cache resolver if none is set.",
            ));
        }
        Ok(())
    }

    fn kind_name(&self) -> &'static str {
        match self.kind {
            OperationKind::Cacheable { .. } => "Cacheable",
            OperationKind::Put { .. } => "CachePut",
            OperationKind::Evict { .. } => "CacheEvict",
        }
    }
}

impl fmt::Display for CacheOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |value: &Option<String>| value.clone().unwrap_or_default();
        write!(
            f,
            "{}[{}] caches={:?} | key='{}' | key_generator='{}' | cache_manager='{}' | cache_resolver='{}' | condition='{}'",
            self.kind_name(),
            self.name,
            self.cache_names,
            opt(&self.key),
            opt(&self.key_generator),
            opt(&self.cache_manager),
            opt(&self.cache_resolver),
            opt(&self.condition),
        )?;
        match &self.kind {
            OperationKind::Cacheable { unless, sync } => {
                write!(f, " | unless='{}' | sync='{}'", opt(unless), sync)
            }
            OperationKind::Put { unless } => write!(f, " | unless='{}'", opt(unless)),
            OperationKind::Evict {
                all_entries,
                before_invocation,
            } => write!(f, ",{},{}", all_entries, before_invocation),
        }
    }
}

/// 类型级缓存默认配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfig {
    pub cache_names: Vec<String>,
    pub key_generator: Option<String>,
    pub cache_manager: Option<String>,
    pub cache_resolver: Option<String>,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cache_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn key_generator(mut self, bean_name: impl Into<String>) -> Self {
        self.key_generator = Some(bean_name.into());
        self
    }

    pub fn cache_manager(mut self, bean_name: impl Into<String>) -> Self {
        self.cache_manager = Some(bean_name.into());
        self
    }

    pub fn cache_resolver(mut self, bean_name: impl Into<String>) -> Self {
        self.cache_resolver = Some(bean_name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let op = CacheOperation::cacheable(["users"])
            .key("#p0")
            .unless("#result == null")
            .sync();
        assert!(op.is_cacheable() && op.is_sync());
        assert_eq!(op.unless_expression(), Some("#result == null"));

        let evict = CacheOperation::evict(["users"])
            .all_entries()
            .before_invocation()
            .unless("ignored")
            .sync();
        assert!(evict.is_all_entries() && evict.is_before_invocation());
        assert!(!evict.is_sync());
        assert_eq!(evict.unless_expression(), None);
    }

    #[test]
    fn test_apply_config() {
        let config = CacheConfig::new()
            .cache_names(["defaults"])
            .key_generator("customKeyGenerator")
            .cache_manager("redisCacheManager");

        let op = CacheOperation::cacheable(Vec::<String>::new()).apply_config(&config);
        assert_eq!(op.cache_names(), ["defaults"]);
        assert_eq!(op.key_generator_name(), Some("customKeyGenerator"));
        assert_eq!(op.cache_manager_name(), Some("redisCacheManager"));

        // 方法上声明的属性优先
        let op = CacheOperation::put(["users"])
            .key("#p0")
            .cache_resolver("localResolver")
            .apply_config(&config);
        assert_eq!(op.cache_names(), ["users"]);
        assert_eq!(op.key_generator_name(), None);
        assert_eq!(op.cache_manager_name(), None);
        assert_eq!(op.cache_resolver_name(), Some("localResolver"));

        let config = config.cache_resolver("sharedResolver");
        let op = CacheOperation::evict(["users"]).apply_config(&config);
        assert_eq!(op.cache_resolver_name(), Some("sharedResolver"));
        assert_eq!(op.cache_manager_name(), None);
    }

    #[test]
    fn test_validate_mutually_exclusive() {
        let op = CacheOperation::cacheable(["users"]).key("#p0").key_generator("gen");
        assert!(matches!(
            op.validate("UserRepository.find"),
            Err(CacheError::InvalidOperation { .. })
        ));

        let op = CacheOperation::cacheable(["users"])
            .cache_manager("a")
            .cache_resolver("b");
        assert!(op.validate("UserRepository.find").is_err());
        assert!(CacheOperation::put(["users"]).validate("UserRepository.save").is_ok());
    }

    #[test]
    fn test_display() {
        let op = CacheOperation::cacheable(["users"]).named("UserRepository.find").key("#p0");
        let text = op.to_string();
        assert!(text.starts_with("Cacheable[UserRepository.find] caches=[\"users\"]"));
        assert!(text.contains("key='#p0'"));
    }
}
