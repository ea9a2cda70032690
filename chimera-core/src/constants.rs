/// 框架内置组件的 Bean 名称和配置键
///
/// 在各个引擎和测试中使用相同的标识符，避免硬编码

/// 默认 TransactionManager 的 Bean 名称
pub const TRANSACTION_MANAGER_BEAN_NAME: &str = "transactionManager";

/// 默认 CacheManager 的 Bean 名称
pub const CACHE_MANAGER_BEAN_NAME: &str = "cacheManager";

/// 事务配置前缀
pub const TRANSACTION_PROPERTIES_PREFIX: &str = "chimera.transaction";

/// 缓存配置前缀
pub const CACHE_PROPERTIES_PREFIX: &str = "chimera.cache";

/// 内置顺序：方法校验最先执行，然后是缓存，事务包裹在最内层
pub const VALIDATION_ADVISOR_ORDER: i32 = 100;
pub const CACHE_ADVISOR_ORDER: i32 = 200;
pub const TRANSACTION_ADVISOR_ORDER: i32 = 300;
