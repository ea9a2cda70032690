//! Chimera TX - 声明式事务
//!
//! - 事务属性：传播行为、隔离级别、超时、只读、限定符与回滚规则
//! - 属性来源：静态声明、名称映射、组合
//! - 事务管理器：命令式、回调式、响应式
//! - 切面支持：开启 / 提交 / 回滚，以及显式传递的事务上下文
//! - 拦截器与通知器

pub mod attribute;
pub mod attribute_source;
pub mod context;
pub mod definition;
pub mod error;
pub mod interceptor;
pub mod manager;
pub mod properties;
pub mod reactive;
pub mod rollback;
pub mod status;
pub mod support;

#[cfg(test)]
pub(crate) mod testing;

pub use attribute::{TransactionAttribute, Transactional};
pub use attribute_source::{
    CompositeTransactionAttributeSource, DeclaredTransactionAttributeSource,
    MethodMapTransactionAttributeSource, NameMatchTransactionAttributeSource,
    TransactionAttributeSource, TransactionalRegistration,
};
pub use context::{
    current_transaction_info, current_transaction_status, TransactionContext, TransactionInfo,
};
pub use definition::{Isolation, Propagation, TransactionDefinition, TIMEOUT_DEFAULT};
pub use error::{TransactionError, TransactionResult};
pub use interceptor::{TransactionAttributeSourcePointcut, TransactionInterceptor};
pub use manager::{
    CallbackPreferringPlatformTransactionManager, PlatformTransactionManager,
    ReactiveTransactionManager, TransactionCallback, TransactionManager,
};
pub use properties::TransactionProperties;
pub use reactive::ReactiveTransactionContext;
pub use rollback::{rollback_decision, RollbackRule};
pub use status::{SimpleTransactionStatus, TransactionStatus};
pub use support::TransactionAspectSupport;
