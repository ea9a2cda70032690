//! 事务管理器接口
//!
//! 引擎只依赖这里的窄接口，传播行为、隔离级别和超时都交给管理器实现。

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chimera_aop::{Throwable, Value};

use crate::definition::TransactionDefinition;
use crate::error::TransactionResult;
use crate::status::TransactionStatus;

/// 命令式事务管理器
pub trait PlatformTransactionManager: Send + Sync {
    /// 按定义开启或加入事务
    fn get_transaction(
        &self,
        definition: &TransactionDefinition,
    ) -> TransactionResult<Arc<dyn TransactionStatus>>;

    /// 提交；状态为 rollback-only 时由管理器执行回滚
    fn commit(&self, status: &dyn TransactionStatus) -> TransactionResult<()>;

    fn rollback(&self, status: &dyn TransactionStatus) -> TransactionResult<()>;
}

/// 事务回调
///
/// 返回 Err 表示需要回滚
pub type TransactionCallback<'a> =
    dyn FnMut(Arc<dyn TransactionStatus>) -> Result<Value, Throwable> + 'a;

/// 由管理器驱动回调的事务管理器
///
/// 管理器在自己的事务中执行回调：回调返回 Err 时回滚并把错误传出，
/// 正常返回时提交
pub trait CallbackPreferringPlatformTransactionManager: Send + Sync {
    fn execute(
        &self,
        definition: &TransactionDefinition,
        callback: &mut TransactionCallback<'_>,
    ) -> Result<Value, Throwable>;
}

/// 响应式事务管理器
#[async_trait]
pub trait ReactiveTransactionManager: Send + Sync {
    async fn get_reactive_transaction(
        &self,
        definition: &TransactionDefinition,
    ) -> TransactionResult<Arc<dyn TransactionStatus>>;

    async fn commit(&self, status: Arc<dyn TransactionStatus>) -> TransactionResult<()>;

    async fn rollback(&self, status: Arc<dyn TransactionStatus>) -> TransactionResult<()>;
}

/// 注册到 Bean 注册表中的事务管理器
#[derive(Clone)]
pub enum TransactionManager {
    Platform(Arc<dyn PlatformTransactionManager>),
    CallbackPreferring(Arc<dyn CallbackPreferringPlatformTransactionManager>),
    Reactive(Arc<dyn ReactiveTransactionManager>),
}

impl TransactionManager {
    pub fn kind(&self) -> &'static str {
        match self {
            TransactionManager::Platform(_) => "PlatformTransactionManager",
            TransactionManager::CallbackPreferring(_) => "CallbackPreferringPlatformTransactionManager",
            TransactionManager::Reactive(_) => "ReactiveTransactionManager",
        }
    }

    pub fn as_platform(&self) -> Option<&Arc<dyn PlatformTransactionManager>> {
        match self {
            TransactionManager::Platform(manager) => Some(manager),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Arc<dyn ReactiveTransactionManager>> {
        match self {
            TransactionManager::Reactive(manager) => Some(manager),
            _ => None,
        }
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionManager({})", self.kind())
    }
}
