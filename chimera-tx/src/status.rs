//! 事务状态

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// 事务状态
///
/// 由事务管理器创建，引擎只通过它标记 rollback-only
pub trait TransactionStatus: Send + Sync + fmt::Debug {
    /// 是否为新开启的事务（而不是加入已有事务）
    fn is_new_transaction(&self) -> bool;

    /// 是否真正持有一个事务（SUPPORTS 等传播行为下可能没有）
    fn has_transaction(&self) -> bool {
        true
    }

    /// 标记事务只能回滚
    fn set_rollback_only(&self);

    fn is_rollback_only(&self) -> bool;

    /// 事务是否已经提交或回滚
    fn is_completed(&self) -> bool;
}

/// 简单事务状态
#[derive(Debug)]
pub struct SimpleTransactionStatus {
    name: Option<String>,
    new_transaction: bool,
    has_transaction: bool,
    rollback_only: AtomicBool,
    completed: AtomicBool,
}

impl SimpleTransactionStatus {
    pub fn new(new_transaction: bool) -> Self {
        Self {
            name: None,
            new_transaction,
            has_transaction: true,
            rollback_only: AtomicBool::new(false),
            completed: AtomicBool::new(false),
        }
    }

    /// 没有实际事务的状态
    pub fn empty() -> Self {
        Self {
            has_transaction: false,
            ..Self::new(false)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 由事务管理器在提交或回滚后调用
    pub fn set_completed(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }
}

impl TransactionStatus for SimpleTransactionStatus {
    fn is_new_transaction(&self) -> bool {
        self.new_transaction && self.has_transaction
    }

    fn has_transaction(&self) -> bool {
        self.has_transaction
    }

    fn set_rollback_only(&self) {
        self.rollback_only.store(true, Ordering::SeqCst);
    }

    fn is_rollback_only(&self) -> bool {
        self.rollback_only.load(Ordering::SeqCst)
    }

    fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_flags() {
        let status = SimpleTransactionStatus::new(true).with_name("OrderService.place");
        assert!(status.is_new_transaction());
        assert!(!status.is_rollback_only());

        status.set_rollback_only();
        status.set_completed();
        assert!(status.is_rollback_only());
        assert!(status.is_completed());
        assert_eq!(status.name(), Some("OrderService.place"));

        let empty = SimpleTransactionStatus::empty();
        assert!(!empty.has_transaction());
        assert!(!empty.is_new_transaction());
    }
}
