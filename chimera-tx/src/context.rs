//! 事务上下文
//!
//! 每次调用的 [`TransactionInfo`] 压入 [`TransactionContext`] 栈，
//! 栈存放在 [`InvocationContext`] 中，随调用显式传递。
//! 进入时压栈、退出时出栈，无论成功还是失败。

use std::fmt;
use std::sync::Arc;

use chimera_aop::InvocationContext;
use parking_lot::Mutex;

use crate::attribute::TransactionAttribute;
use crate::error::{TransactionError, TransactionResult};
use crate::manager::TransactionManager;
use crate::status::TransactionStatus;

/// 一次事务性调用的记录
pub struct TransactionInfo {
    manager: Option<TransactionManager>,
    attribute: Option<TransactionAttribute>,
    joinpoint_identification: String,
    status: Option<Arc<dyn TransactionStatus>>,
}

impl TransactionInfo {
    pub fn new(
        manager: Option<TransactionManager>,
        attribute: Option<TransactionAttribute>,
        joinpoint_identification: impl Into<String>,
        status: Option<Arc<dyn TransactionStatus>>,
    ) -> Self {
        Self {
            manager,
            attribute,
            joinpoint_identification: joinpoint_identification.into(),
            status,
        }
    }

    pub fn manager(&self) -> Option<&TransactionManager> {
        self.manager.as_ref()
    }

    pub fn attribute(&self) -> Option<&TransactionAttribute> {
        self.attribute.as_ref()
    }

    pub fn joinpoint_identification(&self) -> &str {
        &self.joinpoint_identification
    }

    pub fn status(&self) -> Option<&Arc<dyn TransactionStatus>> {
        self.status.as_ref()
    }

    /// 非事务方法的占位记录没有状态
    pub fn has_transaction(&self) -> bool {
        self.status.is_some()
    }
}

impl fmt::Debug for TransactionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionInfo")
            .field("joinpoint", &self.joinpoint_identification)
            .field("attribute", &self.attribute.as_ref().map(ToString::to_string))
            .field("has_transaction", &self.has_transaction())
            .finish()
    }
}

/// TransactionInfo 栈
#[derive(Debug, Default)]
pub struct TransactionContext {
    stack: Mutex<Vec<Arc<TransactionInfo>>>,
}

impl TransactionContext {
    /// 调用上下文中的事务栈，不存在时创建
    pub fn of(context: &InvocationContext) -> Arc<TransactionContext> {
        context.get_or_init(TransactionContext::default)
    }

    /// 栈顶记录
    pub fn current(&self) -> Option<Arc<TransactionInfo>> {
        self.stack.lock().last().cloned()
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }

    /// 压栈，返回的守卫在 drop 时出栈，恢复调用方的记录
    pub fn bind(self: &Arc<Self>, info: Arc<TransactionInfo>) -> TransactionInfoGuard {
        self.stack.lock().push(Arc::clone(&info));
        TransactionInfoGuard {
            context: Arc::clone(self),
            info,
        }
    }

    fn unbind(&self, info: &Arc<TransactionInfo>) {
        let mut stack = self.stack.lock();
        match stack.iter().rposition(|bound| Arc::ptr_eq(bound, info)) {
            Some(index) if index + 1 == stack.len() => {
                stack.pop();
            }
            Some(index) => {
                tracing::warn!(
                    "TransactionInfo for [{}] unbound out of order",
                    info.joinpoint_identification()
                );
                stack.remove(index);
            }
            None => {}
        }
    }
}

/// 绑定守卫
pub struct TransactionInfoGuard {
    context: Arc<TransactionContext>,
    info: Arc<TransactionInfo>,
}

impl TransactionInfoGuard {
    pub fn info(&self) -> &Arc<TransactionInfo> {
        &self.info
    }
}

impl Drop for TransactionInfoGuard {
    fn drop(&mut self) {
        self.context.unbind(&self.info);
    }
}

/// 当前调用中由事务切面管理的事务状态
pub fn current_transaction_status(
    context: &InvocationContext,
) -> TransactionResult<Arc<dyn TransactionStatus>> {
    context
        .get::<TransactionContext>()
        .and_then(|tx| tx.current())
        .and_then(|info| info.status().cloned())
        .ok_or(TransactionError::NoTransaction)
}

/// 当前调用中的 TransactionInfo
pub fn current_transaction_info(context: &InvocationContext) -> Option<Arc<TransactionInfo>> {
    context.get::<TransactionContext>()?.current()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::SimpleTransactionStatus;

    fn info(name: &str, with_status: bool) -> Arc<TransactionInfo> {
        let status: Option<Arc<dyn TransactionStatus>> = if with_status {
            Some(Arc::new(SimpleTransactionStatus::new(true)))
        } else {
            None
        };
        Arc::new(TransactionInfo::new(None, None, name, status))
    }

    #[test]
    fn test_guard_restores_previous_info() {
        let ctx = InvocationContext::new();
        let tx = TransactionContext::of(&ctx);

        let outer = tx.bind(info("Outer.run", true));
        {
            let _inner = tx.bind(info("Inner.run", false));
            assert_eq!(tx.depth(), 2);
            assert_eq!(current_transaction_info(&ctx).unwrap().joinpoint_identification(), "Inner.run");
            assert!(current_transaction_status(&ctx).is_err());
        }
        assert_eq!(tx.depth(), 1);
        assert!(current_transaction_status(&ctx).is_ok());

        drop(outer);
        assert_eq!(tx.depth(), 0);
        assert!(matches!(current_transaction_status(&ctx), Err(TransactionError::NoTransaction)));
    }

    #[test]
    fn test_out_of_order_unbind() {
        let ctx = InvocationContext::new();
        let tx = TransactionContext::of(&ctx);
        let first = tx.bind(info("A.a", true));
        let second = tx.bind(info("B.b", true));

        drop(first);
        assert_eq!(tx.current().unwrap().joinpoint_identification(), "B.b");
        drop(second);
        assert!(tx.current().is_none());
    }
}
