//! 响应式事务
//!
//! 事务状态不放在调用栈上，而是通过 [`ReactiveTransactionContext`] 显式交给被调用的 future / stream。
//! 每个订阅恰好完成一次：成功提交，失败按回滚规则处理，被取消（drop）时提交。

use std::future::Future;
use std::sync::Arc;

use chimera_aop::{Method, Throwable, Value};
use futures::stream::{self, Stream, StreamExt};

use crate::context::TransactionInfo;
use crate::error::TransactionError;
use crate::manager::{ReactiveTransactionManager, TransactionManager};
use crate::status::TransactionStatus;
use crate::support::TransactionAspectSupport;

/// 交给响应式调用的事务上下文
#[derive(Debug, Clone, Default)]
pub struct ReactiveTransactionContext {
    info: Option<Arc<TransactionInfo>>,
}

impl ReactiveTransactionContext {
    pub fn info(&self) -> Option<&Arc<TransactionInfo>> {
        self.info.as_ref()
    }

    /// 当前事务状态，非事务调用时为 None
    pub fn status(&self) -> Option<&Arc<dyn TransactionStatus>> {
        self.info.as_ref()?.status()
    }
}

/// 一次订阅的事务范围
///
/// 完成前被 drop 视为取消，在当前 tokio 运行时中异步提交
struct ReactiveTransactionScope {
    manager: Arc<dyn ReactiveTransactionManager>,
    info: Arc<TransactionInfo>,
    status: Arc<dyn TransactionStatus>,
    armed: bool,
}

impl ReactiveTransactionScope {
    fn context(&self) -> ReactiveTransactionContext {
        ReactiveTransactionContext {
            info: Some(Arc::clone(&self.info)),
        }
    }

    fn joinpoint(&self) -> &str {
        self.info.joinpoint_identification()
    }

    /// 开始完成事务，之后的 drop 不再触发提交
    fn disarm(&mut self) {
        self.armed = false;
    }

    async fn commit_after_returning(
        &mut self,
        support: &TransactionAspectSupport,
        method: &Method,
        value: &Value,
    ) -> Result<(), Throwable> {
        self.disarm();
        if let (Some(attribute), Some(failure)) =
            (self.info.attribute(), support.shapes().failure(method, value))
        {
            if attribute.rollback_on(&failure) {
                self.status.set_rollback_only();
            }
        }
        tracing::trace!("Completing transaction for [{}]", self.joinpoint());
        self.manager.commit(Arc::clone(&self.status)).await?;
        Ok(())
    }

    async fn commit_on_completion(&mut self) -> Result<(), Throwable> {
        self.disarm();
        tracing::trace!("Completing transaction for [{}]", self.joinpoint());
        self.manager.commit(Arc::clone(&self.status)).await?;
        Ok(())
    }

    async fn complete_after_throwing(&mut self, error: Throwable) -> Throwable {
        self.disarm();
        tracing::trace!(
            "Completing transaction for [{}] after exception: {}",
            self.joinpoint(),
            error
        );
        let rollback = self
            .info
            .attribute()
            .map_or(true, |attribute| attribute.rollback_on(&error));

        if rollback {
            match self.manager.rollback(Arc::clone(&self.status)).await {
                Ok(()) => error,
                Err(rollback_error) => {
                    tracing::error!(
                        "Application exception overridden by rollback exception: {}",
                        error.full_description()
                    );
                    rollback_error.with_application_error(error).into()
                }
            }
        } else {
            match self.manager.commit(Arc::clone(&self.status)).await {
                Ok(()) => error,
                Err(commit_error) => {
                    tracing::error!(
                        "Application exception overridden by commit exception: {}",
                        error.full_description()
                    );
                    commit_error.with_application_error(error).into()
                }
            }
        }
    }
}

impl Drop for ReactiveTransactionScope {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::debug!("Transaction for [{}] cancelled, committing", self.joinpoint());
        let manager = Arc::clone(&self.manager);
        let status = Arc::clone(&self.status);
        let joinpoint = self.joinpoint().to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(error) = manager.commit(status).await {
                        tracing::error!(
                            "Failed to commit cancelled transaction for [{}]: {}",
                            joinpoint,
                            error
                        );
                    }
                });
            }
            Err(_) => tracing::warn!(
                "No async runtime available to complete cancelled transaction for [{}]",
                joinpoint
            ),
        }
    }
}

enum StreamState<F, S> {
    Start(F),
    Streaming {
        inner: std::pin::Pin<Box<S>>,
        scope: Option<ReactiveTransactionScope>,
    },
    Done,
}

impl TransactionAspectSupport {
    /// 开启响应式事务，非事务调用返回 None
    async fn begin_reactive(
        &self,
        method: &Method,
        target_type: &str,
    ) -> Result<Option<ReactiveTransactionScope>, Throwable> {
        if !self.is_initialized() {
            return Ok(None);
        }

        let attribute = self.transaction_attribute(method, target_type);
        let manager = self.determine_transaction_manager(attribute.as_ref())?;
        let joinpoint = self.method_identification(method, target_type, attribute.as_ref());
        let Some(attribute) = attribute else {
            tracing::trace!(
                "No need to create transaction for [{}]: This method is not transactional",
                joinpoint
            );
            return Ok(None);
        };

        let reactive = match manager {
            Some(TransactionManager::Reactive(reactive)) => reactive,
            Some(other) => {
                return Err(TransactionError::ManagerMismatch {
                    manager: other.kind().to_string(),
                    method: joinpoint,
                }
                .into())
            }
            None => {
                tracing::debug!(
                    "Skipping transactional joinpoint [{}] because no transaction manager has been configured",
                    joinpoint
                );
                return Ok(None);
            }
        };

        let attribute = self.prepare_attribute(attribute, &joinpoint);
        tracing::trace!("Getting reactive transaction for [{}]", joinpoint);
        let status = reactive.get_reactive_transaction(attribute.definition()).await?;
        let info = Arc::new(TransactionInfo::new(
            Some(TransactionManager::Reactive(Arc::clone(&reactive))),
            Some(attribute),
            joinpoint,
            Some(Arc::clone(&status)),
        ));

        Ok(Some(ReactiveTransactionScope {
            manager: reactive,
            info,
            status,
            armed: true,
        }))
    }

    /// 在响应式事务中执行返回单个值的异步调用
    pub async fn invoke_reactive<F, Fut>(
        &self,
        method: &Method,
        target_type: &str,
        invocation: F,
    ) -> Result<Value, Throwable>
    where
        F: FnOnce(ReactiveTransactionContext) -> Fut,
        Fut: Future<Output = Result<Value, Throwable>>,
    {
        let Some(mut scope) = self.begin_reactive(method, target_type).await? else {
            return invocation(ReactiveTransactionContext::default()).await;
        };

        match invocation(scope.context()).await {
            Ok(value) => {
                scope.commit_after_returning(self, method, &value).await?;
                Ok(value)
            }
            Err(error) => Err(scope.complete_after_throwing(error).await),
        }
    }

    /// 在响应式事务中执行返回多个值的异步调用
    ///
    /// 第一个错误项之后流结束；流正常结束时提交，提交失败时追加一个错误项
    pub fn invoke_reactive_stream<'a, F, S>(
        &'a self,
        method: &'a Method,
        target_type: &'a str,
        invocation: F,
    ) -> impl Stream<Item = Result<Value, Throwable>> + 'a
    where
        F: FnOnce(ReactiveTransactionContext) -> S + 'a,
        S: Stream<Item = Result<Value, Throwable>> + 'a,
    {
        stream::unfold(StreamState::Start(invocation), move |state| async move {
            match state {
                StreamState::Start(invocation) => match self.begin_reactive(method, target_type).await {
                    Err(error) => Some((Err(error), StreamState::Done)),
                    Ok(scope) => {
                        let context = scope
                            .as_ref()
                            .map(ReactiveTransactionScope::context)
                            .unwrap_or_default();
                        let inner = Box::pin(invocation(context));
                        next_item(inner, scope).await
                    }
                },
                StreamState::Streaming { inner, scope } => next_item(inner, scope).await,
                StreamState::Done => None,
            }
        })
    }
}

async fn next_item<F, S>(
    mut inner: std::pin::Pin<Box<S>>,
    mut scope: Option<ReactiveTransactionScope>,
) -> Option<(Result<Value, Throwable>, StreamState<F, S>)>
where
    S: Stream<Item = Result<Value, Throwable>>,
{
    match inner.next().await {
        Some(Ok(value)) => Some((Ok(value), StreamState::Streaming { inner, scope })),
        Some(Err(error)) => {
            let error = match scope.as_mut() {
                Some(scope) => scope.complete_after_throwing(error).await,
                None => error,
            };
            Some((Err(error), StreamState::Done))
        }
        None => match scope.as_mut() {
            Some(scope) => match scope.commit_on_completion().await {
                Ok(()) => None,
                Err(error) => Some((Err(error), StreamState::Done)),
            },
            None => None,
        },
    }
}
