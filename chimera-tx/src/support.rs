//! 事务切面支持
//!
//! 一次调用的流程：
//! 1. 解析 (方法, 目标类型) 的事务属性
//! 2. 解析事务管理器：属性限定符 > 配置的 Bean 名称 > 配置的默认管理器 > 按类型查找唯一 Bean
//! 3. 属性非空时向管理器请求事务，并把 TransactionInfo 压入事务栈
//! 4. 正常返回提交；异常时按回滚规则回滚或提交；无论如何都出栈
//!
//! 回调式管理器由管理器驱动事务，checked 异常需要包装后穿过回调边界，
//! 返回调用方之前再解包。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chimera_aop::{ErrorType, InvocationContext, Method, ResultShapes, Throwable, Value};
use chimera_core::bean_factory::{BeanFactory, BeanFactoryExt};
use chimera_core::error::{ApplicationError, ApplicationResult};
use chimera_core::lifecycle::{BeanFactoryAware, InitializingBean, SmartInitializingSingleton};
use chimera_core::utils::class_names::qualified_method_name;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::attribute::TransactionAttribute;
use crate::attribute_source::TransactionAttributeSource;
use crate::context::{TransactionContext, TransactionInfo};
use crate::error::{TransactionError, TransactionResult};
use crate::manager::{
    CallbackPreferringPlatformTransactionManager, PlatformTransactionManager, TransactionManager,
};
use crate::properties::TransactionProperties;
use crate::status::TransactionStatus;

/// 默认事务管理器在缓存中的键
const DEFAULT_TRANSACTION_MANAGER_KEY: &str = "<default>";

/// 回调式管理器中包装 checked 异常的类型
static THROWABLE_HOLDER_EXCEPTION: Lazy<ErrorType> =
    Lazy::new(|| ErrorType::new("ThrowableHolderException", &ErrorType::runtime_exception()));

fn hold(error: Throwable) -> Throwable {
    Throwable::new(THROWABLE_HOLDER_EXCEPTION.clone(), error.to_string()).with_cause(error)
}

fn is_held(error: &Throwable) -> bool {
    error.error_type() == &*THROWABLE_HOLDER_EXCEPTION
}

/// 事务切面支持
///
/// 代理管道经由 [`TransactionInterceptor`](crate::interceptor::TransactionInterceptor) 走同步路径；
/// 异步调用方直接使用 [`invoke_reactive`](Self::invoke_reactive) 和
/// [`invoke_reactive_stream`](Self::invoke_reactive_stream)。
pub struct TransactionAspectSupport {
    attribute_source: Option<Arc<dyn TransactionAttributeSource>>,
    transaction_manager: Option<TransactionManager>,
    transaction_manager_bean_name: Option<String>,
    default_timeout: Option<i32>,
    shapes: ResultShapes,
    bean_factory: RwLock<Option<Arc<dyn BeanFactory>>>,
    manager_cache: RwLock<HashMap<String, TransactionManager>>,
    initialized: AtomicBool,
}

impl TransactionAspectSupport {
    pub fn new() -> Self {
        Self {
            attribute_source: None,
            transaction_manager: None,
            transaction_manager_bean_name: None,
            default_timeout: None,
            shapes: ResultShapes::default(),
            bean_factory: RwLock::new(None),
            manager_cache: RwLock::new(HashMap::new()),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn with_attribute_source(mut self, source: Arc<dyn TransactionAttributeSource>) -> Self {
        self.attribute_source = Some(source);
        self
    }

    /// 默认事务管理器
    pub fn with_transaction_manager(mut self, manager: TransactionManager) -> Self {
        self.transaction_manager = Some(manager);
        self
    }

    /// 默认事务管理器的 Bean 名称
    pub fn with_transaction_manager_bean_name(mut self, name: impl Into<String>) -> Self {
        self.transaction_manager_bean_name = Some(name.into());
        self
    }

    pub fn with_result_shapes(mut self, shapes: ResultShapes) -> Self {
        self.shapes = shapes;
        self
    }

    pub fn with_properties(mut self, properties: &TransactionProperties) -> Self {
        if let Some(name) = &properties.manager_bean_name {
            self.transaction_manager_bean_name = Some(name.clone());
        }
        self.default_timeout = properties.default_timeout;
        self
    }

    pub fn attribute_source(&self) -> Option<&Arc<dyn TransactionAttributeSource>> {
        self.attribute_source.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn shapes(&self) -> &ResultShapes {
        &self.shapes
    }

    pub(crate) fn transaction_attribute(
        &self,
        method: &Method,
        target_type: &str,
    ) -> Option<TransactionAttribute> {
        self.attribute_source
            .as_ref()?
            .get_transaction_attribute(method, target_type)
    }

    /// 日志和事务名称中使用的连接点标识
    pub(crate) fn method_identification(
        &self,
        method: &Method,
        target_type: &str,
        attribute: Option<&TransactionAttribute>,
    ) -> String {
        attribute
            .and_then(TransactionAttribute::descriptor)
            .map(String::from)
            .unwrap_or_else(|| qualified_method_name(target_type, method.name()))
    }

    /// 补全事务名称和默认超时
    pub(crate) fn prepare_attribute(
        &self,
        mut attribute: TransactionAttribute,
        joinpoint_identification: &str,
    ) -> TransactionAttribute {
        if attribute.name().is_none() {
            attribute.set_name(joinpoint_identification);
        }
        if let Some(timeout) = self.default_timeout {
            if attribute.definition().has_default_timeout() {
                attribute.definition_mut().timeout = timeout;
            }
        }
        attribute
    }

    /// 解析事务管理器
    ///
    /// 没有属性或没有 BeanFactory 时返回配置的默认管理器（可能为空）
    pub fn determine_transaction_manager(
        &self,
        attribute: Option<&TransactionAttribute>,
    ) -> TransactionResult<Option<TransactionManager>> {
        let bean_factory = self.bean_factory.read().clone();
        let (Some(attribute), Some(bean_factory)) = (attribute, bean_factory) else {
            return Ok(self.transaction_manager.clone());
        };

        if let Some(qualifier) = attribute.qualifier() {
            return self
                .cached_manager(qualifier, || bean_factory.qualified_bean::<TransactionManager>(qualifier))
                .map(Some);
        }
        if let Some(name) = &self.transaction_manager_bean_name {
            return self
                .cached_manager(name, || bean_factory.get_bean_of::<TransactionManager>(name))
                .map(Some);
        }
        if let Some(manager) = &self.transaction_manager {
            return Ok(Some(manager.clone()));
        }
        self.cached_manager(DEFAULT_TRANSACTION_MANAGER_KEY, || {
            bean_factory.get_unique_bean::<TransactionManager>()
        })
        .map(Some)
    }

    fn cached_manager<F>(&self, key: &str, lookup: F) -> TransactionResult<TransactionManager>
    where
        F: FnOnce() -> chimera_core::ContainerResult<TransactionManager>,
    {
        if let Some(manager) = self.manager_cache.read().get(key) {
            return Ok(manager.clone());
        }
        let manager = lookup()?;
        tracing::debug!("Resolved {:?} for '{}'", manager, key);
        self.manager_cache
            .write()
            .insert(key.to_string(), manager.clone());
        Ok(manager)
    }

    /// 在事务中执行调用
    pub fn invoke_within_transaction(
        &self,
        method: &Method,
        target_type: &str,
        context: &InvocationContext,
        invocation: &mut dyn FnMut() -> Result<Value, Throwable>,
    ) -> Result<Value, Throwable> {
        if !self.is_initialized() {
            tracing::trace!(
                "Transaction aspect not initialized yet, invoking '{}' directly",
                qualified_method_name(target_type, method.name())
            );
            return invocation();
        }

        let attribute = self.transaction_attribute(method, target_type);
        let manager = self.determine_transaction_manager(attribute.as_ref())?;
        let joinpoint = self.method_identification(method, target_type, attribute.as_ref());

        match (manager, attribute) {
            (Some(TransactionManager::Reactive(_)), _) => Err(TransactionError::ManagerMismatch {
                manager: "ReactiveTransactionManager".into(),
                method: joinpoint,
            }
            .into()),
            (Some(TransactionManager::CallbackPreferring(callback_manager)), Some(attribute)) => {
                let manager = TransactionManager::CallbackPreferring(Arc::clone(&callback_manager));
                self.invoke_with_callback(
                    method,
                    callback_manager.as_ref(),
                    manager,
                    attribute,
                    joinpoint,
                    context,
                    invocation,
                )
            }
            (manager, attribute) => {
                self.invoke_imperative(method, manager, attribute, joinpoint, context, invocation)
            }
        }
    }

    fn invoke_imperative(
        &self,
        method: &Method,
        manager: Option<TransactionManager>,
        attribute: Option<TransactionAttribute>,
        joinpoint: String,
        context: &InvocationContext,
        invocation: &mut dyn FnMut() -> Result<Value, Throwable>,
    ) -> Result<Value, Throwable> {
        let info = Arc::new(self.create_transaction_if_necessary(manager, attribute, joinpoint)?);

        let transaction_context = TransactionContext::of(context);
        let guard = transaction_context.bind(Arc::clone(&info));
        let outcome = match invocation() {
            Ok(value) => Ok(value),
            Err(error) => Err(self.complete_transaction_after_throwing(&info, error)),
        };
        drop(guard);

        let value = outcome?;
        self.mark_failure_carrying_result(method, &info, &value);
        self.commit_transaction_after_returning(&info)?;
        Ok(value)
    }

    fn create_transaction_if_necessary(
        &self,
        manager: Option<TransactionManager>,
        attribute: Option<TransactionAttribute>,
        joinpoint: String,
    ) -> Result<TransactionInfo, Throwable> {
        let attribute = attribute.map(|attribute| self.prepare_attribute(attribute, &joinpoint));
        let platform = manager.as_ref().and_then(TransactionManager::as_platform);

        let status: Option<Arc<dyn TransactionStatus>> = match (&attribute, platform) {
            (Some(attribute), Some(platform)) => {
                tracing::trace!("Getting transaction for [{}]", joinpoint);
                Some(platform.get_transaction(attribute.definition())?)
            }
            (Some(_), None) => {
                tracing::debug!(
                    "Skipping transactional joinpoint [{}] because no transaction manager has been configured",
                    joinpoint
                );
                None
            }
            (None, _) => {
                tracing::trace!(
                    "No need to create transaction for [{}]: This method is not transactional",
                    joinpoint
                );
                None
            }
        };
        Ok(TransactionInfo::new(manager, attribute, joinpoint, status))
    }

    /// 按回滚规则完成事务，返回需要抛给调用方的异常
    fn complete_transaction_after_throwing(&self, info: &TransactionInfo, error: Throwable) -> Throwable {
        let platform = info.manager().and_then(TransactionManager::as_platform);
        let (Some(status), Some(attribute), Some(platform)) = (info.status(), info.attribute(), platform)
        else {
            return error;
        };

        tracing::trace!(
            "Completing transaction for [{}] after exception: {}",
            info.joinpoint_identification(),
            error
        );
        if attribute.rollback_on(&error) {
            match platform.rollback(status.as_ref()) {
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
            // 不回滚时仍然提交，状态为 rollback-only 时由管理器回滚
            match platform.commit(status.as_ref()) {
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

    /// 返回值携带匹配回滚规则的失败时标记 rollback-only
    fn mark_failure_carrying_result(&self, method: &Method, info: &TransactionInfo, value: &Value) {
        let (Some(status), Some(attribute)) = (info.status(), info.attribute()) else {
            return;
        };
        if let Some(failure) = self.shapes.failure(method, value) {
            if attribute.rollback_on(&failure) {
                tracing::trace!(
                    "Marking [{}] rollback-only for failed result: {}",
                    info.joinpoint_identification(),
                    failure
                );
                status.set_rollback_only();
            }
        }
    }

    fn commit_transaction_after_returning(&self, info: &TransactionInfo) -> Result<(), Throwable> {
        let platform = info.manager().and_then(TransactionManager::as_platform);
        if let (Some(status), Some(platform)) = (info.status(), platform) {
            tracing::trace!("Completing transaction for [{}]", info.joinpoint_identification());
            platform.commit(status.as_ref())?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn invoke_with_callback(
        &self,
        method: &Method,
        callback_manager: &dyn CallbackPreferringPlatformTransactionManager,
        manager: TransactionManager,
        attribute: TransactionAttribute,
        joinpoint: String,
        context: &InvocationContext,
        invocation: &mut dyn FnMut() -> Result<Value, Throwable>,
    ) -> Result<Value, Throwable> {
        let attribute = self.prepare_attribute(attribute, &joinpoint);
        let transaction_context = TransactionContext::of(context);
        let mut held: Option<Throwable> = None;

        let result = {
            let mut callback = |status: Arc<dyn TransactionStatus>| -> Result<Value, Throwable> {
                let info = TransactionInfo::new(
                    Some(manager.clone()),
                    Some(attribute.clone()),
                    joinpoint.clone(),
                    Some(Arc::clone(&status)),
                );
                let _guard = transaction_context.bind(Arc::new(info));

                match invocation() {
                    Ok(value) => {
                        if let Some(failure) = self.shapes.failure(method, &value) {
                            if attribute.rollback_on(&failure) {
                                status.set_rollback_only();
                            }
                        }
                        Ok(value)
                    }
                    Err(error) if attribute.rollback_on(&error) => {
                        if error.is_unchecked() {
                            Err(error)
                        } else {
                            Err(hold(error))
                        }
                    }
                    Err(error) => {
                        // 正常返回以提交，异常留到管理器返回后再抛出
                        held = Some(error);
                        Ok(Value::Null)
                    }
                }
            };
            callback_manager.execute(attribute.definition(), &mut callback)
        };

        match result {
            Ok(value) => match held {
                Some(error) => Err(error),
                None => Ok(value),
            },
            Err(error) if is_held(&error) => {
                let cause = error.cause().cloned();
                Err(cause.unwrap_or(error))
            }
            Err(error) => {
                let Some(application_error) = held else {
                    return Err(error);
                };
                tracing::error!(
                    "Application exception overridden by commit exception: {}",
                    application_error.full_description()
                );
                match error.downcast_ref::<TransactionError>() {
                    Some(TransactionError::System { message, .. }) => Err(TransactionError::system(message.clone())
                        .with_application_error(application_error)
                        .into()),
                    _ => Err(error),
                }
            }
        }
    }
}

impl Default for TransactionAspectSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanFactoryAware for TransactionAspectSupport {
    fn set_bean_factory(&self, bean_factory: Arc<dyn BeanFactory>) {
        *self.bean_factory.write() = Some(bean_factory);
        self.manager_cache.write().clear();
    }
}

impl InitializingBean for TransactionAspectSupport {
    fn after_properties_set(&self) -> ApplicationResult<()> {
        if self.transaction_manager.is_none() && self.bean_factory.read().is_none() {
            return Err(ApplicationError::InitializationFailed(
                "Set the 'transaction_manager' property or make sure to run within a BeanFactory containing a TransactionManager bean".into(),
            ));
        }
        if self.attribute_source.is_none() {
            return Err(ApplicationError::InitializationFailed(
                "Either 'transaction_attribute_source' or 'transaction_attributes' is required: \
                 If there are no transactional methods, then don't use a transaction aspect"
                    .into(),
            ));
        }
        Ok(())
    }
}

impl SmartInitializingSingleton for TransactionAspectSupport {
    fn after_singletons_instantiated(&self) -> ApplicationResult<()> {
        self.after_properties_set()?;
        self.initialized.store(true, Ordering::Release);
        tracing::debug!("Transaction aspect initialized");
        Ok(())
    }
}
