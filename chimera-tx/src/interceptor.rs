//! 事务拦截器与通知器

use std::sync::Arc;

use chimera_aop::{
    Advice, Advisor, ClassFilter, Method, MethodInterceptor, MethodInvocation, MethodMatcher,
    Pointcut, PointcutAdvisor, Throwable, Value,
};
use chimera_core::bean_factory::BeanFactory;
use chimera_core::constants::TRANSACTION_ADVISOR_ORDER;
use chimera_core::error::ApplicationResult;
use chimera_core::lifecycle::{BeanFactoryAware, InitializingBean, SmartInitializingSingleton};

use crate::attribute_source::TransactionAttributeSource;
use crate::support::TransactionAspectSupport;

/// 事务拦截器
///
/// 把调用交给 [`TransactionAspectSupport`]，链上其余部分作为事务内的回调
pub struct TransactionInterceptor {
    support: TransactionAspectSupport,
}

impl TransactionInterceptor {
    pub fn new(support: TransactionAspectSupport) -> Self {
        Self { support }
    }

    pub fn support(&self) -> &TransactionAspectSupport {
        &self.support
    }

    /// 以属性来源为切点的通知器
    ///
    /// 没有属性来源时匹配所有方法，由属性来源在调用时决定
    pub fn into_advisor(self: Arc<Self>) -> Advisor {
        let pointcut: Arc<dyn Pointcut> = match self.support.attribute_source() {
            Some(source) => Arc::new(TransactionAttributeSourcePointcut::new(Arc::clone(source))),
            None => Arc::new(chimera_aop::TruePointcut),
        };
        PointcutAdvisor::new("transactionAdvisor", pointcut, Advice::Around(self))
            .with_order(TRANSACTION_ADVISOR_ORDER)
            .into()
    }
}

impl MethodInterceptor for TransactionInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, Throwable> {
        let method = invocation.method();
        let target_type = invocation.target_type();
        let context = invocation.context();
        self.support
            .invoke_within_transaction(method, target_type, context, &mut || invocation.proceed())
    }
}

impl BeanFactoryAware for TransactionInterceptor {
    fn set_bean_factory(&self, bean_factory: Arc<dyn BeanFactory>) {
        self.support.set_bean_factory(bean_factory);
    }
}

impl InitializingBean for TransactionInterceptor {
    fn after_properties_set(&self) -> ApplicationResult<()> {
        self.support.after_properties_set()
    }
}

impl SmartInitializingSingleton for TransactionInterceptor {
    fn after_singletons_instantiated(&self) -> ApplicationResult<()> {
        self.support.after_singletons_instantiated()
    }
}

struct CandidateTypeFilter {
    source: Arc<dyn TransactionAttributeSource>,
}

impl ClassFilter for CandidateTypeFilter {
    fn matches(&self, target_type: &str) -> bool {
        self.source.is_candidate_type(target_type)
    }
}

/// 方法在属性来源中有事务属性时匹配
pub struct TransactionAttributeSourcePointcut {
    source: Arc<dyn TransactionAttributeSource>,
    class_filter: CandidateTypeFilter,
}

impl TransactionAttributeSourcePointcut {
    pub fn new(source: Arc<dyn TransactionAttributeSource>) -> Self {
        Self {
            class_filter: CandidateTypeFilter {
                source: Arc::clone(&source),
            },
            source,
        }
    }
}

impl MethodMatcher for TransactionAttributeSourcePointcut {
    fn matches(&self, method: &Method, target_type: &str) -> bool {
        self.source
            .get_transaction_attribute(method, target_type)
            .is_some()
    }
}

impl Pointcut for TransactionAttributeSourcePointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        &self.class_filter
    }

    fn method_matcher(&self) -> &dyn MethodMatcher {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Transactional;
    use crate::attribute_source::DeclaredTransactionAttributeSource;
    use crate::context::current_transaction_status;
    use crate::manager::TransactionManager;
    use crate::testing::RecordingTransactionManager;
    use chimera_aop::{FnTarget, ProxyFactory, Target};
    use chimera_core::order::Ordered;
    use serde_json::json;

    fn account_service() -> Arc<dyn Target> {
        Arc::new(
            FnTarget::new("AccountService")
                .method(Method::new("AccountService", "transfer"), |args, ctx| {
                    current_transaction_status(ctx)?;
                    match args.first().and_then(Value::as_i64) {
                        Some(amount) if amount > 0 => Ok(json!(amount)),
                        _ => Err(Throwable::illegal_argument("amount must be positive")),
                    }
                })
                .method(Method::new("AccountService", "balance"), |_, ctx| {
                    Ok(json!(current_transaction_status(ctx).is_ok()))
                }),
        )
    }

    fn interceptor(tm: &Arc<RecordingTransactionManager>) -> Arc<TransactionInterceptor> {
        let source = DeclaredTransactionAttributeSource::new()
            .declare_method("AccountService", "transfer", &Transactional::new())
            .unwrap();
        let support = TransactionAspectSupport::new()
            .with_attribute_source(Arc::new(source))
            .with_transaction_manager(TransactionManager::Platform(tm.clone()));
        Arc::new(TransactionInterceptor::new(support))
    }

    #[test]
    fn test_transactional_proxy() {
        let tm = RecordingTransactionManager::new();
        let interceptor = interceptor(&tm);
        interceptor.after_singletons_instantiated().unwrap();
        let advisor = Arc::clone(&interceptor).into_advisor();
        assert_eq!(advisor.order(), TRANSACTION_ADVISOR_ORDER);

        let proxy = ProxyFactory::new(account_service()).add_advisor(advisor).get_proxy();

        assert_eq!(
            proxy.call(&Method::new("AccountService", "transfer"), vec![json!(10)]).unwrap(),
            json!(10)
        );
        let error = proxy
            .call(&Method::new("AccountService", "transfer"), vec![json!(-1)])
            .unwrap_err();
        assert_eq!(error.error_type().name(), "IllegalArgumentException");

        // balance 不匹配切点，不经过事务
        assert_eq!(
            proxy.call(&Method::new("AccountService", "balance"), vec![]).unwrap(),
            json!(false)
        );
        assert_eq!(tm.events(), vec!["begin", "commit", "begin", "rollback"]);
    }

    #[test]
    fn test_interceptor_before_initialization_passes_through() {
        let tm = RecordingTransactionManager::new();
        let proxy = ProxyFactory::new(account_service())
            .add_advisor(interceptor(&tm).into_advisor())
            .get_proxy();

        let error = proxy
            .call(&Method::new("AccountService", "transfer"), vec![json!(10)])
            .unwrap_err();
        assert_eq!(error.error_type().name(), "NoTransactionException");
        assert!(tm.events().is_empty());
    }
}
