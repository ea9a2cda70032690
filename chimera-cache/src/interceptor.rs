//! 缓存拦截器与通知器

use std::sync::Arc;

use chimera_aop::{
    Advice, Advisor, ClassFilter, Method, MethodInterceptor, MethodInvocation, MethodMatcher,
    Pointcut, PointcutAdvisor, Throwable, Value,
};
use chimera_core::bean_factory::BeanFactory;
use chimera_core::constants::CACHE_ADVISOR_ORDER;
use chimera_core::error::ApplicationResult;
use chimera_core::lifecycle::{BeanFactoryAware, InitializingBean, SmartInitializingSingleton};

use crate::source::CacheOperationSource;
use crate::support::CacheAspectSupport;

/// 缓存拦截器
pub struct CacheInterceptor {
    support: CacheAspectSupport,
}

impl CacheInterceptor {
    pub fn new(support: CacheAspectSupport) -> Self {
        Self { support }
    }

    pub fn support(&self) -> &CacheAspectSupport {
        &self.support
    }

    /// 以缓存操作来源为切点的通知器
    pub fn into_advisor(self: Arc<Self>) -> Advisor {
        let pointcut: Arc<dyn Pointcut> = match self.support.operation_source() {
            Some(source) => Arc::new(CacheOperationSourcePointcut::new(Arc::clone(source))),
            None => Arc::new(chimera_aop::TruePointcut),
        };
        PointcutAdvisor::new("cacheAdvisor", pointcut, Advice::Around(self))
            .with_order(CACHE_ADVISOR_ORDER)
            .into()
    }
}

impl MethodInterceptor for CacheInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, Throwable> {
        let method = invocation.method();
        let target_type = invocation.target_type();
        let args = invocation.arguments().to_vec();
        self.support
            .execute(method, target_type, &args, &mut || invocation.proceed())
    }
}

impl BeanFactoryAware for CacheInterceptor {
    fn set_bean_factory(&self, bean_factory: Arc<dyn BeanFactory>) {
        self.support.set_bean_factory(bean_factory);
    }
}

impl InitializingBean for CacheInterceptor {
    fn after_properties_set(&self) -> ApplicationResult<()> {
        self.support.after_properties_set()
    }
}

impl SmartInitializingSingleton for CacheInterceptor {
    fn after_singletons_instantiated(&self) -> ApplicationResult<()> {
        self.support.after_singletons_instantiated()
    }
}

struct CandidateTypeFilter {
    source: Arc<dyn CacheOperationSource>,
}

impl ClassFilter for CandidateTypeFilter {
    fn matches(&self, target_type: &str) -> bool {
        self.source.is_candidate_type(target_type)
    }
}

/// 方法声明了缓存操作时匹配
pub struct CacheOperationSourcePointcut {
    source: Arc<dyn CacheOperationSource>,
    class_filter: CandidateTypeFilter,
}

impl CacheOperationSourcePointcut {
    pub fn new(source: Arc<dyn CacheOperationSource>) -> Self {
        Self {
            class_filter: CandidateTypeFilter {
                source: Arc::clone(&source),
            },
            source,
        }
    }
}

impl MethodMatcher for CacheOperationSourcePointcut {
    fn matches(&self, method: &Method, target_type: &str) -> bool {
        self.source
            .get_cache_operations(method, target_type)
            .is_some_and(|operations| !operations.is_empty())
    }
}

impl Pointcut for CacheOperationSourcePointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        &self.class_filter
    }

    fn method_matcher(&self) -> &dyn MethodMatcher {
        self
    }
}
