//! 拦截器链解析
//!
//! 对给定方法和目标类型，按通知器注册顺序计算需要执行的拦截器列表。

use crate::advice::MethodInterceptor;
use crate::advisor::Advisor;
use crate::method::Method;
use crate::pointcut::Pointcut;
use std::fmt;
use std::sync::Arc;

/// 链上的一个元素
#[derive(Clone)]
pub enum ChainElement {
    /// 静态匹配已确定的拦截器
    Interceptor(Arc<dyn MethodInterceptor>),
    /// 每次调用都要用实参重新匹配的拦截器
    Dynamic {
        pointcut: Arc<dyn Pointcut>,
        interceptor: Arc<dyn MethodInterceptor>,
    },
}

impl fmt::Debug for ChainElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainElement::Interceptor(_) => write!(f, "Interceptor"),
            ChainElement::Dynamic { .. } => write!(f, "Dynamic"),
        }
    }
}

/// 拦截器链工厂
pub trait AdvisorChainFactory: Send + Sync {
    fn interceptors_and_dynamic_advice(
        &self,
        advisors: &[Advisor],
        pre_filtered: bool,
        method: &Method,
        target_type: &str,
    ) -> Vec<ChainElement>;
}

/// 默认的拦截器链工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAdvisorChainFactory;

impl AdvisorChainFactory for DefaultAdvisorChainFactory {
    fn interceptors_and_dynamic_advice(
        &self,
        advisors: &[Advisor],
        pre_filtered: bool,
        method: &Method,
        target_type: &str,
    ) -> Vec<ChainElement> {
        let mut chain = Vec::with_capacity(advisors.len());
        // 只在本次解析内缓存
        let mut has_introductions: Option<bool> = None;

        for advisor in advisors {
            match advisor {
                Advisor::Pointcut(pa) => {
                    let pointcut = pa.pointcut();
                    if !pre_filtered && !pointcut.class_filter().matches(target_type) {
                        continue;
                    }
                    let matcher = pointcut.method_matcher();
                    let matched = if matcher.is_introduction_aware() {
                        let has = *has_introductions
                            .get_or_insert_with(|| has_matching_introductions(advisors, target_type));
                        matcher.matches_with_introductions(method, target_type, has)
                    } else {
                        matcher.matches(method, target_type)
                    };
                    if !matched {
                        continue;
                    }

                    let interceptor = pa.advice().to_interceptor();
                    if matcher.is_runtime() {
                        chain.push(ChainElement::Dynamic {
                            pointcut: Arc::clone(pointcut),
                            interceptor,
                        });
                    } else {
                        chain.push(ChainElement::Interceptor(interceptor));
                    }
                }
                Advisor::Introduction(ia) => {
                    if pre_filtered || ia.class_filter().matches(target_type) {
                        chain.push(ChainElement::Interceptor(Arc::clone(ia.interceptor())));
                    }
                }
                Advisor::Global { .. } => {
                    chain.push(ChainElement::Interceptor(advisor.interceptor()));
                }
            }
        }

        tracing::trace!(
            "Resolved {} interceptor(s) for {} on {}",
            chain.len(),
            method,
            target_type
        );
        chain
    }
}

/// 是否有引入通知器的类过滤器匹配目标类型
fn has_matching_introductions(advisors: &[Advisor], target_type: &str) -> bool {
    advisors.iter().any(|advisor| match advisor {
        Advisor::Introduction(ia) => ia.class_filter().matches(target_type),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::{Advice, DelegatingIntroductionInterceptor};
    use crate::advisor::{IntroductionAdvisor, PointcutAdvisor};
    use crate::invocation::MethodInvocation;
    use crate::pointcut::{
        ClassFilter, FnClassFilter, MethodMatcher, NameMatchMethodPointcut,
    };
    use crate::proxy::FnTarget;
    use crate::throwable::Throwable;
    use crate::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Noop;

    impl MethodInterceptor for Noop {
        fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, Throwable> {
            invocation.proceed()
        }
    }

    fn noop() -> Advice {
        Advice::Around(Arc::new(Noop))
    }

    /// 记录收到的 has_introductions 参数
    struct IntroAwareMatcher {
        calls: AtomicUsize,
        saw_introductions: AtomicUsize,
    }

    impl MethodMatcher for IntroAwareMatcher {
        fn matches(&self, _method: &Method, _target_type: &str) -> bool {
            false
        }

        fn is_introduction_aware(&self) -> bool {
            true
        }

        fn matches_with_introductions(&self, _m: &Method, _t: &str, has_introductions: bool) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if has_introductions {
                self.saw_introductions.fetch_add(1, Ordering::SeqCst);
            }
            true
        }
    }

    impl Pointcut for IntroAwareMatcher {
        fn class_filter(&self) -> &dyn ClassFilter {
            &crate::pointcut::TrueClassFilter
        }

        fn method_matcher(&self) -> &dyn MethodMatcher {
            self
        }
    }

    struct RuntimeMatcher;

    impl MethodMatcher for RuntimeMatcher {
        fn matches(&self, _method: &Method, _target_type: &str) -> bool {
            true
        }

        fn is_runtime(&self) -> bool {
            true
        }
    }

    impl Pointcut for RuntimeMatcher {
        fn class_filter(&self) -> &dyn ClassFilter {
            &crate::pointcut::TrueClassFilter
        }

        fn method_matcher(&self) -> &dyn MethodMatcher {
            self
        }
    }

    fn method(name: &str) -> Method {
        Method::new("OrderService", name)
    }

    #[test]
    fn test_preserves_registration_order_and_filters() {
        let advisors: Vec<Advisor> = vec![
            Advisor::global("first", noop()),
            PointcutAdvisor::new(
                "finders",
                Arc::new(NameMatchMethodPointcut::new().add_method_name("find*")),
                noop(),
            )
            .into(),
            Advisor::global("last", noop()),
        ];

        let factory = DefaultAdvisorChainFactory;
        assert_eq!(
            factory
                .interceptors_and_dynamic_advice(&advisors, false, &method("findAll"), "OrderService")
                .len(),
            3
        );
        assert_eq!(
            factory
                .interceptors_and_dynamic_advice(&advisors, false, &method("save"), "OrderService")
                .len(),
            2
        );
    }

    #[test]
    fn test_class_filter_and_pre_filtered() {
        struct OnlyOrders {
            filter: FnClassFilter<fn(&str) -> bool>,
        }
        impl Pointcut for OnlyOrders {
            fn class_filter(&self) -> &dyn ClassFilter {
                &self.filter
            }
            fn method_matcher(&self) -> &dyn MethodMatcher {
                &crate::pointcut::TrueMethodMatcher
            }
        }
        fn is_orders(t: &str) -> bool {
            t == "OrderService"
        }

        let only = OnlyOrders {
            filter: FnClassFilter(is_orders as fn(&str) -> bool),
        };
        let advisors = vec![Advisor::Pointcut(PointcutAdvisor::new("only", Arc::new(only), noop()))];
        let factory = DefaultAdvisorChainFactory;
        assert!(factory
            .interceptors_and_dynamic_advice(&advisors, false, &method("x"), "UserService")
            .is_empty());
        assert_eq!(
            factory
                .interceptors_and_dynamic_advice(&advisors, true, &method("x"), "UserService")
                .len(),
            1
        );
    }

    #[test]
    fn test_introduction_flag_computed_for_resolution() {
        let matcher = Arc::new(IntroAwareMatcher {
            calls: AtomicUsize::new(0),
            saw_introductions: AtomicUsize::new(0),
        });
        let delegate = Arc::new(FnTarget::new("AuditableImpl").implements("Auditable"));
        let intro = IntroductionAdvisor::new(
            "auditable",
            Arc::new(DelegatingIntroductionInterceptor::new(delegate)),
        )
        .with_class_filter(Arc::new(FnClassFilter(|t: &str| t == "OrderService")));

        let advisors: Vec<Advisor> = vec![
            PointcutAdvisor::new("a", matcher.clone(), noop()).into(),
            PointcutAdvisor::new("b", matcher.clone(), noop()).into(),
            Advisor::Introduction(intro),
        ];

        let factory = DefaultAdvisorChainFactory;
        let chain = factory.interceptors_and_dynamic_advice(&advisors, false, &method("x"), "OrderService");
        assert_eq!(chain.len(), 3);
        assert_eq!(matcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(matcher.saw_introductions.load(Ordering::SeqCst), 2);

        let chain = factory.interceptors_and_dynamic_advice(&advisors, false, &method("x"), "UserService");
        assert_eq!(chain.len(), 2);
        assert_eq!(matcher.saw_introductions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_runtime_matcher_is_wrapped() {
        let advisors = vec![Advisor::Pointcut(PointcutAdvisor::new(
            "dynamic",
            Arc::new(RuntimeMatcher),
            noop(),
        ))];
        let chain = DefaultAdvisorChainFactory.interceptors_and_dynamic_advice(
            &advisors,
            false,
            &method("x"),
            "OrderService",
        );
        assert!(matches!(chain.as_slice(), [ChainElement::Dynamic { .. }]));
    }
}
