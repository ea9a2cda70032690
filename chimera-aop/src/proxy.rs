//! 代理
//!
//! Rust 没有运行时动态代理，这里用 trait object 表达"被拦截的对象"：
//! 目标实现 [`Target`]，[`Proxy`] 也实现 [`Target`]，每次调用都经过拦截器链。

use crate::advice::Advice;
use crate::advisor::Advisor;
use crate::chain::{AdvisorChainFactory, ChainElement, DefaultAdvisorChainFactory};
use crate::context::InvocationContext;
use crate::error::AopError;
use crate::invocation::MethodInvocation;
use crate::method::Method;
use crate::throwable::Throwable;
use crate::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 可被代理的目标对象
pub trait Target: Send + Sync {
    /// 运行时类型名称
    fn type_name(&self) -> &str;

    /// 实现的接口
    fn interfaces(&self) -> Vec<String> {
        Vec::new()
    }

    /// 声明的方法
    fn methods(&self) -> Vec<Method>;

    /// 调用方法
    fn invoke(
        &self,
        method: &Method,
        args: Vec<Value>,
        context: &InvocationContext,
    ) -> Result<Value, Throwable>;

    /// 目标类型上与 method 签名相同的具体方法（桥接方法解析）
    fn most_specific_method(&self, method: &Method) -> Method {
        self.methods()
            .into_iter()
            .find(|m| m.declaring_type() == self.type_name() && m.same_signature(method) && !m.is_bridge())
            .unwrap_or_else(|| method.clone())
    }
}

/// 方法实现
pub type MethodHandler =
    Arc<dyn Fn(Vec<Value>, &InvocationContext) -> Result<Value, Throwable> + Send + Sync>;

/// 用闭包声明方法实现的目标对象
#[derive(Clone)]
pub struct FnTarget {
    type_name: String,
    interfaces: Vec<String>,
    methods: Vec<(Method, MethodHandler)>,
}

impl FnTarget {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            interfaces: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn method<F>(mut self, method: Method, handler: F) -> Self
    where
        F: Fn(Vec<Value>, &InvocationContext) -> Result<Value, Throwable> + Send + Sync + 'static,
    {
        self.methods.push((method, Arc::new(handler)));
        self
    }

    fn handler_for(&self, method: &Method) -> Option<&MethodHandler> {
        self.methods
            .iter()
            .find(|(m, _)| m == method)
            .or_else(|| self.methods.iter().find(|(m, _)| m.same_signature(method)))
            .map(|(_, handler)| handler)
    }
}

impl Target for FnTarget {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn interfaces(&self) -> Vec<String> {
        self.interfaces.clone()
    }

    fn methods(&self) -> Vec<Method> {
        self.methods.iter().map(|(m, _)| m.clone()).collect()
    }

    fn invoke(
        &self,
        method: &Method,
        args: Vec<Value>,
        context: &InvocationContext,
    ) -> Result<Value, Throwable> {
        let handler = self.handler_for(method).ok_or_else(|| AopError::NoHandler {
            method: method.signature(),
            target: self.type_name.clone(),
        })?;
        handler(args, context)
    }
}

impl fmt::Debug for FnTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTarget")
            .field("type_name", &self.type_name)
            .field("interfaces", &self.interfaces)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// 代理配置：目标、通知器和拦截器链缓存
pub struct AdvisedSupport {
    target: Arc<dyn Target>,
    advisors: RwLock<Vec<Advisor>>,
    interfaces: Vec<String>,
    pre_filtered: bool,
    chain_factory: Arc<dyn AdvisorChainFactory>,
    method_cache: RwLock<HashMap<Method, Arc<Vec<ChainElement>>>>,
}

impl AdvisedSupport {
    pub fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }

    pub fn advisors(&self) -> Vec<Advisor> {
        self.advisors.read().clone()
    }

    /// 代理的接口（不含引入的接口）
    pub fn proxied_interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// 引入通知器新增的接口
    pub fn introduced_interfaces(&self) -> Vec<String> {
        self.advisors
            .read()
            .iter()
            .filter_map(|advisor| match advisor {
                Advisor::Introduction(ia) => Some(ia.interfaces().to_vec()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn is_pre_filtered(&self) -> bool {
        self.pre_filtered
    }

    /// 追加通知器，拦截器链缓存随之失效
    pub fn add_advisor(&self, advisor: Advisor) {
        tracing::debug!("Adding {:?} to proxy for {}", advisor, self.target.type_name());
        self.advisors.write().push(advisor);
        self.method_cache.write().clear();
    }

    /// 按名称移除通知器
    pub fn remove_advisor(&self, name: &str) -> bool {
        let removed = {
            let mut advisors = self.advisors.write();
            let before = advisors.len();
            advisors.retain(|a| a.name() != name);
            advisors.len() != before
        };
        if removed {
            self.method_cache.write().clear();
        }
        removed
    }

    /// 获取方法的拦截器链
    ///
    /// 缓存未命中时在锁外计算，并发的重复计算结果相同，后写入者覆盖先写入者
    pub fn interceptors_for(&self, method: &Method) -> Arc<Vec<ChainElement>> {
        if let Some(cached) = self.method_cache.read().get(method) {
            return Arc::clone(cached);
        }

        let advisors = self.advisors.read().clone();
        let chain = Arc::new(self.chain_factory.interceptors_and_dynamic_advice(
            &advisors,
            self.pre_filtered,
            method,
            self.target.type_name(),
        ));
        self.method_cache
            .write()
            .insert(method.clone(), Arc::clone(&chain));
        chain
    }
}

/// 代理类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// 只暴露代理接口上的方法
    Interface,
    /// 暴露目标的全部方法，final 方法不能被拦截
    Subclass,
}

/// 代理工厂
pub struct ProxyFactory {
    target: Arc<dyn Target>,
    advisors: Vec<Advisor>,
    interfaces: Vec<String>,
    proxy_target_class: bool,
    optimize: bool,
    pre_filtered: bool,
    chain_factory: Arc<dyn AdvisorChainFactory>,
}

impl ProxyFactory {
    /// 默认代理目标实现的全部接口
    pub fn new(target: Arc<dyn Target>) -> Self {
        let interfaces = target.interfaces();
        Self {
            target,
            advisors: Vec::new(),
            interfaces,
            proxy_target_class: false,
            optimize: false,
            pre_filtered: false,
            chain_factory: Arc::new(DefaultAdvisorChainFactory),
        }
    }

    pub fn add_advisor(mut self, advisor: impl Into<Advisor>) -> Self {
        self.advisors.push(advisor.into());
        self
    }

    pub fn add_advisors(mut self, advisors: impl IntoIterator<Item = Advisor>) -> Self {
        self.advisors.extend(advisors);
        self
    }

    /// 添加作用于所有方法的通知
    pub fn add_advice(mut self, advice: Advice) -> Self {
        let name = format!("advice#{}", self.advisors.len());
        self.advisors.push(Advisor::global(name, advice));
        self
    }

    pub fn add_interface(mut self, interface: impl Into<String>) -> Self {
        let interface = interface.into();
        if !self.interfaces.contains(&interface) {
            self.interfaces.push(interface);
        }
        self
    }

    pub fn proxy_target_class(mut self, value: bool) -> Self {
        self.proxy_target_class = value;
        self
    }

    pub fn optimize(mut self, value: bool) -> Self {
        self.optimize = value;
        self
    }

    /// 通知器已经按目标类型过滤过，解析时跳过类过滤器
    pub fn pre_filtered(mut self, value: bool) -> Self {
        self.pre_filtered = value;
        self
    }

    pub fn chain_factory(mut self, factory: Arc<dyn AdvisorChainFactory>) -> Self {
        self.chain_factory = factory;
        self
    }

    fn proxy_kind(&self) -> ProxyKind {
        if self.optimize || self.proxy_target_class || self.interfaces.is_empty() {
            ProxyKind::Subclass
        } else {
            ProxyKind::Interface
        }
    }

    pub fn get_proxy(self) -> Proxy {
        let kind = self.proxy_kind();
        tracing::debug!(
            "Creating {:?} proxy for {} with {} advisor(s)",
            kind,
            self.target.type_name(),
            self.advisors.len()
        );
        Proxy {
            kind,
            advised: Arc::new(AdvisedSupport {
                target: self.target,
                advisors: RwLock::new(self.advisors),
                interfaces: self.interfaces,
                pre_filtered: self.pre_filtered,
                chain_factory: self.chain_factory,
                method_cache: RwLock::new(HashMap::new()),
            }),
        }
    }
}

/// 代理对象
#[derive(Clone)]
pub struct Proxy {
    kind: ProxyKind,
    advised: Arc<AdvisedSupport>,
}

impl Proxy {
    pub fn kind(&self) -> ProxyKind {
        self.kind
    }

    pub fn advised(&self) -> &Arc<AdvisedSupport> {
        &self.advised
    }

    /// 以新的调用上下文发起一次外部调用
    pub fn call(&self, method: &Method, args: Vec<Value>) -> Result<Value, Throwable> {
        let context = InvocationContext::new();
        self.invoke(method, args, &context)
    }

    fn accepts(&self, method: &Method) -> bool {
        let declaring = method.declaring_type();
        self.advised.interfaces.iter().any(|i| i == declaring)
            || self.advised.introduced_interfaces().iter().any(|i| i == declaring)
    }
}

impl Target for Proxy {
    fn type_name(&self) -> &str {
        self.advised.target.type_name()
    }

    fn interfaces(&self) -> Vec<String> {
        let mut interfaces = self.advised.interfaces.clone();
        for introduced in self.advised.introduced_interfaces() {
            if !interfaces.contains(&introduced) {
                interfaces.push(introduced);
            }
        }
        interfaces
    }

    fn methods(&self) -> Vec<Method> {
        self.advised.target.methods()
    }

    fn invoke(
        &self,
        method: &Method,
        args: Vec<Value>,
        context: &InvocationContext,
    ) -> Result<Value, Throwable> {
        let target = self.advised.target.as_ref();
        match self.kind {
            ProxyKind::Interface if !self.accepts(method) => {
                return Err(AopError::NotOnProxiedInterface {
                    method: method.signature(),
                    target: target.type_name().to_string(),
                }
                .into());
            }
            ProxyKind::Subclass if method.is_final() => {
                tracing::trace!("Final method {} cannot be advised, invoking target", method);
                return target.invoke(method, args, context);
            }
            _ => {}
        }

        let chain = self.advised.interceptors_for(method);
        if chain.is_empty() {
            return target.invoke(method, args, context);
        }
        MethodInvocation::new(target, method, args, &chain, context).proceed()
    }

    fn most_specific_method(&self, method: &Method) -> Method {
        self.advised.target.most_specific_method(method)
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("kind", &self.kind)
            .field("target", &self.advised.target.type_name())
            .field("advisors", &self.advised.advisors.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::{
        AfterAdvice, AfterReturningAdvice, DelegatingIntroductionInterceptor, MethodBeforeAdvice,
        MethodInterceptor, ThrowsAdvice,
    };
    use crate::advisor::{IntroductionAdvisor, PointcutAdvisor};
    use crate::pointcut::{MethodMatcher, NameMatchMethodPointcut, Pointcut, TrueClassFilter, ClassFilter};
    use parking_lot::Mutex;
    use serde_json::json;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recording {
        name: &'static str,
        log: Log,
    }

    impl MethodInterceptor for Recording {
        fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, Throwable> {
            self.log.lock().push(format!("{}:before", self.name));
            let result = invocation.proceed();
            self.log.lock().push(format!("{}:after", self.name));
            result
        }
    }

    fn order_service(log: Log) -> Arc<dyn Target> {
        let charge_log = log.clone();
        Arc::new(
            FnTarget::new("OrderServiceImpl")
                .implements("OrderService")
                .method(
                    Method::new("OrderService", "charge").with_params(["u64"]),
                    move |args, _| {
                        charge_log.lock().push("target".into());
                        Ok(json!(args[0].as_u64().unwrap_or(0) * 2))
                    },
                )
                .method(Method::new("OrderService", "fail"), |_, _| {
                    Err(Throwable::illegal_state("boom"))
                })
                .method(
                    Method::new("OrderServiceImpl", "audit").final_method(),
                    |_, _| Ok(json!("audited")),
                ),
        )
    }

    fn charge() -> Method {
        Method::new("OrderService", "charge").with_params(["u64"])
    }

    #[test]
    fn test_onion_order() {
        let log: Log = Arc::default();
        let proxy = ProxyFactory::new(order_service(log.clone()))
            .add_advice(Advice::Around(Arc::new(Recording { name: "outer", log: log.clone() })))
            .add_advice(Advice::Around(Arc::new(Recording { name: "inner", log: log.clone() })))
            .get_proxy();

        assert_eq!(proxy.kind(), ProxyKind::Interface);
        assert_eq!(proxy.call(&charge(), vec![json!(21)]).unwrap(), json!(42));
        assert_eq!(
            *log.lock(),
            vec!["outer:before", "inner:before", "target", "inner:after", "outer:after"]
        );
    }

    #[test]
    fn test_short_circuit() {
        struct Cached;
        impl MethodInterceptor for Cached {
            fn invoke(&self, _invocation: &mut MethodInvocation<'_>) -> Result<Value, Throwable> {
                Ok(json!("cached"))
            }
        }

        let log: Log = Arc::default();
        let proxy = ProxyFactory::new(order_service(log.clone()))
            .add_advice(Advice::Around(Arc::new(Cached)))
            .get_proxy();
        assert_eq!(proxy.call(&charge(), vec![json!(1)]).unwrap(), json!("cached"));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_interface_proxy_rejects_undeclared_methods() {
        let proxy = ProxyFactory::new(order_service(Arc::default())).get_proxy();
        let err = proxy
            .call(&Method::new("OrderServiceImpl", "audit").final_method(), vec![])
            .unwrap_err();
        assert!(err.downcast_ref::<AopError>().is_some());
    }

    #[test]
    fn test_subclass_proxy_skips_final_methods() {
        let log: Log = Arc::default();
        let proxy = ProxyFactory::new(order_service(log.clone()))
            .proxy_target_class(true)
            .add_advice(Advice::Around(Arc::new(Recording { name: "r", log: log.clone() })))
            .get_proxy();
        assert_eq!(proxy.kind(), ProxyKind::Subclass);

        let audit = Method::new("OrderServiceImpl", "audit").final_method();
        assert_eq!(proxy.call(&audit, vec![]).unwrap(), json!("audited"));
        assert!(log.lock().is_empty());

        proxy.call(&charge(), vec![json!(1)]).unwrap();
        assert_eq!(log.lock().len(), 3);
    }

    #[test]
    fn test_target_without_interfaces_gets_subclass_proxy() {
        let target = Arc::new(FnTarget::new("Plain").method(Method::new("Plain", "run"), |_, _| Ok(Value::Null)));
        let proxy = ProxyFactory::new(target).get_proxy();
        assert_eq!(proxy.kind(), ProxyKind::Subclass);
    }

    #[test]
    fn test_advice_adapters() {
        struct Events(Log);
        impl MethodBeforeAdvice for Events {
            fn before(&self, m: &Method, _: &[Value], _: &str) -> Result<(), Throwable> {
                self.0.lock().push(format!("before {}", m.name()));
                Ok(())
            }
        }
        impl AfterReturningAdvice for Events {
            fn after_returning(&self, v: &Value, _: &Method, _: &[Value], _: &str) -> Result<(), Throwable> {
                self.0.lock().push(format!("returned {}", v));
                Ok(())
            }
        }
        impl ThrowsAdvice for Events {
            fn after_throwing(&self, _: &Method, _: &[Value], _: &str, e: &Throwable) {
                self.0.lock().push(format!("threw {}", e.message()));
            }
        }
        impl AfterAdvice for Events {
            fn after(&self, m: &Method, _: &str) {
                self.0.lock().push(format!("after {}", m.name()));
            }
        }

        let log: Log = Arc::default();
        let events = Arc::new(Events(log.clone()));
        let proxy = ProxyFactory::new(order_service(Arc::default()))
            .add_advice(Advice::After(events.clone()))
            .add_advice(Advice::Before(events.clone()))
            .add_advice(Advice::AfterReturning(events.clone()))
            .add_advice(Advice::AfterThrowing(events))
            .get_proxy();

        proxy.call(&charge(), vec![json!(2)]).unwrap();
        let err = proxy.call(&Method::new("OrderService", "fail"), vec![]).unwrap_err();
        assert_eq!(err.message(), "boom");

        assert_eq!(
            *log.lock(),
            vec![
                "before charge",
                "returned 4",
                "after charge",
                "before fail",
                "threw boom",
                "after fail",
            ]
        );
    }

    #[test]
    fn test_before_advice_can_abort() {
        struct Deny;
        impl MethodBeforeAdvice for Deny {
            fn before(&self, _: &Method, _: &[Value], _: &str) -> Result<(), Throwable> {
                Err(Throwable::illegal_state("denied"))
            }
        }

        let log: Log = Arc::default();
        let proxy = ProxyFactory::new(order_service(log.clone()))
            .add_advice(Advice::Before(Arc::new(Deny)))
            .get_proxy();
        assert!(proxy.call(&charge(), vec![json!(1)]).is_err());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_introduction() {
        let auditable = Arc::new(
            FnTarget::new("AuditableMixin")
                .implements("Auditable")
                .method(Method::new("Auditable", "last_modified"), |_, _| Ok(json!("yesterday"))),
        );
        let proxy = ProxyFactory::new(order_service(Arc::default()))
            .add_advisor(IntroductionAdvisor::new(
                "auditable",
                Arc::new(DelegatingIntroductionInterceptor::new(auditable)),
            ))
            .get_proxy();

        assert!(proxy.interfaces().contains(&"Auditable".to_string()));
        assert_eq!(
            proxy.call(&Method::new("Auditable", "last_modified"), vec![]).unwrap(),
            json!("yesterday")
        );
        assert_eq!(proxy.call(&charge(), vec![json!(5)]).unwrap(), json!(10));
    }

    #[test]
    fn test_dynamic_matcher_checks_arguments() {
        struct LargeAmounts;
        impl MethodMatcher for LargeAmounts {
            fn matches(&self, _: &Method, _: &str) -> bool {
                true
            }
            fn is_runtime(&self) -> bool {
                true
            }
            fn matches_with_args(&self, _: &Method, _: &str, args: &[Value]) -> bool {
                args.first().and_then(Value::as_u64).unwrap_or(0) > 100
            }
        }
        impl Pointcut for LargeAmounts {
            fn class_filter(&self) -> &dyn ClassFilter {
                &TrueClassFilter
            }
            fn method_matcher(&self) -> &dyn MethodMatcher {
                self
            }
        }

        let log: Log = Arc::default();
        let proxy = ProxyFactory::new(order_service(Arc::default()))
            .add_advisor(PointcutAdvisor::new(
                "large",
                Arc::new(LargeAmounts),
                Advice::Around(Arc::new(Recording { name: "audit", log: log.clone() })),
            ))
            .get_proxy();

        proxy.call(&charge(), vec![json!(5)]).unwrap();
        assert!(log.lock().is_empty());
        proxy.call(&charge(), vec![json!(500)]).unwrap();
        assert_eq!(*log.lock(), vec!["audit:before", "audit:after"]);
    }

    #[test]
    fn test_chain_cache_invalidated_on_change() {
        let log: Log = Arc::default();
        let proxy = ProxyFactory::new(order_service(Arc::default())).get_proxy();
        assert!(proxy.advised().interceptors_for(&charge()).is_empty());

        proxy.advised().add_advisor(
            PointcutAdvisor::new(
                "charges",
                Arc::new(NameMatchMethodPointcut::new().add_method_name("charge")),
                Advice::Around(Arc::new(Recording { name: "late", log: log.clone() })),
            )
            .into(),
        );
        assert_eq!(proxy.advised().interceptors_for(&charge()).len(), 1);
        proxy.call(&charge(), vec![json!(1)]).unwrap();
        assert_eq!(log.lock().len(), 2);

        assert!(proxy.advised().remove_advisor("charges"));
        assert!(proxy.advised().interceptors_for(&charge()).is_empty());
    }
}
