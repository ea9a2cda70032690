//! Chimera AOP - 面向切面编程支持
//!
//! 提供类似 Spring 的代理式方法拦截：
//! - 切点（类过滤器 + 方法匹配器）与切点表达式
//! - 多种通知类型（Around、Before、AfterReturning、AfterThrowing、After）与引入
//! - 按通知器顺序解析拦截器链，洋葱模型执行
//! - 基于 trait object 的代理与自动代理
//! - 返回值形态适配（Option / Result）

pub mod advice;
pub mod advisor;
pub mod aspect;
pub mod bean_post_processor;
pub mod chain;
pub mod context;
pub mod error;
pub mod invocation;
pub mod joinpoint;
pub mod method;
pub mod pointcut;
pub mod proxy;
pub mod registry;
pub mod shape;
pub mod throwable;

/// 调用参数和返回值
pub use serde_json::Value;

// 重新导出核心类型
pub use advice::{
    Advice, AdviceType, AfterAdvice, AfterReturningAdvice, DelegatingIntroductionInterceptor,
    MethodBeforeAdvice, MethodInterceptor, ThrowsAdvice,
};
pub use advisor::{Advisor, IntroductionAdvisor, PointcutAdvisor};
pub use aspect::{Aspect, AspectAdvisor, ExceptionLoggingAspect, LoggingAspect, PerformanceAspect};
pub use bean_post_processor::AopBeanPostProcessor;
pub use chain::{AdvisorChainFactory, ChainElement, DefaultAdvisorChainFactory};
pub use context::InvocationContext;
pub use error::AopError;
pub use invocation::MethodInvocation;
pub use joinpoint::JoinPoint;
pub use method::Method;
pub use pointcut::{
    ClassFilter, ExpressionPointcut, MethodMatcher, NameMatchMethodPointcut, Pointcut,
    PointcutExpression, TrueClassFilter, TrueMethodMatcher, TruePointcut,
};
pub use proxy::{AdvisedSupport, FnTarget, Proxy, ProxyFactory, ProxyKind, Target};
pub use registry::{get_global_registry, AdvisorRegistration, AdvisorRegistry};
pub use shape::{OptionalShape, OutcomeShape, ResultShape, ResultShapes};
pub use throwable::{ErrorType, Throwable};

// 导出 inventory 供静态注册使用
pub use inventory;

/// 预导入模块
pub mod prelude {
    pub use crate::advice::*;
    pub use crate::advisor::{Advisor, IntroductionAdvisor, PointcutAdvisor};
    pub use crate::aspect::{Aspect, AspectAdvisor};
    pub use crate::context::InvocationContext;
    pub use crate::invocation::MethodInvocation;
    pub use crate::method::Method;
    pub use crate::pointcut::{ClassFilter, MethodMatcher, Pointcut, PointcutExpression};
    pub use crate::proxy::{FnTarget, Proxy, ProxyFactory, Target};
    pub use crate::throwable::{ErrorType, Throwable};
    pub use crate::Value;
}
