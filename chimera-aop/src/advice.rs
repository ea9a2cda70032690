//! 通知（Advice）定义
//!
//! 所有通知最终都被适配成 MethodInterceptor，在调用链中以洋葱模型执行。

use crate::invocation::MethodInvocation;
use crate::method::Method;
use crate::proxy::Target;
use crate::throwable::Throwable;
use crate::Value;
use std::sync::Arc;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdviceType {
    /// 前置通知
    Before,
    /// 后置通知（无论成功还是失败都执行）
    After,
    /// 返回后通知（成功返回时执行）
    AfterReturning,
    /// 异常通知（抛出异常时执行）
    AfterThrowing,
    /// 环绕通知（可以控制方法执行）
    Around,
}

/// 环绕通知
///
/// 调用 invocation.proceed() 执行链上剩余部分，也可以不调用直接返回
pub trait MethodInterceptor: Send + Sync {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, Throwable>;
}

/// 前置通知，返回错误时目标方法不会执行
pub trait MethodBeforeAdvice: Send + Sync {
    fn before(&self, method: &Method, args: &[Value], target_type: &str) -> Result<(), Throwable>;
}

/// 返回后通知
pub trait AfterReturningAdvice: Send + Sync {
    fn after_returning(
        &self,
        return_value: &Value,
        method: &Method,
        args: &[Value],
        target_type: &str,
    ) -> Result<(), Throwable>;
}

/// 异常通知，执行后原异常继续向上抛出
pub trait ThrowsAdvice: Send + Sync {
    fn after_throwing(&self, method: &Method, args: &[Value], target_type: &str, error: &Throwable);
}

/// 后置通知（finally 语义）
pub trait AfterAdvice: Send + Sync {
    fn after(&self, method: &Method, target_type: &str);
}

/// 通知
#[derive(Clone)]
pub enum Advice {
    Around(Arc<dyn MethodInterceptor>),
    Before(Arc<dyn MethodBeforeAdvice>),
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    AfterThrowing(Arc<dyn ThrowsAdvice>),
    After(Arc<dyn AfterAdvice>),
}

impl Advice {
    pub fn advice_type(&self) -> AdviceType {
        match self {
            Advice::Around(_) => AdviceType::Around,
            Advice::Before(_) => AdviceType::Before,
            Advice::AfterReturning(_) => AdviceType::AfterReturning,
            Advice::AfterThrowing(_) => AdviceType::AfterThrowing,
            Advice::After(_) => AdviceType::After,
        }
    }

    /// 把通知适配成拦截器
    pub fn to_interceptor(&self) -> Arc<dyn MethodInterceptor> {
        match self {
            Advice::Around(interceptor) => Arc::clone(interceptor),
            Advice::Before(advice) => Arc::new(BeforeAdviceInterceptor(Arc::clone(advice))),
            Advice::AfterReturning(advice) => {
                Arc::new(AfterReturningAdviceInterceptor(Arc::clone(advice)))
            }
            Advice::AfterThrowing(advice) => Arc::new(ThrowsAdviceInterceptor(Arc::clone(advice))),
            Advice::After(advice) => Arc::new(AfterAdviceInterceptor(Arc::clone(advice))),
        }
    }
}

impl std::fmt::Debug for Advice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Advice({:?})", self.advice_type())
    }
}

struct BeforeAdviceInterceptor(Arc<dyn MethodBeforeAdvice>);

impl MethodInterceptor for BeforeAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, Throwable> {
        self.0
            .before(invocation.method(), invocation.arguments(), invocation.target_type())?;
        invocation.proceed()
    }
}

struct AfterReturningAdviceInterceptor(Arc<dyn AfterReturningAdvice>);

impl MethodInterceptor for AfterReturningAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, Throwable> {
        let value = invocation.proceed()?;
        self.0.after_returning(
            &value,
            invocation.method(),
            invocation.arguments(),
            invocation.target_type(),
        )?;
        Ok(value)
    }
}

struct ThrowsAdviceInterceptor(Arc<dyn ThrowsAdvice>);

impl MethodInterceptor for ThrowsAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, Throwable> {
        invocation.proceed().map_err(|error| {
            self.0.after_throwing(
                invocation.method(),
                invocation.arguments(),
                invocation.target_type(),
                &error,
            );
            error
        })
    }
}

struct AfterAdviceInterceptor(Arc<dyn AfterAdvice>);

impl MethodInterceptor for AfterAdviceInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, Throwable> {
        let result = invocation.proceed();
        self.0.after(invocation.method(), invocation.target_type());
        result
    }
}

/// 引入拦截器：被引入接口上声明的方法交给委托对象处理
pub struct DelegatingIntroductionInterceptor {
    delegate: Arc<dyn Target>,
    interfaces: Vec<String>,
}

impl DelegatingIntroductionInterceptor {
    /// 默认引入委托对象实现的全部接口
    pub fn new(delegate: Arc<dyn Target>) -> Self {
        let interfaces = delegate.interfaces();
        Self {
            delegate,
            interfaces,
        }
    }

    /// 不再引入指定接口
    pub fn suppress_interface(mut self, interface: &str) -> Self {
        self.interfaces.retain(|i| i != interface);
        self
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn implements_interface(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }
}

impl MethodInterceptor for DelegatingIntroductionInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, Throwable> {
        if self.implements_interface(invocation.method().declaring_type()) {
            tracing::trace!(
                "Dispatching introduced method {} to delegate {}",
                invocation.method(),
                self.delegate.type_name()
            );
            let method = invocation.method().clone();
            let args = invocation.arguments().to_vec();
            return self.delegate.invoke(&method, args, invocation.context());
        }
        invocation.proceed()
    }
}
