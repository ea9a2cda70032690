//! 方法调用链
//!
//! MethodInvocation 按下标依次执行拦截器，链尾调用目标方法。

use crate::chain::ChainElement;
use crate::context::InvocationContext;
use crate::joinpoint::JoinPoint;
use crate::method::Method;
use crate::proxy::Target;
use crate::throwable::Throwable;
use crate::Value;
use std::fmt;

/// 一次被拦截的方法调用
pub struct MethodInvocation<'a> {
    target: &'a dyn Target,
    method: &'a Method,
    args: Vec<Value>,
    chain: &'a [ChainElement],
    index: usize,
    context: &'a InvocationContext,
}

impl<'a> MethodInvocation<'a> {
    pub fn new(
        target: &'a dyn Target,
        method: &'a Method,
        args: Vec<Value>,
        chain: &'a [ChainElement],
        context: &'a InvocationContext,
    ) -> Self {
        Self {
            target,
            method,
            args,
            chain,
            index: 0,
            context,
        }
    }

    /// 执行链上的下一个拦截器，链尾执行目标方法
    pub fn proceed(&mut self) -> Result<Value, Throwable> {
        let chain = self.chain;
        let Some(element) = chain.get(self.index) else {
            return self.invoke_joinpoint();
        };
        self.index += 1;

        match element {
            ChainElement::Interceptor(interceptor) => interceptor.invoke(self),
            ChainElement::Dynamic {
                pointcut,
                interceptor,
            } => {
                let matcher = pointcut.method_matcher();
                if matcher.matches_with_args(self.method, self.target_type(), &self.args) {
                    interceptor.invoke(self)
                } else {
                    tracing::trace!("Dynamic match failed for {}, skipping interceptor", self.method);
                    self.proceed()
                }
            }
        }
    }

    fn invoke_joinpoint(&mut self) -> Result<Value, Throwable> {
        tracing::trace!("Invoking target method {}", self.method);
        self.target
            .invoke(self.method, self.args.clone(), self.context)
    }

    pub fn method(&self) -> &'a Method {
        self.method
    }

    pub fn target(&self) -> &'a dyn Target {
        self.target
    }

    /// 目标对象的运行时类型
    pub fn target_type(&self) -> &'a str {
        self.target.type_name()
    }

    pub fn arguments(&self) -> &[Value] {
        &self.args
    }

    pub fn set_arguments(&mut self, args: Vec<Value>) {
        self.args = args;
    }

    pub fn context(&self) -> &'a InvocationContext {
        self.context
    }

    /// `OrderService.charge`，用作事务名称等标识
    pub fn joinpoint_identification(&self) -> String {
        chimera_core::utils::class_names::qualified_method_name(
            self.target_type(),
            self.method.name(),
        )
    }

    pub fn join_point(&self) -> JoinPoint {
        JoinPoint::new(self.target_type(), self.method.clone()).with_args(self.args.clone())
    }
}

impl fmt::Debug for MethodInvocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInvocation")
            .field("method", &self.method)
            .field("target_type", &self.target_type())
            .field("index", &self.index)
            .field("chain_len", &self.chain.len())
            .finish()
    }
}
