//! 切面（Aspect）定义
//!
//! 切面是横切关注点的模块化：一个切点表达式加上一组钩子。
//! 通过 [`AspectAdvisor`] 转换成普通的通知器参与拦截链。

use crate::advice::{Advice, MethodInterceptor};
use crate::advisor::{Advisor, PointcutAdvisor};
use crate::invocation::MethodInvocation;
use crate::pointcut::{ExpressionPointcut, PointcutExpression};
use crate::throwable::Throwable;
use crate::{JoinPoint, Value};
use chimera_core::order::LOWEST_PRECEDENCE;
use std::sync::Arc;

/// 切面 Trait
///
/// 实现此 trait 以定义切面逻辑
pub trait Aspect: Send + Sync {
    /// 切面名称
    fn name(&self) -> &str;

    /// 切点表达式
    fn pointcut(&self) -> &PointcutExpression;

    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }

    /// 前置通知（可选实现）
    fn before(&self, _join_point: &JoinPoint) {}

    /// 后置通知（可选实现）
    fn after(&self, _join_point: &JoinPoint) {}

    /// 返回后通知（可选实现）
    fn after_returning(&self, _join_point: &JoinPoint, _result: &Value) {}

    /// 异常通知（可选实现）
    fn after_throwing(&self, _join_point: &JoinPoint, _error: &Throwable) {}
}

/// 把切面钩子编排成环绕拦截器
struct AspectInterceptor {
    aspect: Arc<dyn Aspect>,
}

impl MethodInterceptor for AspectInterceptor {
    fn invoke(&self, invocation: &mut MethodInvocation<'_>) -> Result<Value, Throwable> {
        let join_point = invocation.join_point();
        self.aspect.before(&join_point);

        let result = invocation.proceed();
        match &result {
            Ok(value) => self.aspect.after_returning(&join_point, value),
            Err(error) => self.aspect.after_throwing(&join_point, error),
        }

        self.aspect.after(&join_point);
        result
    }
}

/// 切面到通知器的转换
pub struct AspectAdvisor;

impl AspectAdvisor {
    pub fn from_aspect(aspect: Arc<dyn Aspect>) -> Advisor {
        let pointcut = Arc::new(ExpressionPointcut::new(aspect.pointcut().clone()));
        let name = aspect.name().to_string();
        let order = aspect.order();
        PointcutAdvisor::new(name, pointcut, Advice::Around(Arc::new(AspectInterceptor { aspect })))
            .with_order(order)
            .into()
    }
}

// ============================================================================
// 预定义的常用切面
// ============================================================================

/// 日志切面 - 记录方法调用
pub struct LoggingAspect {
    log_args: bool,
    log_result: bool,
    pointcut: PointcutExpression,
}

impl LoggingAspect {
    pub fn new(pointcut: PointcutExpression) -> Self {
        Self {
            log_args: false,
            log_result: false,
            pointcut,
        }
    }

    pub fn with_args(mut self) -> Self {
        self.log_args = true;
        self
    }

    pub fn with_result(mut self) -> Self {
        self.log_result = true;
        self
    }
}

impl Aspect for LoggingAspect {
    fn name(&self) -> &str {
        "LoggingAspect"
    }

    fn pointcut(&self) -> &PointcutExpression {
        &self.pointcut
    }

    fn before(&self, join_point: &JoinPoint) {
        if self.log_args {
            tracing::info!("→ Entering: {} with {:?}", join_point.signature(), join_point.args);
        } else {
            tracing::info!("→ Entering: {}", join_point.signature());
        }
    }

    fn after_returning(&self, join_point: &JoinPoint, result: &Value) {
        if self.log_result {
            tracing::info!("  {} returned {}", join_point.signature(), result);
        }
    }

    fn after(&self, join_point: &JoinPoint) {
        let elapsed = join_point.timestamp.elapsed();
        tracing::info!("← Exiting: {} (took {:?})", join_point.signature(), elapsed);
    }
}

/// 性能监控切面
pub struct PerformanceAspect {
    threshold_ms: u128,
    pointcut: PointcutExpression,
}

impl PerformanceAspect {
    pub fn new(threshold_ms: u128, pointcut: PointcutExpression) -> Self {
        Self {
            threshold_ms,
            pointcut,
        }
    }
}

impl Aspect for PerformanceAspect {
    fn name(&self) -> &str {
        "PerformanceAspect"
    }

    fn pointcut(&self) -> &PointcutExpression {
        &self.pointcut
    }

    fn after(&self, join_point: &JoinPoint) {
        let elapsed = join_point.timestamp.elapsed().as_millis();
        if elapsed > self.threshold_ms {
            tracing::warn!(
                "Slow method detected: {} took {}ms (threshold: {}ms)",
                join_point.signature(),
                elapsed,
                self.threshold_ms
            );
        }
    }
}

/// 异常日志切面
pub struct ExceptionLoggingAspect {
    pointcut: PointcutExpression,
}

impl ExceptionLoggingAspect {
    pub fn new(pointcut: PointcutExpression) -> Self {
        Self { pointcut }
    }
}

impl Aspect for ExceptionLoggingAspect {
    fn name(&self) -> &str {
        "ExceptionLoggingAspect"
    }

    fn pointcut(&self) -> &PointcutExpression {
        &self.pointcut
    }

    fn after_throwing(&self, join_point: &JoinPoint, error: &Throwable) {
        tracing::error!("Exception in {}: {}", join_point.signature(), error.full_description());
    }
}
