//! 通知器（Advisor）
//!
//! Advisor = 切点 + 通知。注册后不可变，按 order 排序。

use crate::advice::{Advice, DelegatingIntroductionInterceptor, MethodInterceptor};
use crate::method::Method;
use crate::pointcut::{ClassFilter, Pointcut, TrueClassFilter};
use chimera_core::order::{Ordered, LOWEST_PRECEDENCE};
use std::fmt;
use std::sync::Arc;

/// 切点通知器
#[derive(Clone)]
pub struct PointcutAdvisor {
    name: String,
    pointcut: Arc<dyn Pointcut>,
    advice: Advice,
    order: i32,
}

impl PointcutAdvisor {
    pub fn new(name: impl Into<String>, pointcut: Arc<dyn Pointcut>, advice: Advice) -> Self {
        Self {
            name: name.into(),
            pointcut,
            advice,
            order: LOWEST_PRECEDENCE,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn pointcut(&self) -> &Arc<dyn Pointcut> {
        &self.pointcut
    }

    pub fn advice(&self) -> &Advice {
        &self.advice
    }
}

/// 引入通知器：为代理增加新的接口
#[derive(Clone)]
pub struct IntroductionAdvisor {
    name: String,
    class_filter: Arc<dyn ClassFilter>,
    interfaces: Vec<String>,
    interceptor: Arc<dyn MethodInterceptor>,
    order: i32,
}

impl IntroductionAdvisor {
    pub fn new(name: impl Into<String>, interceptor: Arc<DelegatingIntroductionInterceptor>) -> Self {
        Self {
            name: name.into(),
            class_filter: Arc::new(TrueClassFilter),
            interfaces: interceptor.interfaces().to_vec(),
            interceptor,
            order: LOWEST_PRECEDENCE,
        }
    }

    pub fn with_class_filter(mut self, class_filter: Arc<dyn ClassFilter>) -> Self {
        self.class_filter = class_filter;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn class_filter(&self) -> &dyn ClassFilter {
        self.class_filter.as_ref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn interceptor(&self) -> &Arc<dyn MethodInterceptor> {
        &self.interceptor
    }
}

/// 通知器
#[derive(Clone)]
pub enum Advisor {
    /// 切点 + 通知
    Pointcut(PointcutAdvisor),
    /// 引入
    Introduction(IntroductionAdvisor),
    /// 适用于所有方法的通知
    Global {
        name: String,
        advice: Advice,
        order: i32,
    },
}

impl Advisor {
    pub fn global(name: impl Into<String>, advice: Advice) -> Self {
        Advisor::Global {
            name: name.into(),
            advice,
            order: LOWEST_PRECEDENCE,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Advisor::Pointcut(a) => &a.name,
            Advisor::Introduction(a) => &a.name,
            Advisor::Global { name, .. } => name,
        }
    }

    /// 通知对应的拦截器
    pub fn interceptor(&self) -> Arc<dyn MethodInterceptor> {
        match self {
            Advisor::Pointcut(a) => a.advice.to_interceptor(),
            Advisor::Introduction(a) => Arc::clone(&a.interceptor),
            Advisor::Global { advice, .. } => advice.to_interceptor(),
        }
    }

    /// 判断通知器能否作用于目标类型的某个方法
    pub fn can_apply(&self, target_type: &str, methods: &[Method], has_introductions: bool) -> bool {
        match self {
            Advisor::Introduction(a) => a.class_filter.matches(target_type),
            Advisor::Pointcut(a) => {
                if !a.pointcut.class_filter().matches(target_type) {
                    return false;
                }
                let matcher = a.pointcut.method_matcher();
                methods.iter().any(|method| {
                    if matcher.is_introduction_aware() {
                        matcher.matches_with_introductions(method, target_type, has_introductions)
                    } else {
                        matcher.matches(method, target_type)
                    }
                })
            }
            Advisor::Global { .. } => true,
        }
    }
}

impl Ordered for Advisor {
    fn order(&self) -> i32 {
        match self {
            Advisor::Pointcut(a) => a.order,
            Advisor::Introduction(a) => a.order,
            Advisor::Global { order, .. } => *order,
        }
    }
}

impl From<PointcutAdvisor> for Advisor {
    fn from(advisor: PointcutAdvisor) -> Self {
        Advisor::Pointcut(advisor)
    }
}

impl From<IntroductionAdvisor> for Advisor {
    fn from(advisor: IntroductionAdvisor) -> Self {
        Advisor::Introduction(advisor)
    }
}

impl fmt::Debug for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Advisor::Pointcut(_) => "Pointcut",
            Advisor::Introduction(_) => "Introduction",
            Advisor::Global { .. } => "Global",
        };
        write!(f, "Advisor({} '{}', order={})", kind, self.name(), self.order())
    }
}
