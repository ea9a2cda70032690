//! AOP BeanPostProcessor - 自动为匹配的 Bean 创建代理
//!
//! Bean 初始化后检查是否有通知器能作用于它的任一方法，有则包装成代理。

use crate::advisor::Advisor;
use crate::proxy::{ProxyFactory, Target};
use crate::registry::get_global_registry;
use chimera_core::order::{sort_by_order, Ordered};
use std::sync::Arc;

/// 通知器来源
enum AdvisorSource {
    /// 全局注册表
    Global,
    /// 显式列表
    Fixed(Vec<Advisor>),
}

/// AOP BeanPostProcessor
///
/// 1. 找出能作用于 Bean 的通知器（类过滤器 + 至少一个方法匹配）
/// 2. 按 order 排序
/// 3. 没有通知器时原样返回，否则返回代理
pub struct AopBeanPostProcessor {
    source: AdvisorSource,
    proxy_target_class: bool,
    enabled: bool,
}

impl AopBeanPostProcessor {
    /// 使用全局注册表中的通知器
    pub fn new() -> Self {
        Self {
            source: AdvisorSource::Global,
            proxy_target_class: false,
            enabled: true,
        }
    }

    /// 使用指定的通知器
    pub fn with_advisors(advisors: Vec<Advisor>) -> Self {
        Self {
            source: AdvisorSource::Fixed(advisors),
            proxy_target_class: false,
            enabled: true,
        }
    }

    /// 创建禁用的 AOP BeanPostProcessor
    pub fn disabled() -> Self {
        Self {
            source: AdvisorSource::Fixed(Vec::new()),
            proxy_target_class: false,
            enabled: false,
        }
    }

    pub fn proxy_target_class(mut self, value: bool) -> Self {
        self.proxy_target_class = value;
        self
    }

    fn candidate_advisors(&self) -> Vec<Advisor> {
        match &self.source {
            AdvisorSource::Global => get_global_registry().advisors(),
            AdvisorSource::Fixed(advisors) => advisors.clone(),
        }
    }

    /// 能作用于目标的通知器，按 order 排序
    pub fn eligible_advisors(&self, target: &dyn Target) -> Vec<Advisor> {
        let candidates = self.candidate_advisors();
        let type_name = target.type_name();
        let has_introductions = candidates.iter().any(|advisor| {
            matches!(advisor, Advisor::Introduction(_)) && advisor.can_apply(type_name, &[], false)
        });
        let methods = target.methods();

        let mut eligible: Vec<Advisor> = candidates
            .into_iter()
            .filter(|advisor| advisor.can_apply(type_name, &methods, has_introductions))
            .collect();
        sort_by_order(&mut eligible);
        eligible
    }

    /// 按需为 Bean 创建代理
    pub fn post_process_after_initialization(
        &self,
        target: Arc<dyn Target>,
        bean_name: &str,
    ) -> Arc<dyn Target> {
        if !self.enabled {
            return target;
        }

        let advisors = self.eligible_advisors(target.as_ref());
        if advisors.is_empty() {
            tracing::trace!("Bean '{}' does not match any advisor, skipping proxy creation", bean_name);
            return target;
        }

        tracing::info!(
            "Creating proxy for bean '{}' with {} advisor(s)",
            bean_name,
            advisors.len()
        );
        Arc::new(
            ProxyFactory::new(target)
                .add_advisors(advisors)
                .proxy_target_class(self.proxy_target_class)
                .pre_filtered(true)
                .get_proxy(),
        )
    }
}

impl Default for AopBeanPostProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Ordered for AopBeanPostProcessor {
    fn order(&self) -> i32 {
        // 在其他处理器之后执行，确保 Bean 已经完全初始化
        2000
    }
}
