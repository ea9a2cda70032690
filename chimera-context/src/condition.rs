//! 条件评估
//!
//! `Conditional` 注解的 `value` 是条件名列表，`Profile` 注解隐含名为 `Profile` 的条件。

use std::collections::HashMap;
use std::sync::Arc;

use chimera_core::order::{Ordered, LOWEST_PRECEDENCE};
use chimera_core::Environment;

use crate::error::{ContextError, ContextResult};
use crate::metadata::annotations::{CONDITIONAL, PROFILE};
use crate::metadata::{AnnotatedMetadata, ClassMetadata};

/// 条件的评估阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationPhase {
    /// 解析配置类时
    ParseConfiguration,
    /// 注册 Bean 时
    RegisterBean,
}

/// 评估条件时可用的上下文
pub struct ConditionContext<'a> {
    pub environment: &'a Environment,
}

pub trait Condition: Send + Sync {
    fn matches(&self, context: &ConditionContext<'_>, metadata: &dyn AnnotatedMetadata) -> bool;

    /// 只在指定阶段评估，`None` 表示所有阶段
    fn phase(&self) -> Option<ConfigurationPhase> {
        None
    }

    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }
}

/// `Profile` 条件：任一声明的 profile 被激活即匹配
pub struct ProfileCondition;

impl Condition for ProfileCondition {
    fn matches(&self, context: &ConditionContext<'_>, metadata: &dyn AnnotatedMetadata) -> bool {
        metadata
            .annotations_of(PROFILE)
            .all(|profile| context.environment.accepts_profiles(&profile.strings("value")))
    }
}

/// 通过 inventory 静态注册的条件
pub struct ConditionRegistration {
    pub name: &'static str,
    pub factory: fn() -> Arc<dyn Condition>,
}

inventory::collect!(ConditionRegistration);

struct OrderedCondition(Arc<dyn Condition>);

impl Ordered for OrderedCondition {
    fn order(&self) -> i32 {
        self.0.order()
    }
}

/// 按名称评估条件，决定是否跳过
pub struct ConditionEvaluator {
    environment: Arc<Environment>,
    conditions: HashMap<String, Arc<dyn Condition>>,
}

impl ConditionEvaluator {
    pub fn new(environment: Arc<Environment>) -> Self {
        let mut conditions: HashMap<String, Arc<dyn Condition>> = HashMap::new();
        conditions.insert(PROFILE.to_string(), Arc::new(ProfileCondition));
        Self {
            environment,
            conditions,
        }
    }

    /// 额外加载所有通过 inventory 注册的条件
    pub fn with_registered_conditions(mut self) -> Self {
        for registration in inventory::iter::<ConditionRegistration> {
            self.conditions
                .insert(registration.name.to_string(), (registration.factory)());
        }
        self
    }

    pub fn register(mut self, name: impl Into<String>, condition: Arc<dyn Condition>) -> Self {
        self.conditions.insert(name.into(), condition);
        self
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    /// 元素上声明的条件名，`Profile` 注解算作一个条件
    fn condition_names(metadata: &dyn AnnotatedMetadata) -> Vec<String> {
        let mut names: Vec<String> = metadata
            .annotations_of(CONDITIONAL)
            .flat_map(|a| a.strings("value"))
            .collect();
        if metadata.is_annotated(PROFILE) && !names.iter().any(|n| n == PROFILE) {
            names.push(PROFILE.to_string());
        }
        names
    }

    /// 类的默认阶段：配置类在解析阶段，其他在注册阶段
    pub fn should_skip_class(&self, metadata: &ClassMetadata, phase: Option<ConfigurationPhase>) -> ContextResult<bool> {
        let phase = phase.unwrap_or(if metadata.is_configuration_candidate() {
            ConfigurationPhase::ParseConfiguration
        } else {
            ConfigurationPhase::RegisterBean
        });
        self.should_skip(metadata, phase)
    }

    /// 任一适用于该阶段的条件不匹配即跳过
    pub fn should_skip(&self, metadata: &dyn AnnotatedMetadata, phase: ConfigurationPhase) -> ContextResult<bool> {
        let names = Self::condition_names(metadata);
        if names.is_empty() {
            return Ok(false);
        }

        let mut conditions = names
            .iter()
            .map(|name| {
                self.conditions
                    .get(name)
                    .map(|c| OrderedCondition(Arc::clone(c)))
                    .ok_or_else(|| ContextError::UnknownCondition(name.clone()))
            })
            .collect::<ContextResult<Vec<_>>>()?;
        chimera_core::order::sort_by_order(&mut conditions);

        let context = ConditionContext {
            environment: &self.environment,
        };
        Ok(conditions.iter().any(|OrderedCondition(condition)| {
            let applies = condition.phase().map_or(true, |required| required == phase);
            applies && !condition.matches(&context, metadata)
        }))
    }
}
