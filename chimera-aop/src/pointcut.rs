//! 切点（Pointcut）
//!
//! 切点由类过滤器和方法匹配器组成，决定通知是否适用于某个方法调用。

use crate::method::Method;
use crate::Value;
use regex::Regex;
use std::sync::Arc;

/// 类过滤器
pub trait ClassFilter: Send + Sync {
    fn matches(&self, target_type: &str) -> bool;
}

/// 方法匹配器
pub trait MethodMatcher: Send + Sync {
    /// 静态匹配
    fn matches(&self, method: &Method, target_type: &str) -> bool;

    /// 返回 true 时，静态匹配通过后每次调用还要用实参再匹配一次
    fn is_runtime(&self) -> bool {
        false
    }

    /// 运行时匹配，仅在 is_runtime 为 true 时调用
    fn matches_with_args(&self, method: &Method, target_type: &str, _args: &[Value]) -> bool {
        self.matches(method, target_type)
    }

    /// 是否需要知道目标上是否存在引入（introduction）
    fn is_introduction_aware(&self) -> bool {
        false
    }

    /// 带引入信息的静态匹配，仅在 is_introduction_aware 为 true 时调用
    fn matches_with_introductions(
        &self,
        method: &Method,
        target_type: &str,
        _has_introductions: bool,
    ) -> bool {
        self.matches(method, target_type)
    }
}

/// 切点
pub trait Pointcut: Send + Sync {
    fn class_filter(&self) -> &dyn ClassFilter;

    fn method_matcher(&self) -> &dyn MethodMatcher;
}

/// 匹配所有类型
#[derive(Debug, Clone, Copy, Default)]
pub struct TrueClassFilter;

impl ClassFilter for TrueClassFilter {
    fn matches(&self, _target_type: &str) -> bool {
        true
    }
}

/// 匹配所有方法
#[derive(Debug, Clone, Copy, Default)]
pub struct TrueMethodMatcher;

impl MethodMatcher for TrueMethodMatcher {
    fn matches(&self, _method: &Method, _target_type: &str) -> bool {
        true
    }
}

/// 匹配所有方法调用的切点
#[derive(Debug, Clone, Copy, Default)]
pub struct TruePointcut;

impl Pointcut for TruePointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        &TrueClassFilter
    }

    fn method_matcher(&self) -> &dyn MethodMatcher {
        &TrueMethodMatcher
    }
}

/// 用闭包实现的类过滤器
pub struct FnClassFilter<F>(pub F);

impl<F> ClassFilter for FnClassFilter<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches(&self, target_type: &str) -> bool {
        (self.0)(target_type)
    }
}

/// 类过滤器的组合
pub enum ClassFilters {
    Union(Vec<Arc<dyn ClassFilter>>),
    Intersection(Vec<Arc<dyn ClassFilter>>),
}

impl ClassFilter for ClassFilters {
    fn matches(&self, target_type: &str) -> bool {
        match self {
            ClassFilters::Union(filters) => filters.iter().any(|f| f.matches(target_type)),
            ClassFilters::Intersection(filters) => filters.iter().all(|f| f.matches(target_type)),
        }
    }
}

/// 切点表达式
///
/// 用于匹配连接点
#[derive(Clone)]
pub enum PointcutExpression {
    /// 匹配所有方法
    All,

    /// 匹配特定类型的所有方法
    /// 例如：TypePattern("*Service")
    TypePattern(String),

    /// 匹配特定方法名
    /// 例如：MethodPattern("find*")
    MethodPattern(String),

    /// 匹配特定类型的特定方法
    /// 例如：execution(* UserService.get_user(..))
    Execution {
        type_pattern: String,
        method_pattern: String,
    },

    /// 使用正则表达式匹配类型
    TypeRegex(Regex),

    /// 使用正则表达式匹配方法
    MethodRegex(Regex),

    /// 自定义匹配函数
    Custom(Arc<dyn Fn(&Method, &str) -> bool + Send + Sync>),

    /// 与运算（AND）
    And(Box<PointcutExpression>, Box<PointcutExpression>),

    /// 或运算（OR）
    Or(Box<PointcutExpression>, Box<PointcutExpression>),

    /// 非运算（NOT）
    Not(Box<PointcutExpression>),
}

impl PointcutExpression {
    /// 检查方法调用是否匹配
    pub fn matches(&self, method: &Method, target_type: &str) -> bool {
        match self {
            PointcutExpression::All => true,

            PointcutExpression::TypePattern(pattern) => type_matches(pattern, target_type),

            PointcutExpression::MethodPattern(pattern) => wildcard_match(pattern, method.name()),

            PointcutExpression::Execution {
                type_pattern,
                method_pattern,
            } => type_matches(type_pattern, target_type) && wildcard_match(method_pattern, method.name()),

            PointcutExpression::TypeRegex(regex) => regex.is_match(target_type),

            PointcutExpression::MethodRegex(regex) => regex.is_match(method.name()),

            PointcutExpression::Custom(func) => func(method, target_type),

            PointcutExpression::And(left, right) => {
                left.matches(method, target_type) && right.matches(method, target_type)
            }

            PointcutExpression::Or(left, right) => {
                left.matches(method, target_type) || right.matches(method, target_type)
            }

            PointcutExpression::Not(expr) => !expr.matches(method, target_type),
        }
    }

    /// 类级别的预判
    ///
    /// 返回 false 表示该类型上不可能有方法匹配；返回 true 时仍需逐个方法匹配
    pub fn could_match_type(&self, target_type: &str) -> bool {
        match self {
            PointcutExpression::TypePattern(pattern) => type_matches(pattern, target_type),
            PointcutExpression::Execution { type_pattern, .. } => {
                type_matches(type_pattern, target_type)
            }
            PointcutExpression::TypeRegex(regex) => regex.is_match(target_type),
            PointcutExpression::And(left, right) => {
                left.could_match_type(target_type) && right.could_match_type(target_type)
            }
            PointcutExpression::Or(left, right) => {
                left.could_match_type(target_type) || right.could_match_type(target_type)
            }
            _ => true,
        }
    }

    /// 创建 execution 表达式
    ///
    /// 格式：返回类型 类型名.方法名(参数)，例如 "* UserService.get_user(..)"
    /// 只使用类型和方法名部分
    pub fn execution(expression: &str) -> Self {
        let parts: Vec<&str> = expression.split_whitespace().collect();

        if parts.len() < 2 {
            return PointcutExpression::All;
        }

        let method_part = parts[1];
        let method_part = match method_part.find('(') {
            Some(index) => &method_part[..index],
            None => method_part,
        };
        match method_part.rsplit_once('.') {
            Some((type_pattern, method_pattern)) => PointcutExpression::Execution {
                type_pattern: type_pattern.to_string(),
                method_pattern: method_pattern.to_string(),
            },
            None => PointcutExpression::MethodPattern(method_part.to_string()),
        }
    }

    /// 与运算
    pub fn and(self, other: PointcutExpression) -> Self {
        PointcutExpression::And(Box::new(self), Box::new(other))
    }

    /// 或运算
    pub fn or(self, other: PointcutExpression) -> Self {
        PointcutExpression::Or(Box::new(self), Box::new(other))
    }

    /// 非运算
    pub fn negate(self) -> Self {
        PointcutExpression::Not(Box::new(self))
    }
}

impl std::fmt::Debug for PointcutExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointcutExpression::All => write!(f, "All"),
            PointcutExpression::TypePattern(p) => write!(f, "TypePattern({})", p),
            PointcutExpression::MethodPattern(p) => write!(f, "MethodPattern({})", p),
            PointcutExpression::Execution { type_pattern, method_pattern } => {
                write!(f, "Execution({}.{})", type_pattern, method_pattern)
            }
            PointcutExpression::TypeRegex(r) => write!(f, "TypeRegex({})", r.as_str()),
            PointcutExpression::MethodRegex(r) => write!(f, "MethodRegex({})", r.as_str()),
            PointcutExpression::Custom(_) => write!(f, "Custom(...)"),
            PointcutExpression::And(l, r) => write!(f, "And({:?}, {:?})", l, r),
            PointcutExpression::Or(l, r) => write!(f, "Or({:?}, {:?})", l, r),
            PointcutExpression::Not(e) => write!(f, "Not({:?})", e),
        }
    }
}

/// 类型模式同时尝试完整名称和短名称
fn type_matches(pattern: &str, target_type: &str) -> bool {
    wildcard_match(pattern, target_type)
        || wildcard_match(pattern, chimera_core::utils::class_names::short_name(target_type))
}

/// 简单的模式匹配（支持 * 通配符）
///
/// - `*` 匹配任意字符串
/// - `User*` 以 User 开头
/// - `*Service` 以 Service 结尾
/// - `*Service*` 包含 Service
pub fn wildcard_match(pattern: &str, target: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if !pattern.contains('*') {
        return pattern == target;
    }

    let segments: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match segments.split_first() {
        Some(split) => split,
        None => return target.is_empty(),
    };
    let Some(mut remaining) = target.strip_prefix(first) else {
        return false;
    };
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return remaining.is_empty(),
    };
    for segment in middle {
        match remaining.find(segment) {
            Some(index) => remaining = &remaining[index + segment.len()..],
            None => return false,
        }
    }
    remaining.len() >= last.len() && remaining.ends_with(last)
}

/// 基于表达式的切点
#[derive(Debug, Clone)]
pub struct ExpressionPointcut {
    expression: PointcutExpression,
}

impl ExpressionPointcut {
    pub fn new(expression: PointcutExpression) -> Self {
        Self { expression }
    }

    pub fn expression(&self) -> &PointcutExpression {
        &self.expression
    }
}

impl ClassFilter for ExpressionPointcut {
    fn matches(&self, target_type: &str) -> bool {
        self.expression.could_match_type(target_type)
    }
}

impl MethodMatcher for ExpressionPointcut {
    fn matches(&self, method: &Method, target_type: &str) -> bool {
        self.expression.matches(method, target_type)
    }
}

impl Pointcut for ExpressionPointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        self
    }

    fn method_matcher(&self) -> &dyn MethodMatcher {
        self
    }
}

/// 按方法名匹配的切点，支持 `*` 通配符
#[derive(Debug, Clone, Default)]
pub struct NameMatchMethodPointcut {
    mapped_names: Vec<String>,
}

impl NameMatchMethodPointcut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_method_name(mut self, name: impl Into<String>) -> Self {
        self.mapped_names.push(name.into());
        self
    }

    pub fn mapped_names(&self) -> &[String] {
        &self.mapped_names
    }
}

impl MethodMatcher for NameMatchMethodPointcut {
    fn matches(&self, method: &Method, _target_type: &str) -> bool {
        self.mapped_names
            .iter()
            .any(|name| wildcard_match(name, method.name()))
    }
}

impl Pointcut for NameMatchMethodPointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        &TrueClassFilter
    }

    fn method_matcher(&self) -> &dyn MethodMatcher {
        self
    }
}
