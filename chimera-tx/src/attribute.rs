//! 事务属性
//!
//! [`TransactionAttribute`] = 事务定义 + 管理器限定符 + 标签 + 回滚规则。
//! 属性可以来自 [`Transactional`] 声明，也可以来自文本形式，例如
//! `PROPAGATION_REQUIRED,ISOLATION_DEFAULT,readOnly,timeout_5,-Exception,+Foo`。

use std::fmt;
use std::str::FromStr;

use chimera_aop::{ErrorType, Throwable};

use crate::definition::{Isolation, Propagation, TransactionDefinition, TIMEOUT_DEFAULT};
use crate::error::TransactionError;
use crate::rollback::{default_rollback_on, rollback_decision, RollbackRule};

/// 事务属性
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionAttribute {
    definition: TransactionDefinition,
    qualifier: Option<String>,
    labels: Vec<String>,
    descriptor: Option<String>,
    /// None 表示只使用默认规则
    rollback_rules: Option<Vec<RollbackRule>>,
}

impl TransactionAttribute {
    /// 默认属性（REQUIRED，只对 unchecked 异常回滚）
    pub fn new() -> Self {
        Self::default()
    }

    /// 基于规则的属性，规则顺序即优先顺序
    pub fn rule_based(rules: Vec<RollbackRule>) -> Self {
        Self {
            rollback_rules: Some(rules),
            ..Self::default()
        }
    }

    pub fn with_definition(mut self, definition: TransactionDefinition) -> Self {
        self.definition = definition;
        self
    }

    pub fn with_propagation(mut self, propagation: Propagation) -> Self {
        self.definition.propagation = propagation;
        self
    }

    pub fn with_isolation(mut self, isolation: Isolation) -> Self {
        self.definition.isolation = isolation;
        self
    }

    pub fn with_timeout(mut self, timeout: i32) -> Self {
        self.definition.timeout = timeout;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.definition.read_only = read_only;
        self
    }

    /// 指定事务管理器的限定符
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// 描述属性来源，通常是 `Type.method`
    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = Some(descriptor.into());
        self
    }

    /// 追加回滚规则，属性随之变为基于规则的属性
    pub fn add_rollback_rule(mut self, rule: RollbackRule) -> Self {
        self.rollback_rules.get_or_insert_with(Vec::new).push(rule);
        self
    }

    pub fn definition(&self) -> &TransactionDefinition {
        &self.definition
    }

    pub fn definition_mut(&mut self) -> &mut TransactionDefinition {
        &mut self.definition
    }

    pub fn name(&self) -> Option<&str> {
        self.definition.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.definition.name = Some(name.into());
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref().filter(|q| !q.is_empty())
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn descriptor(&self) -> Option<&str> {
        self.descriptor.as_deref()
    }

    pub fn rollback_rules(&self) -> &[RollbackRule] {
        self.rollback_rules.as_deref().unwrap_or(&[])
    }

    /// 该异常是否应该回滚
    pub fn rollback_on(&self, error: &Throwable) -> bool {
        match &self.rollback_rules {
            Some(rules) => {
                let rollback = rollback_decision(rules, error);
                tracing::trace!(
                    "Applying rules to determine whether transaction should rollback on {}: {}",
                    error.error_type(),
                    rollback
                );
                rollback
            }
            None => default_rollback_on(error),
        }
    }
}

impl fmt::Display for TransactionAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.definition)?;
        if let Some(qualifier) = self.qualifier() {
            write!(f, "; '{}'", qualifier)?;
        }
        for rule in self.rollback_rules() {
            write!(f, ",{}", rule)?;
        }
        Ok(())
    }
}

impl FromStr for TransactionAttribute {
    type Err = TransactionError;

    /// 逗号分隔：`PROPAGATION_*`、`ISOLATION_*`、`timeout_N`、`readOnly`、`-Name`、`+Name`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut attribute = TransactionAttribute::rule_based(Vec::new());
        for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if token.starts_with(Propagation::PREFIX) {
                attribute.definition.propagation = token.parse()?;
            } else if token.starts_with(Isolation::PREFIX) {
                attribute.definition.isolation = token.parse()?;
            } else if let Some(timeout) = token.strip_prefix("timeout_") {
                attribute.definition.timeout = timeout
                    .parse()
                    .map_err(|_| TransactionError::InvalidAttribute(token.to_string()))?;
            } else if token == "readOnly" {
                attribute.definition.read_only = true;
            } else if let Some(rule) = RollbackRule::parse(token) {
                attribute = attribute.add_rollback_rule(rule);
            } else {
                return Err(TransactionError::InvalidAttribute(token.to_string()));
            }
        }
        Ok(attribute)
    }
}

/// 事务声明
///
/// 对应方法或类型上的事务注解，通过 [`Transactional::to_attribute`]
/// 转换为基于规则的属性
#[derive(Debug, Clone, Default)]
pub struct Transactional {
    /// 事务管理器限定符
    pub transaction_manager: String,
    pub label: Vec<String>,
    pub propagation: Propagation,
    pub isolation: Isolation,
    pub timeout: Option<i32>,
    /// 文本形式的超时秒数
    pub timeout_string: String,
    pub read_only: bool,
    pub rollback_for: Vec<ErrorType>,
    pub rollback_for_class_name: Vec<String>,
    pub no_rollback_for: Vec<ErrorType>,
    pub no_rollback_for_class_name: Vec<String>,
}

impl Transactional {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_manager(mut self, qualifier: impl Into<String>) -> Self {
        self.transaction_manager = qualifier.into();
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label.push(label.into());
        self
    }

    pub fn propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn timeout(mut self, seconds: i32) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn timeout_string(mut self, seconds: impl Into<String>) -> Self {
        self.timeout_string = seconds.into();
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn rollback_for(mut self, error_type: &ErrorType) -> Self {
        self.rollback_for.push(error_type.clone());
        self
    }

    pub fn rollback_for_class_name(mut self, name: impl Into<String>) -> Self {
        self.rollback_for_class_name.push(name.into());
        self
    }

    pub fn no_rollback_for(mut self, error_type: &ErrorType) -> Self {
        self.no_rollback_for.push(error_type.clone());
        self
    }

    pub fn no_rollback_for_class_name(mut self, name: impl Into<String>) -> Self {
        self.no_rollback_for_class_name.push(name.into());
        self
    }

    /// 转换为事务属性
    ///
    /// 规则顺序：rollback_for 类型、rollback_for 名称、no_rollback_for 类型、no_rollback_for 名称
    pub fn to_attribute(&self) -> Result<TransactionAttribute, TransactionError> {
        let timeout = match (self.timeout, self.timeout_string.trim()) {
            (Some(timeout), _) => timeout,
            (None, "") => TIMEOUT_DEFAULT,
            (None, text) => text
                .parse()
                .map_err(|_| TransactionError::InvalidAttribute(format!("timeout_{}", text)))?,
        };

        let rules = self
            .rollback_for
            .iter()
            .map(RollbackRule::rollback_for)
            .chain(self.rollback_for_class_name.iter().map(RollbackRule::rollback_for_name))
            .chain(self.no_rollback_for.iter().map(RollbackRule::no_rollback_for))
            .chain(
                self.no_rollback_for_class_name
                    .iter()
                    .map(RollbackRule::no_rollback_for_name),
            )
            .collect();

        let mut attribute = TransactionAttribute::rule_based(rules)
            .with_propagation(self.propagation)
            .with_isolation(self.isolation)
            .with_timeout(timeout)
            .read_only(self.read_only);
        if !self.transaction_manager.is_empty() {
            attribute = attribute.with_qualifier(self.transaction_manager.clone());
        }
        attribute.labels = self.label.clone();
        Ok(attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_textual_attribute() {
        let attribute: TransactionAttribute =
            "PROPAGATION_REQUIRES_NEW,ISOLATION_READ_COMMITTED,readOnly,timeout_5,-Exception,+Foo"
                .parse()
                .unwrap();

        assert_eq!(attribute.definition().propagation, Propagation::RequiresNew);
        assert_eq!(attribute.definition().isolation, Isolation::ReadCommitted);
        assert_eq!(attribute.definition().timeout, 5);
        assert!(attribute.definition().read_only);
        assert_eq!(attribute.rollback_rules().len(), 2);

        // "-Exception" 匹配 checked 异常
        assert!(attribute.rollback_on(&Throwable::checked("io")));
        // 两条名称规则深度相同时先登记的规则生效
        let foo_exception = ErrorType::new("FooException", &ErrorType::runtime_exception());
        assert!(attribute.rollback_on(&Throwable::new(foo_exception, "foo")));
        let foo_failure = ErrorType::new("FooFailure", &ErrorType::runtime_exception());
        assert!(!attribute.rollback_on(&Throwable::new(foo_failure, "foo")));
    }

    #[test]
    fn test_parse_rejects_unknown_tokens() {
        assert!("PROPAGATION_REQUIRED,sometimes".parse::<TransactionAttribute>().is_err());
        assert!("timeout_soon".parse::<TransactionAttribute>().is_err());
    }

    #[test]
    fn test_default_attribute_rolls_back_unchecked_only() {
        let attribute = TransactionAttribute::new();
        assert!(attribute.rollback_on(&Throwable::runtime("x")));
        assert!(!attribute.rollback_on(&Throwable::checked("x")));
        assert!(attribute.rollback_rules().is_empty());
    }

    #[test]
    fn test_transactional_rule_order() {
        let declared = Transactional::new()
            .no_rollback_for_class_name("Ignored")
            .no_rollback_for(&ErrorType::illegal_state())
            .rollback_for_class_name("Payment")
            .rollback_for(&ErrorType::exception())
            .transaction_manager("orders")
            .timeout_string("30")
            .label("audit");

        let attribute = declared.to_attribute().unwrap();
        let rules: Vec<String> = attribute.rollback_rules().iter().map(|r| r.to_string()).collect();
        assert_eq!(rules, vec!["-Exception", "-Payment", "+IllegalStateException", "+Ignored"]);
        assert_eq!(attribute.qualifier(), Some("orders"));
        assert_eq!(attribute.definition().timeout, 30);
        assert_eq!(attribute.labels(), ["audit".to_string()]);
    }

    #[test]
    fn test_closer_no_rollback_rule_beats_rollback_for_exception() {
        let attribute = Transactional::new()
            .rollback_for(&ErrorType::exception())
            .no_rollback_for(&ErrorType::illegal_state())
            .to_attribute()
            .unwrap();

        assert!(!attribute.rollback_on(&Throwable::illegal_state("bad state")));
        assert!(attribute.rollback_on(&Throwable::illegal_argument("bad arg")));
        assert!(attribute.rollback_on(&Throwable::checked("io")));
    }
}
