//! 方法级约束验证

use std::collections::{BTreeMap, HashMap};

use chimera_aop::{Method, Value};
use parking_lot::RwLock;

use crate::constraint::ConstraintRule;
use crate::error::{ConstraintViolation, ValidationError, ValidationResult};

/// 返回值在违反路径中的名称
pub const RETURN_VALUE_NODE: &str = "<return value>";

/// 方法参数和返回值的约束验证器
pub trait ExecutableValidator: Send + Sync {
    /// 方法签名与实参不一致时返回 [`ValidationError::SignatureMismatch`]
    fn validate_parameters(
        &self,
        target_type: &str,
        method: &Method,
        args: &[Value],
        groups: &[String],
    ) -> ValidationResult<Vec<ConstraintViolation>>;

    fn validate_return_value(
        &self,
        target_type: &str,
        method: &Method,
        value: &Value,
        groups: &[String],
    ) -> ValidationResult<Vec<ConstraintViolation>>;
}

/// 一个方法上声明的约束
#[derive(Debug, Clone, Default)]
pub struct MethodConstraints {
    parameters: BTreeMap<usize, Vec<ConstraintRule>>,
    return_value: Vec<ConstraintRule>,
}

impl MethodConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameter(mut self, index: usize, rule: impl Into<ConstraintRule>) -> Self {
        self.parameters.entry(index).or_default().push(rule.into());
        self
    }

    pub fn return_value(mut self, rule: impl Into<ConstraintRule>) -> Self {
        self.return_value.push(rule.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.return_value.is_empty()
    }
}

/// 按方法声明约束的验证器
///
/// 参数路径为 `方法名.argN`，返回值路径为 `方法名.<return value>`
#[derive(Default)]
pub struct DeclarativeValidator {
    constraints: RwLock<HashMap<Method, MethodConstraints>>,
}

impl DeclarativeValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 声明方法约束，参数下标不能超出方法参数个数
    pub fn declare(self, method: Method, constraints: MethodConstraints) -> ValidationResult<Self> {
        if let Some(index) = constraints
            .parameters
            .keys()
            .find(|index| **index >= method.parameter_count())
        {
            return Err(ValidationError::invalid_constraint(
                method.signature(),
                format!(
                    "parameter index {} out of bounds for {} parameter(s)",
                    index,
                    method.parameter_count()
                ),
            ));
        }
        tracing::debug!("Declared constraints on '{}'", method);
        self.constraints.write().insert(method, constraints);
        Ok(self)
    }

    /// 找到方法的约束
    ///
    /// 声明类型或目标类型上有同名方法但签名不同时视为签名不一致
    fn constraints_for(&self, target_type: &str, method: &Method) -> ValidationResult<Option<MethodConstraints>> {
        let constraints = self.constraints.read();
        if let Some(found) = constraints.get(method) {
            return Ok(Some(found.clone()));
        }
        let mismatch = constraints.keys().find(|declared| {
            declared.name() == method.name()
                && (declared.declaring_type() == method.declaring_type()
                    || declared.declaring_type() == target_type)
        });
        match mismatch {
            Some(declared) => Err(ValidationError::SignatureMismatch {
                method: method.signature(),
                message: format!("constraints are declared for '{}'", declared.signature()),
            }),
            None => Ok(None),
        }
    }
}

impl ExecutableValidator for DeclarativeValidator {
    fn validate_parameters(
        &self,
        target_type: &str,
        method: &Method,
        args: &[Value],
        groups: &[String],
    ) -> ValidationResult<Vec<ConstraintViolation>> {
        let Some(constraints) = self.constraints_for(target_type, method)? else {
            return Ok(Vec::new());
        };
        if args.len() != method.parameter_count() {
            return Err(ValidationError::SignatureMismatch {
                method: method.signature(),
                message: format!(
                    "expected {} argument(s), got {}",
                    method.parameter_count(),
                    args.len()
                ),
            });
        }

        let mut violations = Vec::new();
        for (index, rules) in &constraints.parameters {
            let path = format!("{}.arg{}", method.name(), index);
            let value = &args[*index];
            violations.extend(
                rules
                    .iter()
                    .filter(|rule| rule.applies_to(groups))
                    .filter_map(|rule| rule.validate(&path, value)),
            );
        }
        Ok(violations)
    }

    fn validate_return_value(
        &self,
        target_type: &str,
        method: &Method,
        value: &Value,
        groups: &[String],
    ) -> ValidationResult<Vec<ConstraintViolation>> {
        let Some(constraints) = self.constraints_for(target_type, method)? else {
            return Ok(Vec::new());
        };
        let path = format!("{}.{}", method.name(), RETURN_VALUE_NODE);
        Ok(constraints
            .return_value
            .iter()
            .filter(|rule| rule.applies_to(groups))
            .filter_map(|rule| rule.validate(&path, value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Constraint;
    use serde_json::json;

    fn register() -> Method {
        Method::new("UserService", "register").with_params(["String", "u32"])
    }

    fn validator() -> DeclarativeValidator {
        DeclarativeValidator::new()
            .declare(
                register(),
                MethodConstraints::new()
                    .parameter(0, Constraint::email().unwrap())
                    .parameter(1, Constraint::range(Some(18.0), None))
                    .parameter(1, ConstraintRule::new(Constraint::range(None, Some(65.0))).groups(["Adult"]))
                    .return_value(ConstraintRule::new(Constraint::NotNull).property("id")),
            )
            .unwrap()
    }

    #[test]
    fn test_parameter_violations() {
        let violations = validator()
            .validate_parameters("UserService", &register(), &[json!("ann"), json!(12)], &[])
            .unwrap();
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["register.arg0", "register.arg1"]);
        assert_eq!(violations[1].message, "arg1 must be at least 18, but was 12");

        assert!(validator()
            .validate_parameters("UserService", &register(), &[json!("ann@example.com"), json!(30)], &[])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_groups_select_constraints() {
        let groups = vec!["Adult".to_string()];
        let violations = validator()
            .validate_parameters("UserService", &register(), &[json!("ann"), json!(70)], &groups)
            .unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "register.arg1");
        assert_eq!(violations[0].message, "arg1 must be at most 65, but was 70");
    }

    #[test]
    fn test_return_value() {
        let violations = validator()
            .validate_return_value("UserService", &register(), &json!({"name": "ann"}), &[])
            .unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "register.<return value>.id");

        assert!(validator()
            .validate_return_value("UserService", &register(), &json!({"id": 1}), &[])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_signature_mismatch() {
        let generic = Method::new("UserService", "register").with_params(["T", "u32"]);
        assert!(matches!(
            validator().validate_parameters("UserService", &generic, &[json!("a"), json!(1)], &[]),
            Err(ValidationError::SignatureMismatch { .. })
        ));

        assert!(matches!(
            validator().validate_parameters("UserService", &register(), &[json!("a")], &[]),
            Err(ValidationError::SignatureMismatch { .. })
        ));

        let unconstrained = Method::new("UserService", "delete").with_params(["u64"]);
        assert!(validator()
            .validate_parameters("UserService", &unconstrained, &[json!(1)], &[])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_declare_rejects_out_of_bounds_parameter() {
        let result = DeclarativeValidator::new().declare(
            Method::new("UserService", "delete").with_params(["u64"]),
            MethodConstraints::new().parameter(1, Constraint::NotNull),
        );
        assert!(matches!(result, Err(ValidationError::InvalidConstraint { .. })));
    }
}
