//! 约束
//!
//! 约束作用在 JSON 形式的参数或返回值上，可以通过属性路径指向值内部的字段。
//! 除 `NotNull`、`NotEmpty`、`NotBlank` 外，null 值总是满足约束。

use std::fmt;

use chimera_aop::Value;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ConstraintViolation, ValidationError, ValidationResult};

/// 未声明分组的约束属于默认分组
pub const DEFAULT_GROUP: &str = "Default";

static EMAIL_PATTERN: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"));

/// 约束类型
#[derive(Debug, Clone)]
pub enum Constraint {
    NotNull,
    /// 字符串、数组、对象非空
    NotEmpty,
    /// 字符串去掉空白后非空
    NotBlank,
    /// 字符串长度（字符数）
    Length { min: Option<usize>, max: Option<usize> },
    /// 数值范围
    Range { min: Option<f64>, max: Option<f64> },
    Email(Regex),
    Pattern(Regex),
    /// 数组、对象、字符串的元素个数
    Size { min: Option<usize>, max: Option<usize> },
}

impl Constraint {
    pub fn length(min: Option<usize>, max: Option<usize>) -> Self {
        Constraint::Length { min, max }
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Constraint::Range { min, max }
    }

    pub fn size(min: Option<usize>, max: Option<usize>) -> Self {
        Constraint::Size { min, max }
    }

    pub fn email() -> ValidationResult<Self> {
        match EMAIL_PATTERN.as_ref() {
            Ok(regex) => Ok(Constraint::Email(regex.clone())),
            Err(e) => Err(ValidationError::invalid_constraint("Email", e.to_string())),
        }
    }

    pub fn pattern(pattern: &str) -> ValidationResult<Self> {
        Regex::new(pattern)
            .map(Constraint::Pattern)
            .map_err(|e| ValidationError::invalid_constraint("Pattern", format!("Invalid regex pattern: {}", e)))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Constraint::NotNull => "NotNull",
            Constraint::NotEmpty => "NotEmpty",
            Constraint::NotBlank => "NotBlank",
            Constraint::Length { .. } => "Length",
            Constraint::Range { .. } => "Range",
            Constraint::Email(_) => "Email",
            Constraint::Pattern(_) => "Pattern",
            Constraint::Size { .. } => "Size",
        }
    }

    /// 检查值，返回默认的违反消息
    fn check(&self, value: &Value, field: &str) -> Option<String> {
        match self {
            Constraint::NotNull => value
                .is_null()
                .then(|| format!("{} must not be null", field)),
            Constraint::NotEmpty => {
                let empty = match value {
                    Value::Null => true,
                    Value::String(s) => s.is_empty(),
                    Value::Array(items) => items.is_empty(),
                    Value::Object(fields) => fields.is_empty(),
                    _ => false,
                };
                empty.then(|| format!("{} must not be empty", field))
            }
            Constraint::NotBlank => {
                let blank = match value {
                    Value::Null => true,
                    Value::String(s) => s.trim().is_empty(),
                    _ => false,
                };
                blank.then(|| format!("{} must not be blank", field))
            }
            Constraint::Length { min, max } => {
                let len = value.as_str()?.chars().count();
                bounds_violation(len, *min, *max).map(|(bound, limit)| {
                    format!("{} length must be {} {}, but was {}", field, bound, limit, len)
                })
            }
            Constraint::Range { min, max } => {
                let number = value.as_f64()?;
                if let Some(min) = min.filter(|min| number < *min) {
                    return Some(format!("{} must be at least {}, but was {}", field, min, value));
                }
                max.filter(|max| number > *max)
                    .map(|max| format!("{} must be at most {}, but was {}", field, max, value))
            }
            Constraint::Email(regex) => {
                let text = value.as_str()?;
                (!regex.is_match(text)).then(|| format!("{} must be a valid email address", field))
            }
            Constraint::Pattern(regex) => {
                let text = value.as_str()?;
                (!regex.is_match(text)).then(|| format!("{} must match pattern: {}", field, regex.as_str()))
            }
            Constraint::Size { min, max } => {
                let len = match value {
                    Value::Array(items) => items.len(),
                    Value::Object(fields) => fields.len(),
                    Value::String(s) => s.chars().count(),
                    _ => return None,
                };
                bounds_violation(len, *min, *max).map(|(bound, limit)| {
                    format!("{} size must be {} {}, but was {}", field, bound, limit, len)
                })
            }
        }
    }
}

fn bounds_violation(len: usize, min: Option<usize>, max: Option<usize>) -> Option<(&'static str, usize)> {
    if let Some(min) = min.filter(|min| len < *min) {
        return Some(("at least", min));
    }
    max.filter(|max| len > *max).map(|max| ("at most", max))
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 声明的约束：约束类型、属性路径、分组和自定义消息
#[derive(Debug, Clone)]
pub struct ConstraintRule {
    constraint: Constraint,
    property: Option<String>,
    groups: Vec<String>,
    message: Option<String>,
}

impl ConstraintRule {
    pub fn new(constraint: Constraint) -> Self {
        Self {
            constraint,
            property: None,
            groups: Vec::new(),
            message: None,
        }
    }

    /// 以 `.` 分隔的属性路径，如 `address.city`
    pub fn property(mut self, path: impl Into<String>) -> Self {
        self.property = Some(path.into());
        self
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    /// 是否属于请求的分组之一；请求为空时按默认分组处理
    pub fn applies_to(&self, groups: &[String]) -> bool {
        let in_group = |group: &str| {
            if self.groups.is_empty() {
                group == DEFAULT_GROUP
            } else {
                self.groups.iter().any(|g| g == group)
            }
        };
        if groups.is_empty() {
            in_group(DEFAULT_GROUP)
        } else {
            groups.iter().any(|group| in_group(group))
        }
    }

    /// 以 `base_path` 为根检查值
    pub fn validate(&self, base_path: &str, value: &Value) -> Option<ConstraintViolation> {
        let (path, field, target) = match &self.property {
            Some(property) => {
                let mut current = value;
                for segment in property.split('.') {
                    current = current.get(segment).unwrap_or(&Value::Null);
                }
                let field = property.rsplit('.').next().unwrap_or(property.as_str());
                (format!("{}.{}", base_path, property), field.to_string(), current)
            }
            None => {
                let field = base_path.rsplit('.').next().unwrap_or(base_path);
                (base_path.to_string(), field.to_string(), value)
            }
        };

        let default_message = self.constraint.check(target, &field)?;
        Some(ConstraintViolation {
            path,
            message: self.message.clone().unwrap_or(default_message),
            invalid_value: target.clone(),
            constraint: self.constraint.name().to_string(),
        })
    }
}

impl From<Constraint> for ConstraintRule {
    fn from(constraint: Constraint) -> Self {
        ConstraintRule::new(constraint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(constraint: Constraint, value: Value) -> Option<String> {
        ConstraintRule::new(constraint)
            .validate("save.name", &value)
            .map(|v| v.message)
    }

    #[test]
    fn test_not_null_family() {
        assert_eq!(message(Constraint::NotNull, Value::Null).unwrap(), "name must not be null");
        assert!(message(Constraint::NotNull, json!("")).is_none());

        assert_eq!(message(Constraint::NotEmpty, json!("")).unwrap(), "name must not be empty");
        assert!(message(Constraint::NotEmpty, json!([])).is_some());
        assert!(message(Constraint::NotEmpty, json!({"a": 1})).is_none());

        assert_eq!(message(Constraint::NotBlank, json!("  ")).unwrap(), "name must not be blank");
        assert!(message(Constraint::NotBlank, Value::Null).is_some());
        assert!(message(Constraint::NotBlank, json!(" x ")).is_none());
    }

    #[test]
    fn test_length_range_size() {
        assert_eq!(
            message(Constraint::length(Some(3), None), json!("ab")).unwrap(),
            "name length must be at least 3, but was 2"
        );
        assert_eq!(
            message(Constraint::length(None, Some(2)), json!("héé")).unwrap(),
            "name length must be at most 2, but was 3"
        );
        assert!(message(Constraint::length(Some(3), None), Value::Null).is_none());

        assert_eq!(
            message(Constraint::range(Some(1.0), Some(10.0)), json!(0)).unwrap(),
            "name must be at least 1, but was 0"
        );
        assert_eq!(
            message(Constraint::range(Some(1.0), Some(10.0)), json!(11)).unwrap(),
            "name must be at most 10, but was 11"
        );
        assert!(message(Constraint::range(Some(1.0), Some(10.0)), json!(5)).is_none());

        assert_eq!(
            message(Constraint::size(Some(1), Some(2)), json!([1, 2, 3])).unwrap(),
            "name size must be at most 2, but was 3"
        );
    }

    #[test]
    fn test_email_and_pattern() {
        let email = Constraint::email().unwrap();
        assert!(message(email.clone(), json!("ann@example.com")).is_none());
        assert_eq!(
            message(email, json!("ann@")).unwrap(),
            "name must be a valid email address"
        );

        let pattern = Constraint::pattern(r"^\d{3}$").unwrap();
        assert!(message(pattern.clone(), json!("123")).is_none());
        assert_eq!(
            message(pattern, json!("12a")).unwrap(),
            r"name must match pattern: ^\d{3}$"
        );

        assert!(matches!(
            Constraint::pattern("(unclosed"),
            Err(ValidationError::InvalidConstraint { .. })
        ));
    }

    #[test]
    fn test_property_path_and_custom_message() {
        let rule = ConstraintRule::new(Constraint::NotBlank)
            .property("address.city")
            .message("city is required");
        let violation = rule
            .validate("register.arg0", &json!({"address": {"city": ""}}))
            .unwrap();
        assert_eq!(violation.path, "register.arg0.address.city");
        assert_eq!(violation.message, "city is required");
        assert_eq!(violation.constraint, "NotBlank");

        let violation = ConstraintRule::new(Constraint::NotNull)
            .property("address.zip")
            .validate("register.arg0", &json!({}))
            .unwrap();
        assert_eq!(violation.message, "zip must not be null");
    }

    #[test]
    fn test_groups() {
        let default_rule = ConstraintRule::new(Constraint::NotNull);
        let create_rule = ConstraintRule::new(Constraint::NotNull).groups(["Create"]);

        assert!(default_rule.applies_to(&[]));
        assert!(!default_rule.applies_to(&["Create".to_string()]));
        assert!(default_rule.applies_to(&["Create".to_string(), DEFAULT_GROUP.to_string()]));

        assert!(!create_rule.applies_to(&[]));
        assert!(create_rule.applies_to(&["Create".to_string()]));
    }
}
