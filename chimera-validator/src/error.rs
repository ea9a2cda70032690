//! 验证错误

use std::fmt;

use chimera_aop::{ErrorType, Throwable, Value};
use once_cell::sync::Lazy;
use thiserror::Error;

static VALIDATION_EXCEPTION: Lazy<ErrorType> =
    Lazy::new(|| ErrorType::new("ValidationException", &ErrorType::runtime_exception()));
static CONSTRAINT_VIOLATION_EXCEPTION: Lazy<ErrorType> =
    Lazy::new(|| ErrorType::new("ConstraintViolationException", &VALIDATION_EXCEPTION));

/// 一条违反的约束
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintViolation {
    /// `find.arg0.email`、`find.<return value>`
    pub path: String,
    pub message: String,
    pub invalid_value: Value,
    /// 约束名称，如 `NotBlank`
    pub constraint: String,
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// 验证错误
#[derive(Debug, Error, Clone)]
pub enum ValidationError {
    /// 参数或返回值违反约束
    #[error("{}", describe(.0))]
    ConstraintViolations(Vec<ConstraintViolation>),

    /// 参数与声明的方法签名不一致
    #[error("Argument mismatch for '{method}': {message}")]
    SignatureMismatch { method: String, message: String },

    /// 约束声明不合法
    #[error("Invalid constraint declaration on '{target}': {message}")]
    InvalidConstraint { target: String, message: String },
}

fn describe(violations: &[ConstraintViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationError {
    pub fn invalid_constraint(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConstraint {
            target: target.into(),
            message: message.into(),
        }
    }

    /// 违反的约束，其它错误为空
    pub fn violations(&self) -> &[ConstraintViolation] {
        match self {
            Self::ConstraintViolations(violations) => violations,
            _ => &[],
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::ConstraintViolations(_) => CONSTRAINT_VIOLATION_EXCEPTION.clone(),
            Self::SignatureMismatch { .. } => ErrorType::illegal_argument(),
            Self::InvalidConstraint { .. } => VALIDATION_EXCEPTION.clone(),
        }
    }
}

impl From<ValidationError> for Throwable {
    fn from(error: ValidationError) -> Self {
        let error_type = error.error_type();
        Throwable::from_error(error_type, error)
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;
