//! Chimera Validator - 方法验证
//!
//! 提供类似 Spring 方法级验证的功能：
//! - 约束：NotNull、NotEmpty、NotBlank、Length、Range、Email、Pattern、Size，支持分组和属性路径
//! - 按方法声明约束的验证器
//! - `Validated` 分组声明（方法级优先于类型级）
//! - 方法验证拦截器与通知器

pub mod constraint;
pub mod error;
pub mod groups;
pub mod interceptor;
pub mod validator;

pub use constraint::{Constraint, ConstraintRule, DEFAULT_GROUP};
pub use error::{ConstraintViolation, ValidationError, ValidationResult};
pub use groups::{ValidatedGroups, ValidatedRegistration};
pub use interceptor::MethodValidationInterceptor;
pub use validator::{DeclarativeValidator, ExecutableValidator, MethodConstraints, RETURN_VALUE_NODE};

// 导出 inventory 供静态注册使用
pub use inventory;
