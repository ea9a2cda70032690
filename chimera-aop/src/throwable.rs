//! 异常模型
//!
//! 拦截链上传递的失败值。每个失败都有一个带父链的错误类型，
//! 回滚规则根据这条父链计算继承深度。
//!
//! 内置类型层次：
//!
//! ```text
//! Throwable
//! ├── Exception                (checked)
//! │   └── RuntimeException     (unchecked)
//! │       ├── IllegalStateException
//! │       ├── IllegalArgumentException
//! │       └── UnsupportedOperationException
//! └── Error                    (unchecked)
//! ```

use once_cell::sync::Lazy;
use std::error::Error as StdError;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

struct ErrorTypeNode {
    name: String,
    parent: Option<ErrorType>,
}

/// 错误类型
///
/// 以名称标识，相同名称视为同一类型
#[derive(Clone)]
pub struct ErrorType {
    node: Arc<ErrorTypeNode>,
}

static THROWABLE: Lazy<ErrorType> = Lazy::new(|| ErrorType::root("Throwable"));
static EXCEPTION: Lazy<ErrorType> = Lazy::new(|| ErrorType::new("Exception", &THROWABLE));
static RUNTIME_EXCEPTION: Lazy<ErrorType> =
    Lazy::new(|| ErrorType::new("RuntimeException", &EXCEPTION));
static ERROR: Lazy<ErrorType> = Lazy::new(|| ErrorType::new("Error", &THROWABLE));
static ILLEGAL_STATE: Lazy<ErrorType> =
    Lazy::new(|| ErrorType::new("IllegalStateException", &RUNTIME_EXCEPTION));
static ILLEGAL_ARGUMENT: Lazy<ErrorType> =
    Lazy::new(|| ErrorType::new("IllegalArgumentException", &RUNTIME_EXCEPTION));
static UNSUPPORTED_OPERATION: Lazy<ErrorType> =
    Lazy::new(|| ErrorType::new("UnsupportedOperationException", &RUNTIME_EXCEPTION));

impl ErrorType {
    /// 创建没有父类型的根类型
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            node: Arc::new(ErrorTypeNode {
                name: name.into(),
                parent: None,
            }),
        }
    }

    /// 创建子类型
    pub fn new(name: impl Into<String>, parent: &ErrorType) -> Self {
        Self {
            node: Arc::new(ErrorTypeNode {
                name: name.into(),
                parent: Some(parent.clone()),
            }),
        }
    }

    pub fn throwable() -> ErrorType {
        THROWABLE.clone()
    }

    pub fn exception() -> ErrorType {
        EXCEPTION.clone()
    }

    pub fn runtime_exception() -> ErrorType {
        RUNTIME_EXCEPTION.clone()
    }

    pub fn error() -> ErrorType {
        ERROR.clone()
    }

    pub fn illegal_state() -> ErrorType {
        ILLEGAL_STATE.clone()
    }

    pub fn illegal_argument() -> ErrorType {
        ILLEGAL_ARGUMENT.clone()
    }

    pub fn unsupported_operation() -> ErrorType {
        UNSUPPORTED_OPERATION.clone()
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn parent(&self) -> Option<&ErrorType> {
        self.node.parent.as_ref()
    }

    /// 从自身开始沿父链向上遍历
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors {
            current: Some(self),
        }
    }

    /// 到指定名称祖先的距离，自身为 0，不在父链上返回 None
    pub fn depth_of(&self, ancestor_name: &str) -> Option<usize> {
        self.ancestors().position(|t| t.name() == ancestor_name)
    }

    pub fn is_subtype_of(&self, other: &ErrorType) -> bool {
        self.depth_of(other.name()).is_some()
    }

    /// RuntimeException 和 Error 的子类型是 unchecked
    pub fn is_unchecked(&self) -> bool {
        self.ancestors()
            .any(|t| t.name() == RUNTIME_EXCEPTION.name() || t.name() == ERROR.name())
    }

    pub fn is_checked(&self) -> bool {
        !self.is_unchecked()
    }
}

impl PartialEq for ErrorType {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for ErrorType {}

impl Hash for ErrorType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

impl fmt::Debug for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain: Vec<&str> = self.ancestors().map(|t| t.name()).collect();
        write!(f, "ErrorType({})", chain.join(" < "))
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 父链迭代器
pub struct Ancestors<'a> {
    current: Option<&'a ErrorType>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a ErrorType;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = current.parent();
        Some(current)
    }
}

/// 调用链上的失败值
///
/// 可携带原始的 Rust 错误作为 payload，调用方可通过 downcast_ref 取回
#[derive(Clone)]
pub struct Throwable {
    error_type: ErrorType,
    message: String,
    cause: Option<Box<Throwable>>,
    payload: Option<Arc<dyn StdError + Send + Sync>>,
}

impl Throwable {
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            cause: None,
            payload: None,
        }
    }

    /// 从 Rust 错误构造，保留原错误作为 payload
    pub fn from_error<E>(error_type: ErrorType, error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            error_type,
            message: error.to_string(),
            cause: None,
            payload: Some(Arc::new(error)),
        }
    }

    /// checked 异常（Exception）
    pub fn checked(message: impl Into<String>) -> Self {
        Self::new(ErrorType::exception(), message)
    }

    /// unchecked 异常（RuntimeException）
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorType::runtime_exception(), message)
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new(ErrorType::illegal_state(), message)
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorType::illegal_argument(), message)
    }

    pub fn unsupported_operation(message: impl Into<String>) -> Self {
        Self::new(ErrorType::unsupported_operation(), message)
    }

    pub fn with_cause(mut self, cause: Throwable) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn error_type(&self) -> &ErrorType {
        &self.error_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&Throwable> {
        self.cause.as_deref()
    }

    /// 是否为指定类型或其子类型
    pub fn is_instance_of(&self, error_type: &ErrorType) -> bool {
        self.error_type.is_subtype_of(error_type)
    }

    pub fn is_unchecked(&self) -> bool {
        self.error_type.is_unchecked()
    }

    /// 取回 payload 中的原始错误
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let payload: &(dyn StdError + Send + Sync + 'static) = self.payload.as_deref()?;
        payload.downcast_ref::<E>()
    }

    /// 包含 cause 链的完整描述
    pub fn full_description(&self) -> String {
        let mut description = self.to_string();
        let mut current = self.cause();
        while let Some(cause) = current {
            description.push_str("\nCaused by: ");
            description.push_str(&cause.to_string());
            current = cause.cause();
        }
        description
    }
}

impl fmt::Debug for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throwable")
            .field("type", &self.error_type.name())
            .field("message", &self.message)
            .field("cause", &self.cause)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

impl fmt::Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.error_type)
        } else {
            write!(f, "{}: {}", self.error_type, self.message)
        }
    }
}

impl StdError for Throwable {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn StdError + 'static))
    }
}

impl From<anyhow::Error> for Throwable {
    fn from(error: anyhow::Error) -> Self {
        Throwable::runtime(format!("{:#}", error))
    }
}
