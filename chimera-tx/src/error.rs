//! 事务错误

use chimera_aop::{ErrorType, Throwable};
use chimera_core::ContainerError;
use once_cell::sync::Lazy;
use thiserror::Error;

static TRANSACTION_EXCEPTION: Lazy<ErrorType> =
    Lazy::new(|| ErrorType::new("TransactionException", &ErrorType::runtime_exception()));
static TRANSACTION_SYSTEM_EXCEPTION: Lazy<ErrorType> =
    Lazy::new(|| ErrorType::new("TransactionSystemException", &TRANSACTION_EXCEPTION));
static UNEXPECTED_ROLLBACK_EXCEPTION: Lazy<ErrorType> =
    Lazy::new(|| ErrorType::new("UnexpectedRollbackException", &TRANSACTION_EXCEPTION));
static NO_TRANSACTION_EXCEPTION: Lazy<ErrorType> =
    Lazy::new(|| ErrorType::new("NoTransactionException", &TRANSACTION_EXCEPTION));
static TIMED_OUT_EXCEPTION: Lazy<ErrorType> =
    Lazy::new(|| ErrorType::new("TransactionTimedOutException", &TRANSACTION_EXCEPTION));

/// 事务错误
#[derive(Debug, Error)]
pub enum TransactionError {
    /// 没有可用的事务管理器
    #[error("No transaction manager available: {0}")]
    NoTransactionManager(String),

    /// 按名称、类型或限定符查找事务管理器失败
    #[error("Failed to resolve transaction manager: {0}")]
    ManagerLookup(#[from] ContainerError),

    /// 事务管理器类型与调用方式不匹配
    #[error("Cannot apply {manager} to method '{method}'")]
    ManagerMismatch { manager: String, method: String },

    /// 提交/回滚过程中底层资源失败
    ///
    /// 如果失败前已经发生了应用异常，会一并记录下来
    #[error("{message}")]
    System {
        message: String,
        application_error: Option<Throwable>,
    },

    /// 事务被静默回滚
    #[error("Transaction silently rolled back: {0}")]
    UnexpectedRollback(String),

    /// 当前没有事务
    #[error("No transaction aspect-managed TransactionStatus in scope")]
    NoTransaction,

    #[error("Transaction timed out: {0}")]
    TimedOut(String),

    /// 事务属性文本无法解析
    #[error("Invalid transaction attribute token '{0}'")]
    InvalidAttribute(String),

    /// 配置错误
    #[error("{0}")]
    IllegalState(String),
}

impl TransactionError {
    pub fn system(message: impl Into<String>) -> Self {
        TransactionError::System {
            message: message.into(),
            application_error: None,
        }
    }

    /// 记录被事务失败覆盖的应用异常，其它变体原样返回
    pub fn with_application_error(self, error: Throwable) -> Self {
        match self {
            TransactionError::System { message, .. } => TransactionError::System {
                message,
                application_error: Some(error),
            },
            other => other,
        }
    }

    /// 被覆盖的应用异常
    pub fn application_error(&self) -> Option<&Throwable> {
        match self {
            TransactionError::System { application_error, .. } => application_error.as_ref(),
            _ => None,
        }
    }

    /// 转换为 Throwable 时使用的异常类型
    pub fn error_type(&self) -> ErrorType {
        match self {
            TransactionError::System { .. } => TRANSACTION_SYSTEM_EXCEPTION.clone(),
            TransactionError::UnexpectedRollback(_) => UNEXPECTED_ROLLBACK_EXCEPTION.clone(),
            TransactionError::NoTransaction => NO_TRANSACTION_EXCEPTION.clone(),
            TransactionError::TimedOut(_) => TIMED_OUT_EXCEPTION.clone(),
            TransactionError::InvalidAttribute(_) => ErrorType::illegal_argument(),
            TransactionError::NoTransactionManager(_)
            | TransactionError::ManagerLookup(_)
            | TransactionError::ManagerMismatch { .. }
            | TransactionError::IllegalState(_) => ErrorType::illegal_state(),
        }
    }

    /// TransactionException 异常类型
    pub fn transaction_exception() -> ErrorType {
        TRANSACTION_EXCEPTION.clone()
    }

    /// TransactionSystemException 异常类型
    pub fn system_exception() -> ErrorType {
        TRANSACTION_SYSTEM_EXCEPTION.clone()
    }
}

impl From<TransactionError> for Throwable {
    fn from(error: TransactionError) -> Self {
        let error_type = error.error_type();
        Throwable::from_error(error_type, error)
    }
}

pub type TransactionResult<T> = std::result::Result<T, TransactionError>;
