//! 事务定义：传播行为、隔离级别、超时、只读

use std::fmt;
use std::str::FromStr;

use crate::error::TransactionError;

/// 使用底层资源的默认超时
pub const TIMEOUT_DEFAULT: i32 = -1;

/// 事务传播行为
///
/// 引擎只负责把传播行为交给事务管理器，挂起与恢复由管理器完成
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Propagation {
    /// 有事务则加入，没有则新建
    #[default]
    Required,
    /// 有事务则加入，没有则以非事务方式执行
    Supports,
    /// 必须在已有事务中执行
    Mandatory,
    /// 总是新建事务，挂起当前事务
    RequiresNew,
    /// 以非事务方式执行，挂起当前事务
    NotSupported,
    /// 以非事务方式执行，存在事务则失败
    Never,
    /// 在当前事务中开启嵌套事务（保存点）
    Nested,
}

impl Propagation {
    pub const PREFIX: &'static str = "PROPAGATION_";

    pub fn as_str(&self) -> &'static str {
        match self {
            Propagation::Required => "REQUIRED",
            Propagation::Supports => "SUPPORTS",
            Propagation::Mandatory => "MANDATORY",
            Propagation::RequiresNew => "REQUIRES_NEW",
            Propagation::NotSupported => "NOT_SUPPORTED",
            Propagation::Never => "NEVER",
            Propagation::Nested => "NESTED",
        }
    }
}

impl FromStr for Propagation {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix(Self::PREFIX).unwrap_or(s);
        match name.to_uppercase().as_str() {
            "REQUIRED" => Ok(Propagation::Required),
            "SUPPORTS" => Ok(Propagation::Supports),
            "MANDATORY" => Ok(Propagation::Mandatory),
            "REQUIRES_NEW" => Ok(Propagation::RequiresNew),
            "NOT_SUPPORTED" => Ok(Propagation::NotSupported),
            "NEVER" => Ok(Propagation::Never),
            "NESTED" => Ok(Propagation::Nested),
            _ => Err(TransactionError::InvalidAttribute(s.to_string())),
        }
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.as_str())
    }
}

/// 事务隔离级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Isolation {
    /// 使用底层数据源的默认级别
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl Isolation {
    pub const PREFIX: &'static str = "ISOLATION_";

    pub fn as_str(&self) -> &'static str {
        match self {
            Isolation::Default => "DEFAULT",
            Isolation::ReadUncommitted => "READ_UNCOMMITTED",
            Isolation::ReadCommitted => "READ_COMMITTED",
            Isolation::RepeatableRead => "REPEATABLE_READ",
            Isolation::Serializable => "SERIALIZABLE",
        }
    }
}

impl FromStr for Isolation {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix(Self::PREFIX).unwrap_or(s);
        match name.to_uppercase().as_str() {
            "DEFAULT" => Ok(Isolation::Default),
            "READ_UNCOMMITTED" => Ok(Isolation::ReadUncommitted),
            "READ_COMMITTED" => Ok(Isolation::ReadCommitted),
            "REPEATABLE_READ" => Ok(Isolation::RepeatableRead),
            "SERIALIZABLE" => Ok(Isolation::Serializable),
            _ => Err(TransactionError::InvalidAttribute(s.to_string())),
        }
    }
}

impl fmt::Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.as_str())
    }
}

/// 事务定义
///
/// 交给事务管理器的参数集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDefinition {
    pub name: Option<String>,
    pub propagation: Propagation,
    pub isolation: Isolation,
    /// 超时秒数，[`TIMEOUT_DEFAULT`] 表示使用默认值
    pub timeout: i32,
    pub read_only: bool,
}

impl TransactionDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn with_isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn with_timeout(mut self, timeout: i32) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn has_default_timeout(&self) -> bool {
        self.timeout == TIMEOUT_DEFAULT
    }
}

impl Default for TransactionDefinition {
    fn default() -> Self {
        Self {
            name: None,
            propagation: Propagation::Required,
            isolation: Isolation::Default,
            timeout: TIMEOUT_DEFAULT,
            read_only: false,
        }
    }
}

impl fmt::Display for TransactionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.propagation, self.isolation)?;
        if self.timeout != TIMEOUT_DEFAULT {
            write!(f, ",timeout_{}", self.timeout)?;
        }
        if self.read_only {
            write!(f, ",readOnly")?;
        }
        Ok(())
    }
}
