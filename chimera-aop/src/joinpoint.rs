//! 连接点（JoinPoint）定义
//!
//! 供切面钩子使用的只读调用快照

use crate::method::Method;
use crate::Value;
use std::fmt;
use std::time::Instant;

/// 连接点信息
#[derive(Clone)]
pub struct JoinPoint {
    /// 目标类型名称
    pub target_type: String,

    /// 被调用的方法
    pub method: Method,

    /// 方法参数
    pub args: Vec<Value>,

    /// 调用时间戳
    pub timestamp: Instant,
}

impl JoinPoint {
    /// 创建新的连接点
    pub fn new(target_type: impl Into<String>, method: Method) -> Self {
        Self {
            target_type: target_type.into(),
            method,
            args: Vec::new(),
            timestamp: Instant::now(),
        }
    }

    /// 设置参数
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// 获取完整的方法签名
    pub fn signature(&self) -> String {
        format!("{}::{}", self.target_type, self.method.name())
    }

    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    /// 获取第 index 个参数
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
}

impl fmt::Debug for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("signature", &self.signature())
            .field("args", &self.args)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl fmt::Display for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}
