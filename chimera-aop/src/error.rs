use crate::throwable::{ErrorType, Throwable};
use thiserror::Error;

/// 代理分派错误
#[derive(Debug, Error)]
pub enum AopError {
    /// 接口代理上调用了未声明在代理接口上的方法
    #[error("Method '{method}' is not declared on any proxied interface of '{target}'")]
    NotOnProxiedInterface { method: String, target: String },

    /// 目标对象没有该方法的实现
    #[error("No handler for method '{method}' on '{target}'")]
    NoHandler { method: String, target: String },
}

impl From<AopError> for Throwable {
    fn from(error: AopError) -> Self {
        Throwable::from_error(ErrorType::unsupported_operation(), error)
    }
}
