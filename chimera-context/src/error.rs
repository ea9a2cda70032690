//! 配置解析错误

use chimera_core::{ApplicationError, ContainerError};
use thiserror::Error;

use crate::problem::Problem;

/// 配置类解析过程中的错误
///
/// 循环导入等图结构问题不走这里，而是作为 [`Problem`] 收集；
/// 只有使用快速失败的问题报告器时才会以 [`ContextError::Problem`] 返回。
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("No class metadata found for '{0}'")]
    ClassNotFound(String),

    #[error("Invalid class metadata in '{source_name}': {message}")]
    InvalidMetadata { source_name: String, message: String },

    #[error("Property source location '{0}' not found")]
    ResourceNotFound(String),

    #[error("Failed to load property source from '{location}': {message}")]
    PropertySourceLoadFailed { location: String, message: String },

    #[error("Unknown condition '{0}'")]
    UnknownCondition(String),

    #[error("Unknown import group '{0}'")]
    UnknownImportGroup(String),

    #[error("{0}")]
    Problem(Problem),

    #[error(transparent)]
    Application(#[from] ApplicationError),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

pub type ContextResult<T> = std::result::Result<T, ContextError>;
