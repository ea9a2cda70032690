use thiserror::Error;

/// 统一的宽松错误类型
///
/// 框架内部的辅助函数使用 anyhow::Result，通过 .context() 补充上下文。
/// 需要被调用方区分处理的错误则使用下面的强类型错误。
pub use anyhow::Result;

/// Bean 查找相关错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 指定名称的 Bean 不存在
    #[error("No bean named '{0}' available")]
    BeanNotFound(String),

    /// 指定类型的 Bean 不存在
    #[error("No qualifying bean of type '{0}' available")]
    NoSuchBeanOfType(String),

    /// 指定类型存在多个候选 Bean，且没有唯一的 primary
    #[error("No qualifying bean of type '{type_name}' available: expected single matching bean but found {}: {}", .candidates.len(), .candidates.join(","))]
    NoUniqueBean {
        type_name: String,
        candidates: Vec<String>,
    },

    /// Bean 存在但类型不匹配
    #[error("Bean named '{name}' is expected to be of type '{expected}'")]
    TypeMismatch { name: String, expected: String },

    /// Bean 名称重复注册
    #[error("Bean named '{0}' is already registered")]
    DuplicateBean(String),

    /// 其他错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Bean 查找结果类型
pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

/// 应用引导阶段错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 日志系统初始化失败
    #[error("Failed to initialize logging: {0}")]
    LoggingInitFailed(String),

    /// 配置加载失败
    #[error("Failed to load configuration: {0}")]
    ConfigLoadFailed(String),

    /// 占位符无法解析
    #[error("Could not resolve placeholder '{placeholder}' in value \"{value}\"")]
    UnresolvablePlaceholder { placeholder: String, value: String },

    /// 生命周期回调失败
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Bean 查找失败
    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// 应用引导结果类型
pub type ApplicationResult<T> = std::result::Result<T, ApplicationError>;
