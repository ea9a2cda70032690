// chimera-core: 框架基础设施
//
// 为拦截引擎和配置解析提供共享能力：
// - 错误类型（thiserror + anyhow）
// - 日志初始化（tracing）
// - Environment 与配置源
// - 窄化的 Bean 查找接口
// - 生命周期回调与排序约定

pub mod bean_factory;
pub mod config;
pub mod constants;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod order;
pub mod utils;

// 重新导出常用类型
pub use bean_factory::{BeanFactory, BeanFactoryExt, DefaultListableBeanFactory};
pub use config::{
    CompositePropertySource, ConfigValue, Environment, EnvironmentPropertySource,
    MapPropertySource, PropertySource, TomlPropertySource,
};
pub use constants::*;
pub use error::{ApplicationError, ApplicationResult, ContainerError, ContainerResult, Result};
pub use lifecycle::{BeanFactoryAware, InitializingBean, SmartInitializingSingleton};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use order::{Ordered, HIGHEST_PRECEDENCE, LOWEST_PRECEDENCE};

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::bean_factory::{BeanFactory, BeanFactoryExt, DefaultListableBeanFactory};
    pub use crate::config::{
        self, ConfigValue, Environment, MapPropertySource, PropertySource, TomlPropertySource,
    };
    pub use crate::error::{ApplicationError, ApplicationResult, ContainerError, ContainerResult, Result};
    pub use crate::lifecycle::{BeanFactoryAware, InitializingBean, SmartInitializingSingleton};
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::order::Ordered;
    pub use crate::utils;
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
