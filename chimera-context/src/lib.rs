//! Chimera Context - 配置类图解析
//!
//! - 类元数据：注解、方法、父类、接口与成员类，可从 TOML 描述文件加载
//! - 配置类解析：成员类、配置源、组件扫描、导入、导入资源、Bean 方法与父类链
//! - 导入：普通配置类、选择器、延迟选择器分组与 Bean 注册器
//! - 条件：解析阶段与注册阶段的条件求值，内置 profile 条件
//! - 问题报告：循环导入、导入深度、final 配置类与不可覆盖的 Bean 方法

pub mod condition;
pub mod configuration_class;
pub mod error;
pub mod import;
pub mod import_stack;
pub mod metadata;
pub mod parser;
pub mod problem;
pub mod property_source;
pub mod reader;
pub mod scan;

pub use condition::{
    Condition, ConditionContext, ConditionEvaluator, ConditionRegistration, ConfigurationPhase,
    ProfileCondition,
};
pub use configuration_class::{BeanMethod, ConfigurationClass};
pub use error::{ContextError, ContextResult};
pub use import::{
    DefaultDeferredImportGroup, DeferredImportGroup, DeferredImportSelector, ExclusionFilter,
    GroupEntry, GroupFactory, ImportBeanDefinitionRegistrar, ImportCandidate,
    ImportCandidateRegistry, ImportRegistration, ImportSelector,
};
pub use import_stack::{ImportRegistry, ImportStack};
pub use metadata::{
    AnnotatedMetadata, AnnotationDescriptor, AttributeValue, ClassMetadata, MetadataOrigin,
    MethodMetadata,
};
pub use parser::{
    CandidateSource, ConfigCandidate, ConfigurationClassParser, ConfigurationRegistration,
    DEFAULT_MAX_IMPORT_DEPTH,
};
pub use problem::{
    CollectingProblemReporter, FailFastProblemReporter, Location, Problem, ProblemKind,
    ProblemReporter,
};
pub use property_source::{PropertySourceLoader, PropertySourceProcessor, TomlPropertySourceLoader};
pub use reader::{CachingMetadataReaderFactory, MetadataReaderFactory, SimpleMetadataReaderFactory};
pub use scan::{ComponentScanner, PackageComponentScanner, ScannedCandidate};

// 导出 inventory 供静态注册使用
pub use inventory;
