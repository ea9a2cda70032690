//! 导入候选：选择器、延迟选择器、注册器
//!
//! `Import` 注解引用的类名先在 [`ImportCandidateRegistry`] 中分类，
//! 未登记的类名按普通配置类处理。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chimera_core::error::ContainerResult;
use chimera_core::order::Ordered;
use chimera_core::utils::class_names::is_builtin_type_name;
use chimera_core::DefaultListableBeanFactory;

use crate::error::{ContextError, ContextResult};
use crate::metadata::ClassMetadata;

type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// 导入时需要跳过的类名
#[derive(Clone, Default)]
pub struct ExclusionFilter {
    predicates: Vec<Predicate>,
}

impl ExclusionFilter {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            predicates: vec![Arc::new(predicate)],
        }
    }

    /// 跳过运行时内置类型
    pub fn builtin() -> Self {
        Self::new(is_builtin_type_name)
    }

    /// 任一过滤器匹配即跳过
    pub fn or(&self, other: &ExclusionFilter) -> Self {
        let mut predicates = self.predicates.clone();
        predicates.extend(other.predicates.iter().cloned());
        Self { predicates }
    }

    pub fn matches(&self, class_name: &str) -> bool {
        self.predicates.iter().any(|p| p(class_name))
    }
}

impl fmt::Debug for ExclusionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusionFilter")
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

/// 根据导入方的元数据计算要导入的类名
pub trait ImportSelector: Send + Sync {
    fn select_imports(&self, importing: &ClassMetadata) -> Vec<String>;

    fn exclusion_filter(&self) -> Option<ExclusionFilter> {
        None
    }
}

/// 在所有配置类处理完之后才执行的选择器
pub trait DeferredImportSelector: ImportSelector + Ordered {
    /// 分组键，相同键的选择器合并处理；`None` 时每个选择器单独成组
    fn import_group(&self) -> Option<&str> {
        None
    }
}

/// 向 Bean 注册表注册额外的 Bean，不再产生配置类
pub trait ImportBeanDefinitionRegistrar: Send + Sync {
    fn register_bean_definitions(
        &self,
        importing: &ClassMetadata,
        registry: &DefaultListableBeanFactory,
    ) -> ContainerResult<()>;
}

/// 延迟导入分组中的一条导入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub importing_class: String,
    pub import_class_name: String,
}

/// 延迟导入分组
pub trait DeferredImportGroup: Send {
    fn process(&mut self, importing: &ClassMetadata, selector: &dyn DeferredImportSelector);

    fn select_imports(&mut self) -> Vec<GroupEntry>;
}

/// 逐个收集选择器的结果
#[derive(Debug, Default)]
pub struct DefaultDeferredImportGroup {
    imports: Vec<GroupEntry>,
}

impl DeferredImportGroup for DefaultDeferredImportGroup {
    fn process(&mut self, importing: &ClassMetadata, selector: &dyn DeferredImportSelector) {
        for import_class_name in selector.select_imports(importing) {
            self.imports.push(GroupEntry {
                importing_class: importing.class_name().to_string(),
                import_class_name,
            });
        }
    }

    fn select_imports(&mut self) -> Vec<GroupEntry> {
        std::mem::take(&mut self.imports)
    }
}

/// 导入候选的分类
#[derive(Clone)]
pub enum ImportCandidate {
    Selector(Arc<dyn ImportSelector>),
    DeferredSelector(Arc<dyn DeferredImportSelector>),
    Registrar(Arc<dyn ImportBeanDefinitionRegistrar>),
    Configuration,
}

impl fmt::Debug for ImportCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ImportCandidate::Selector(_) => "Selector",
            ImportCandidate::DeferredSelector(_) => "DeferredSelector",
            ImportCandidate::Registrar(_) => "Registrar",
            ImportCandidate::Configuration => "Configuration",
        };
        f.write_str(kind)
    }
}

pub type GroupFactory = fn() -> Box<dyn DeferredImportGroup>;

/// 通过 inventory 静态注册的导入候选
pub enum ImportRegistration {
    Selector {
        class_name: &'static str,
        factory: fn() -> Arc<dyn ImportSelector>,
    },
    DeferredSelector {
        class_name: &'static str,
        factory: fn() -> Arc<dyn DeferredImportSelector>,
    },
    Registrar {
        class_name: &'static str,
        factory: fn() -> Arc<dyn ImportBeanDefinitionRegistrar>,
    },
    Group {
        name: &'static str,
        factory: GroupFactory,
    },
}

inventory::collect!(ImportRegistration);

/// 类名到导入候选的映射
#[derive(Default)]
pub struct ImportCandidateRegistry {
    candidates: HashMap<String, ImportCandidate>,
    groups: HashMap<String, GroupFactory>,
}

impl ImportCandidateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加载所有通过 inventory 注册的候选
    pub fn from_registry() -> Self {
        let mut registry = Self::new();
        for registration in inventory::iter::<ImportRegistration> {
            registry = match registration {
                ImportRegistration::Selector { class_name, factory } => {
                    registry.selector(*class_name, factory())
                }
                ImportRegistration::DeferredSelector { class_name, factory } => {
                    registry.deferred_selector(*class_name, factory())
                }
                ImportRegistration::Registrar { class_name, factory } => {
                    registry.registrar(*class_name, factory())
                }
                ImportRegistration::Group { name, factory } => registry.group(*name, *factory),
            };
        }
        tracing::debug!(
            "Loaded {} import candidate(s) and {} import group(s) from registry",
            registry.candidates.len(),
            registry.groups.len()
        );
        registry
    }

    pub fn selector(mut self, class_name: impl Into<String>, selector: Arc<dyn ImportSelector>) -> Self {
        self.candidates
            .insert(class_name.into(), ImportCandidate::Selector(selector));
        self
    }

    pub fn deferred_selector(
        mut self,
        class_name: impl Into<String>,
        selector: Arc<dyn DeferredImportSelector>,
    ) -> Self {
        self.candidates
            .insert(class_name.into(), ImportCandidate::DeferredSelector(selector));
        self
    }

    pub fn registrar(
        mut self,
        class_name: impl Into<String>,
        registrar: Arc<dyn ImportBeanDefinitionRegistrar>,
    ) -> Self {
        self.candidates
            .insert(class_name.into(), ImportCandidate::Registrar(registrar));
        self
    }

    pub fn group(mut self, name: impl Into<String>, factory: GroupFactory) -> Self {
        self.groups.insert(name.into(), factory);
        self
    }

    pub fn classify(&self, class_name: &str) -> ImportCandidate {
        self.candidates
            .get(class_name)
            .cloned()
            .unwrap_or(ImportCandidate::Configuration)
    }

    /// 按分组键创建分组，未指定时使用默认分组
    pub fn create_group(&self, name: Option<&str>) -> ContextResult<Box<dyn DeferredImportGroup>> {
        match name {
            None => Ok(Box::<DefaultDeferredImportGroup>::default()),
            Some(name) => self
                .groups
                .get(name)
                .map(|factory| factory())
                .ok_or_else(|| ContextError::UnknownImportGroup(name.to_string())),
        }
    }
}
