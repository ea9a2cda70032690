//! 配置类
//!
//! 一个配置类节点记录解析得到的全部内容：导入方、Bean 方法、导入的资源和注册器。

use std::fmt;
use std::sync::Arc;

use chimera_core::error::ContainerResult;
use chimera_core::utils::naming::default_bean_name;
use chimera_core::DefaultListableBeanFactory;
use indexmap::{IndexMap, IndexSet};

use crate::error::ContextResult;
use crate::import::ImportBeanDefinitionRegistrar;
use crate::metadata::{ClassMetadata, MethodMetadata};
use crate::problem::{Location, Problem, ProblemKind, ProblemReporter};

/// 配置类上声明的 Bean 方法
#[derive(Debug, Clone, PartialEq)]
pub struct BeanMethod {
    pub metadata: MethodMetadata,
    /// 声明该方法的类，可能是父类或接口
    pub declaring_class: String,
}

impl BeanMethod {
    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    fn validate(&self, config_class: &ConfigurationClass, reporter: &dyn ProblemReporter) -> ContextResult<()> {
        if self.metadata.is_static() {
            return Ok(());
        }
        if config_class.metadata.is_full_configuration() && !self.metadata.is_overridable() {
            reporter.error(Problem::new(
                ProblemKind::NonOverridableBeanMethod,
                format!(
                    "Bean method '{}' must not be private or final; change the method's modifiers to continue",
                    self.name()
                ),
                Location::method(&self.declaring_class, self.name()),
            ))?;
        }
        Ok(())
    }
}

#[derive(Clone)]
struct RegistrarEntry {
    registrar: Arc<dyn ImportBeanDefinitionRegistrar>,
    importing: Arc<ClassMetadata>,
}

/// 解析后的配置类
#[derive(Clone)]
pub struct ConfigurationClass {
    metadata: Arc<ClassMetadata>,
    bean_name: Option<String>,
    imported_by: IndexSet<String>,
    bean_methods: Vec<BeanMethod>,
    imported_resources: IndexMap<String, String>,
    registrars: Vec<RegistrarEntry>,
}

impl ConfigurationClass {
    /// 显式注册的配置类
    pub fn new(metadata: Arc<ClassMetadata>, bean_name: Option<String>) -> Self {
        Self {
            metadata,
            bean_name,
            imported_by: IndexSet::new(),
            bean_methods: Vec::new(),
            imported_resources: IndexMap::new(),
            registrars: Vec::new(),
        }
    }

    /// 被 `importing_class` 导入的配置类，Bean 名称在注册时决定
    pub fn imported(metadata: Arc<ClassMetadata>, importing_class: impl Into<String>) -> Self {
        let mut config = Self::new(metadata, None);
        config.imported_by.insert(importing_class.into());
        config
    }

    pub fn metadata(&self) -> &Arc<ClassMetadata> {
        &self.metadata
    }

    pub fn class_name(&self) -> &str {
        self.metadata.class_name()
    }

    pub fn bean_name(&self) -> Option<&str> {
        self.bean_name.as_deref()
    }

    /// 注册时使用的名称：显式名称，导入类使用完整类名
    pub fn registration_name(&self) -> String {
        match &self.bean_name {
            Some(name) => name.clone(),
            None if self.is_imported() => self.class_name().to_string(),
            None => default_bean_name(self.class_name()),
        }
    }

    pub fn is_imported(&self) -> bool {
        !self.imported_by.is_empty()
    }

    pub fn imported_by(&self) -> &IndexSet<String> {
        &self.imported_by
    }

    pub fn merge_imported_by(&mut self, other: &ConfigurationClass) {
        self.imported_by.extend(other.imported_by.iter().cloned());
    }

    pub fn add_bean_method(&mut self, bean_method: BeanMethod) {
        self.bean_methods.push(bean_method);
    }

    pub fn bean_methods(&self) -> &[BeanMethod] {
        &self.bean_methods
    }

    pub fn add_imported_resource(&mut self, location: impl Into<String>, reader: impl Into<String>) {
        self.imported_resources.insert(location.into(), reader.into());
    }

    /// 资源位置到读取器名称
    pub fn imported_resources(&self) -> &IndexMap<String, String> {
        &self.imported_resources
    }

    pub fn add_registrar(&mut self, registrar: Arc<dyn ImportBeanDefinitionRegistrar>, importing: Arc<ClassMetadata>) {
        self.registrars.push(RegistrarEntry { registrar, importing });
    }

    pub fn registrar_count(&self) -> usize {
        self.registrars.len()
    }

    /// 把 `other` 中下标 `from` 之后新增的注册器追加过来
    pub(crate) fn append_registrars_from(&mut self, other: &ConfigurationClass, from: usize) {
        self.registrars
            .extend(other.registrars.iter().skip(from).cloned());
    }

    /// 按登记顺序调用注册器
    pub fn load_registrars(&self, registry: &DefaultListableBeanFactory) -> ContainerResult<()> {
        for entry in &self.registrars {
            entry
                .registrar
                .register_bean_definitions(&entry.importing, registry)?;
        }
        Ok(())
    }

    /// Bean 方法代理要求配置类可以被继承，Bean 方法可以被覆盖
    pub fn validate(&self, reporter: &dyn ProblemReporter) -> ContextResult<()> {
        if self.metadata.is_full_configuration() && self.metadata.is_final() {
            reporter.error(Problem::new(
                ProblemKind::FinalConfiguration,
                format!(
                    "Configuration class '{}' may not be final; remove the final modifier to continue",
                    self.metadata.class_name()
                ),
                Location::class(self.class_name()),
            ))?;
        }
        for bean_method in &self.bean_methods {
            bean_method.validate(self, reporter)?;
        }
        Ok(())
    }
}

impl PartialEq for ConfigurationClass {
    fn eq(&self, other: &Self) -> bool {
        self.class_name() == other.class_name()
    }
}

impl fmt::Debug for ConfigurationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationClass")
            .field("class_name", &self.class_name())
            .field("bean_name", &self.bean_name)
            .field("imported_by", &self.imported_by)
            .field("bean_methods", &self.bean_methods.len())
            .field("registrars", &self.registrars.len())
            .finish()
    }
}

impl fmt::Display for ConfigurationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigurationClass: beanName '{}', {}", self.registration_name(), self.class_name())
    }
}
