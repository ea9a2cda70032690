//! Bean Factory - Bean 查找接口
//!
//! 拦截引擎只需要按名称、类型和限定符查找已经创建好的单例，
//! 因此这里只保留一个窄的注册表，不负责实例化和依赖注入。

use std::any::{type_name, Any};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::{ContainerError, ContainerResult};

/// BeanFactory - 最基础的查找接口
///
/// 注意：此 trait 不包含泛型方法，因此可以作为 trait object 使用
pub trait BeanFactory: Send + Sync {
    /// 通过名称获取 Bean
    fn get_bean(&self, name: &str) -> ContainerResult<Arc<dyn Any + Send + Sync>>;

    /// 检查是否包含指定名称的 Bean
    fn contains_bean(&self, name: &str) -> bool;

    /// 按注册顺序返回所有 Bean 名称
    fn bean_names(&self) -> Vec<String>;

    /// 是否为同类型候选中的 primary Bean
    fn is_primary(&self, _name: &str) -> bool {
        false
    }

    /// Bean 声明的限定符
    fn qualifiers(&self, _name: &str) -> Vec<String> {
        Vec::new()
    }
}

/// BeanFactoryExt - 泛型查找方法
///
/// 对所有 BeanFactory（包括 `dyn BeanFactory`）自动实现
pub trait BeanFactoryExt: BeanFactory {
    /// 按名称获取 Bean 并转换为指定类型
    fn get_bean_of<T: Any + Clone + Send + Sync>(&self, name: &str) -> ContainerResult<T> {
        let bean = self.get_bean(name)?;
        bean.downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| ContainerError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>().to_string(),
            })
    }

    /// 获取指定类型的全部 Bean（按注册顺序）
    fn beans_of_type<T: Any + Clone + Send + Sync>(&self) -> Vec<(String, T)> {
        self.bean_names()
            .into_iter()
            .filter_map(|name| {
                let bean = self.get_bean(&name).ok()?;
                let value = bean.downcast_ref::<T>()?.clone();
                Some((name, value))
            })
            .collect()
    }

    /// 获取指定类型的唯一 Bean
    ///
    /// 多个候选时选择唯一的 primary，否则报 NoUniqueBean
    fn get_unique_bean<T: Any + Clone + Send + Sync>(&self) -> ContainerResult<T> {
        let mut candidates = self.beans_of_type::<T>();
        match candidates.len() {
            0 => Err(ContainerError::NoSuchBeanOfType(type_name::<T>().to_string())),
            1 => Ok(candidates.remove(0).1),
            _ => {
                let primaries: Vec<usize> = candidates
                    .iter()
                    .enumerate()
                    .filter(|(_, (name, _))| self.is_primary(name))
                    .map(|(i, _)| i)
                    .collect();
                if primaries.len() == 1 {
                    Ok(candidates.remove(primaries[0]).1)
                } else {
                    Err(ContainerError::NoUniqueBean {
                        type_name: type_name::<T>().to_string(),
                        candidates: candidates.into_iter().map(|(name, _)| name).collect(),
                    })
                }
            }
        }
    }

    /// 按限定符获取指定类型的 Bean
    ///
    /// 限定符匹配 Bean 名称或 Bean 声明的限定符
    fn qualified_bean<T: Any + Clone + Send + Sync>(&self, qualifier: &str) -> ContainerResult<T> {
        let mut matching: Vec<(String, T)> = self
            .beans_of_type::<T>()
            .into_iter()
            .filter(|(name, _)| {
                name == qualifier || self.qualifiers(name).iter().any(|q| q == qualifier)
            })
            .collect();

        match matching.len() {
            0 => Err(ContainerError::NoSuchBeanOfType(format!(
                "{} (qualifier '{}')",
                type_name::<T>(),
                qualifier
            ))),
            1 => Ok(matching.remove(0).1),
            _ => Err(ContainerError::NoUniqueBean {
                type_name: type_name::<T>().to_string(),
                candidates: matching.into_iter().map(|(name, _)| name).collect(),
            }),
        }
    }
}

impl<F: BeanFactory + ?Sized> BeanFactoryExt for F {}

struct BeanEntry {
    instance: Arc<dyn Any + Send + Sync>,
    primary: bool,
    qualifiers: Vec<String>,
}

/// DefaultListableBeanFactory - 单例注册表
pub struct DefaultListableBeanFactory {
    singletons: RwLock<IndexMap<String, BeanEntry>>,
}

impl DefaultListableBeanFactory {
    pub fn new() -> Self {
        Self {
            singletons: RwLock::new(IndexMap::new()),
        }
    }

    /// 注册单例
    pub fn register_singleton<T: Any + Send + Sync>(
        &self,
        name: impl Into<String>,
        bean: T,
    ) -> ContainerResult<()> {
        self.register(name.into(), Arc::new(bean), false, Vec::new())
    }

    /// 注册 primary 单例
    pub fn register_primary<T: Any + Send + Sync>(
        &self,
        name: impl Into<String>,
        bean: T,
    ) -> ContainerResult<()> {
        self.register(name.into(), Arc::new(bean), true, Vec::new())
    }

    /// 注册带限定符的单例
    pub fn register_qualified<T: Any + Send + Sync>(
        &self,
        name: impl Into<String>,
        bean: T,
        qualifiers: Vec<String>,
    ) -> ContainerResult<()> {
        self.register(name.into(), Arc::new(bean), false, qualifiers)
    }

    fn register(
        &self,
        name: String,
        instance: Arc<dyn Any + Send + Sync>,
        primary: bool,
        qualifiers: Vec<String>,
    ) -> ContainerResult<()> {
        let mut singletons = self.singletons.write();
        if singletons.contains_key(&name) {
            return Err(ContainerError::DuplicateBean(name));
        }
        tracing::debug!("Registering singleton bean '{}'", name);
        singletons.insert(
            name,
            BeanEntry {
                instance,
                primary,
                qualifiers,
            },
        );
        Ok(())
    }

    /// 移除单例，返回是否存在
    pub fn remove_singleton(&self, name: &str) -> bool {
        self.singletons.write().shift_remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.singletons.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.singletons.read().is_empty()
    }
}

impl Default for DefaultListableBeanFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BeanFactory for DefaultListableBeanFactory {
    fn get_bean(&self, name: &str) -> ContainerResult<Arc<dyn Any + Send + Sync>> {
        tracing::trace!("Requesting bean: '{}'", name);
        self.singletons
            .read()
            .get(name)
            .map(|entry| Arc::clone(&entry.instance))
            .ok_or_else(|| {
                tracing::debug!("Bean '{}' not found in registry", name);
                ContainerError::BeanNotFound(name.to_string())
            })
    }

    fn contains_bean(&self, name: &str) -> bool {
        self.singletons.read().contains_key(name)
    }

    fn bean_names(&self) -> Vec<String> {
        self.singletons.read().keys().cloned().collect()
    }

    fn is_primary(&self, name: &str) -> bool {
        self.singletons
            .read()
            .get(name)
            .map(|entry| entry.primary)
            .unwrap_or(false)
    }

    fn qualifiers(&self, name: &str) -> Vec<String> {
        self.singletons
            .read()
            .get(name)
            .map(|entry| entry.qualifiers.clone())
            .unwrap_or_default()
    }
}
