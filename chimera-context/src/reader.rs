//! 元数据读取
//!
//! 解析器通过 [`MetadataReaderFactory`] 按类名获取元数据。

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::{ContextError, ContextResult};
use crate::metadata::{ClassMetadata, MetadataOrigin};

/// 按类名提供元数据
pub trait MetadataReaderFactory: Send + Sync {
    fn get_metadata(&self, class_name: &str) -> ContextResult<Arc<ClassMetadata>>;

    /// 已知的全部类名，供组件扫描使用
    fn class_names(&self) -> Vec<String>;
}

#[derive(Deserialize)]
struct MetadataDocument {
    #[serde(default, rename = "class")]
    classes: Vec<ClassMetadata>,
}

/// 内存中的元数据注册表
///
/// 可以直接注册，也可以从 TOML 描述文件加载：
///
/// ```toml
/// [[class]]
/// name = "app.AppConfig"
/// super-class = "app.BaseConfig"
///
/// [[class.annotation]]
/// type = "Import"
/// value = ["app.DataConfig"]
///
/// [[class.method]]
/// name = "dataSource"
/// [[class.method.annotation]]
/// type = "Bean"
/// ```
#[derive(Default)]
pub struct SimpleMetadataReaderFactory {
    classes: RwLock<IndexMap<String, Arc<ClassMetadata>>>,
}

impl SimpleMetadataReaderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, metadata: ClassMetadata) -> &Self {
        tracing::trace!("Registering metadata for '{}'", metadata.class_name());
        self.classes
            .write()
            .insert(metadata.class_name().to_string(), Arc::new(metadata));
        self
    }

    pub fn with(self, metadata: ClassMetadata) -> Self {
        self.register(metadata);
        self
    }

    /// 解析 TOML 描述，方法顺序为声明顺序
    pub fn load_str(&self, content: &str, source_name: &str) -> ContextResult<usize> {
        let document: MetadataDocument =
            toml::from_str(content).map_err(|e| ContextError::InvalidMetadata {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
        let count = document.classes.len();
        for mut class in document.classes {
            class.set_origin(MetadataOrigin::Parsed);
            self.register(class);
        }
        tracing::debug!("Loaded {} class descriptor(s) from '{}'", count, source_name);
        Ok(count)
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> ContextResult<usize> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ContextError::InvalidMetadata {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.load_str(&content, &path.display().to_string())
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }
}

impl MetadataReaderFactory for SimpleMetadataReaderFactory {
    fn get_metadata(&self, class_name: &str) -> ContextResult<Arc<ClassMetadata>> {
        self.classes
            .read()
            .get(class_name)
            .cloned()
            .ok_or_else(|| ContextError::ClassNotFound(class_name.to_string()))
    }

    fn class_names(&self) -> Vec<String> {
        self.classes.read().keys().cloned().collect()
    }
}

/// 缓存委托工厂的读取结果
pub struct CachingMetadataReaderFactory {
    delegate: Arc<dyn MetadataReaderFactory>,
    cache: RwLock<HashMap<String, Arc<ClassMetadata>>>,
}

impl CachingMetadataReaderFactory {
    pub fn new(delegate: Arc<dyn MetadataReaderFactory>) -> Self {
        Self {
            delegate,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }
}

impl MetadataReaderFactory for CachingMetadataReaderFactory {
    fn get_metadata(&self, class_name: &str) -> ContextResult<Arc<ClassMetadata>> {
        if let Some(cached) = self.cache.read().get(class_name) {
            return Ok(Arc::clone(cached));
        }
        let metadata = self.delegate.get_metadata(class_name)?;
        self.cache
            .write()
            .entry(class_name.to_string())
            .or_insert_with(|| Arc::clone(&metadata));
        Ok(metadata)
    }

    fn class_names(&self) -> Vec<String> {
        self.delegate.class_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::annotations::{BEAN, IMPORT};
    use crate::metadata::AnnotatedMetadata;
    use std::io::Write;

    const DESCRIPTORS: &str = r#"
[[class]]
name = "app.AppConfig"
super-class = "app.BaseConfig"
interfaces = ["app.Defaults"]

[[class.annotation]]
type = "Configuration"
proxyBeanMethods = false

[[class.annotation]]
type = "Import"
value = ["app.DataConfig", "app.WebConfig"]

[[class.annotation]]
type = "Order"
value = 3

[[class.method]]
name = "zeta"
[[class.method.annotation]]
type = "Bean"

[[class.method]]
name = "alpha"
final = true
[[class.method.annotation]]
type = "Bean"

[[class]]
name = "app.Defaults"
interface = true
"#;

    #[test]
    fn test_load_toml_descriptors() {
        let factory = SimpleMetadataReaderFactory::new();
        assert_eq!(factory.load_str(DESCRIPTORS, "classes.toml").unwrap(), 2);

        let config = factory.get_metadata("app.AppConfig").unwrap();
        assert_eq!(config.origin(), MetadataOrigin::Parsed);
        assert_eq!(config.super_class(), Some("app.BaseConfig"));
        assert_eq!(config.order(), 3);
        assert!(!config.is_full_configuration());
        assert_eq!(
            config.annotation(IMPORT).unwrap().strings("value"),
            vec!["app.DataConfig", "app.WebConfig"]
        );
        let names: Vec<_> = config.annotated_methods(BEAN).iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert!(!config.methods()[1].is_overridable());

        assert!(factory.get_metadata("app.Defaults").unwrap().is_interface());
        assert!(matches!(
            factory.get_metadata("app.Missing"),
            Err(ContextError::ClassNotFound(_))
        ));
    }

    #[test]
    fn test_load_file_and_invalid_descriptor() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DESCRIPTORS.as_bytes()).unwrap();
        let factory = SimpleMetadataReaderFactory::new();
        assert_eq!(factory.load_file(file.path()).unwrap(), 2);

        assert!(matches!(
            factory.load_str("[[class]]\ninterface = true", "broken.toml"),
            Err(ContextError::InvalidMetadata { .. })
        ));
    }

    #[test]
    fn test_caching_factory() {
        let delegate = Arc::new(SimpleMetadataReaderFactory::new().with(ClassMetadata::configuration("app.A")));
        let caching = CachingMetadataReaderFactory::new(delegate.clone());

        let first = caching.get_metadata("app.A").unwrap();
        delegate.register(ClassMetadata::new("app.A"));
        let second = caching.get_metadata("app.A").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(caching.cached_count(), 1);

        caching.clear_cache();
        assert!(!caching.get_metadata("app.A").unwrap().is_configuration_candidate());
        assert!(caching.get_metadata("app.Missing").is_err());
        assert_eq!(caching.class_names(), vec!["app.A"]);
    }
}
