//! `PropertySource` 注解处理
//!
//! 按处理顺序把配置源加入 Environment：第一个追加到最后，之后的插入到
//! 上一个之前，后处理的优先级更高。同名配置源合并为组合配置源。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chimera_core::{CompositePropertySource, Environment, PropertySource, TomlPropertySource};

use crate::error::{ContextError, ContextResult};
use crate::metadata::AnnotationDescriptor;

/// 按位置加载配置源
pub trait PropertySourceLoader: Send + Sync {
    /// 位置不存在时返回 [`ContextError::ResourceNotFound`]
    fn load(&self, name: Option<&str>, location: &str) -> ContextResult<Box<dyn PropertySource>>;
}

/// 从 TOML 文件加载，位置可带 `file:` 前缀，相对路径基于 `base_dir`
#[derive(Debug, Clone, Default)]
pub struct TomlPropertySourceLoader {
    base_dir: Option<PathBuf>,
}

impl TomlPropertySourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    fn resolve(&self, location: &str) -> PathBuf {
        let path = Path::new(location.strip_prefix("file:").unwrap_or(location));
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl PropertySourceLoader for TomlPropertySourceLoader {
    fn load(&self, name: Option<&str>, location: &str) -> ContextResult<Box<dyn PropertySource>> {
        let path = self.resolve(location);
        if !path.is_file() {
            return Err(ContextError::ResourceNotFound(location.to_string()));
        }
        let source = TomlPropertySource::from_file(&path).map_err(|e| {
            ContextError::PropertySourceLoadFailed {
                location: location.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(Box::new(source.with_name(name.unwrap_or(location))))
    }
}

/// 把 `PropertySource` 注解加载进 Environment
pub struct PropertySourceProcessor {
    environment: Arc<Environment>,
    loader: Arc<dyn PropertySourceLoader>,
    names: Vec<String>,
}

impl PropertySourceProcessor {
    pub fn new(environment: Arc<Environment>, loader: Arc<dyn PropertySourceLoader>) -> Self {
        Self {
            environment,
            loader,
            names: Vec::new(),
        }
    }

    /// 已处理的配置源名称，按处理顺序
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn process(&mut self, annotation: &AnnotationDescriptor) -> ContextResult<()> {
        let name = annotation.string("name").filter(|n| !n.is_empty());
        let locations = annotation.strings("value");
        if locations.is_empty() {
            return Err(ContextError::InvalidMetadata {
                source_name: "PropertySource".to_string(),
                message: "at least one location is required".to_string(),
            });
        }
        let ignore_not_found = annotation.bool_or("ignoreResourceNotFound", false);

        for location in &locations {
            let loaded = self
                .environment
                .resolve_required_placeholders(location)
                .map_err(ContextError::from)
                .and_then(|resolved| self.loader.load(name, &resolved));
            match loaded {
                Ok(source) => self.add_property_source(source),
                Err(e @ (ContextError::ResourceNotFound(_) | ContextError::Application(_))) if ignore_not_found => {
                    tracing::info!("Properties location [{}] not resolvable: {}", location, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn add_property_source(&mut self, source: Box<dyn PropertySource>) {
        let name = source.name().to_string();
        if self.names.contains(&name) && self.environment.contains_source(&name) {
            tracing::debug!("Extending property source '{}'", name);
            self.environment.replace_with(&name, |existing| {
                let mut composite = CompositePropertySource::new(name.clone());
                composite.add_property_source(source);
                composite.add_property_source(existing);
                Box::new(composite)
            });
            return;
        }

        match self.names.last() {
            None => self.environment.add_last(source),
            Some(previous) => self.environment.add_before(previous, source),
        }
        tracing::debug!("Added property source '{}'", name);
        self.names.push(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::annotations::PROPERTY_SOURCE;
    use chimera_core::{ConfigValue, MapPropertySource};
    use std::fs;

    fn write(dir: &Path, file: &str, content: &str) {
        fs::write(dir.join(file), content).unwrap();
    }

    fn processor(dir: &Path) -> (Arc<Environment>, PropertySourceProcessor) {
        let env = Arc::new(Environment::new());
        env.add_first(Box::new(
            MapPropertySource::new("systemProperties").with_property("config.dir", ConfigValue::String(".".into())),
        ));
        let loader = Arc::new(TomlPropertySourceLoader::new().with_base_dir(dir));
        (Arc::clone(&env), PropertySourceProcessor::new(env, loader))
    }

    fn annotation(locations: Vec<&str>) -> AnnotationDescriptor {
        AnnotationDescriptor::new(PROPERTY_SOURCE).attr("value", locations)
    }

    #[test]
    fn test_later_sources_take_precedence() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.toml", "[app]\nname = \"a\"\nonly-a = true\n");
        write(dir.path(), "b.toml", "[app]\nname = \"b\"\n");
        let (env, mut processor) = processor(dir.path());

        processor.process(&annotation(vec!["a.toml"])).unwrap();
        processor.process(&annotation(vec!["${config.dir}/b.toml"])).unwrap();

        assert_eq!(env.source_names(), vec!["systemProperties", "./b.toml", "a.toml"]);
        assert_eq!(env.get_string("app.name").as_deref(), Some("b"));
        assert_eq!(env.get_bool("app.only-a"), Some(true));
    }

    #[test]
    fn test_same_name_becomes_composite() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.toml", "key = \"a\"\nonly-a = 1\n");
        write(dir.path(), "b.toml", "key = \"b\"\n");
        let (env, mut processor) = processor(dir.path());

        processor
            .process(&annotation(vec!["a.toml"]).attr("name", "shared"))
            .unwrap();
        processor
            .process(&annotation(vec!["b.toml"]).attr("name", "shared"))
            .unwrap();

        assert_eq!(env.source_names(), vec!["systemProperties", "shared"]);
        assert_eq!(env.get_string("key").as_deref(), Some("b"));
        assert_eq!(env.get_i64("only-a"), Some(1));
        assert_eq!(processor.names(), ["shared"]);
    }

    #[test]
    fn test_missing_location() {
        let dir = tempfile::tempdir().unwrap();
        let (env, mut processor) = processor(dir.path());

        assert!(matches!(
            processor.process(&annotation(vec!["missing.toml"])),
            Err(ContextError::ResourceNotFound(_))
        ));
        processor
            .process(&annotation(vec!["missing.toml", "${undefined.dir}/x.toml"]).attr("ignoreResourceNotFound", true))
            .unwrap();
        assert_eq!(env.source_names(), vec!["systemProperties"]);

        assert!(matches!(
            processor.process(&AnnotationDescriptor::new(PROPERTY_SOURCE)),
            Err(ContextError::InvalidMetadata { .. })
        ));
    }
}
