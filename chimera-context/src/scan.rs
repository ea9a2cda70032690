//! 组件扫描

use std::collections::HashSet;
use std::sync::Arc;

use chimera_core::utils::class_names::{is_builtin_type_name, is_in_package, package_name};
use chimera_core::utils::naming::default_bean_name;

use crate::condition::ConditionEvaluator;
use crate::error::ContextResult;
use crate::metadata::annotations::{COMPONENT, CONFIGURATION};
use crate::metadata::{AnnotatedMetadata, AnnotationDescriptor, ClassMetadata};
use crate::reader::MetadataReaderFactory;

/// 扫描得到的组件
#[derive(Debug, Clone)]
pub struct ScannedCandidate {
    pub bean_name: String,
    pub metadata: Arc<ClassMetadata>,
}

/// 处理一个 `ComponentScan` 注解
pub trait ComponentScanner: Send + Sync {
    fn scan(&self, component_scan: &AnnotationDescriptor, declaring_class: &str) -> ContextResult<Vec<ScannedCandidate>>;
}

/// 在已知元数据中按包前缀扫描
///
/// 基础包为空时使用声明类所在的包；声明类自身不会被扫描到。
pub struct PackageComponentScanner {
    reader: Arc<dyn MetadataReaderFactory>,
    conditions: Arc<ConditionEvaluator>,
}

impl PackageComponentScanner {
    pub fn new(reader: Arc<dyn MetadataReaderFactory>, conditions: Arc<ConditionEvaluator>) -> Self {
        Self { reader, conditions }
    }

    fn base_packages(&self, component_scan: &AnnotationDescriptor, declaring_class: &str) -> Vec<String> {
        let environment = self.conditions.environment();
        let mut packages: Vec<String> = component_scan
            .strings("basePackages")
            .into_iter()
            .chain(component_scan.strings("value"))
            .flat_map(|p| {
                environment
                    .resolve_placeholders(&p)
                    .split([',', ';'])
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .collect();
        packages.extend(
            component_scan
                .strings("basePackageClasses")
                .iter()
                .map(|c| package_name(c).to_string()),
        );
        if packages.is_empty() {
            packages.push(package_name(declaring_class).to_string());
        }
        packages
    }

    /// 直接或通过元注解标注了 `Component`
    fn stereotype<'a>(&self, metadata: &'a ClassMetadata) -> Option<&'a AnnotationDescriptor> {
        let mut visited = HashSet::new();
        metadata
            .annotations()
            .iter()
            .find(|a| self.is_component_annotation(a.type_name(), &mut visited))
    }

    fn is_component_annotation(&self, type_name: &str, visited: &mut HashSet<String>) -> bool {
        if type_name == COMPONENT || type_name == CONFIGURATION {
            return true;
        }
        if is_builtin_type_name(type_name) || !visited.insert(type_name.to_string()) {
            return false;
        }
        match self.reader.get_metadata(type_name) {
            Ok(annotation_type) => annotation_type
                .annotations()
                .iter()
                .any(|meta| self.is_component_annotation(meta.type_name(), visited)),
            Err(_) => false,
        }
    }
}

impl ComponentScanner for PackageComponentScanner {
    fn scan(&self, component_scan: &AnnotationDescriptor, declaring_class: &str) -> ContextResult<Vec<ScannedCandidate>> {
        let packages = self.base_packages(component_scan, declaring_class);
        tracing::debug!("Scanning packages {:?} for components", packages);

        let mut candidates = Vec::new();
        for class_name in self.reader.class_names() {
            if class_name == declaring_class || !packages.iter().any(|p| is_in_package(&class_name, p)) {
                continue;
            }
            let metadata = self.reader.get_metadata(&class_name)?;
            if !metadata.is_concrete() || metadata.is_annotation() {
                continue;
            }
            let Some(stereotype) = self.stereotype(&metadata) else {
                continue;
            };
            if self.conditions.should_skip_class(&metadata, None)? {
                tracing::trace!("Ignored '{}' because of its conditions", class_name);
                continue;
            }
            let bean_name = stereotype
                .string("value")
                .filter(|name| !name.is_empty())
                .map(String::from)
                .unwrap_or_else(|| default_bean_name(&class_name));
            tracing::trace!("Identified candidate component '{}' as '{}'", class_name, bean_name);
            candidates.push(ScannedCandidate {
                bean_name,
                metadata: Arc::clone(&metadata),
            });
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::annotations::{COMPONENT_SCAN, PROFILE};
    use crate::reader::SimpleMetadataReaderFactory;
    use chimera_core::{ConfigValue, Environment, MapPropertySource};

    fn component(name: &str) -> ClassMetadata {
        ClassMetadata::new(name).annotated(AnnotationDescriptor::new(COMPONENT))
    }

    fn scanner() -> PackageComponentScanner {
        let reader = SimpleMetadataReaderFactory::new()
            .with(ClassMetadata::configuration("app.AppConfig"))
            .with(component("app.service.OrderService"))
            .with(
                ClassMetadata::new("app.service.Named")
                    .annotated(AnnotationDescriptor::new(COMPONENT).attr("value", "customName")),
            )
            .with(component("app.service.Base").abstract_class())
            .with(ClassMetadata::new("app.service.Helper"))
            .with(ClassMetadata::new("app.Service").annotation_type().annotated(AnnotationDescriptor::new(COMPONENT)))
            .with(ClassMetadata::new("app.repo.UserRepository").annotated(AnnotationDescriptor::new("app.Service")))
            .with(component("app.dev.DevOnly").annotated(AnnotationDescriptor::new(PROFILE).attr("value", "dev")))
            .with(component("other.External"));
        let env = Environment::new();
        env.add_last(Box::new(
            MapPropertySource::new("test").with_property("scan.extra", ConfigValue::String("app.dev".into())),
        ));
        PackageComponentScanner::new(
            Arc::new(reader),
            Arc::new(ConditionEvaluator::new(Arc::new(env))),
        )
    }

    fn bean_names(candidates: &[ScannedCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.bean_name.as_str()).collect()
    }

    #[test]
    fn test_scan_declaring_package() {
        let scan = AnnotationDescriptor::new(COMPONENT_SCAN);
        let candidates = scanner().scan(&scan, "app.AppConfig").unwrap();
        assert_eq!(bean_names(&candidates), vec!["orderService", "customName", "userRepository"]);
    }

    #[test]
    fn test_scan_explicit_packages_with_placeholders() {
        let scan = AnnotationDescriptor::new(COMPONENT_SCAN).attr("basePackages", vec!["app.service", "${scan.extra}"]);
        let candidates = scanner().scan(&scan, "app.AppConfig").unwrap();
        // app.dev 中的组件只在 dev profile 下注册
        assert_eq!(bean_names(&candidates), vec!["orderService", "customName"]);

        let scan = AnnotationDescriptor::new(COMPONENT_SCAN).attr("basePackageClasses", vec!["other.Marker"]);
        let candidates = scanner().scan(&scan, "app.AppConfig").unwrap();
        assert_eq!(bean_names(&candidates), vec!["external"]);
    }
}
