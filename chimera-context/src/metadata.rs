//! 类元数据模型
//!
//! 配置解析只依赖元数据，不加载任何类型。元数据有两种来源：
//! - `Introspected`：运行时自省得到，方法顺序不可靠
//! - `Parsed`：从描述文件按声明顺序解析，方法顺序即声明顺序

use std::collections::BTreeMap;

use chimera_core::order::LOWEST_PRECEDENCE;
use serde::Deserialize;

/// 框架识别的注解名
pub mod annotations {
    pub const CONFIGURATION: &str = "Configuration";
    pub const COMPONENT: &str = "Component";
    pub const COMPONENT_SCAN: &str = "ComponentScan";
    pub const IMPORT: &str = "Import";
    pub const IMPORT_RESOURCE: &str = "ImportResource";
    pub const PROPERTY_SOURCE: &str = "PropertySource";
    pub const BEAN: &str = "Bean";
    pub const CONDITIONAL: &str = "Conditional";
    pub const PROFILE: &str = "Profile";
    pub const ORDER: &str = "Order";

    /// 框架自身的注解，不会声明导入
    pub fn is_framework_annotation(type_name: &str) -> bool {
        [
            CONFIGURATION,
            COMPONENT,
            COMPONENT_SCAN,
            IMPORT,
            IMPORT_RESOURCE,
            PROPERTY_SOURCE,
            BEAN,
            CONDITIONAL,
            PROFILE,
            ORDER,
        ]
        .contains(&type_name)
    }
}

use annotations::*;

/// 元数据来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataOrigin {
    Introspected,
    #[default]
    Parsed,
}

/// 注解属性值
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Integer(i64),
    String(String),
    Strings(Vec<String>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// 单个字符串视为只有一个元素的数组
    pub fn strings(&self) -> Vec<String> {
        match self {
            AttributeValue::String(s) => vec![s.clone()],
            AttributeValue::Strings(items) => items.clone(),
            _ => Vec::new(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<Vec<&str>> for AttributeValue {
    fn from(value: Vec<&str>) -> Self {
        AttributeValue::Strings(value.into_iter().map(String::from).collect())
    }
}

/// 一个注解实例
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnnotationDescriptor {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(flatten)]
    attributes: BTreeMap<String, AttributeValue>,
}

impl AnnotationDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(AttributeValue::as_str)
    }

    pub fn strings(&self, name: &str) -> Vec<String> {
        self.attribute(name).map(AttributeValue::strings).unwrap_or_default()
    }

    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.attribute(name)
            .and_then(AttributeValue::as_bool)
            .unwrap_or(default)
    }
}

/// 带注解的元素：类或方法
pub trait AnnotatedMetadata {
    fn annotations(&self) -> &[AnnotationDescriptor];

    fn is_annotated(&self, type_name: &str) -> bool {
        self.annotations().iter().any(|a| a.type_name == type_name)
    }

    fn annotation(&self, type_name: &str) -> Option<&AnnotationDescriptor> {
        self.annotations().iter().find(|a| a.type_name == type_name)
    }

    /// 可重复注解的所有实例
    fn annotations_of<'a>(&'a self, type_name: &'a str) -> Box<dyn Iterator<Item = &'a AnnotationDescriptor> + 'a> {
        Box::new(
            self.annotations()
                .iter()
                .filter(move |a| a.type_name == type_name),
        )
    }
}

/// 方法元数据
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MethodMetadata {
    name: String,
    #[serde(default, rename = "annotation")]
    annotations: Vec<AnnotationDescriptor>,
    #[serde(default, rename = "abstract")]
    is_abstract: bool,
    #[serde(default, rename = "static")]
    is_static: bool,
    #[serde(default, rename = "final")]
    is_final: bool,
    #[serde(default, rename = "private")]
    is_private: bool,
}

impl MethodMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotations: Vec::new(),
            is_abstract: false,
            is_static: false,
            is_final: false,
            is_private: false,
        }
    }

    pub fn annotated(mut self, annotation: AnnotationDescriptor) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// `Bean` 方法的简写
    pub fn bean(name: impl Into<String>) -> Self {
        Self::new(name).annotated(AnnotationDescriptor::new(BEAN))
    }

    pub fn abstract_method(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn final_method(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn private_method(mut self) -> Self {
        self.is_private = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// 能否被代理子类覆盖
    pub fn is_overridable(&self) -> bool {
        !self.is_final && !self.is_private
    }
}

impl AnnotatedMetadata for MethodMetadata {
    fn annotations(&self) -> &[AnnotationDescriptor] {
        &self.annotations
    }
}

/// 类元数据
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClassMetadata {
    #[serde(rename = "name")]
    class_name: String,
    #[serde(skip)]
    origin: MetadataOrigin,
    #[serde(default, rename = "interface")]
    is_interface: bool,
    #[serde(default, rename = "abstract")]
    is_abstract: bool,
    #[serde(default, rename = "final")]
    is_final: bool,
    #[serde(default, rename = "annotation-type")]
    is_annotation: bool,
    #[serde(default)]
    super_class: Option<String>,
    #[serde(default)]
    interfaces: Vec<String>,
    #[serde(default)]
    member_classes: Vec<String>,
    #[serde(default, rename = "annotation")]
    annotations: Vec<AnnotationDescriptor>,
    #[serde(default, rename = "method")]
    methods: Vec<MethodMetadata>,
}

impl ClassMetadata {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            origin: MetadataOrigin::Parsed,
            is_interface: false,
            is_abstract: false,
            is_final: false,
            is_annotation: false,
            super_class: None,
            interfaces: Vec::new(),
            member_classes: Vec::new(),
            annotations: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// `Configuration` 类的简写
    pub fn configuration(class_name: impl Into<String>) -> Self {
        Self::new(class_name).annotated(AnnotationDescriptor::new(CONFIGURATION))
    }

    pub fn introspected(mut self) -> Self {
        self.origin = MetadataOrigin::Introspected;
        self
    }

    pub fn annotated(mut self, annotation: AnnotationDescriptor) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// 添加 `Import` 注解
    pub fn imports(self, class_names: Vec<&str>) -> Self {
        self.annotated(AnnotationDescriptor::new(IMPORT).attr("value", class_names))
    }

    pub fn extends(mut self, super_class: impl Into<String>) -> Self {
        self.super_class = Some(super_class.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn member(mut self, class_name: impl Into<String>) -> Self {
        self.member_classes.push(class_name.into());
        self
    }

    pub fn method(mut self, method: MethodMetadata) -> Self {
        self.methods.push(method);
        self
    }

    pub fn interface(mut self) -> Self {
        self.is_interface = true;
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn final_class(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn annotation_type(mut self) -> Self {
        self.is_annotation = true;
        self
    }

    pub(crate) fn set_origin(&mut self, origin: MetadataOrigin) {
        self.origin = origin;
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn origin(&self) -> MetadataOrigin {
        self.origin
    }

    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn is_annotation(&self) -> bool {
        self.is_annotation
    }

    /// 可以独立实例化：非接口且非抽象
    pub fn is_concrete(&self) -> bool {
        !self.is_interface && !self.is_abstract
    }

    pub fn super_class(&self) -> Option<&str> {
        self.super_class.as_deref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn member_classes(&self) -> &[String] {
        &self.member_classes
    }

    pub fn methods(&self) -> &[MethodMetadata] {
        &self.methods
    }

    pub fn annotated_methods(&self, type_name: &str) -> Vec<&MethodMetadata> {
        self.methods
            .iter()
            .filter(|m| m.is_annotated(type_name))
            .collect()
    }

    pub fn has_annotated_methods(&self, type_name: &str) -> bool {
        self.methods.iter().any(|m| m.is_annotated(type_name))
    }

    /// `Order` 注解的值，未声明时为最低优先级
    pub fn order(&self) -> i32 {
        self.annotation(ORDER)
            .and_then(|a| a.attribute("value"))
            .and_then(AttributeValue::as_i64)
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(LOWEST_PRECEDENCE)
    }

    /// `Component` 或 `Configuration`
    pub fn is_component(&self) -> bool {
        self.is_annotated(COMPONENT) || self.is_annotated(CONFIGURATION)
    }

    /// `Configuration` 且未关闭 Bean 方法代理
    pub fn is_full_configuration(&self) -> bool {
        self.annotation(CONFIGURATION)
            .map(|a| a.bool_or("proxyBeanMethods", true))
            .unwrap_or(false)
    }

    /// 是否需要作为配置类处理
    pub fn is_configuration_candidate(&self) -> bool {
        if self.is_interface || self.is_annotation {
            return false;
        }
        [CONFIGURATION, COMPONENT, COMPONENT_SCAN, IMPORT, IMPORT_RESOURCE]
            .iter()
            .any(|a| self.is_annotated(a))
            || self.has_annotated_methods(BEAN)
    }
}

impl AnnotatedMetadata for ClassMetadata {
    fn annotations(&self) -> &[AnnotationDescriptor] {
        &self.annotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_candidate() {
        assert!(ClassMetadata::configuration("app.AppConfig").is_configuration_candidate());
        assert!(ClassMetadata::new("app.Beans")
            .method(MethodMetadata::bean("dataSource"))
            .is_configuration_candidate());
        assert!(!ClassMetadata::new("app.Plain").is_configuration_candidate());
        assert!(!ClassMetadata::configuration("app.Api").interface().is_configuration_candidate());
    }

    #[test]
    fn test_full_configuration() {
        assert!(ClassMetadata::configuration("app.AppConfig").is_full_configuration());
        let lite = ClassMetadata::new("app.LiteConfig")
            .annotated(AnnotationDescriptor::new(CONFIGURATION).attr("proxyBeanMethods", false));
        assert!(!lite.is_full_configuration());
        assert!(!ClassMetadata::new("app.Component")
            .annotated(AnnotationDescriptor::new(COMPONENT))
            .is_full_configuration());
    }

    #[test]
    fn test_order_and_attributes() {
        let class = ClassMetadata::configuration("app.AppConfig")
            .annotated(AnnotationDescriptor::new(ORDER).attr("value", 5i64))
            .imports(vec!["app.A", "app.B"]);
        assert_eq!(class.order(), 5);
        assert_eq!(ClassMetadata::new("app.X").order(), LOWEST_PRECEDENCE);
        assert_eq!(class.annotation(IMPORT).unwrap().strings("value"), vec!["app.A", "app.B"]);
        assert_eq!(AttributeValue::from("one").strings(), vec!["one"]);
    }

    #[test]
    fn test_annotations_of_repeatable() {
        let class = ClassMetadata::new("app.Config")
            .annotated(AnnotationDescriptor::new(PROPERTY_SOURCE).attr("value", "a.toml"))
            .annotated(AnnotationDescriptor::new(PROPERTY_SOURCE).attr("value", "b.toml"));
        let locations: Vec<_> = class
            .annotations_of(PROPERTY_SOURCE)
            .filter_map(|a| a.string("value"))
            .collect();
        assert_eq!(locations, vec!["a.toml", "b.toml"]);
    }

    #[test]
    fn test_method_modifiers() {
        assert!(MethodMetadata::bean("a").is_overridable());
        assert!(!MethodMetadata::bean("a").final_method().is_overridable());
        assert!(!MethodMetadata::bean("a").private_method().is_overridable());
    }
}
