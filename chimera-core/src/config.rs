use crate::error::{ApplicationError, ApplicationResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// 配置值类型
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Int(i) => Some(*i as f64),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => f.write_str(s),
            ConfigValue::Int(i) => write!(f, "{}", i),
            ConfigValue::Float(v) => write!(f, "{}", v),
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(","))
            }
            ConfigValue::Object(_) => f.write_str("{...}"),
        }
    }
}

/// 配置源 trait
pub trait PropertySource: Send + Sync {
    /// 配置源名称，在 Environment 中唯一
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<ConfigValue>;

    fn keys(&self) -> Vec<String>;

    /// 配置源优先级（数字越大优先级越高），仅用于 add_property_source
    fn priority(&self) -> i32 {
        0
    }
}

const PLACEHOLDER_PREFIX: &str = "${";
const PLACEHOLDER_SUFFIX: &str = "}";
const VALUE_SEPARATOR: char = ':';
const MAX_PLACEHOLDER_DEPTH: usize = 16;

/// Environment - 配置管理器
///
/// 维护一个有序的配置源列表，查找时从前往后，第一个命中的值生效。
pub struct Environment {
    sources: RwLock<Vec<Box<dyn PropertySource>>>,
    active_profiles: RwLock<Vec<String>>,
    default_profiles: RwLock<Vec<String>>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("sources", &self.source_names())
            .field("active_profiles", &*self.active_profiles.read())
            .finish()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            active_profiles: RwLock::new(Vec::new()),
            default_profiles: RwLock::new(vec!["default".to_string()]),
        }
    }

    /// 按优先级插入配置源（优先级高的排在前面，同优先级保持插入顺序）
    pub fn add_property_source(&self, source: Box<dyn PropertySource>) {
        let mut sources = self.sources.write();
        sources.retain(|s| s.name() != source.name());
        let position = sources
            .iter()
            .position(|s| s.priority() < source.priority())
            .unwrap_or(sources.len());
        sources.insert(position, source);
    }

    /// 添加到最前（最高优先级）
    pub fn add_first(&self, source: Box<dyn PropertySource>) {
        let mut sources = self.sources.write();
        sources.retain(|s| s.name() != source.name());
        sources.insert(0, source);
    }

    /// 添加到最后（最低优先级）
    pub fn add_last(&self, source: Box<dyn PropertySource>) {
        let mut sources = self.sources.write();
        sources.retain(|s| s.name() != source.name());
        sources.push(source);
    }

    /// 添加到指定配置源之前，relative 不存在时追加到最后
    pub fn add_before(&self, relative: &str, source: Box<dyn PropertySource>) {
        let mut sources = self.sources.write();
        sources.retain(|s| s.name() != source.name());
        let position = sources
            .iter()
            .position(|s| s.name() == relative)
            .unwrap_or(sources.len());
        sources.insert(position, source);
    }

    /// 用 f 的返回值原位替换指定配置源
    ///
    /// 返回 false 表示配置源不存在
    pub fn replace_with<F>(&self, name: &str, f: F) -> bool
    where
        F: FnOnce(Box<dyn PropertySource>) -> Box<dyn PropertySource>,
    {
        let mut sources = self.sources.write();
        match sources.iter().position(|s| s.name() == name) {
            Some(index) => {
                let existing = sources.remove(index);
                sources.insert(index, f(existing));
                true
            }
            None => false,
        }
    }

    pub fn contains_source(&self, name: &str) -> bool {
        self.sources.read().iter().any(|s| s.name() == name)
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.read().iter().map(|s| s.name().to_string()).collect()
    }

    /// 获取配置值
    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        let sources = self.sources.read();
        for source in sources.iter() {
            if let Some(value) = source.get(key) {
                tracing::trace!("Config '{}' found in source '{}'", key, source.name());
                return Some(value);
            }
        }
        tracing::trace!("Config '{}' not found in any source", key);
        None
    }

    pub fn contains_property(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// 获取字符串数组配置
    ///
    /// 支持 TOML 数组和逗号分隔字符串两种写法
    pub fn get_string_array(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            ConfigValue::Array(arr) => Some(arr.iter().map(|v| v.to_string()).collect()),
            ConfigValue::String(s) => Some(
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn set_active_profiles(&self, profiles: Vec<String>) {
        *self.active_profiles.write() = profiles;
    }

    pub fn add_active_profile(&self, profile: impl Into<String>) {
        self.active_profiles.write().push(profile.into());
    }

    pub fn get_active_profiles(&self) -> Vec<String> {
        self.active_profiles.read().clone()
    }

    pub fn set_default_profiles(&self, profiles: Vec<String>) {
        *self.default_profiles.write() = profiles;
    }

    /// 检查 profile 表达式是否被接受
    ///
    /// 支持 "!name" 取反；没有激活任何 profile 时使用默认 profile
    pub fn accepts_profiles(&self, profiles: &[String]) -> bool {
        let active = self.active_profiles.read();
        let effective: Vec<String> = if active.is_empty() {
            self.default_profiles.read().clone()
        } else {
            active.clone()
        };
        profiles.iter().any(|expr| match expr.strip_prefix('!') {
            Some(negated) => !effective.iter().any(|p| p == negated),
            None => effective.iter().any(|p| p == expr),
        })
    }

    /// 解析 ${key:default} 占位符，无法解析的占位符原样保留
    pub fn resolve_placeholders(&self, text: &str) -> String {
        self.do_resolve(text, false, 0)
            .unwrap_or_else(|_| text.to_string())
    }

    /// 解析 ${key:default} 占位符，无法解析时报错
    pub fn resolve_required_placeholders(&self, text: &str) -> ApplicationResult<String> {
        self.do_resolve(text, true, 0)
    }

    fn do_resolve(&self, text: &str, required: bool, depth: usize) -> ApplicationResult<String> {
        if depth > MAX_PLACEHOLDER_DEPTH {
            return Err(ApplicationError::UnresolvablePlaceholder {
                placeholder: text.to_string(),
                value: text.to_string(),
            });
        }

        let mut result = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(PLACEHOLDER_PREFIX) {
            result.push_str(&rest[..start]);
            let after_prefix = &rest[start + PLACEHOLDER_PREFIX.len()..];
            let Some(end) = after_prefix.find(PLACEHOLDER_SUFFIX) else {
                result.push_str(&rest[start..]);
                return Ok(result);
            };

            let placeholder = &after_prefix[..end];
            let (key, default) = match placeholder.split_once(VALUE_SEPARATOR) {
                Some((key, default)) => (key, Some(default)),
                None => (placeholder, None),
            };

            match self.get_string(key).or_else(|| default.map(String::from)) {
                Some(value) => {
                    let resolved = self.do_resolve(&value, required, depth + 1)?;
                    result.push_str(&resolved);
                }
                None if required => {
                    return Err(ApplicationError::UnresolvablePlaceholder {
                        placeholder: key.to_string(),
                        value: text.to_string(),
                    });
                }
                None => {
                    result.push_str(&rest[start..start + PLACEHOLDER_PREFIX.len() + end + 1]);
                }
            }
            rest = &after_prefix[end + PLACEHOLDER_SUFFIX.len()..];
        }
        result.push_str(rest);
        Ok(result)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Property Sources ==========

/// 环境变量配置源
pub struct EnvironmentPropertySource {
    prefix: String,
    priority: i32,
}

impl EnvironmentPropertySource {
    /// 创建环境变量配置源，例如前缀 "APP_" 时 database.url 对应 APP_DATABASE_URL
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            priority: 100,
        }
    }

    fn env_to_key(&self, env_key: &str) -> String {
        env_key
            .strip_prefix(&self.prefix)
            .unwrap_or(env_key)
            .to_lowercase()
            .replace('_', ".")
    }

    fn key_to_env(&self, key: &str) -> String {
        format!(
            "{}{}",
            self.prefix,
            key.replace(['.', '-'], "_").to_uppercase()
        )
    }
}

impl PropertySource for EnvironmentPropertySource {
    fn name(&self) -> &str {
        "systemEnvironment"
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        std::env::var(self.key_to_env(key))
            .ok()
            .map(ConfigValue::String)
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars()
            .filter(|(k, _)| k.starts_with(&self.prefix))
            .map(|(k, _)| self.env_to_key(&k))
            .collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// TOML 配置源
pub struct TomlPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl TomlPropertySource {
    /// 从文件加载
    pub fn from_file(path: impl AsRef<Path>) -> ApplicationResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ApplicationError::ConfigLoadFailed(format!("cannot read {:?}: {}", path, e))
        })?;
        Self::parse(&content, path.to_string_lossy().to_string())
    }

    /// 从字符串解析
    pub fn parse(content: &str, name: impl Into<String>) -> ApplicationResult<Self> {
        let value: toml::Value = toml::from_str(content)
            .map_err(|e| ApplicationError::ConfigLoadFailed(format!("invalid TOML: {}", e)))?;

        let mut properties = HashMap::new();
        flatten_toml(&value, String::new(), &mut properties);

        Ok(Self {
            name: name.into(),
            properties,
            priority: 0,
        })
    }

    /// 以新名称返回同一组配置
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// 展平 TOML 结构：{ database: { url: "x" } } -> { "database.url": "x" }
fn flatten_toml(value: &toml::Value, prefix: String, result: &mut HashMap<String, ConfigValue>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_toml(val, key, result);
            }
        }
        other => {
            result.insert(prefix, toml_to_config(other));
        }
    }
}

fn toml_to_config(value: &toml::Value) -> ConfigValue {
    match value {
        toml::Value::String(s) => ConfigValue::String(s.clone()),
        toml::Value::Integer(i) => ConfigValue::Int(*i),
        toml::Value::Float(f) => ConfigValue::Float(*f),
        toml::Value::Boolean(b) => ConfigValue::Bool(*b),
        toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
        toml::Value::Array(arr) => ConfigValue::Array(arr.iter().map(toml_to_config).collect()),
        toml::Value::Table(table) => ConfigValue::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_config(v)))
                .collect(),
        ),
    }
}

impl PropertySource for TomlPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 内存配置源（用于测试或运行时配置）
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
            priority: 50,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 组合配置源：同名配置源被多次加载时合并为一个，前面的成员优先
pub struct CompositePropertySource {
    name: String,
    members: Vec<Box<dyn PropertySource>>,
}

impl CompositePropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// 追加成员（最低优先级）
    pub fn add_property_source(&mut self, source: Box<dyn PropertySource>) {
        self.members.push(source);
    }

    /// 插入成员（最高优先级）
    pub fn add_first_property_source(&mut self, source: Box<dyn PropertySource>) {
        self.members.insert(0, source);
    }

    pub fn member_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.name().to_string()).collect()
    }
}

impl PropertySource for CompositePropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.members.iter().find_map(|m| m.get(key))
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for member in &self.members {
            for key in member.keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }
}
