//! `Validated` 声明：验证分组
//!
//! 方法上的声明优先于类型上的声明；只有声明了 `Validated` 的类型才会被方法验证通知器代理。

use std::collections::HashMap;

use chimera_aop::Method;

/// 通过 inventory 静态注册的 `Validated` 声明
pub enum ValidatedRegistration {
    Type {
        type_name: &'static str,
        groups: &'static [&'static str],
    },
    Method {
        type_name: &'static str,
        method_name: &'static str,
        groups: &'static [&'static str],
    },
}

inventory::collect!(ValidatedRegistration);

/// 类型级和方法级的验证分组
#[derive(Debug, Clone, Default)]
pub struct ValidatedGroups {
    types: HashMap<String, Vec<String>>,
    methods: HashMap<(String, String), Vec<String>>,
}

fn to_groups<I, S>(groups: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    groups.into_iter().map(Into::into).collect()
}

impl ValidatedGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加载所有通过 inventory 注册的声明
    pub fn from_registry() -> Self {
        let mut validated = Self::new();
        for registration in inventory::iter::<ValidatedRegistration> {
            validated = match registration {
                ValidatedRegistration::Type { type_name, groups } => {
                    validated.validated_type(*type_name, groups.iter().copied())
                }
                ValidatedRegistration::Method {
                    type_name,
                    method_name,
                    groups,
                } => validated.validated_method(*type_name, *method_name, groups.iter().copied()),
            };
        }
        validated
    }

    /// 类型上的 `Validated`，分组为空时使用默认分组
    pub fn validated_type<I, S>(mut self, type_name: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.insert(type_name.into(), to_groups(groups));
        self
    }

    pub fn validated_method<I, S>(
        mut self,
        type_name: impl Into<String>,
        method_name: impl Into<String>,
        groups: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods
            .insert((type_name.into(), method_name.into()), to_groups(groups));
        self
    }

    pub fn is_validated_type(&self, target_type: &str) -> bool {
        self.types.contains_key(target_type)
    }

    /// 调用使用的分组：先找方法，再找目标类型，都没有时为空
    pub fn determine(&self, method: &Method, target_type: &str) -> Vec<String> {
        let method_level = [method.declaring_type(), target_type]
            .into_iter()
            .find_map(|type_name| {
                self.methods
                    .get(&(type_name.to_string(), method.name().to_string()))
            });
        method_level
            .or_else(|| self.types.get(target_type))
            .cloned()
            .unwrap_or_default()
    }
}
