//! 方法描述
//!
//! 代理没有运行时反射可用，方法以描述符的形式显式声明。

use std::fmt;

/// 方法描述符
///
/// 同一声明类型中名称和参数类型相同的方法视为同一方法
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Method {
    declaring_type: String,
    name: String,
    parameter_types: Vec<String>,
    return_type: String,
    is_final: bool,
    is_bridge: bool,
}

impl Method {
    pub fn new(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            parameter_types: Vec::new(),
            return_type: "()".to_string(),
            is_final: false,
            is_bridge: false,
        }
    }

    pub fn with_params<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn returns(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = return_type.into();
        self
    }

    /// 不可被子类代理覆盖的方法
    pub fn final_method(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// 泛型擦除后生成的桥接方法
    pub fn bridge(mut self) -> Self {
        self.is_bridge = true;
        self
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_types.len()
    }

    pub fn return_type(&self) -> &str {
        &self.return_type
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn is_bridge(&self) -> bool {
        self.is_bridge
    }

    /// 以另一个声明类型重新声明同一方法
    pub fn redeclared_on(&self, declaring_type: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            ..self.clone()
        }
    }

    /// 名称与参数类型相同（忽略声明类型）
    pub fn same_signature(&self, other: &Method) -> bool {
        self.name == other.name && self.parameter_types == other.parameter_types
    }

    /// `OrderService.charge(u64,String)`
    pub fn signature(&self) -> String {
        format!(
            "{}.{}({})",
            self.declaring_type,
            self.name,
            self.parameter_types.join(",")
        )
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({} -> {})", self.signature(), self.return_type)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}
