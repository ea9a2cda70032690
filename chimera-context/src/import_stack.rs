//! 导入栈与导入关系

use std::collections::HashSet;
use std::fmt;

use chimera_core::utils::class_names::short_name;
use indexmap::IndexMap;

/// 查询类是被谁导入的
pub trait ImportRegistry {
    /// 最近一次导入该类的配置类
    fn importing_class_for(&self, imported_class: &str) -> Option<&str>;

    /// 从所有导入关系中移除一次该导入方
    fn remove_importing_class(&mut self, importing_class: &str);
}

/// 正在处理的配置类栈，以及导入关系
#[derive(Debug, Default)]
pub struct ImportStack {
    stack: Vec<String>,
    imports: IndexMap<String, Vec<String>>,
}

impl ImportStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, class_name: impl Into<String>) {
        self.stack.push(class_name.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.stack.pop()
    }

    /// 栈顶，即当前正在处理的配置类
    pub fn peek(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.stack.iter().any(|c| c == class_name)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn register_import(&mut self, importing_class: &str, imported_class: &str) {
        self.imports
            .entry(imported_class.to_string())
            .or_default()
            .push(importing_class.to_string());
    }

    /// 类在栈上，且沿导入方链能回到自身
    pub fn is_chained_import_on_stack(&self, class_name: &str) -> bool {
        if !self.contains(class_name) {
            return false;
        }
        let mut visited = HashSet::new();
        let mut current = class_name;
        while let Some(importing) = self.importing_class_for(current) {
            if importing == class_name {
                return true;
            }
            if !visited.insert(importing) {
                return false;
            }
            current = importing;
        }
        false
    }
}

impl ImportRegistry for ImportStack {
    fn importing_class_for(&self, imported_class: &str) -> Option<&str> {
        self.imports
            .get(imported_class)
            .and_then(|importing| importing.last())
            .map(String::as_str)
    }

    fn remove_importing_class(&mut self, importing_class: &str) {
        for importing in self.imports.values_mut() {
            if let Some(index) = importing.iter().position(|c| c == importing_class) {
                importing.remove(index);
            }
        }
    }
}

/// `[A->B->C]`
impl fmt::Display for ImportStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.stack.iter().map(|c| short_name(c)).collect();
        write!(f, "[{}]", names.join("->"))
    }
}
