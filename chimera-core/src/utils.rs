//! Utility functions shared by the framework crates

/// Naming convention utilities for bean names
pub mod naming {
    /// Converts a PascalCase type name to camelCase for bean naming.
    ///
    /// ```
    /// use chimera_core::utils::naming::to_camel_case;
    ///
    /// assert_eq!(to_camel_case("UserService"), "userService");
    /// assert_eq!(to_camel_case(""), "");
    /// ```
    pub fn to_camel_case(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = String::with_capacity(s.len());
                result.extend(first.to_lowercase());
                result.push_str(chars.as_str());
                result
            }
        }
    }

    /// Default bean name for a class: camelCase of its short name.
    pub fn default_bean_name(class_name: &str) -> String {
        to_camel_case(super::class_names::short_name(class_name))
    }
}

/// Helpers for dotted / path-style class names (`com.acme.OrderService`, `app::OrderService`)
pub mod class_names {
    /// Prefixes of names that belong to the language runtime.
    const BUILTIN_PREFIXES: &[&str] = &["std::", "core::", "alloc::", "java.", "javax."];

    fn split_index(name: &str) -> Option<(usize, usize)> {
        let dot = name.rfind('.').map(|i| (i, 1));
        let path = name.rfind("::").map(|i| (i, 2));
        match (dot, path) {
            (Some(d), Some(p)) => Some(if d.0 > p.0 { d } else { p }),
            (d, p) => d.or(p),
        }
    }

    /// `com.acme.OrderService` -> `OrderService`
    pub fn short_name(name: &str) -> &str {
        match split_index(name) {
            Some((i, len)) => &name[i + len..],
            None => name,
        }
    }

    /// `com.acme.OrderService` -> `com.acme`
    pub fn package_name(name: &str) -> &str {
        match split_index(name) {
            Some((i, _)) => &name[..i],
            None => "",
        }
    }

    /// Whether the name refers to a runtime built-in type.
    pub fn is_builtin_type_name(name: &str) -> bool {
        BUILTIN_PREFIXES.iter().any(|p| name.starts_with(p))
    }

    /// `OrderService.charge`
    pub fn qualified_method_name(class_name: &str, method_name: &str) -> String {
        format!("{}.{}", short_name(class_name), method_name)
    }

    /// Whether `name` lives in `package` or one of its sub-packages.
    pub fn is_in_package(name: &str, package: &str) -> bool {
        if package.is_empty() {
            return true;
        }
        match name.strip_prefix(package) {
            Some(rest) => rest.starts_with('.') || rest.starts_with("::"),
            None => false,
        }
    }
}
