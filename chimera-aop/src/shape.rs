//! 返回值形态适配
//!
//! 一些返回类型把真正的值包在容器里（`Option<T>`、`Result<T, E>`）。
//! 缓存需要存取内部的值，事务需要识别携带失败的返回值。
//! 新的容器形态只需实现 [`ResultShape`] 并注册到 [`ResultShapes`]。

use crate::method::Method;
use crate::throwable::{ErrorType, Throwable};
use crate::Value;
use serde_json::json;
use std::sync::Arc;

/// 返回值形态
pub trait ResultShape: Send + Sync {
    fn name(&self) -> &'static str;

    /// 是否适用于该返回类型
    fn supports(&self, return_type: &str) -> bool;

    /// 取出内部值，没有可用的值时返回 None
    fn unwrap(&self, value: &Value) -> Option<Value>;

    /// 把内部值包回容器
    fn wrap(&self, value: Value) -> Value;

    /// 返回值携带的失败
    fn failure(&self, _value: &Value) -> Option<Throwable> {
        None
    }
}

/// `Option<T>`：序列化后 None 为 null，Some(v) 为 v 本身
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionalShape;

impl ResultShape for OptionalShape {
    fn name(&self) -> &'static str {
        "Option"
    }

    fn supports(&self, return_type: &str) -> bool {
        return_type.starts_with("Option<")
    }

    fn unwrap(&self, value: &Value) -> Option<Value> {
        Some(value.clone())
    }

    fn wrap(&self, value: Value) -> Value {
        value
    }
}

/// `Result<T, E>`：序列化为 `{"Ok": v}` 或 `{"Err": e}`
///
/// `e` 可以是字符串，也可以是 `{"type": "...", "message": "..."}`
#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomeShape;

impl ResultShape for OutcomeShape {
    fn name(&self) -> &'static str {
        "Result"
    }

    fn supports(&self, return_type: &str) -> bool {
        return_type.starts_with("Result<")
    }

    fn unwrap(&self, value: &Value) -> Option<Value> {
        value.get("Ok").cloned()
    }

    fn wrap(&self, value: Value) -> Value {
        json!({ "Ok": value })
    }

    fn failure(&self, value: &Value) -> Option<Throwable> {
        let error = value.get("Err")?;
        Some(failure_to_throwable(error))
    }
}

fn failure_to_throwable(error: &Value) -> Throwable {
    let type_name = error
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("RuntimeException");
    let message = match error {
        Value::String(s) => s.clone(),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| other.to_string()),
    };

    let runtime = ErrorType::runtime_exception();
    let error_type = if type_name == runtime.name() {
        runtime
    } else {
        ErrorType::new(type_name, &runtime)
    };
    Throwable::new(error_type, message)
}

/// 已注册的返回值形态
#[derive(Clone)]
pub struct ResultShapes {
    shapes: Vec<Arc<dyn ResultShape>>,
}

impl ResultShapes {
    pub fn empty() -> Self {
        Self { shapes: Vec::new() }
    }

    pub fn register(mut self, shape: Arc<dyn ResultShape>) -> Self {
        self.shapes.push(shape);
        self
    }

    pub fn for_method(&self, method: &Method) -> Option<&Arc<dyn ResultShape>> {
        self.shapes
            .iter()
            .find(|shape| shape.supports(method.return_type()))
    }

    /// 没有适用的形态时原样返回
    pub fn unwrap(&self, method: &Method, value: &Value) -> Option<Value> {
        match self.for_method(method) {
            Some(shape) => shape.unwrap(value),
            None => Some(value.clone()),
        }
    }

    pub fn wrap(&self, method: &Method, value: Value) -> Value {
        match self.for_method(method) {
            Some(shape) => shape.wrap(value),
            None => value,
        }
    }

    pub fn failure(&self, method: &Method, value: &Value) -> Option<Throwable> {
        self.for_method(method)?.failure(value)
    }
}

impl Default for ResultShapes {
    fn default() -> Self {
        Self::empty()
            .register(Arc::new(OptionalShape))
            .register(Arc::new(OutcomeShape))
    }
}
