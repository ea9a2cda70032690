//! 缓存表达式
//!
//! 引擎只通过 [`CacheExpressionEvaluator`] 计算键、条件和 unless。
//! 内置的 [`NamedExpressionEvaluator`] 支持一个很小的子集：
//!
//! - 参数：`#p0`、`#a1`，可带属性路径 `#p0.id`
//! - 返回值：`#result`、`#result.name`
//! - 根对象：`#root.methodName`、`#root.targetClass`
//! - 字面量：`null`、`true`、`false`、数字、`'text'`
//! - 比较：`==`、`!=`、`>`、`>=`、`<`、`<=`，前缀 `!` 取反

use std::collections::HashMap;
use std::sync::Arc;

use chimera_aop::{Method, Value};
use parking_lot::RwLock;
use thiserror::Error;

/// 表达式错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvaluationError {
    /// 变量在当前阶段不可用，例如调用前的 `#result`
    #[error("Variable '{0}' not available")]
    VariableNotAvailable(String),

    #[error("Invalid cache expression '{expression}': {message}")]
    Invalid { expression: String, message: String },
}

impl EvaluationError {
    fn invalid(expression: &str, message: impl Into<String>) -> Self {
        EvaluationError::Invalid {
            expression: expression.to_string(),
            message: message.into(),
        }
    }
}

/// 方法返回值在求值时的状态
#[derive(Debug, Clone, Copy)]
pub enum ResultState<'a> {
    /// 方法还没有执行，`#result` 为 null
    NoResult,
    /// 结果存在但还拿不到，引用 `#result` 报错
    Unavailable,
    Available(&'a Value),
}

impl ResultState<'_> {
    pub fn is_available(&self) -> bool {
        matches!(self, ResultState::Available(_))
    }
}

/// 表达式求值上下文
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub method: &'a Method,
    pub target_type: &'a str,
    pub args: &'a [Value],
    pub result: ResultState<'a>,
}

/// 表达式求值器
pub trait CacheExpressionEvaluator: Send + Sync {
    fn key(&self, expression: &str, context: &EvaluationContext<'_>) -> Result<Value, EvaluationError>;

    fn condition(&self, expression: &str, context: &EvaluationContext<'_>) -> Result<bool, EvaluationError>;

    fn unless(&self, expression: &str, context: &EvaluationContext<'_>) -> Result<bool, EvaluationError>;
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Argument { index: usize, path: Vec<String> },
    Result { path: Vec<String> },
    MethodName,
    TargetClass,
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparison {
    const TOKENS: [(&'static str, Comparison); 6] = [
        ("==", Comparison::Eq),
        ("!=", Comparison::Ne),
        (">=", Comparison::Ge),
        ("<=", Comparison::Le),
        (">", Comparison::Gt),
        ("<", Comparison::Lt),
    ];
}

#[derive(Debug, Clone, PartialEq)]
enum Expression {
    Operand(Operand),
    Not(Box<Expression>),
    Compare {
        left: Operand,
        comparison: Comparison,
        right: Operand,
    },
}

fn parse(expression: &str) -> Result<Expression, EvaluationError> {
    let text = expression.trim();
    if text.is_empty() {
        return Err(EvaluationError::invalid(expression, "empty expression"));
    }
    if let Some(rest) = text.strip_prefix('!') {
        if !rest.starts_with('=') {
            return Ok(Expression::Not(Box::new(parse(rest)?)));
        }
    }

    match find_comparison(text) {
        Some((position, token, comparison)) => Ok(Expression::Compare {
            left: parse_operand(expression, &text[..position])?,
            comparison,
            right: parse_operand(expression, &text[position + token.len()..])?,
        }),
        None => Ok(Expression::Operand(parse_operand(expression, text)?)),
    }
}

/// 第一个不在引号内的比较运算符
fn find_comparison(text: &str) -> Option<(usize, &'static str, Comparison)> {
    let mut quoted = false;
    for (position, ch) in text.char_indices() {
        if ch == '\'' {
            quoted = !quoted;
            continue;
        }
        if quoted {
            continue;
        }
        let rest = &text[position..];
        if let Some((token, comparison)) = Comparison::TOKENS
            .iter()
            .find(|(token, _)| rest.starts_with(token))
        {
            return Some((position, token, *comparison));
        }
    }
    None
}

fn parse_path(expression: &str, path: &str) -> Result<Vec<String>, EvaluationError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let Some(path) = path.strip_prefix('.') else {
        return Err(EvaluationError::invalid(expression, format!("unexpected '{}'", path)));
    };
    path.split('.')
        .map(|segment| {
            if !segment.is_empty() && segment.chars().all(|c| c.is_alphanumeric() || c == '_') {
                Ok(segment.to_string())
            } else {
                Err(EvaluationError::invalid(expression, format!("invalid property '{}'", segment)))
            }
        })
        .collect()
}

fn parse_operand(expression: &str, text: &str) -> Result<Operand, EvaluationError> {
    let text = text.trim();
    match text {
        "" => return Err(EvaluationError::invalid(expression, "missing operand")),
        "null" => return Ok(Operand::Literal(Value::Null)),
        "true" => return Ok(Operand::Literal(Value::Bool(true))),
        "false" => return Ok(Operand::Literal(Value::Bool(false))),
        "#root.methodName" => return Ok(Operand::MethodName),
        "#root.targetClass" => return Ok(Operand::TargetClass),
        _ => {}
    }

    if let Some(rest) = text.strip_prefix("#result") {
        return Ok(Operand::Result {
            path: parse_path(expression, rest)?,
        });
    }
    if let Some(rest) = text.strip_prefix("#p").or_else(|| text.strip_prefix("#a")) {
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            return Err(EvaluationError::invalid(expression, format!("unknown variable '{}'", text)));
        }
        let index = rest[..digits]
            .parse()
            .map_err(|_| EvaluationError::invalid(expression, "argument index out of range"))?;
        return Ok(Operand::Argument {
            index,
            path: parse_path(expression, &rest[digits..])?,
        });
    }
    if text.starts_with('#') {
        return Err(EvaluationError::invalid(expression, format!("unknown variable '{}'", text)));
    }
    if let Some(literal) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return Ok(Operand::Literal(Value::String(literal.to_string())));
    }
    if let Ok(number) = text.parse::<i64>() {
        return Ok(Operand::Literal(Value::from(number)));
    }
    if let Ok(number) = text.parse::<f64>() {
        return Ok(Operand::Literal(Value::from(number)));
    }
    Err(EvaluationError::invalid(expression, format!("cannot parse '{}'", text)))
}

fn follow(value: &Value, path: &[String]) -> Value {
    path.iter()
        .try_fold(value, |current, segment| current.get(segment.as_str()))
        .cloned()
        .unwrap_or(Value::Null)
}

fn resolve(operand: &Operand, context: &EvaluationContext<'_>) -> Result<Value, EvaluationError> {
    match operand {
        Operand::Argument { index, path } => Ok(context
            .args
            .get(*index)
            .map(|arg| follow(arg, path))
            .unwrap_or(Value::Null)),
        Operand::Result { path } => match context.result {
            ResultState::NoResult => Ok(Value::Null),
            ResultState::Unavailable => Err(EvaluationError::VariableNotAvailable("result".into())),
            ResultState::Available(value) => Ok(follow(value, path)),
        },
        Operand::MethodName => Ok(Value::String(context.method.name().to_string())),
        Operand::TargetClass => Ok(Value::String(context.target_type.to_string())),
        Operand::Literal(value) => Ok(value.clone()),
    }
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

fn evaluate(
    source: &str,
    expression: &Expression,
    context: &EvaluationContext<'_>,
) -> Result<Value, EvaluationError> {
    match expression {
        Expression::Operand(operand) => resolve(operand, context),
        Expression::Not(inner) => match evaluate(source, inner, context)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(EvaluationError::invalid(source, format!("cannot negate {}", other))),
        },
        Expression::Compare {
            left,
            comparison,
            right,
        } => {
            let left = resolve(left, context)?;
            let right = resolve(right, context)?;
            let ordering = match (&left, &right) {
                (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
                _ => match (left.as_f64(), right.as_f64()) {
                    (Some(l), Some(r)) => l.partial_cmp(&r),
                    _ => None,
                },
            };
            let outcome = match comparison {
                Comparison::Eq => loosely_equal(&left, &right),
                Comparison::Ne => !loosely_equal(&left, &right),
                ordered => {
                    let Some(ordering) = ordering else {
                        return Err(EvaluationError::invalid(
                            source,
                            format!("cannot compare {} with {}", left, right),
                        ));
                    };
                    match ordered {
                        Comparison::Gt => ordering.is_gt(),
                        Comparison::Ge => ordering.is_ge(),
                        Comparison::Lt => ordering.is_lt(),
                        _ => ordering.is_le(),
                    }
                }
            };
            Ok(Value::Bool(outcome))
        }
    }
}

/// 内置表达式求值器，解析结果按表达式文本缓存
#[derive(Default)]
pub struct NamedExpressionEvaluator {
    parsed: RwLock<HashMap<String, Arc<Expression>>>,
}

impl NamedExpressionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    fn expression(&self, source: &str) -> Result<Arc<Expression>, EvaluationError> {
        if let Some(parsed) = self.parsed.read().get(source) {
            return Ok(Arc::clone(parsed));
        }
        let parsed = Arc::new(parse(source)?);
        self.parsed
            .write()
            .insert(source.to_string(), Arc::clone(&parsed));
        Ok(parsed)
    }

    fn value(&self, source: &str, context: &EvaluationContext<'_>) -> Result<Value, EvaluationError> {
        let expression = self.expression(source)?;
        evaluate(source, &expression, context)
    }

    fn boolean(&self, source: &str, context: &EvaluationContext<'_>) -> Result<bool, EvaluationError> {
        match self.value(source, context)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvaluationError::invalid(
                source,
                format!("expected a boolean but got {}", other),
            )),
        }
    }
}

impl CacheExpressionEvaluator for NamedExpressionEvaluator {
    fn key(&self, expression: &str, context: &EvaluationContext<'_>) -> Result<Value, EvaluationError> {
        self.value(expression, context)
    }

    fn condition(&self, expression: &str, context: &EvaluationContext<'_>) -> Result<bool, EvaluationError> {
        self.boolean(expression, context)
    }

    fn unless(&self, expression: &str, context: &EvaluationContext<'_>) -> Result<bool, EvaluationError> {
        self.boolean(expression, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context<'a>(method: &'a Method, args: &'a [Value], result: ResultState<'a>) -> EvaluationContext<'a> {
        EvaluationContext {
            method,
            target_type: "UserRepository",
            args,
            result,
        }
    }

    #[test]
    fn test_key_expressions() {
        let evaluator = NamedExpressionEvaluator::new();
        let method = Method::new("UserRepository", "find");
        let args = vec![json!({"id": 7, "name": "ann"}), json!(3)];
        let ctx = context(&method, &args, ResultState::NoResult);

        assert_eq!(evaluator.key("#p0.id", &ctx).unwrap(), json!(7));
        assert_eq!(evaluator.key("#a1", &ctx).unwrap(), json!(3));
        assert_eq!(evaluator.key("#p0.missing", &ctx).unwrap(), Value::Null);
        assert_eq!(evaluator.key("#p5", &ctx).unwrap(), Value::Null);
        assert_eq!(evaluator.key("#root.methodName", &ctx).unwrap(), json!("find"));
        assert_eq!(evaluator.key("'fixed'", &ctx).unwrap(), json!("fixed"));
    }

    #[test]
    fn test_conditions() {
        let evaluator = NamedExpressionEvaluator::new();
        let method = Method::new("UserRepository", "find");
        let args = vec![json!(10), json!("admin")];
        let ctx = context(&method, &args, ResultState::NoResult);

        assert!(evaluator.condition("#p0 > 5", &ctx).unwrap());
        assert!(!evaluator.condition("#p0 <= 5", &ctx).unwrap());
        assert!(evaluator.condition("#p0 == 10.0", &ctx).unwrap());
        assert!(evaluator.condition("#p1 != 'guest'", &ctx).unwrap());
        assert!(evaluator.condition("!false", &ctx).unwrap());
        assert!(evaluator.condition("#result == null", &ctx).unwrap());
        assert!(matches!(
            evaluator.condition("#p1", &ctx),
            Err(EvaluationError::Invalid { .. })
        ));
        assert!(matches!(
            evaluator.condition("#p0 > 'a'", &ctx),
            Err(EvaluationError::Invalid { .. })
        ));
        assert!(matches!(
            evaluator.condition("#unknown", &ctx),
            Err(EvaluationError::Invalid { .. })
        ));
    }

    #[test]
    fn test_result_states() {
        let evaluator = NamedExpressionEvaluator::new();
        let method = Method::new("UserRepository", "find");
        let result = json!({"name": "ann", "active": false});

        let unavailable = context(&method, &[], ResultState::Unavailable);
        assert_eq!(
            evaluator.unless("#result == null", &unavailable),
            Err(EvaluationError::VariableNotAvailable("result".into()))
        );

        let available = context(&method, &[], ResultState::Available(&result));
        assert!(evaluator.unless("!#result.active", &available).unwrap());
        assert!(evaluator.unless("#result.name == 'ann'", &available).unwrap());
    }

    #[test]
    fn test_parsed_expressions_are_cached() {
        let evaluator = NamedExpressionEvaluator::new();
        let method = Method::new("UserRepository", "find");
        let ctx = context(&method, &[], ResultState::NoResult);

        evaluator.condition("true", &ctx).unwrap();
        evaluator.condition("true", &ctx).unwrap();
        evaluator.condition("false", &ctx).unwrap();
        assert_eq!(evaluator.parsed.read().len(), 2);
    }
}
