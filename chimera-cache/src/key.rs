//! 缓存键生成

use chimera_aop::{Method, Value};

/// 缓存键生成器
pub trait KeyGenerator: Send + Sync {
    fn generate(&self, target_type: &str, method: &Method, args: &[Value]) -> Value;
}

/// 默认键生成器
///
/// - 没有参数：`{"SimpleKey": []}`
/// - 一个非 null、非数组的参数：参数本身
/// - 其它情况：`{"SimpleKey": [参数...]}`
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleKeyGenerator;

impl SimpleKeyGenerator {
    pub fn generate_key(args: &[Value]) -> Value {
        match args {
            [single] if !single.is_null() && !single.is_array() => single.clone(),
            _ => {
                let mut key = Value::Object(Default::default());
                key["SimpleKey"] = Value::Array(args.to_vec());
                key
            }
        }
    }
}

impl KeyGenerator for SimpleKeyGenerator {
    fn generate(&self, _target_type: &str, _method: &Method, args: &[Value]) -> Value {
        Self::generate_key(args)
    }
}

/// 缓存存储使用的规范化键
///
/// JSON 对象序列化时键有序，相同的值总是得到相同的文本
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Value> for CacheKey {
    fn from(value: &Value) -> Self {
        CacheKey(value.to_string())
    }
}
