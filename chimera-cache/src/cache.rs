//! 缓存抽象与基于 HashMap 的实现

use std::collections::HashMap;
use std::sync::Arc;

use chimera_aop::{Throwable, Value};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use crate::error::{CacheError, CacheResult};
use crate::key::CacheKey;

/// 加载缓存值的回调
pub type ValueLoader<'a> = dyn FnMut() -> Result<Value, Throwable> + 'a;

/// 缓存
///
/// `get` 返回 `Some(Value::Null)` 表示缓存了 null，`None` 表示未命中
pub trait Cache: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &Value) -> CacheResult<Option<Value>>;

    /// 原子地读取或加载
    ///
    /// 同一个键同时只有一个加载在执行，其余调用等待并读取它的结果。
    /// 加载失败时不写入缓存，错误原样返回。
    fn get_or_load(&self, key: &Value, loader: &mut ValueLoader<'_>) -> Result<Value, Throwable>;

    fn put(&self, key: &Value, value: Value) -> CacheResult<()>;

    fn evict(&self, key: &Value) -> CacheResult<()>;

    fn clear(&self) -> CacheResult<()>;
}

/// 基于 HashMap 的缓存
pub struct ConcurrentMapCache {
    name: String,
    store: RwLock<HashMap<CacheKey, Value>>,
    loading: Mutex<HashMap<CacheKey, Arc<OnceCell<Value>>>>,
    allow_null_values: bool,
}

impl ConcurrentMapCache {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_null_values(name, true)
    }

    pub fn with_null_values(name: impl Into<String>, allow_null_values: bool) -> Self {
        Self {
            name: name.into(),
            store: RwLock::new(HashMap::new()),
            loading: Mutex::new(HashMap::new()),
            allow_null_values,
        }
    }

    pub fn is_allow_null_values(&self) -> bool {
        self.allow_null_values
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    fn check_value(&self, value: &Value) -> CacheResult<()> {
        if value.is_null() && !self.allow_null_values {
            return Err(CacheError::NullValueNotAllowed(self.name.clone()));
        }
        Ok(())
    }

    fn load(&self, key: &CacheKey, loader: &mut ValueLoader<'_>) -> Result<Value, Throwable> {
        if let Some(value) = self.store.read().get(key) {
            return Ok(value.clone());
        }
        let value = loader()?;
        self.check_value(&value)?;
        self.store.write().insert(key.clone(), value.clone());
        Ok(value)
    }
}

impl Cache for ConcurrentMapCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &Value) -> CacheResult<Option<Value>> {
        Ok(self.store.read().get(&CacheKey::from(key)).cloned())
    }

    fn get_or_load(&self, key: &Value, loader: &mut ValueLoader<'_>) -> Result<Value, Throwable> {
        let key = CacheKey::from(key);
        if let Some(value) = self.store.read().get(&key) {
            return Ok(value.clone());
        }

        let cell = Arc::clone(
            self.loading
                .lock()
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        );
        let result = cell.get_or_try_init(|| self.load(&key, loader)).cloned();

        let mut loading = self.loading.lock();
        if loading
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            loading.remove(&key);
        }
        result
    }

    fn put(&self, key: &Value, value: Value) -> CacheResult<()> {
        self.check_value(&value)?;
        self.store.write().insert(CacheKey::from(key), value);
        Ok(())
    }

    fn evict(&self, key: &Value) -> CacheResult<()> {
        self.store.write().remove(&CacheKey::from(key));
        Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
        self.store.write().clear();
        Ok(())
    }
}
