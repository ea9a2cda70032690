//! 调用上下文
//!
//! 一次外部调用以及它触发的所有嵌套代理调用共享同一个 InvocationContext，
//! 各个拦截器把自己的调用级状态（例如事务栈）以类型为键存放在这里，
//! 而不是放进线程局部变量。

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 按类型存放调用级状态
#[derive(Default)]
pub struct InvocationContext {
    slots: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取类型 T 的状态，不存在时用 init 创建
    pub fn get_or_init<T, F>(&self, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.get::<T>() {
            return existing;
        }
        let mut slots = self.slots.write();
        let id = TypeId::of::<T>();
        if let Some(existing) = slots.get(&id).and_then(|s| Arc::clone(s).downcast::<T>().ok()) {
            return existing;
        }
        let value = Arc::new(init());
        slots.insert(id, Arc::clone(&value) as Arc<dyn Any + Send + Sync>);
        value
    }

    /// 获取类型 T 的状态
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let slots = self.slots.read();
        let slot = slots.get(&TypeId::of::<T>())?;
        Arc::clone(slot).downcast::<T>().ok()
    }

    /// 替换类型 T 的状态，返回旧值
    pub fn insert<T: Any + Send + Sync>(&self, value: T) -> Option<Arc<T>> {
        let previous = self
            .slots
            .write()
            .insert(TypeId::of::<T>(), Arc::new(value));
        previous.and_then(|p| p.downcast::<T>().ok())
    }

    pub fn remove<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let previous = self.slots.write().remove(&TypeId::of::<T>());
        previous.and_then(|p| p.downcast::<T>().ok())
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("slots", &self.slots.read().len())
            .finish()
    }
}
