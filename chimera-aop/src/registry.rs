//! 通知器注册表
//!
//! 通知器通过 inventory 静态注册，启动时按 order 排成一个显式列表，
//! 不依赖运行时的类型探测。

use crate::advisor::Advisor;
use chimera_core::order::sort_by_order;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;

/// 通知器注册器
///
/// 用于 inventory 自动收集和注册通知器
pub struct AdvisorRegistration {
    /// 通知器名称
    pub name: &'static str,

    /// 创建通知器的函数
    pub creator: fn() -> Advisor,
}

impl AdvisorRegistration {
    pub const fn new(name: &'static str, creator: fn() -> Advisor) -> Self {
        Self { name, creator }
    }

    pub fn create_instance(&self) -> Advisor {
        (self.creator)()
    }
}

// 使用 inventory 收集所有通知器注册器
inventory::collect!(AdvisorRegistration);

/// 获取所有注册的通知器注册器
pub fn get_all_advisor_registrations() -> impl Iterator<Item = &'static AdvisorRegistration> {
    inventory::iter::<AdvisorRegistration>()
}

/// 全局通知器注册表
///
/// 首次访问时加载所有通过 inventory 注册的通知器
static GLOBAL_ADVISOR_REGISTRY: Lazy<Arc<AdvisorRegistry>> = Lazy::new(|| {
    let registry = AdvisorRegistry::new();
    registry.auto_load_advisors();
    Arc::new(registry)
});

/// 获取全局通知器注册表
pub fn get_global_registry() -> &'static Arc<AdvisorRegistry> {
    &GLOBAL_ADVISOR_REGISTRY
}

/// 通知器注册表
///
/// 始终保持按 order 稳定排序
pub struct AdvisorRegistry {
    advisors: RwLock<Vec<Advisor>>,
}

impl AdvisorRegistry {
    pub fn new() -> Self {
        Self {
            advisors: RwLock::new(Vec::new()),
        }
    }

    /// 注册通知器
    pub fn register(&self, advisor: Advisor) {
        tracing::debug!("Registering {:?}", advisor);
        let mut advisors = self.advisors.write();
        advisors.push(advisor);
        sort_by_order(&mut advisors);
    }

    /// 按 order 排好序的通知器快照
    pub fn advisors(&self) -> Vec<Advisor> {
        self.advisors.read().clone()
    }

    pub fn len(&self) -> usize {
        self.advisors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.advisors.read().is_empty()
    }

    pub fn clear(&self) {
        self.advisors.write().clear();
    }

    /// 从 inventory 自动加载所有注册的通知器
    pub fn auto_load_advisors(&self) {
        let registrations: Vec<_> = get_all_advisor_registrations().collect();
        tracing::info!("Auto-loading {} advisor(s) from registry", registrations.len());

        for registration in registrations {
            tracing::debug!("  ├─ Loading advisor: {}", registration.name);
            self.register(registration.create_instance());
        }

        tracing::info!("Auto-loaded {} advisor(s)", self.len());
    }
}

impl Default for AdvisorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
