use crate::bean_factory::BeanFactory;
use crate::error::ApplicationResult;
use std::sync::Arc;

/// 需要访问 BeanFactory 的组件
///
/// 类似 Spring 的 BeanFactoryAware，注入发生在任何业务调用之前
pub trait BeanFactoryAware {
    fn set_bean_factory(&self, bean_factory: Arc<dyn BeanFactory>);
}

/// 属性设置完成后的初始化回调
/// 类似 Spring 的 InitializingBean / @PostConstruct
pub trait InitializingBean {
    fn after_properties_set(&self) -> ApplicationResult<()> {
        Ok(())
    }
}

/// 所有单例实例化完成后的回调
///
/// 拦截器在这里解析默认的 CacheManager / TransactionManager，
/// 回调完成前到达的调用直接透传到目标方法
pub trait SmartInitializingSingleton {
    fn after_singletons_instantiated(&self) -> ApplicationResult<()>;
}
