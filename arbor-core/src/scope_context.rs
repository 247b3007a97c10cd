//! 作用域上下文：按作用域缓存实例

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use crate::bean::BeanRef;
use crate::context::InitializationContext;
use crate::error::ContainerResult;
use crate::scope::ScopeType;
use crate::value::Instance;

/// 作用域的缓存策略
pub trait ScopeContext: Send + Sync {
    fn scope_type(&self) -> ScopeType;

    /// 返回缓存的实例，没有则用 `context` 创建
    fn get_or_create(&self, bean: &BeanRef, context: Arc<InitializationContext>) -> ContainerResult<Instance>;

    fn get_if_exists(&self, bean: &BeanRef) -> Option<Instance>;

    /// 销毁并移除缓存的实例
    fn destroy(&self, bean: &BeanRef);

    /// 销毁所有缓存的实例
    fn close(&self);
}

/// per-use 作用域：每次都创建，实例由初始化上下文跟踪
#[derive(Debug, Default)]
pub struct DependentScopeContext;

impl ScopeContext for DependentScopeContext {
    fn scope_type(&self) -> ScopeType {
        ScopeType::dependent()
    }

    fn get_or_create(&self, bean: &BeanRef, context: Arc<InitializationContext>) -> ContainerResult<Instance> {
        bean.create(&context)
    }

    fn get_if_exists(&self, _bean: &BeanRef) -> Option<Instance> {
        None
    }

    fn destroy(&self, _bean: &BeanRef) {}

    fn close(&self) {}
}

struct ScopedInstance {
    bean: BeanRef,
    value: OnceCell<Instance>,
    context: Mutex<Option<Arc<InitializationContext>>>,
}

/// 缓存型作用域（单例及自定义作用域）
///
/// 每个 Bean 一个 `OnceCell` 条目，并发的首次访问只会构造一次。
pub struct DefaultScopeContext {
    scope_type: ScopeType,
    instances: RwLock<HashMap<u64, Arc<ScopedInstance>>>,
}

impl DefaultScopeContext {
    pub fn new(scope_type: ScopeType) -> Self {
        Self {
            scope_type,
            instances: RwLock::new(HashMap::new()),
        }
    }

    pub fn singleton() -> Self {
        Self::new(ScopeType::singleton())
    }

    pub fn len(&self) -> usize {
        self.instances.read().values().filter(|e| e.value.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, bean: &BeanRef) -> Arc<ScopedInstance> {
        if let Some(entry) = self.instances.read().get(&bean.id()) {
            return Arc::clone(entry);
        }
        let mut instances = self.instances.write();
        let entry = instances.entry(bean.id()).or_insert_with(|| {
            Arc::new(ScopedInstance {
                bean: Arc::clone(bean),
                value: OnceCell::new(),
                context: Mutex::new(None),
            })
        });
        Arc::clone(entry)
    }

    fn destroy_entry(&self, entry: &ScopedInstance) {
        let Some(instance) = entry.value.get().cloned() else {
            return;
        };
        let context = entry
            .context
            .lock()
            .take()
            .unwrap_or_else(|| InitializationContext::new(Some(Arc::clone(&entry.bean))));
        if let Err(e) = entry.bean.destroy(instance, &context) {
            tracing::warn!("Failed to destroy {} bean '{}': {}", self.scope_type, entry.bean.name(), e);
        }
    }
}

impl ScopeContext for DefaultScopeContext {
    fn scope_type(&self) -> ScopeType {
        self.scope_type
    }

    fn get_or_create(&self, bean: &BeanRef, context: Arc<InitializationContext>) -> ContainerResult<Instance> {
        let entry = self.entry(bean);
        if let Some(instance) = entry.value.get() {
            return Ok(Arc::clone(instance));
        }
        // 同一线程重入初始化会在 OnceCell 上死锁，先检查创建链
        bean.ensure_not_creating()?;
        let instance = entry.value.get_or_try_init(|| {
            tracing::debug!("Creating {} instance of bean '{}'", self.scope_type, bean.name());
            let instance = bean.create(&context)?;
            *entry.context.lock() = Some(Arc::clone(&context));
            Ok::<_, crate::error::ContainerError>(instance)
        })?;
        Ok(Arc::clone(instance))
    }

    fn get_if_exists(&self, bean: &BeanRef) -> Option<Instance> {
        self.instances.read().get(&bean.id()).and_then(|entry| entry.value.get().cloned())
    }

    fn destroy(&self, bean: &BeanRef) {
        let removed = self.instances.write().remove(&bean.id());
        if let Some(entry) = removed {
            self.destroy_entry(&entry);
        }
    }

    fn close(&self) {
        let drained: Vec<Arc<ScopedInstance>> = self.instances.write().drain().map(|(_, e)| e).collect();
        if !drained.is_empty() {
            tracing::debug!("Closing {} scope with {} cached bean(s)", self.scope_type, drained.len());
        }
        for entry in drained {
            self.destroy_entry(&entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean_manager::BeanManager;
    use crate::model::{MetaClass, MetaConstructor};
    use crate::scope::Singleton;

    struct Cache;

    #[test]
    fn test_destroy_evicts_cached_instance() {
        let manager = BeanManager::new();
        let beans = manager
            .load_beans([MetaClass::builder::<Cache>()
                .scope::<Singleton>()
                .constructor(MetaConstructor::no_args(|| Cache))
                .build()])
            .unwrap();
        let bean = &beans[0];
        let scope = DefaultScopeContext::singleton();

        let first = scope.get_or_create(bean, InitializationContext::new(Some(Arc::clone(bean)))).unwrap();
        assert!(scope.get_if_exists(bean).is_some());
        assert_eq!(scope.len(), 1);

        scope.destroy(bean);
        assert!(scope.get_if_exists(bean).is_none());

        let second = scope.get_or_create(bean, InitializationContext::new(Some(Arc::clone(bean)))).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        scope.close();
        assert!(scope.is_empty());
    }

    #[test]
    fn test_dependent_scope_never_caches() {
        let manager = BeanManager::new();
        let bean = manager.bind_instance(Cache);
        let scope = DependentScopeContext;

        scope.get_or_create(&bean, InitializationContext::new(None)).unwrap();
        assert!(scope.get_if_exists(&bean).is_none());
    }
}
