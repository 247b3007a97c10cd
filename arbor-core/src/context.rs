//! 初始化上下文
//!
//! 一次顶层构造对应一棵上下文树：每创建一个 Bean 就从父上下文派生一个子上下文。
//! 整棵树共享"未完成实例"表，子上下文里创建的 per-use 实例登记到父上下文的
//! 依赖列表中，父上下文关闭时按创建的逆序级联销毁。

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::bean::BeanRef;
use crate::model::InjectionPoint;
use crate::value::Instance;

/// 被某个上下文持有的 per-use 实例
struct DependentInstance {
    bean: BeanRef,
    instance: Instance,
    context: Arc<InitializationContext>,
}

pub struct InitializationContext {
    bean: Option<BeanRef>,
    /// 父上下文持有子上下文（经由依赖列表），反向只保留弱引用
    parent: Option<Weak<InitializationContext>>,
    /// 正在为之创建当前 Bean 的注入点
    injection_point: Option<InjectionPoint>,
    incomplete: Arc<Mutex<HashMap<u64, Instance>>>,
    dependents: Mutex<Vec<DependentInstance>>,
    closed: AtomicBool,
}

impl InitializationContext {
    /// 新的根上下文
    pub fn new(bean: Option<BeanRef>) -> Arc<Self> {
        Arc::new(Self {
            bean,
            parent: None,
            injection_point: None,
            incomplete: Arc::new(Mutex::new(HashMap::new())),
            dependents: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn bean(&self) -> Option<&BeanRef> {
        self.bean.as_ref()
    }

    pub fn parent(&self) -> Option<Arc<InitializationContext>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn injection_point(&self) -> Option<&InjectionPoint> {
        self.injection_point.as_ref()
    }

    /// 为 `bean` 派生子上下文，共享未完成实例表
    pub fn create_dependent_context(self: &Arc<Self>, bean: &BeanRef) -> Arc<Self> {
        self.derive(bean, None)
    }

    pub(crate) fn derive(self: &Arc<Self>, bean: &BeanRef, point: Option<&InjectionPoint>) -> Arc<Self> {
        Arc::new(Self {
            bean: Some(Arc::clone(bean)),
            parent: Some(Arc::downgrade(self)),
            injection_point: point.cloned(),
            incomplete: Arc::clone(&self.incomplete),
            dependents: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// 为 `bean` 新建一棵独立的上下文树
    pub fn create_independent_context(&self, bean: &BeanRef) -> Arc<Self> {
        Self::new(Some(Arc::clone(bean)))
    }

    /// 登记当前 Bean 的实例
    ///
    /// 实例在整棵树中可被复用，并由父上下文持有，父上下文关闭时销毁。
    pub fn add_incomplete_instance(self: &Arc<Self>, instance: Instance) {
        let Some(bean) = &self.bean else {
            return;
        };
        self.incomplete.lock().insert(bean.id(), Arc::clone(&instance));
        if let Some(parent) = self.parent() {
            parent.dependents.lock().push(DependentInstance {
                bean: Arc::clone(bean),
                instance,
                context: Arc::clone(self),
            });
        }
    }

    pub fn incomplete_instance(&self, bean: &BeanRef) -> Option<Instance> {
        self.incomplete.lock().get(&bean.id()).cloned()
    }

    /// 从当前上下文向上，最近的一个非 per-use 作用域的 Bean
    pub fn non_dependent_scoped_dependent(&self) -> Option<BeanRef> {
        if let Some(bean) = &self.bean {
            if !bean.is_dependent_scoped() {
                return Some(Arc::clone(bean));
            }
        }
        let mut current = self.parent();
        while let Some(context) = current {
            if let Some(bean) = &context.bean {
                if !bean.is_dependent_scoped() {
                    return Some(Arc::clone(bean));
                }
            }
            current = context.parent();
        }
        None
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 关闭上下文，按创建的逆序销毁持有的 per-use 实例；重复调用无效
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let dependents = std::mem::take(&mut *self.dependents.lock());
        for dependent in dependents.into_iter().rev() {
            self.incomplete.lock().remove(&dependent.bean.id());
            if let Err(e) = dependent.bean.destroy(dependent.instance, &dependent.context) {
                tracing::warn!("Failed to destroy dependent instance of bean '{}': {}", dependent.bean.name(), e);
            }
        }
    }
}

impl fmt::Debug for InitializationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitializationContext")
            .field("bean", &self.bean.as_ref().map(|b| b.name().to_string()))
            .field("dependents", &self.dependents.lock().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// 离开作用域时关闭上下文
pub struct ContextGuard {
    context: Arc<InitializationContext>,
}

impl ContextGuard {
    pub fn new(context: Arc<InitializationContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<InitializationContext> {
        &self.context
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.context.close();
    }
}
