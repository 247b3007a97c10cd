//! 容器合成的包装 Bean

use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use crate::bean::BeanRef;
use crate::bean_manager::BeanManager;
use crate::context::InitializationContext;
use crate::error::{ContainerError, ContainerResult};
use crate::qualifier::Qualifiers;
use crate::types::TypeKey;
use crate::value::{Deferred, Instance, OptionalValue};

/// `Provider<X>`：创建时不构造 X，只返回一个 [`Deferred`]
pub struct ProviderBean {
    target: BeanRef,
}

impl ProviderBean {
    pub fn new(target: BeanRef) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &BeanRef {
        &self.target
    }

    pub(crate) fn create(&self, manager: &Weak<BeanManager>, context: &Arc<InitializationContext>) -> Instance {
        let manager = manager.clone();
        let target = Arc::clone(&self.target);
        // 调用时上下文可能已经释放，此时为目标新建根上下文
        let context = Arc::downgrade(context);
        let deferred = Deferred::new(move || {
            let manager = manager
                .upgrade()
                .ok_or_else(|| ContainerError::Resolution("container has been dropped".to_string()))?;
            let context = context
                .upgrade()
                .unwrap_or_else(|| manager.create_initialization_context(Some(&target)));
            manager.get_value(&target, &context)
        });
        Arc::new(deferred)
    }
}

/// 由 `Provider<X>` 绑定适配出的 `X` 绑定
pub struct ProvidedBean {
    provider: BeanRef,
}

impl ProvidedBean {
    pub fn new(provider: BeanRef) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &BeanRef {
        &self.provider
    }

    pub(crate) fn create(&self, manager: &BeanManager, context: &Arc<InitializationContext>) -> ContainerResult<Instance> {
        let value = manager.get_value(&self.provider, context)?;
        let deferred = value.downcast_ref::<Deferred>().ok_or_else(|| ContainerError::TypeMismatch {
            expected: "Deferred".to_string(),
            found: format!("product of bean '{}'", self.provider.name()),
        })?;
        deferred.get()
    }
}

/// `Optional<X>`：X 只在第一次使用时查找一次
pub struct OptionalBean {
    target_type: TypeKey,
    qualifiers: Qualifiers,
    resolved: OnceCell<Option<BeanRef>>,
}

impl OptionalBean {
    pub fn new(target_type: TypeKey, qualifiers: Qualifiers) -> Self {
        Self {
            target_type,
            qualifiers,
            resolved: OnceCell::new(),
        }
    }

    pub fn target_type(&self) -> &TypeKey {
        &self.target_type
    }

    pub(crate) fn create(&self, manager: &BeanManager, context: &Arc<InitializationContext>) -> ContainerResult<Instance> {
        let resolved = self
            .resolved
            .get_or_try_init(|| manager.get_bean(&self.target_type, &self.qualifiers))?;
        let value: OptionalValue = match resolved {
            Some(bean) => {
                let instance = manager.get_value(bean, context)?;
                Some(bean.view(instance, &self.target_type)?)
            }
            None => None,
        };
        Ok(Arc::new(value))
    }
}

/// 容器提供的现成值，没有注入点
pub struct SystemBean {
    value: Instance,
}

impl SystemBean {
    pub fn new(value: Instance) -> Self {
        Self { value }
    }

    pub(crate) fn create(&self) -> Instance {
        Arc::clone(&self.value)
    }
}
