use std::sync::Arc;

use crate::bean::{Bean, BeanRef};
use crate::bean_manager::BeanManager;
use crate::context::{ContextGuard, InitializationContext};
use crate::error::{ContainerError, ContainerResult};
use crate::model::meta::FieldAccess;
use crate::model::{InjectionPoint, MetaField, MetaMethod};
use crate::value::Instance;

/// producer 成员
pub enum ProducerMember {
    Field(MetaField),
    Method {
        method: MetaMethod,
        points: Vec<InjectionPoint>,
    },
}

impl ProducerMember {
    pub fn name(&self) -> &str {
        match self {
            ProducerMember::Field(field) => &field.name,
            ProducerMember::Method { method, .. } => &method.name,
        }
    }

    pub fn needs_receiver(&self) -> bool {
        match self {
            ProducerMember::Field(field) => field.needs_receiver(),
            ProducerMember::Method { method, .. } => method.needs_receiver(),
        }
    }
}

/// 与 producer 匹配的 disposer
pub struct Disposer {
    method: MetaMethod,
    points: Vec<InjectionPoint>,
}

impl Disposer {
    pub fn new(method: MetaMethod, points: Vec<InjectionPoint>) -> Self {
        Self { method, points }
    }

    pub fn method(&self) -> &MetaMethod {
        &self.method
    }
}

/// 一个 (声明 Bean, producer 成员) 对应的工厂
pub struct ProducerFactory {
    member: ProducerMember,
    disposer: Option<Disposer>,
}

impl ProducerFactory {
    pub fn new(member: ProducerMember, disposer: Option<Disposer>) -> Self {
        Self { member, disposer }
    }

    pub fn member(&self) -> &ProducerMember {
        &self.member
    }

    pub fn disposer(&self) -> Option<&Disposer> {
        self.disposer.as_ref()
    }

    pub fn injection_points(&self) -> &[InjectionPoint] {
        match &self.member {
            ProducerMember::Field(_) => &[],
            ProducerMember::Method { points, .. } => points,
        }
    }

    fn produce(
        &self,
        manager: &BeanManager,
        declaring: Option<&Instance>,
        context: &Arc<InitializationContext>,
    ) -> ContainerResult<Option<Instance>> {
        match &self.member {
            ProducerMember::Field(field) => {
                let target = format!("producer field '{}'", field.name);
                let value = match (&field.access, declaring) {
                    (FieldAccess::Static(read), _) => read(),
                    (FieldAccess::Getter(read), Some(instance)) => read(instance.as_ref()),
                    _ => {
                        return Err(ContainerError::Definition(format!(
                            "{target} cannot be read without a declaring instance"
                        )))
                    }
                };
                value.map_err(|e| ContainerError::injection(target, e))
            }
            ProducerMember::Method { method, points } => {
                manager.injector().produce(declaring, method, points, context)
            }
        }
    }
}

/// producer Bean
pub struct ProducerBean {
    declaring_bean: Option<BeanRef>,
    factory: ProducerFactory,
}

impl ProducerBean {
    pub fn new(declaring_bean: Option<BeanRef>, factory: ProducerFactory) -> Self {
        Self {
            declaring_bean,
            factory,
        }
    }

    pub fn declaring_bean(&self) -> Option<&BeanRef> {
        self.declaring_bean.as_ref()
    }

    pub fn factory(&self) -> &ProducerFactory {
        &self.factory
    }

    /// 声明实例：优先复用当前构造树中未完成的实例，否则在独立上下文中获取
    ///
    /// 返回的守卫持有独立上下文，调用结束后关闭，per-use 的声明实例随之销毁。
    fn declaring_instance(
        &self,
        manager: &BeanManager,
        context: &Arc<InitializationContext>,
    ) -> ContainerResult<(Option<Instance>, Option<ContextGuard>)> {
        let Some(declaring) = &self.declaring_bean else {
            return Ok((None, None));
        };
        if let Some(existing) = context.incomplete_instance(declaring) {
            return Ok((Some(existing), None));
        }
        let guard = ContextGuard::new(context.create_independent_context(declaring));
        let instance = manager.get_value(declaring, guard.context())?;
        Ok((Some(instance), Some(guard)))
    }

    pub(crate) fn create(
        &self,
        bean: &Bean,
        manager: &BeanManager,
        context: &Arc<InitializationContext>,
    ) -> ContainerResult<Instance> {
        let (declaring, _guard) = self.declaring_instance(manager, context)?;
        let product = self.factory.produce(manager, declaring.as_ref(), context)?;
        let product = product.ok_or_else(|| {
            ContainerError::IllegalProduct(format!(
                "producer '{}' of bean '{}' returned no value",
                self.factory.member.name(),
                bean.name()
            ))
        })?;

        if bean.is_dependent_scoped() {
            context.add_incomplete_instance(Arc::clone(&product));
        }
        tracing::debug!("Bean '{}' produced by '{}'", bean.name(), self.factory.member.name());
        Ok(product)
    }

    pub(crate) fn destroy(
        &self,
        bean: &Bean,
        manager: &BeanManager,
        instance: Instance,
        context: &Arc<InitializationContext>,
    ) -> ContainerResult<()> {
        let result = match (&self.factory.disposer, bean.is_dependent_scoped()) {
            (Some(disposer), true) => {
                let disposer_context = InitializationContext::new(self.declaring_bean.clone());
                let _guard = ContextGuard::new(Arc::clone(&disposer_context));
                self.declaring_instance(manager, &disposer_context).and_then(|(declaring, _declaring_guard)| {
                    manager.injector().dispose(
                        declaring.as_ref(),
                        &disposer.method,
                        &disposer.points,
                        instance,
                        &disposer_context,
                    )
                })
            }
            _ => Ok(()),
        };
        context.close();
        result
    }
}
