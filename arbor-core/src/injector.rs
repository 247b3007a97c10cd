//! 注入器：为构造函数、字段和方法解析参数并执行调用

use std::sync::{Arc, Weak};

use crate::bean_manager::BeanManager;
use crate::context::InitializationContext;
use crate::error::{ContainerError, ContainerResult};
use crate::model::meta::{FieldAccess, MethodBody, RawInstance};
use crate::model::{InjectionPoint, MetaConstructor, MetaField, MetaMethod};
use crate::types::RawType;
use crate::value::{Arguments, Instance};

pub struct Injector {
    manager: Weak<BeanManager>,
}

impl Injector {
    pub fn new(manager: Weak<BeanManager>) -> Self {
        Self { manager }
    }

    fn manager(&self) -> ContainerResult<Arc<BeanManager>> {
        self.manager
            .upgrade()
            .ok_or_else(|| ContainerError::Resolution("container has been dropped".to_string()))
    }

    /// 解析单个注入点的值
    ///
    /// `InjectionPoint` 和 `Bean<X>` 由注入器自己满足，其余交给 BeanManager。
    pub fn resolve(&self, point: &InjectionPoint, context: &Arc<InitializationContext>) -> ContainerResult<Instance> {
        if point.type_key().is_raw(RawType::InjectionPoint) {
            let requested = context.injection_point().cloned().ok_or_else(|| {
                ContainerError::UnsatisfiedBean(format!("{point}: bean was not created for an injection point"))
            })?;
            return Ok(Arc::new(requested));
        }
        if point.type_key().is_raw(RawType::Bean) {
            let bean = point
                .bean()
                .ok_or_else(|| ContainerError::UnsatisfiedBean(format!("{point}: not declared by a bean")))?;
            return Ok(Arc::new(bean));
        }

        let manager = self.manager()?;
        manager
            .get_injectable_value(point, context)?
            .ok_or_else(|| ContainerError::UnsatisfiedBean(point.to_string()))
    }

    /// 按顺序解析参数；`disposed` 填入带 disposes 标记的参数位置
    pub fn resolve_arguments(
        &self,
        target: &str,
        points: &[InjectionPoint],
        disposes_at: Option<(usize, Instance)>,
        context: &Arc<InitializationContext>,
    ) -> ContainerResult<Arguments> {
        let mut values = Vec::with_capacity(points.len());
        let mut disposes_at = disposes_at;
        for (index, point) in points.iter().enumerate() {
            match disposes_at.take() {
                Some((slot, instance)) if slot == index => values.push(instance),
                other => {
                    disposes_at = other;
                    values.push(self.resolve(point, context)?);
                }
            }
        }
        Ok(Arguments::new(target, values))
    }

    pub fn construct(
        &self,
        class: &str,
        constructor: &MetaConstructor,
        points: &[InjectionPoint],
        context: &Arc<InitializationContext>,
    ) -> ContainerResult<Box<RawInstance>> {
        let target = format!("{class}::new");
        let args = self.resolve_arguments(&target, points, None, context)?;
        (constructor.body)(args).map_err(|e| ContainerError::injection(target, e))
    }

    pub fn inject_field(
        &self,
        instance: &mut RawInstance,
        class: &str,
        field: &MetaField,
        point: &InjectionPoint,
        context: &Arc<InitializationContext>,
    ) -> ContainerResult<()> {
        let target = format!("{}.{}", class, field.name);
        let FieldAccess::Setter(assign) = &field.access else {
            return Err(ContainerError::Definition(format!("{target} is not assignable")));
        };
        let value = self.resolve(point, context)?;
        assign(instance, value).map_err(|e| ContainerError::injection(target, e))
    }

    pub fn invoke_method(
        &self,
        instance: &mut RawInstance,
        class: &str,
        method: &MetaMethod,
        points: &[InjectionPoint],
        context: &Arc<InitializationContext>,
    ) -> ContainerResult<()> {
        let target = format!("{}::{}", class, method.name);
        let MethodBody::Mut(body) = &method.body else {
            return Err(ContainerError::Definition(format!("{target} cannot be used for injection")));
        };
        let args = self.resolve_arguments(&target, points, None, context)?;
        body(instance, args).map_err(|e| ContainerError::injection(target, e))
    }

    /// 调用 producer 方法
    pub fn produce(
        &self,
        declaring: Option<&Instance>,
        method: &MetaMethod,
        points: &[InjectionPoint],
        context: &Arc<InitializationContext>,
    ) -> ContainerResult<Option<Instance>> {
        let target = format!("producer method '{}'", method.name);
        let args = self.resolve_arguments(&target, points, None, context)?;
        self.call(declaring, method, &target, args)
    }

    /// 调用 disposer 方法，被销毁的实例填入 disposes 参数
    pub fn dispose(
        &self,
        declaring: Option<&Instance>,
        method: &MetaMethod,
        points: &[InjectionPoint],
        disposed: Instance,
        context: &Arc<InitializationContext>,
    ) -> ContainerResult<()> {
        let target = format!("disposer method '{}'", method.name);
        let slot = method.parameters.iter().position(|p| p.disposes).ok_or_else(|| {
            ContainerError::Definition(format!("{target} has no disposes parameter"))
        })?;
        let args = self.resolve_arguments(&target, points, Some((slot, disposed)), context)?;
        self.call(declaring, method, &target, args).map(|_| ())
    }

    fn call(
        &self,
        declaring: Option<&Instance>,
        method: &MetaMethod,
        target: &str,
        args: Arguments,
    ) -> ContainerResult<Option<Instance>> {
        let result = match (&method.body, declaring) {
            (MethodBody::Static(body), _) => body(args),
            (MethodBody::Ref(body), Some(instance)) => body(instance.as_ref(), args),
            (MethodBody::Ref(_), None) => {
                return Err(ContainerError::Definition(format!(
                    "{target} requires a declaring instance"
                )))
            }
            (MethodBody::Mut(_), _) => {
                return Err(ContainerError::Definition(format!("{target} requires a mutable receiver")))
            }
        };
        result.map_err(|e| ContainerError::injection(target, e))
    }
}
