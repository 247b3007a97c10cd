use std::collections::HashSet;
use std::sync::{Arc, Weak};

use crate::bean::Bean;
use crate::bean_manager::BeanManager;
use crate::context::InitializationContext;
use crate::error::{ContainerError, ContainerResult};
use crate::model::meta::RawInstance;
use crate::model::{ElementManager, InjectionPoint, MetaClass, MetaConstructor, MetaField, MetaMethod};
use crate::value::Instance;

/// 一个类的完整注入方案：选定的构造函数、注入字段、注入方法和生命周期回调
pub struct InjectionTarget {
    class: Arc<MetaClass>,
    constructor: MetaConstructor,
    constructor_points: Vec<InjectionPoint>,
    fields: Vec<(MetaField, InjectionPoint)>,
    methods: Vec<(MetaMethod, Vec<InjectionPoint>)>,
    /// 带 inject 标记的无参方法
    initializers: Vec<MetaMethod>,
    points: Vec<InjectionPoint>,
}

impl InjectionTarget {
    pub fn class(&self) -> &Arc<MetaClass> {
        &self.class
    }

    pub fn constructor(&self) -> &MetaConstructor {
        &self.constructor
    }

    /// 构造函数、字段、方法的全部注入点
    pub fn injection_points(&self) -> &[InjectionPoint] {
        &self.points
    }

    /// 构造实例
    pub fn produce(
        &self,
        manager: &BeanManager,
        context: &Arc<InitializationContext>,
    ) -> ContainerResult<Box<RawInstance>> {
        manager
            .injector()
            .construct(&self.class.name, &self.constructor, &self.constructor_points, context)
    }

    /// 字段注入，然后是方法注入，最后调用无参的初始化方法
    pub fn inject(
        &self,
        instance: &mut RawInstance,
        manager: &BeanManager,
        context: &Arc<InitializationContext>,
    ) -> ContainerResult<()> {
        let injector = manager.injector();
        for (field, point) in &self.fields {
            injector.inject_field(instance, &self.class.name, field, point, context)?;
        }
        for (method, points) in &self.methods {
            injector.invoke_method(instance, &self.class.name, method, points, context)?;
        }
        for method in &self.initializers {
            injector.invoke_method(instance, &self.class.name, method, &[], context)?;
        }
        Ok(())
    }

    pub fn post_construct(&self, instance: &mut RawInstance) -> ContainerResult<()> {
        for (name, hook) in &self.class.post_construct {
            hook(instance).map_err(|e| ContainerError::injection(format!("{}::{}", self.class.name, name), e))?;
        }
        Ok(())
    }

    /// 依次调用全部销毁回调，返回第一个失败
    pub fn pre_destroy(&self, instance: &RawInstance) -> ContainerResult<()> {
        let mut first_error = None;
        for (name, hook) in &self.class.pre_destroy {
            if let Err(e) = hook(instance) {
                tracing::warn!("Pre-destroy hook '{}::{}' failed: {}", self.class.name, name, e);
                first_error.get_or_insert(ContainerError::injection(format!("{}::{}", self.class.name, name), e));
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// 由类描述符和选定的构造函数生成 [`InjectionTarget`]
pub struct InjectionTargetFactory<'a> {
    elements: &'a dyn ElementManager,
}

impl<'a> InjectionTargetFactory<'a> {
    pub fn new(elements: &'a dyn ElementManager) -> Self {
        Self { elements }
    }

    pub fn create_injection_target(
        &self,
        class: Arc<MetaClass>,
        constructor: MetaConstructor,
        bean: &Weak<Bean>,
    ) -> InjectionTarget {
        let member = format!("{}::new", class.name);
        let constructor_points =
            self.elements
                .create_executable_injection_points(&member, &constructor.parameters, Some(bean));

        let fields: Vec<(MetaField, InjectionPoint)> = class
            .fields
            .iter()
            .filter(|field| field.inject)
            .map(|field| (field.clone(), self.elements.create_field_injection_point(field, Some(bean))))
            .collect();

        let mut injected = HashSet::new();
        let mut methods = Vec::new();
        let mut initializers = Vec::new();
        for method in class.methods.iter().filter(|m| m.inject && !m.produces && !m.is_disposer()) {
            if !injected.insert(method.name.clone()) {
                continue;
            }
            if method.parameters.is_empty() {
                initializers.push(method.clone());
            } else {
                let member = format!("{}::{}", class.name, method.name);
                let points = self
                    .elements
                    .create_executable_injection_points(&member, &method.parameters, Some(bean));
                methods.push((method.clone(), points));
            }
        }

        let points = constructor_points
            .iter()
            .chain(fields.iter().map(|(_, point)| point))
            .chain(methods.iter().flat_map(|(_, points)| points.iter()))
            .cloned()
            .collect();

        InjectionTarget {
            class,
            constructor,
            constructor_points,
            fields,
            methods,
            initializers,
            points,
        }
    }
}

/// 注入目标 Bean
pub struct InjectionTargetBean {
    target: InjectionTarget,
}

impl InjectionTargetBean {
    pub fn new(target: InjectionTarget) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &InjectionTarget {
        &self.target
    }

    pub(crate) fn create(
        &self,
        bean: &Bean,
        manager: &BeanManager,
        context: &Arc<InitializationContext>,
    ) -> ContainerResult<Instance> {
        let mut instance = self.target.produce(manager, context)?;
        self.target.inject(instance.as_mut(), manager, context)?;
        self.target.post_construct(instance.as_mut())?;

        let instance: Instance = Arc::from(instance);
        if bean.is_dependent_scoped() {
            context.add_incomplete_instance(Arc::clone(&instance));
        }
        tracing::debug!("Bean '{}' created", bean.name());
        Ok(instance)
    }

    pub(crate) fn destroy(
        &self,
        bean: &Bean,
        instance: &Instance,
        context: &Arc<InitializationContext>,
    ) -> ContainerResult<()> {
        let result = if bean.is_dependent_scoped() {
            self.target.pre_destroy(instance.as_ref())
        } else {
            Ok(())
        };
        context.close();
        result
    }
}
