//! 元模型描述符
//!
//! 没有反射时，类、构造函数、字段、方法和参数都以显式的描述符表登记。
//! 描述符携带声明类型、限定符、作用域、标记（inject / produces / disposes）
//! 以及真正执行构造、赋值和调用的闭包。

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;

use crate::qualifier::{Qualifier, Qualifiers};
use crate::scope::ScopeType;
use crate::types::{BeanType, TypeKey};
use crate::utils::naming::short_type_name;
use crate::value::{Arguments, Instance};

/// 可变的、尚未共享的实例
pub type RawInstance = dyn Any + Send + Sync;

pub type ConstructorFn = Arc<dyn Fn(Arguments) -> anyhow::Result<Box<RawInstance>> + Send + Sync>;
pub type FieldSetter = Arc<dyn Fn(&mut RawInstance, Instance) -> anyhow::Result<()> + Send + Sync>;
pub type FieldGetter = Arc<dyn Fn(&RawInstance) -> anyhow::Result<Option<Instance>> + Send + Sync>;
pub type StaticFieldGetter = Arc<dyn Fn() -> anyhow::Result<Option<Instance>> + Send + Sync>;
pub type PostConstructFn = Arc<dyn Fn(&mut RawInstance) -> anyhow::Result<()> + Send + Sync>;
pub type PreDestroyFn = Arc<dyn Fn(&RawInstance) -> anyhow::Result<()> + Send + Sync>;

fn cast_mut<'a, C: Any>(instance: &'a mut RawInstance) -> anyhow::Result<&'a mut C> {
    instance
        .downcast_mut::<C>()
        .ok_or_else(|| anyhow!("receiver is not a {}", type_name::<C>()))
}

fn cast_ref<'a, C: Any>(instance: &'a RawInstance) -> anyhow::Result<&'a C> {
    instance
        .downcast_ref::<C>()
        .ok_or_else(|| anyhow!("receiver is not a {}", type_name::<C>()))
}

fn cast_value<T: Any + Send + Sync>(value: Instance) -> anyhow::Result<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| anyhow!("injected value is not a {}", type_name::<T>()))
}

// ========== Parameters ==========

/// 构造函数或方法的参数
#[derive(Debug, Clone)]
pub struct MetaParameter {
    pub name: String,
    pub type_key: TypeKey,
    pub qualifiers: Qualifiers,
    /// 标记为被销毁的实例（disposer 参数）
    pub disposes: bool,
}

impl MetaParameter {
    pub fn new(name: impl Into<String>, type_key: TypeKey) -> Self {
        Self {
            name: name.into(),
            type_key,
            qualifiers: Qualifiers::none(),
            disposes: false,
        }
    }

    pub fn of<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::new(name, TypeKey::of::<T>())
    }

    /// `Provider<T>` 参数
    pub fn provider<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::new(name, TypeKey::provider_of(TypeKey::of::<T>()))
    }

    /// `Optional<T>` 参数
    pub fn optional<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::new(name, TypeKey::optional_of(TypeKey::of::<T>()))
    }

    /// 请求元注入点
    pub fn injection_point(name: impl Into<String>) -> Self {
        Self::new(name, TypeKey::injection_point())
    }

    /// disposer 方法中接收被销毁实例的参数
    pub fn disposes<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        let mut parameter = Self::of::<T>(name);
        parameter.disposes = true;
        parameter
    }

    pub fn qualified(mut self, qualifier: Qualifier) -> Self {
        let mut all: Vec<Qualifier> = self.qualifiers.iter().cloned().collect();
        all.push(qualifier);
        self.qualifiers = Qualifiers::of(all);
        self
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        self.qualified(Qualifier::named(name))
    }
}

// ========== Constructors ==========

#[derive(Clone)]
pub struct MetaConstructor {
    pub parameters: Vec<MetaParameter>,
    /// 是否带有 inject 标记
    pub inject: bool,
    pub(crate) body: ConstructorFn,
}

impl MetaConstructor {
    pub fn new<T, F>(parameters: Vec<MetaParameter>, body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            parameters,
            inject: false,
            body: Arc::new(move |args| Ok(Box::new(body(args)?) as Box<RawInstance>)),
        }
    }

    /// 带 inject 标记的构造函数
    pub fn inject<T, F>(parameters: Vec<MetaParameter>, body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let mut constructor = Self::new(parameters, body);
        constructor.inject = true;
        constructor
    }

    /// 无参构造函数
    pub fn no_args<T, F>(body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::new(Vec::new(), move |_| Ok(body()))
    }

    pub fn is_no_args(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl fmt::Debug for MetaConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaConstructor")
            .field("parameters", &self.parameters)
            .field("inject", &self.inject)
            .finish()
    }
}

// ========== Fields ==========

#[derive(Clone)]
pub(crate) enum FieldAccess {
    /// 注入目标：构造完成后赋值
    Setter(FieldSetter),
    /// producer：从声明实例上读取
    Getter(FieldGetter),
    /// producer：不需要声明实例
    Static(StaticFieldGetter),
}

#[derive(Clone)]
pub struct MetaField {
    pub name: String,
    pub type_key: TypeKey,
    pub qualifiers: Qualifiers,
    pub scope: Option<ScopeType>,
    pub inject: bool,
    pub produces: bool,
    pub(crate) views: Vec<BeanType>,
    pub(crate) access: FieldAccess,
}

impl MetaField {
    /// 注入字段，值为 `Arc<T>`
    pub fn inject<C, T, F>(name: impl Into<String>, assign: F) -> Self
    where
        C: Any + Send + Sync,
        T: Any + Send + Sync,
        F: Fn(&mut C, Arc<T>) + Send + Sync + 'static,
    {
        let setter: FieldSetter = Arc::new(move |instance, value| {
            assign(cast_mut::<C>(instance)?, cast_value::<T>(value)?);
            Ok(())
        });
        Self::with_access(name, TypeKey::of::<T>(), FieldAccess::Setter(setter)).mark_inject()
    }

    /// 注入字段，按声明类型原样接收实例（如 `Provider<T>`、`Optional<T>` 字段）
    pub fn inject_raw<C, F>(name: impl Into<String>, type_key: TypeKey, assign: F) -> Self
    where
        C: Any + Send + Sync,
        F: Fn(&mut C, Instance) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let setter: FieldSetter = Arc::new(move |instance, value| assign(cast_mut::<C>(instance)?, value));
        Self::with_access(name, type_key, FieldAccess::Setter(setter)).mark_inject()
    }

    /// producer 字段
    pub fn producer<C, T, F>(name: impl Into<String>, read: F) -> Self
    where
        C: Any + Send + Sync,
        T: Any + Send + Sync,
        F: Fn(&C) -> Option<T> + Send + Sync + 'static,
    {
        let getter: FieldGetter = Arc::new(move |instance| {
            Ok(read(cast_ref::<C>(instance)?).map(|value| Arc::new(value) as Instance))
        });
        Self::with_access(name, TypeKey::of::<T>(), FieldAccess::Getter(getter)).mark_produces()
    }

    /// 不依赖声明实例的 producer 字段
    pub fn static_producer<T, F>(name: impl Into<String>, read: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> Option<T> + Send + Sync + 'static,
    {
        let getter: StaticFieldGetter =
            Arc::new(move || Ok(read().map(|value| Arc::new(value) as Instance)));
        Self::with_access(name, TypeKey::of::<T>(), FieldAccess::Static(getter)).mark_produces()
    }

    fn with_access(name: impl Into<String>, type_key: TypeKey, access: FieldAccess) -> Self {
        Self {
            name: name.into(),
            type_key,
            qualifiers: Qualifiers::none(),
            scope: None,
            inject: false,
            produces: false,
            views: Vec::new(),
            access,
        }
    }

    fn mark_inject(mut self) -> Self {
        self.inject = true;
        self
    }

    /// 同时标记 produces（非法组合，用于校验）
    pub fn mark_produces(mut self) -> Self {
        self.produces = true;
        self
    }

    pub fn qualified(mut self, qualifier: Qualifier) -> Self {
        let mut all: Vec<Qualifier> = self.qualifiers.iter().cloned().collect();
        all.push(qualifier);
        self.qualifiers = Qualifiers::of(all);
        self
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        self.qualified(Qualifier::named(name))
    }

    pub fn scope<M: 'static>(mut self) -> Self {
        self.scope = Some(ScopeType::of::<M>());
        self
    }

    /// 在产品的类型闭包中追加一个视图类型
    pub fn view(mut self, view: BeanType) -> Self {
        self.views.push(view);
        self
    }

    pub(crate) fn needs_receiver(&self) -> bool {
        !matches!(self.access, FieldAccess::Static(_))
    }
}

impl fmt::Debug for MetaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaField")
            .field("name", &self.name)
            .field("type", &self.type_key)
            .field("qualifiers", &self.qualifiers)
            .field("inject", &self.inject)
            .field("produces", &self.produces)
            .finish()
    }
}

// ========== Methods ==========

pub type MutMethodFn = Arc<dyn Fn(&mut RawInstance, Arguments) -> anyhow::Result<()> + Send + Sync>;
pub type RefMethodFn =
    Arc<dyn Fn(&RawInstance, Arguments) -> anyhow::Result<Option<Instance>> + Send + Sync>;
pub type StaticMethodFn = Arc<dyn Fn(Arguments) -> anyhow::Result<Option<Instance>> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum MethodBody {
    /// 以可变引用调用：注入方法和无参生命周期方法
    Mut(MutMethodFn),
    /// 以共享引用调用：producer 和 disposer
    Ref(RefMethodFn),
    /// 不需要声明实例
    Static(StaticMethodFn),
}

#[derive(Clone)]
pub struct MetaMethod {
    pub name: String,
    pub parameters: Vec<MetaParameter>,
    /// producer 的返回类型；其他方法为 None
    pub return_type: Option<TypeKey>,
    pub qualifiers: Qualifiers,
    pub scope: Option<ScopeType>,
    pub inject: bool,
    pub produces: bool,
    pub(crate) views: Vec<BeanType>,
    pub(crate) body: MethodBody,
}

impl MetaMethod {
    fn with_body(name: impl Into<String>, parameters: Vec<MetaParameter>, body: MethodBody) -> Self {
        Self {
            name: name.into(),
            parameters,
            return_type: None,
            qualifiers: Qualifiers::none(),
            scope: None,
            inject: false,
            produces: false,
            views: Vec::new(),
            body,
        }
    }

    /// 注入方法（setter 风格），在字段注入之后调用
    pub fn inject<C, F>(name: impl Into<String>, parameters: Vec<MetaParameter>, body: F) -> Self
    where
        C: Any + Send + Sync,
        F: Fn(&mut C, Arguments) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let body: MutMethodFn = Arc::new(move |instance, args| body(cast_mut::<C>(instance)?, args));
        let mut method = Self::with_body(name, parameters, MethodBody::Mut(body));
        method.inject = true;
        method
    }

    /// 带 inject 标记的无参方法，在所有注入完成后调用
    pub fn initializer<C, F>(name: impl Into<String>, body: F) -> Self
    where
        C: Any + Send + Sync,
        F: Fn(&mut C) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::inject::<C, _>(name, Vec::new(), move |instance, _| body(instance))
    }

    /// producer 方法，产品类型为 `T`
    pub fn producer<C, T, F>(name: impl Into<String>, parameters: Vec<MetaParameter>, body: F) -> Self
    where
        C: Any + Send + Sync,
        T: Any + Send + Sync,
        F: Fn(&C, Arguments) -> anyhow::Result<Option<T>> + Send + Sync + 'static,
    {
        let body: RefMethodFn = Arc::new(move |instance, args| {
            Ok(body(cast_ref::<C>(instance)?, args)?.map(|value| Arc::new(value) as Instance))
        });
        Self::with_body(name, parameters, MethodBody::Ref(body)).returning(TypeKey::of::<T>())
    }

    /// 不依赖声明实例的 producer 方法
    pub fn static_producer<T, F>(name: impl Into<String>, parameters: Vec<MetaParameter>, body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Arguments) -> anyhow::Result<Option<T>> + Send + Sync + 'static,
    {
        let body: StaticMethodFn =
            Arc::new(move |args| Ok(body(args)?.map(|value| Arc::new(value) as Instance)));
        Self::with_body(name, parameters, MethodBody::Static(body)).returning(TypeKey::of::<T>())
    }

    /// 以任意声明类型产出实例的 producer（如声明为 `Provider<T>`，产出 `Deferred`）
    pub fn producer_raw<C, F>(
        name: impl Into<String>,
        return_type: TypeKey,
        parameters: Vec<MetaParameter>,
        body: F,
    ) -> Self
    where
        C: Any + Send + Sync,
        F: Fn(&C, Arguments) -> anyhow::Result<Option<Instance>> + Send + Sync + 'static,
    {
        let body: RefMethodFn = Arc::new(move |instance, args| body(cast_ref::<C>(instance)?, args));
        Self::with_body(name, parameters, MethodBody::Ref(body)).returning(return_type)
    }

    /// disposer 方法；参数中恰好有一个 [`MetaParameter::disposes`]
    pub fn disposer<C, F>(name: impl Into<String>, parameters: Vec<MetaParameter>, body: F) -> Self
    where
        C: Any + Send + Sync,
        F: Fn(&C, Arguments) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let body: RefMethodFn = Arc::new(move |instance, args| {
            body(cast_ref::<C>(instance)?, args)?;
            Ok(None)
        });
        Self::with_body(name, parameters, MethodBody::Ref(body))
    }

    /// 不依赖声明实例的 disposer
    pub fn static_disposer<F>(name: impl Into<String>, parameters: Vec<MetaParameter>, body: F) -> Self
    where
        F: Fn(Arguments) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let body: StaticMethodFn = Arc::new(move |args| {
            body(args)?;
            Ok(None)
        });
        Self::with_body(name, parameters, MethodBody::Static(body))
    }

    fn returning(mut self, return_type: TypeKey) -> Self {
        self.return_type = Some(return_type);
        self.produces = true;
        self
    }

    pub fn qualified(mut self, qualifier: Qualifier) -> Self {
        let mut all: Vec<Qualifier> = self.qualifiers.iter().cloned().collect();
        all.push(qualifier);
        self.qualifiers = Qualifiers::of(all);
        self
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        self.qualified(Qualifier::named(name))
    }

    pub fn scope<M: 'static>(mut self) -> Self {
        self.scope = Some(ScopeType::of::<M>());
        self
    }

    pub fn view(mut self, view: BeanType) -> Self {
        self.views.push(view);
        self
    }

    pub fn is_disposer(&self) -> bool {
        self.parameters.iter().any(|p| p.disposes)
    }

    pub(crate) fn needs_receiver(&self) -> bool {
        !matches!(self.body, MethodBody::Static(_))
    }
}

impl fmt::Debug for MetaMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaMethod")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("return_type", &self.return_type)
            .field("inject", &self.inject)
            .field("produces", &self.produces)
            .finish()
    }
}

// ========== Classes ==========

/// 类描述符
pub struct MetaClass {
    pub name: String,
    pub type_key: TypeKey,
    pub qualifiers: Qualifiers,
    pub scope: Option<ScopeType>,
    /// 显式标记为可注入
    pub injectable: bool,
    pub constructors: Vec<MetaConstructor>,
    pub fields: Vec<MetaField>,
    pub methods: Vec<MetaMethod>,
    pub(crate) views: Vec<BeanType>,
    pub(crate) post_construct: Vec<(String, PostConstructFn)>,
    pub(crate) pre_destroy: Vec<(String, PreDestroyFn)>,
}

impl MetaClass {
    pub fn builder<T: Any + Send + Sync>() -> MetaClassBuilder<T> {
        MetaClassBuilder::new()
    }

    pub fn has_post_construct(&self) -> bool {
        !self.post_construct.is_empty()
    }
}

impl fmt::Debug for MetaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaClass")
            .field("name", &self.name)
            .field("type", &self.type_key)
            .field("qualifiers", &self.qualifiers)
            .field("scope", &self.scope)
            .field("constructors", &self.constructors.len())
            .field("fields", &self.fields)
            .field("methods", &self.methods)
            .finish()
    }
}

/// 类描述符构建器
///
/// # 示例
///
/// ```ignore
/// let class = MetaClass::builder::<ConsoleAppender>()
///     .scope::<Singleton>()
///     .named("console")
///     .implements(|appender| appender as Arc<dyn Appender>)
///     .constructor(MetaConstructor::inject(
///         vec![MetaParameter::of::<PatternLayout>("layout")],
///         |args| Ok(ConsoleAppender::new(args.get(0)?)),
///     ))
///     .build();
/// ```
pub struct MetaClassBuilder<T> {
    class: MetaClass,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> MetaClassBuilder<T> {
    fn new() -> Self {
        Self {
            class: MetaClass {
                name: short_type_name(type_name::<T>()).to_string(),
                type_key: TypeKey::of::<T>(),
                qualifiers: Qualifiers::none(),
                scope: None,
                injectable: false,
                constructors: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                views: Vec::new(),
                post_construct: Vec::new(),
                pre_destroy: Vec::new(),
            },
            _marker: std::marker::PhantomData,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.class.name = name.into();
        self
    }

    pub fn qualified(mut self, qualifier: Qualifier) -> Self {
        let mut all: Vec<Qualifier> = self.class.qualifiers.iter().cloned().collect();
        all.push(qualifier);
        self.class.qualifiers = Qualifiers::of(all);
        self
    }

    pub fn named(self, name: impl Into<String>) -> Self {
        self.qualified(Qualifier::named(name))
    }

    pub fn scope<M: 'static>(mut self) -> Self {
        self.class.scope = Some(ScopeType::of::<M>());
        self
    }

    pub fn scope_type(mut self, scope: ScopeType) -> Self {
        self.class.scope = Some(scope);
        self
    }

    pub fn injectable(mut self) -> Self {
        self.class.injectable = true;
        self
    }

    /// 把类型暴露为另一种类型（通常是 trait 对象）
    pub fn implements<V, F>(mut self, convert: F) -> Self
    where
        V: Any + Send + Sync,
        F: Fn(Arc<T>) -> V + Send + Sync + 'static,
    {
        self.class.views.push(BeanType::view_of::<T, V, F>(convert));
        self
    }

    pub fn constructor(mut self, constructor: MetaConstructor) -> Self {
        self.class.constructors.push(constructor);
        self
    }

    pub fn field(mut self, field: MetaField) -> Self {
        self.class.fields.push(field);
        self
    }

    pub fn method(mut self, method: MetaMethod) -> Self {
        self.class.methods.push(method);
        self
    }

    /// 构造和注入完成后调用（@PostConstruct）
    pub fn post_construct<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let hook: PostConstructFn = Arc::new(move |instance| hook(cast_mut::<T>(instance)?));
        self.class.post_construct.push((name.into(), hook));
        self
    }

    /// 销毁前调用（@PreDestroy）
    pub fn pre_destroy<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let hook: PreDestroyFn = Arc::new(move |instance| hook(cast_ref::<T>(instance)?));
        self.class.pre_destroy.push((name.into(), hook));
        self
    }

    pub fn build(self) -> Arc<MetaClass> {
        Arc::new(self.class)
    }
}
