//! BeanManager - 容器的核心
//!
//! 负责加载 Bean、按 (类型, 限定符) 解析、校验注入点以及管理作用域。

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::bean::{
    next_bean_id, Bean, BeanKind, BeanRef, Disposer, InjectionTargetBean, InjectionTargetFactory, OptionalBean,
    ProducerBean, ProducerFactory, ProducerMember, ProvidedBean, ProviderBean, SystemBean,
};
use crate::config::{ContainerSettings, Environment};
use crate::context::InitializationContext;
use crate::error::{ContainerError, ContainerResult};
use crate::injector::Injector;
use crate::model::{
    DefaultElementManager, ElementManager, InjectionPoint, MetaClass, MetaField, MetaMethod, MetaParameter, Variable,
};
use crate::qualifier::Qualifiers;
use crate::registry;
use crate::scope::ScopeType;
use crate::scope_context::{DefaultScopeContext, DependentScopeContext, ScopeContext};
use crate::types::{BeanType, RawType, TypeKey};
use crate::utils::dependency::CreationTracker;
use crate::utils::naming::to_camel_case;
use crate::value::{downcast, Deferred, Instance, OptionalValue, Provider};

/// disposer 索引项
struct DisposerEntry {
    type_key: TypeKey,
    qualifiers: Qualifiers,
    declaring_bean: Option<BeanRef>,
    class_name: String,
    method: MetaMethod,
}

impl DisposerEntry {
    fn matches(&self, declaring: Option<&BeanRef>, variable: &Variable) -> bool {
        let same_declaring = match (&self.declaring_bean, declaring) {
            (Some(a), Some(b)) => a.id() == b.id(),
            (None, None) => true,
            _ => false,
        };
        same_declaring && &self.qualifiers == variable.qualifiers() && variable.has_matching_type(&self.type_key)
    }
}

pub struct BeanManager {
    this: Weak<BeanManager>,
    elements: Arc<dyn ElementManager>,
    injector: Injector,
    settings: ContainerSettings,
    /// 按注册顺序排列的全部 Bean
    beans: RwLock<Vec<BeanRef>>,
    beans_by_type: RwLock<HashMap<TypeKey, Vec<BeanRef>>>,
    disposers: RwLock<Vec<DisposerEntry>>,
    /// 合成的包装 Bean，按 (请求类型, 限定符) 缓存
    synthetic: RwLock<HashMap<(TypeKey, Qualifiers), BeanRef>>,
    /// 按注册顺序排列，关闭时逆序
    scopes: RwLock<Vec<(ScopeType, Arc<dyn ScopeContext>)>>,
    creation_tracker: CreationTracker,
    closed: AtomicBool,
}

impl BeanManager {
    pub fn new() -> Arc<Self> {
        Self::with_settings(ContainerSettings::default())
    }

    pub fn with_settings(settings: ContainerSettings) -> Arc<Self> {
        Self::with_element_manager(Arc::new(DefaultElementManager::new()), settings)
    }

    pub fn with_element_manager(elements: Arc<dyn ElementManager>, settings: ContainerSettings) -> Arc<Self> {
        let scopes: Vec<(ScopeType, Arc<dyn ScopeContext>)> = vec![
            (ScopeType::dependent(), Arc::new(DependentScopeContext)),
            (ScopeType::singleton(), Arc::new(DefaultScopeContext::singleton())),
        ];
        let manager = Arc::new_cyclic(|this| Self {
            this: this.clone(),
            elements,
            injector: Injector::new(this.clone()),
            settings,
            beans: RwLock::new(Vec::new()),
            beans_by_type: RwLock::new(HashMap::new()),
            disposers: RwLock::new(Vec::new()),
            synthetic: RwLock::new(HashMap::new()),
            scopes: RwLock::new(scopes),
            creation_tracker: CreationTracker::new(),
            closed: AtomicBool::new(false),
        });
        tracing::debug!("Bean manager created with {:?}", manager.settings);
        manager
    }

    /// 从配置环境创建，并把环境本身注册为系统 Bean
    pub fn from_environment(environment: Arc<Environment>) -> ContainerResult<Arc<Self>> {
        let settings = ContainerSettings::from_environment(&environment)?;
        let manager = Self::with_settings(settings);
        manager.bind_instance_with(
            "environment",
            vec![BeanType::primary(TypeKey::of::<Environment>())],
            Qualifiers::none(),
            environment,
        );
        Ok(manager)
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.settings
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    pub fn element_manager(&self) -> &dyn ElementManager {
        self.elements.as_ref()
    }

    pub(crate) fn creation_tracker(&self) -> &CreationTracker {
        &self.creation_tracker
    }

    /// 已注册的 Bean（不含合成的包装 Bean）
    pub fn beans(&self) -> Vec<BeanRef> {
        self.beans.read().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> ContainerResult<()> {
        if self.is_closed() {
            return Err(ContainerError::Resolution("bean manager has been closed".to_string()));
        }
        Ok(())
    }

    // ========== Loading ==========

    /// 加载一批类描述符，返回新注册的 Bean
    ///
    /// 设置了 `validate_on_load` 时，返回前校验新 Bean 的所有注入点。
    pub fn load_beans<I>(&self, classes: I) -> ContainerResult<Vec<BeanRef>>
    where
        I: IntoIterator<Item = Arc<MetaClass>>,
    {
        self.ensure_open()?;
        let classes: Vec<Arc<MetaClass>> = classes.into_iter().collect();
        let pending = self.declared_variables(&classes)?;

        let mut loaded = Vec::new();
        for class in &classes {
            self.load_class(class, &pending, &mut loaded)?;
        }
        tracing::info!("Loaded {} bean(s) from {} class(es)", loaded.len(), classes.len());

        if self.settings.validate_on_load {
            self.validate_beans(&loaded)?;
        }
        if self.settings.preinstantiate_singletons {
            self.preinstantiate(&loaded)?;
        }
        Ok(loaded)
    }

    /// 加载通过 `submit_bean_class!` 提交的全部类
    pub fn scan_and_load_beans(&self) -> ContainerResult<Vec<BeanRef>> {
        let classes = registry::submitted_classes();
        tracing::debug!("Scanning found {} submitted bean class(es)", classes.len());
        self.load_beans(classes)
    }

    /// 本批次中各类将要声明的变量，用于构造函数选择时判断参数能否解析
    fn declared_variables(&self, classes: &[Arc<MetaClass>]) -> ContainerResult<Vec<Variable>> {
        let mut variables = Vec::new();
        for class in classes {
            if self.elements.is_injectable(class) {
                variables.push(self.elements.create_class_variable(class));
            }
            for method in class.methods.iter().filter(|m| m.produces) {
                variables.push(self.elements.create_method_variable(method)?);
            }
            for field in class.fields.iter().filter(|f| f.produces) {
                variables.push(self.elements.create_field_variable(field));
            }
        }
        Ok(variables)
    }

    fn load_class(&self, class: &Arc<MetaClass>, pending: &[Variable], loaded: &mut Vec<BeanRef>) -> ContainerResult<()> {
        let bean = if self.elements.is_injectable(class) {
            Some(self.create_injection_target_bean(class, pending)?)
        } else {
            None
        };

        self.load_disposer_methods(class, bean.as_ref())?;

        for method in class.methods.iter().filter(|m| m.produces) {
            loaded.push(self.create_producer_method_bean(class, method, bean.as_ref())?);
        }
        for field in class.fields.iter().filter(|f| f.produces) {
            loaded.push(self.create_producer_field_bean(class, field, bean.as_ref())?);
        }
        if let Some(bean) = bean {
            loaded.push(bean);
        }
        Ok(())
    }

    /// 为单个类注册注入目标 Bean
    pub fn create_bean(&self, class: &Arc<MetaClass>) -> ContainerResult<BeanRef> {
        self.ensure_open()?;
        self.create_injection_target_bean(class, &[])
    }

    fn create_injection_target_bean(&self, class: &Arc<MetaClass>, pending: &[Variable]) -> ContainerResult<BeanRef> {
        let variable = self.elements.create_class_variable(class);
        let constructor = self
            .elements
            .injectable_constructor(class, &|parameter: &MetaParameter| self.is_resolvable(parameter, pending))?
            .clone();
        let name = bean_name(&class.name, variable.qualifiers());

        let bean = Arc::new_cyclic(|weak: &Weak<Bean>| {
            let target =
                InjectionTargetFactory::new(self.elements.as_ref()).create_injection_target(Arc::clone(class), constructor, weak);
            Bean::new(
                next_bean_id(),
                name,
                variable,
                self.this.clone(),
                BeanKind::InjectionTarget(InjectionTargetBean::new(target)),
            )
        });
        self.add_bean(Arc::clone(&bean));
        Ok(bean)
    }

    fn is_resolvable(&self, parameter: &MetaParameter, pending: &[Variable]) -> bool {
        self.is_type_resolvable(&parameter.type_key, &parameter.qualifiers, pending)
    }

    fn is_type_resolvable(&self, type_key: &TypeKey, qualifiers: &Qualifiers, pending: &[Variable]) -> bool {
        if type_key.is_raw(RawType::InjectionPoint) || type_key.is_raw(RawType::Bean) || type_key.is_raw(RawType::Optional) {
            return true;
        }
        if let Some(inner) = type_key.unwrap(RawType::Provider) {
            return self.is_type_resolvable(inner, qualifiers, pending);
        }
        if matches!(self.get_bean(type_key, qualifiers), Ok(Some(_))) {
            return true;
        }
        let provider = TypeKey::provider_of(type_key.clone());
        pending.iter().any(|variable| {
            variable.qualifiers() == qualifiers
                && (variable.has_matching_type(type_key) || variable.has_matching_type(&provider))
        })
    }

    fn load_disposer_methods(&self, class: &MetaClass, declaring: Option<&BeanRef>) -> ContainerResult<()> {
        for method in class.methods.iter().filter(|m| m.is_disposer()) {
            let disposed: Vec<&MetaParameter> = method.parameters.iter().filter(|p| p.disposes).collect();
            let [parameter] = disposed.as_slice() else {
                return Err(ContainerError::Definition(format!(
                    "disposer method {}::{} must declare exactly one disposes parameter, found {}",
                    class.name,
                    method.name,
                    disposed.len()
                )));
            };
            if method.produces {
                return Err(ContainerError::Definition(format!(
                    "method {}::{} cannot be both a producer and a disposer",
                    class.name, method.name
                )));
            }
            if method.needs_receiver() && declaring.is_none() {
                return Err(ContainerError::Definition(format!(
                    "disposer method {}::{} is declared outside a bean",
                    class.name, method.name
                )));
            }
            tracing::debug!("Disposer method registered: {}::{}", class.name, method.name);
            self.disposers.write().push(DisposerEntry {
                type_key: parameter.type_key.clone(),
                qualifiers: parameter.qualifiers.clone(),
                declaring_bean: declaring.cloned(),
                class_name: class.name.clone(),
                method: method.clone(),
            });
        }
        Ok(())
    }

    fn create_producer_method_bean(
        &self,
        class: &MetaClass,
        method: &MetaMethod,
        declaring: Option<&BeanRef>,
    ) -> ContainerResult<BeanRef> {
        if method.needs_receiver() && declaring.is_none() {
            return Err(ContainerError::Definition(format!(
                "producer method {}::{} is declared outside a bean",
                class.name, method.name
            )));
        }
        let variable = self.elements.create_method_variable(method)?;
        let owner = declaring.map(Arc::downgrade);
        let points = self.elements.create_executable_injection_points(
            &format!("{}::{}", class.name, method.name),
            &method.parameters,
            owner.as_ref(),
        );
        let member = ProducerMember::Method {
            method: method.clone(),
            points,
        };
        self.register_producer(&method.name, variable, declaring, member)
    }

    fn create_producer_field_bean(
        &self,
        class: &MetaClass,
        field: &MetaField,
        declaring: Option<&BeanRef>,
    ) -> ContainerResult<BeanRef> {
        if field.needs_receiver() && declaring.is_none() {
            return Err(ContainerError::Definition(format!(
                "producer field {}.{} is declared outside a bean",
                class.name, field.name
            )));
        }
        let variable = self.elements.create_field_variable(field);
        self.register_producer(&field.name, variable, declaring, ProducerMember::Field(field.clone()))
    }

    fn register_producer(
        &self,
        member_name: &str,
        variable: Variable,
        declaring: Option<&BeanRef>,
        member: ProducerMember,
    ) -> ContainerResult<BeanRef> {
        let disposer = self.resolve_disposer(declaring, &variable)?;
        let factory = ProducerFactory::new(member, disposer);
        let bean = Arc::new(Bean::new(
            next_bean_id(),
            bean_name(member_name, variable.qualifiers()),
            variable,
            self.this.clone(),
            BeanKind::Producer(ProducerBean::new(declaring.cloned(), factory)),
        ));
        self.add_bean(Arc::clone(&bean));
        Ok(bean)
    }

    /// 查找与 producer 匹配的 disposer，多个匹配时报错
    fn resolve_disposer(&self, declaring: Option<&BeanRef>, variable: &Variable) -> ContainerResult<Option<Disposer>> {
        let disposers = self.disposers.read();
        let matching: Vec<&DisposerEntry> = disposers.iter().filter(|d| d.matches(declaring, variable)).collect();
        match matching.as_slice() {
            [] => Ok(None),
            [entry] => {
                let owner = declaring.map(Arc::downgrade);
                let points = self.elements.create_executable_injection_points(
                    &format!("{}::{}", entry.class_name, entry.method.name),
                    &entry.method.parameters,
                    owner.as_ref(),
                );
                Ok(Some(Disposer::new(entry.method.clone(), points)))
            }
            many => Err(ContainerError::Resolution(format!(
                "ambiguous disposer methods for {} {}: [{}]",
                variable.qualifiers(),
                variable.primary_type().map(ToString::to_string).unwrap_or_default(),
                many.iter()
                    .map(|d| format!("{}::{}", d.class_name, d.method.name))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// 注册容器直接提供的值
    pub fn bind_instance<T: Any + Send + Sync>(&self, value: T) -> BeanRef {
        let name = to_camel_case(crate::utils::naming::short_type_name(type_name::<T>()));
        self.bind_instance_with(
            name,
            vec![BeanType::primary(TypeKey::of::<T>())],
            Qualifiers::none(),
            Arc::new(value),
        )
    }

    pub fn bind_instance_with(
        &self,
        name: impl Into<String>,
        types: Vec<BeanType>,
        qualifiers: Qualifiers,
        value: Instance,
    ) -> BeanRef {
        let bean = Arc::new(Bean::new(
            next_bean_id(),
            name,
            Variable::new(types, qualifiers, ScopeType::dependent()),
            self.this.clone(),
            BeanKind::System(SystemBean::new(value)),
        ));
        self.add_bean(Arc::clone(&bean));
        bean
    }

    fn add_bean(&self, bean: BeanRef) {
        {
            let mut index = self.beans_by_type.write();
            for bean_type in bean.types() {
                let key = &bean_type.key;
                index.entry(key.clone()).or_default().push(Arc::clone(&bean));
                if let (true, Some(raw)) = (key.is_parameterized(), key.raw_type()) {
                    let raw_entry = index.entry(TypeKey::Class(raw)).or_default();
                    if !raw_entry.iter().any(|b| b.id() == bean.id()) {
                        raw_entry.push(Arc::clone(&bean));
                    }
                }
            }
        }
        tracing::debug!("Bean registered: {}", bean);
        self.beans.write().push(bean);
    }

    // ========== Resolution ==========

    /// 按 (类型, 限定符) 查找 Bean
    ///
    /// 依次尝试：已注册的 Bean、由 `Provider<T>` 绑定适配的 Bean、
    /// 为 `Provider<X>` 合成延迟访问器、为 `Optional<X>` 合成可选包装。
    pub fn get_bean(&self, type_key: &TypeKey, qualifiers: &Qualifiers) -> ContainerResult<Option<BeanRef>> {
        tracing::trace!("Resolving bean for {} {}", qualifiers, type_key);
        if let Some(bean) = self.get_existing_or_provided_bean(type_key, qualifiers)? {
            return Ok(Some(bean));
        }

        if let Some(inner) = type_key.unwrap(RawType::Provider) {
            let Some(target) = self.get_bean(inner, qualifiers)? else {
                return Ok(None);
            };
            let bean = self.synthetic_bean(type_key, qualifiers, ScopeType::dependent(), || {
                (format!("Provider<{}>", target.name()), BeanKind::Provider(ProviderBean::new(Arc::clone(&target))))
            });
            return Ok(Some(bean));
        }

        if let Some(inner) = type_key.unwrap(RawType::Optional) {
            let scope = self
                .get_existing_bean(inner, qualifiers)
                .ok()
                .flatten()
                .map(|bean| bean.scope_type())
                .unwrap_or_default();
            let bean = self.synthetic_bean(type_key, qualifiers, scope, || {
                (
                    format!("Optional<{inner}>"),
                    BeanKind::Optional(OptionalBean::new(inner.clone(), qualifiers.clone())),
                )
            });
            return Ok(Some(bean));
        }

        Ok(None)
    }

    /// 已注册的 Bean，或由 `Provider<T>` 绑定适配出的 Bean
    pub fn get_existing_or_provided_bean(
        &self,
        type_key: &TypeKey,
        qualifiers: &Qualifiers,
    ) -> ContainerResult<Option<BeanRef>> {
        if let Some(bean) = self.get_existing_bean(type_key, qualifiers)? {
            return Ok(Some(bean));
        }
        let provider_type = TypeKey::provider_of(type_key.clone());
        let Some(provider) = self.get_existing_bean(&provider_type, qualifiers)? else {
            return Ok(None);
        };
        let bean = self.synthetic_bean(type_key, qualifiers, ScopeType::dependent(), || {
            (format!("provided:{}", provider.name()), BeanKind::Provided(ProvidedBean::new(Arc::clone(&provider))))
        });
        Ok(Some(bean))
    }

    /// 只在已注册的 Bean 中查找
    pub fn get_existing_bean(&self, type_key: &TypeKey, qualifiers: &Qualifiers) -> ContainerResult<Option<BeanRef>> {
        let candidates: Vec<BeanRef> = {
            let index = self.beans_by_type.read();
            let registered = match index.get(type_key) {
                Some(beans) => Some(beans),
                None if type_key.is_parameterized() => {
                    type_key.raw_type().and_then(|raw| index.get(&TypeKey::Class(raw)))
                }
                None => None,
            };
            registered
                .map(|beans| {
                    beans
                        .iter()
                        .filter(|b| b.qualifiers() == qualifiers && b.has_matching_type(type_key))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        match candidates.len() {
            0 => Ok(None),
            1 => Ok(candidates.into_iter().next()),
            _ => Err(ContainerError::AmbiguousBean {
                target: format!("{qualifiers} {type_key}"),
                candidates: candidates.iter().map(|b| b.name().to_string()).collect(),
            }),
        }
    }

    fn synthetic_bean<F>(&self, type_key: &TypeKey, qualifiers: &Qualifiers, scope: ScopeType, make: F) -> BeanRef
    where
        F: FnOnce() -> (String, BeanKind),
    {
        let key = (type_key.clone(), qualifiers.clone());
        if let Some(bean) = self.synthetic.read().get(&key) {
            return Arc::clone(bean);
        }
        let mut synthetic = self.synthetic.write();
        let bean = synthetic.entry(key).or_insert_with(|| {
            let (name, kind) = make();
            let bean = Arc::new(Bean::new(
                next_bean_id(),
                name,
                Variable::of(type_key.clone(), qualifiers.clone(), scope),
                self.this.clone(),
                kind,
            ));
            tracing::debug!("Synthetic bean registered: {}", bean);
            bean
        });
        Arc::clone(bean)
    }

    pub fn create_initialization_context(&self, bean: Option<&BeanRef>) -> Arc<InitializationContext> {
        InitializationContext::new(bean.cloned())
    }

    /// 在 Bean 的作用域中获取（或创建）实例
    pub fn get_value(&self, bean: &BeanRef, parent: &Arc<InitializationContext>) -> ContainerResult<Instance> {
        self.get_value_for(bean, parent, None)
    }

    fn get_value_for(
        &self,
        bean: &BeanRef,
        parent: &Arc<InitializationContext>,
        point: Option<&InjectionPoint>,
    ) -> ContainerResult<Instance> {
        self.ensure_open()?;
        let scope = self.scope_context(bean.scope_type())?;
        let context = parent.derive(bean, point);
        scope.get_or_create(bean, Arc::clone(&context)).inspect_err(|e| {
            // 创建失败时派生上下文不会挂到父上下文上，已创建的 per-use 依赖在此销毁
            tracing::debug!("Creating bean '{}' failed, releasing its dependents: {}", bean.name(), e);
            context.close();
        })
    }

    /// 解析注入点的值，并转换为注入点请求的类型视图
    pub fn get_injectable_value(
        &self,
        point: &InjectionPoint,
        parent: &Arc<InitializationContext>,
    ) -> ContainerResult<Option<Instance>> {
        let resolved = self
            .get_bean(point.type_key(), point.qualifiers())?
            .ok_or_else(|| ContainerError::UnsatisfiedBean(point.to_string()))?;

        if let Some(owner) = point.bean() {
            if owner.id() != resolved.id() {
                if let Some(existing) = self.get_existing_value(&resolved, &owner, parent) {
                    tracing::trace!("Reusing existing instance of bean '{}' for {}", resolved.name(), point);
                    return resolved.view(existing, point.type_key()).map(Some);
                }
            }
        }

        let context = if resolved.is_dependent_scoped() {
            Arc::clone(parent)
        } else {
            self.create_initialization_context(Some(&resolved))
        };
        let value = self.get_value_for(&resolved, &context, Some(point))?;
        resolved.view(value, point.type_key()).map(Some)
    }

    fn get_existing_value(
        &self,
        resolved: &BeanRef,
        owner: &BeanRef,
        parent: &InitializationContext,
    ) -> Option<Instance> {
        if owner.is_dependent_scoped() && parent.non_dependent_scoped_dependent().is_none() {
            return None;
        }
        parent.incomplete_instance(resolved).or_else(|| {
            self.scope_context(resolved.scope_type())
                .ok()
                .and_then(|scope| scope.get_if_exists(resolved))
        })
    }

    // ========== Validation ==========

    /// 校验一批 Bean 的所有注入点，失败时一次性返回全部错误
    pub fn validate_beans(&self, beans: &[BeanRef]) -> ContainerResult<()> {
        let errors: Vec<String> = beans
            .iter()
            .flat_map(|bean| bean.injection_points().iter())
            .filter_map(|point| self.validate_injection_point(point).err())
            .map(|e| e.to_string())
            .collect();

        if errors.is_empty() {
            tracing::debug!("Validated {} bean(s)", beans.len());
            return Ok(());
        }
        tracing::warn!("Bean validation found {} error(s)", errors.len());
        Err(ContainerError::Validation(errors))
    }

    pub fn validate_injection_point(&self, point: &InjectionPoint) -> ContainerResult<()> {
        if point.is_producer_element() {
            return Err(ContainerError::Definition(format!(
                "cannot inject into a producer element: {point}"
            )));
        }
        let type_key = point.type_key();
        if type_key.is_variable() {
            return Err(ContainerError::Definition(format!(
                "injection point type cannot be a type variable: {point}"
            )));
        }

        if type_key.is_raw(RawType::InjectionPoint) {
            let owner = point.bean().ok_or_else(|| {
                ContainerError::Definition(format!("InjectionPoint requested outside of a bean: {point}"))
            })?;
            if !owner.is_dependent_scoped() {
                return Err(ContainerError::Definition(format!(
                    "InjectionPoint can only be injected into per-use beans: {point}"
                )));
            }
            return Ok(());
        }

        if type_key.is_raw(RawType::Bean) {
            let owner = point
                .bean()
                .ok_or_else(|| ContainerError::UnsatisfiedBean(format!("{point}: not declared by a bean")))?;
            return validate_bean_injection_point(point, owner.primary_type());
        }

        if self.get_bean(type_key, point.qualifiers())?.is_none() && !type_key.is_raw(RawType::Optional) {
            return Err(ContainerError::UnsatisfiedBean(point.to_string()));
        }
        Ok(())
    }

    // ========== Scopes ==========

    /// 注册作用域；同一作用域再次注册时替换原有实现
    pub fn register_scope(&self, scope_type: ScopeType, context: Arc<dyn ScopeContext>) {
        let mut scopes = self.scopes.write();
        match scopes.iter_mut().find(|(registered, _)| *registered == scope_type) {
            Some(entry) => entry.1 = context,
            None => scopes.push((scope_type, context)),
        }
        tracing::debug!("Scope registered: {}", scope_type);
    }

    /// 以标记类型注册一个缓存型作用域
    pub fn register_cached_scope<M: 'static>(&self) -> Arc<DefaultScopeContext> {
        let scope_type = ScopeType::of::<M>();
        let context = Arc::new(DefaultScopeContext::new(scope_type));
        self.register_scope(scope_type, Arc::clone(&context) as Arc<dyn ScopeContext>);
        context
    }

    pub fn scope_context(&self, scope_type: ScopeType) -> ContainerResult<Arc<dyn ScopeContext>> {
        self.scopes
            .read()
            .iter()
            .find(|(registered, _)| *registered == scope_type)
            .map(|(_, context)| Arc::clone(context))
            .ok_or_else(|| ContainerError::Resolution(format!("no scope context registered for {scope_type}")))
    }

    /// 预先创建全部单例
    pub fn preinstantiate_singletons(&self) -> ContainerResult<usize> {
        let beans = self.beans();
        self.preinstantiate(&beans)
    }

    fn preinstantiate(&self, beans: &[BeanRef]) -> ContainerResult<usize> {
        let singletons: Vec<&BeanRef> = beans.iter().filter(|b| b.scope_type() == ScopeType::singleton()).collect();
        tracing::debug!("Pre-instantiating {} singleton bean(s)", singletons.len());
        for bean in &singletons {
            let context = self.create_initialization_context(Some(bean));
            self.get_value(bean, &context)?;
        }
        Ok(singletons.len())
    }

    /// 关闭容器：逆序关闭所有作用域并清空注册表；重复调用无效
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!("Closing bean manager");
        let scopes = std::mem::take(&mut *self.scopes.write());
        for (scope_type, context) in scopes.into_iter().rev() {
            tracing::debug!("Closing scope {}", scope_type);
            context.close();
        }
        self.synthetic.write().clear();
        self.disposers.write().clear();
        self.beans_by_type.write().clear();
        self.beans.write().clear();
        tracing::info!("Bean manager closed");
    }

    // ========== Typed helpers ==========

    /// 获取默认限定符下类型为 `T` 的实例
    ///
    /// 实例在新的根上下文中创建，per-use 实例的销毁由调用方负责。
    pub fn get_instance<T: Any + Send + Sync>(&self) -> ContainerResult<Arc<T>> {
        self.get_qualified_instance::<T>(Qualifiers::none())
    }

    pub fn get_qualified_instance<T: Any + Send + Sync>(
        &self,
        qualifiers: impl Into<Qualifiers>,
    ) -> ContainerResult<Arc<T>> {
        let type_key = TypeKey::of::<T>();
        downcast(self.resolve_instance(&type_key, &qualifiers.into())?)
    }

    pub fn get_provider<T: Any + Send + Sync>(&self) -> ContainerResult<Provider<T>> {
        let type_key = TypeKey::provider_of(TypeKey::of::<T>());
        let value = self.resolve_instance(&type_key, &Qualifiers::none())?;
        let deferred = downcast::<Deferred>(value)?;
        Ok(Provider::from_deferred(Deferred::clone(&deferred)))
    }

    pub fn get_optional<T: Any + Send + Sync>(&self) -> ContainerResult<Option<Arc<T>>> {
        let type_key = TypeKey::optional_of(TypeKey::of::<T>());
        let value = downcast::<OptionalValue>(self.resolve_instance(&type_key, &Qualifiers::none())?)?;
        value.as_ref().clone().map(downcast::<T>).transpose()
    }

    fn resolve_instance(&self, type_key: &TypeKey, qualifiers: &Qualifiers) -> ContainerResult<Instance> {
        let bean = self
            .get_bean(type_key, qualifiers)?
            .ok_or_else(|| ContainerError::UnsatisfiedBean(format!("{qualifiers} {type_key}")))?;
        let context = self.create_initialization_context(Some(&bean));
        let value = self.get_value(&bean, &context)?;
        bean.view(value, type_key)
    }
}

impl std::fmt::Debug for BeanManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanManager")
            .field("beans", &self.beans.read().len())
            .field("scopes", &self.scopes.read().iter().map(|(s, _)| *s).collect::<Vec<_>>())
            .field("settings", &self.settings)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// `Bean<X>` 注入点必须恰好有一个类型参数；默认限定符下还须等于声明/产出的类型
fn validate_bean_injection_point(point: &InjectionPoint, expected: Option<&TypeKey>) -> ContainerResult<()> {
    let args = point.type_key().type_arguments();
    let [actual] = args else {
        return Err(ContainerError::Definition(format!(
            "Bean injection point must declare exactly one type argument: {point}"
        )));
    };
    if point.qualifiers().is_default() && Some(actual) != expected {
        return Err(ContainerError::Definition(format!(
            "Bean injection point type argument {} does not match bean type {}: {point}",
            actual,
            expected.map(ToString::to_string).unwrap_or_else(|| "<none>".to_string())
        )));
    }
    Ok(())
}

/// `Named` 限定符的名称，或 camelCase 的默认名
fn bean_name(default: &str, qualifiers: &Qualifiers) -> String {
    qualifiers
        .iter()
        .find_map(|q| if q.tag == "Named" { q.name.clone() } else { None })
        .unwrap_or_else(|| to_camel_case(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigValue, MapPropertySource};
    use crate::model::MetaConstructor;
    use crate::scope::Singleton;

    struct Clock;

    fn clock_class() -> Arc<MetaClass> {
        MetaClass::builder::<Clock>()
            .scope::<Singleton>()
            .constructor(MetaConstructor::no_args(|| Clock))
            .build()
    }

    #[test]
    fn test_synthetic_beans_are_cached() {
        let manager = BeanManager::new();
        manager.load_beans([clock_class()]).unwrap();
        let provider_type = TypeKey::provider_of(TypeKey::of::<Clock>());

        let first = manager.get_bean(&provider_type, &Qualifiers::none()).unwrap().unwrap();
        let second = manager.get_bean(&provider_type, &Qualifiers::none()).unwrap().unwrap();

        assert_eq!(first.id(), second.id());
        assert!(first.is_synthetic());
        assert_eq!(manager.beans().len(), 1);
    }

    #[test]
    fn test_bind_instance_uses_camel_case_name() {
        let manager = BeanManager::new();
        let bean = manager.bind_instance(Clock);

        assert_eq!(bean.name(), "clock");
        assert!(manager.get_instance::<Clock>().is_ok());
    }

    #[test]
    fn test_from_environment_reads_settings() {
        let environment = Environment::new().with_source(
            MapPropertySource::new("test")
                .with_property(crate::config::VALIDATE_ON_LOAD_KEY, ConfigValue::Bool(false)),
        );
        let manager = BeanManager::from_environment(Arc::new(environment)).unwrap();

        assert!(!manager.settings().validate_on_load);
        assert!(manager.get_instance::<Environment>().is_ok());
    }

    #[test]
    fn test_register_scope_replaces_existing() {
        let manager = BeanManager::new();
        let replacement = Arc::new(DefaultScopeContext::singleton());
        manager.register_scope(ScopeType::singleton(), Arc::clone(&replacement) as Arc<dyn ScopeContext>);
        manager.load_beans([clock_class()]).unwrap();

        manager.get_instance::<Clock>().unwrap();
        assert_eq!(replacement.len(), 1);
    }

    #[test]
    fn test_bean_name_prefers_named_qualifier() {
        assert_eq!(bean_name("ConsoleAppender", &Qualifiers::none()), "consoleAppender");
        assert_eq!(bean_name("ConsoleAppender", &Qualifiers::named("console")), "console");
    }
}
