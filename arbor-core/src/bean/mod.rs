//! Bean：类型化、带限定符、有作用域的生产单元
//!
//! 所有变体共用一个 [`Bean`] 结构体，具体的创建和销毁逻辑由 [`BeanKind`] 区分。

mod injection_target;
mod producer;
mod synthetic;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

pub use injection_target::{InjectionTarget, InjectionTargetBean, InjectionTargetFactory};
pub use producer::{Disposer, ProducerBean, ProducerFactory, ProducerMember};
pub use synthetic::{OptionalBean, ProvidedBean, ProviderBean, SystemBean};

use crate::bean_manager::BeanManager;
use crate::context::InitializationContext;
use crate::error::{ContainerError, ContainerResult};
use crate::model::{InjectionPoint, Variable};
use crate::qualifier::Qualifiers;
use crate::scope::ScopeType;
use crate::types::{BeanType, TypeKey};
use crate::value::Instance;

/// 共享的 Bean 引用，按 id 比较
pub type BeanRef = Arc<Bean>;

static NEXT_BEAN_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_bean_id() -> u64 {
    NEXT_BEAN_ID.fetch_add(1, Ordering::Relaxed)
}

/// Bean 的具体变体
pub enum BeanKind {
    /// 构造函数 + 字段 + 方法注入
    InjectionTarget(InjectionTargetBean),
    /// 调用声明 Bean 上的 producer 字段或方法
    Producer(ProducerBean),
    /// `Provider<X>` 请求的延迟访问器
    Provider(ProviderBean),
    /// 把 `Provider<X>` 绑定适配成 `X` 绑定
    Provided(ProvidedBean),
    /// `Optional<X>` 请求
    Optional(OptionalBean),
    /// 容器直接提供的值
    System(SystemBean),
}

impl BeanKind {
    fn label(&self) -> &'static str {
        match self {
            BeanKind::InjectionTarget(_) => "InjectionTarget",
            BeanKind::Producer(_) => "Producer",
            BeanKind::Provider(_) => "Provider",
            BeanKind::Provided(_) => "Provided",
            BeanKind::Optional(_) => "Optional",
            BeanKind::System(_) => "System",
        }
    }
}

pub struct Bean {
    id: u64,
    name: String,
    variable: Variable,
    manager: Weak<BeanManager>,
    kind: BeanKind,
}

impl Bean {
    pub(crate) fn new(
        id: u64,
        name: impl Into<String>,
        variable: Variable,
        manager: Weak<BeanManager>,
        kind: BeanKind,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            variable,
            manager,
            kind,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &BeanKind {
        &self.kind
    }

    pub fn variable(&self) -> &Variable {
        &self.variable
    }

    pub fn types(&self) -> &[BeanType] {
        self.variable.types()
    }

    /// 类型闭包的第一项：注入目标的类，或 producer 的返回类型
    pub fn primary_type(&self) -> Option<&TypeKey> {
        self.variable.primary_type()
    }

    pub fn qualifiers(&self) -> &Qualifiers {
        self.variable.qualifiers()
    }

    pub fn scope_type(&self) -> ScopeType {
        self.variable.scope_type()
    }

    pub fn is_dependent_scoped(&self) -> bool {
        self.scope_type().is_dependent()
    }

    pub fn has_matching_type(&self, requested: &TypeKey) -> bool {
        self.variable.has_matching_type(requested)
    }

    /// 容器合成的包装 Bean（不参与按类型的索引）
    pub fn is_synthetic(&self) -> bool {
        matches!(
            self.kind,
            BeanKind::Provider(_) | BeanKind::Provided(_) | BeanKind::Optional(_)
        )
    }

    pub fn injection_points(&self) -> &[InjectionPoint] {
        match &self.kind {
            BeanKind::InjectionTarget(bean) => bean.target().injection_points(),
            BeanKind::Producer(bean) => bean.factory().injection_points(),
            _ => &[],
        }
    }

    /// 创建实例
    ///
    /// 同一线程在创建过程中再次进入同一个 Bean 时返回 `CircularDependency`。
    pub fn create(&self, context: &Arc<InitializationContext>) -> ContainerResult<Instance> {
        let manager = self.manager()?;
        let _creating = manager.creation_tracker().start_creating(self.id, &self.name)?;
        tracing::trace!("Creating instance of {} bean '{}'", self.kind.label(), self.name);

        match &self.kind {
            BeanKind::InjectionTarget(bean) => bean.create(self, &manager, context),
            BeanKind::Producer(bean) => bean.create(self, &manager, context),
            BeanKind::Provider(bean) => Ok(bean.create(&self.manager, context)),
            BeanKind::Provided(bean) => bean.create(&manager, context),
            BeanKind::Optional(bean) => bean.create(&manager, context),
            BeanKind::System(bean) => Ok(bean.create()),
        }
    }

    /// 销毁实例并关闭其上下文
    pub fn destroy(&self, instance: Instance, context: &Arc<InitializationContext>) -> ContainerResult<()> {
        tracing::trace!("Destroying instance of bean '{}'", self.name);
        match &self.kind {
            BeanKind::InjectionTarget(bean) => bean.destroy(self, &instance, context),
            BeanKind::Producer(bean) => match self.manager() {
                Ok(manager) => bean.destroy(self, &manager, instance, context),
                Err(e) => {
                    context.close();
                    Err(e)
                }
            },
            _ => {
                context.close();
                Ok(())
            }
        }
    }

    /// 把主实例转换为请求的类型视图；请求的类型不在闭包中时原样返回
    pub fn view(&self, instance: Instance, requested: &TypeKey) -> ContainerResult<Instance> {
        match self.variable.find_type(requested) {
            Some(bean_type) => bean_type.apply(&instance),
            None => Ok(instance),
        }
    }

    pub(crate) fn ensure_not_creating(&self) -> ContainerResult<()> {
        let manager = self.manager()?;
        let probe = manager.creation_tracker().start_creating(self.id, &self.name)?;
        drop(probe);
        Ok(())
    }

    pub(crate) fn manager(&self) -> ContainerResult<Arc<BeanManager>> {
        self.manager
            .upgrade()
            .ok_or_else(|| ContainerError::Resolution(format!("container of bean '{}' has been dropped", self.name)))
    }
}

impl PartialEq for Bean {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Bean {}

impl Hash for Bean {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bean")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind.label())
            .field("types", &self.variable.types().iter().map(|t| &t.key).collect::<Vec<_>>())
            .field("qualifiers", self.qualifiers())
            .field("scope", &self.scope_type())
            .finish()
    }
}

impl fmt::Display for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bean '{}' {} {}", self.kind.label(), self.name, self.qualifiers(), self.scope_type())
    }
}
