//! 类型描述
//!
//! Rust 没有运行时反射，容器用 [`TypeKey`] 描述注入请求和 Bean 的声明类型。
//! 具体的 Rust 类型通过 `TypeId` 标识；泛型类型显式写成原始类型加类型参数，
//! 这样查找时才能先按原始类型索引、再按完整的泛型参数过滤。

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::{ContainerError, ContainerResult};
use crate::value::Instance;

/// 原始类型（去掉泛型参数之后的类型）
#[derive(Clone, Copy)]
pub enum RawType {
    /// 一个具体的 Rust 类型
    Of { id: TypeId, name: &'static str },
    /// 延迟访问器 `Provider<T>`
    Provider,
    /// 可选包装 `Optional<T>`
    Optional,
    /// Bean 描述符自身 `Bean<T>`
    Bean,
    /// 元注入点类型
    InjectionPoint,
}

impl RawType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        RawType::Of {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RawType::Of { name, .. } => name,
            RawType::Provider => "Provider",
            RawType::Optional => "Optional",
            RawType::Bean => "Bean",
            RawType::InjectionPoint => "InjectionPoint",
        }
    }

    fn identity(&self) -> (u8, Option<TypeId>) {
        match self {
            RawType::Of { id, .. } => (0, Some(*id)),
            RawType::Provider => (1, None),
            RawType::Optional => (2, None),
            RawType::Bean => (3, None),
            RawType::InjectionPoint => (4, None),
        }
    }
}

impl PartialEq for RawType {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for RawType {}

impl std::hash::Hash for RawType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for RawType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 注入请求或 Bean 声明的类型
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    /// 非泛型类型
    Class(RawType),
    /// 带类型参数的泛型类型
    Parameterized { raw: RawType, args: Vec<TypeKey> },
    /// 未绑定的泛型参数（不可注入）
    Variable(&'static str),
}

impl TypeKey {
    /// 具体 Rust 类型 `T` 的描述，存放的实例即 `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeKey::Class(RawType::of::<T>())
    }

    pub fn parameterized(raw: RawType, args: Vec<TypeKey>) -> Self {
        TypeKey::Parameterized { raw, args }
    }

    /// `Provider<inner>`
    pub fn provider_of(inner: TypeKey) -> Self {
        Self::parameterized(RawType::Provider, vec![inner])
    }

    /// `Optional<inner>`
    pub fn optional_of(inner: TypeKey) -> Self {
        Self::parameterized(RawType::Optional, vec![inner])
    }

    /// `Bean<inner>`
    pub fn bean_of(inner: TypeKey) -> Self {
        Self::parameterized(RawType::Bean, vec![inner])
    }

    /// 元注入点类型
    pub fn injection_point() -> Self {
        TypeKey::Class(RawType::InjectionPoint)
    }

    pub fn variable(name: &'static str) -> Self {
        TypeKey::Variable(name)
    }

    /// 原始类型；泛型参数没有原始类型
    pub fn raw_type(&self) -> Option<RawType> {
        match self {
            TypeKey::Class(raw) | TypeKey::Parameterized { raw, .. } => Some(*raw),
            TypeKey::Variable(_) => None,
        }
    }

    pub fn type_arguments(&self) -> &[TypeKey] {
        match self {
            TypeKey::Parameterized { args, .. } => args,
            _ => &[],
        }
    }

    pub fn is_parameterized(&self) -> bool {
        matches!(self, TypeKey::Parameterized { .. })
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, TypeKey::Variable(_))
    }

    /// 若为 `wrapper<X>`（单参数）则返回 X
    pub fn unwrap(&self, wrapper: RawType) -> Option<&TypeKey> {
        match self {
            TypeKey::Parameterized { raw, args } if *raw == wrapper && args.len() == 1 => args.first(),
            _ => None,
        }
    }

    pub fn is_raw(&self, raw: RawType) -> bool {
        self.raw_type() == Some(raw)
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKey::Class(raw) => f.write_str(raw.name()),
            TypeKey::Parameterized { raw, args } => {
                write!(f, "{}<", raw.name())?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            TypeKey::Variable(name) => f.write_str(name),
        }
    }
}

/// 视图转换：把 Bean 的主实例转换为类型闭包中的另一种类型
pub type ViewFn = Arc<dyn Fn(&Instance) -> ContainerResult<Instance> + Send + Sync>;

/// 类型闭包中的一项
///
/// Rust 没有继承，Bean 能匹配的"父类型/接口"由显式声明的视图组成，
/// 例如把 `ConsoleAppender` 暴露为 `Arc<dyn Appender>`。
#[derive(Clone)]
pub struct BeanType {
    pub key: TypeKey,
    view: Option<ViewFn>,
}

impl BeanType {
    /// 主类型，实例无需转换
    pub fn primary(key: TypeKey) -> Self {
        Self { key, view: None }
    }

    pub fn with_view(key: TypeKey, view: ViewFn) -> Self {
        Self {
            key,
            view: Some(view),
        }
    }

    /// 由具体类型 `T` 到视图类型 `V` 的转换
    pub fn view_of<T, V, F>(convert: F) -> Self
    where
        T: Any + Send + Sync,
        V: Any + Send + Sync,
        F: Fn(Arc<T>) -> V + Send + Sync + 'static,
    {
        let view: ViewFn = Arc::new(move |instance: &Instance| {
            let typed = Arc::clone(instance).downcast::<T>().map_err(|_| ContainerError::TypeMismatch {
                expected: type_name::<T>().to_string(),
                found: "instance of another type".to_string(),
            })?;
            Ok(Arc::new(convert(typed)) as Instance)
        });
        Self::with_view(TypeKey::of::<V>(), view)
    }

    /// 把主实例转换为本项描述的类型
    pub fn apply(&self, instance: &Instance) -> ContainerResult<Instance> {
        match &self.view {
            Some(view) => view(instance),
            None => Ok(Arc::clone(instance)),
        }
    }
}

impl fmt::Debug for BeanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanType")
            .field("key", &self.key)
            .field("view", &self.view.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    struct Sink<T>(std::marker::PhantomData<T>);

    #[test]
    fn test_parameterized_keys_compare_arguments() {
        let raw = RawType::of::<Sink<()>>();
        let strings = TypeKey::parameterized(raw, vec![TypeKey::of::<String>()]);
        let numbers = TypeKey::parameterized(raw, vec![TypeKey::of::<u32>()]);

        assert_ne!(strings, numbers);
        assert_eq!(strings.raw_type(), numbers.raw_type());
        assert!(TypeKey::variable("T").raw_type().is_none());
    }

    #[test]
    fn test_unwrap_wrapper_types() {
        let provider = TypeKey::provider_of(TypeKey::of::<String>());

        assert_eq!(provider.unwrap(RawType::Provider), Some(&TypeKey::of::<String>()));
        assert_eq!(provider.unwrap(RawType::Optional), None);
        assert_eq!(provider.to_string(), "Provider<alloc::string::String>");
    }

    #[test]
    fn test_view_converts_to_trait_object() {
        let entry = BeanType::view_of::<English, Arc<dyn Greeter>, _>(|e| e as Arc<dyn Greeter>);
        let instance: Instance = Arc::new(English);

        let converted = entry.apply(&instance).unwrap();
        let greeter = converted.downcast_ref::<Arc<dyn Greeter>>().unwrap();
        assert_eq!(greeter.greet(), "hello");
        assert_eq!(entry.key, TypeKey::of::<Arc<dyn Greeter>>());
    }
}
