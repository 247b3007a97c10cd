//! 实例与参数
//!
//! 容器内部统一用 [`Instance`]（`Arc<dyn Any + Send + Sync>`）传递实例，
//! 在用户闭包的边界上再通过 [`Arguments`] 还原为具体类型。

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::bean::BeanRef;
use crate::error::{ContainerError, ContainerResult};
use crate::model::InjectionPoint;

/// 容器管理的实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// `Optional<T>` 请求对应的值
pub type OptionalValue = Option<Instance>;

/// 把实例转换为具体类型
pub fn downcast<T: Any + Send + Sync>(instance: Instance) -> ContainerResult<Arc<T>> {
    instance.downcast::<T>().map_err(|_| ContainerError::TypeMismatch {
        expected: type_name::<T>().to_string(),
        found: "instance of another type".to_string(),
    })
}

fn downcast_ref<'a, T: Any>(instance: &'a Instance, what: &str) -> ContainerResult<&'a T> {
    instance.downcast_ref::<T>().ok_or_else(|| ContainerError::TypeMismatch {
        expected: type_name::<T>().to_string(),
        found: what.to_string(),
    })
}

/// 延迟求值的实例
///
/// `Provider<X>` 请求注入的就是它：构造依赖方时不会创建 X，
/// 只有调用 [`Deferred::get`] 时才解析。打断循环依赖靠的也是它。
#[derive(Clone)]
pub struct Deferred {
    thunk: Arc<dyn Fn() -> ContainerResult<Instance> + Send + Sync>,
}

impl Deferred {
    pub fn new<F>(thunk: F) -> Self
    where
        F: Fn() -> ContainerResult<Instance> + Send + Sync + 'static,
    {
        Self {
            thunk: Arc::new(thunk),
        }
    }

    pub fn get(&self) -> ContainerResult<Instance> {
        (self.thunk)()
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred")
    }
}

/// 类型化的延迟访问器
pub struct Provider<T> {
    deferred: Deferred,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Provider<T> {
    pub fn from_deferred(deferred: Deferred) -> Self {
        Self {
            deferred,
            _marker: PhantomData,
        }
    }

    /// 由普通函数构造，例如用于声明一个 `Provider<T>` 类型的 producer
    pub fn from_fn<F>(factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self::from_deferred(Deferred::new(move || {
            let value = factory().map_err(|e| ContainerError::injection(type_name::<T>(), e))?;
            Ok(Arc::new(value) as Instance)
        }))
    }

    pub fn get(&self) -> ContainerResult<Arc<T>> {
        downcast(self.deferred.get()?)
    }

    pub fn into_deferred(self) -> Deferred {
        self.deferred
    }
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            deferred: self.deferred.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Provider<{}>", type_name::<T>())
    }
}

/// 注入器为一次调用解析出的参数列表
pub struct Arguments {
    target: String,
    values: Vec<Instance>,
}

impl Arguments {
    pub fn new(target: impl Into<String>, values: Vec<Instance>) -> Self {
        Self {
            target: target.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn instance(&self, index: usize) -> ContainerResult<&Instance> {
        self.values.get(index).ok_or_else(|| {
            ContainerError::Definition(format!(
                "{} has no argument at position {} ({} resolved)",
                self.target,
                index,
                self.values.len()
            ))
        })
    }

    /// 第 `index` 个参数，作为 `Arc<T>`
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> ContainerResult<Arc<T>> {
        downcast(Arc::clone(self.instance(index)?))
    }

    /// 第 `index` 个参数的克隆值，适合 `Arc<dyn Trait>` 之类的视图类型
    pub fn cloned<T: Any + Clone>(&self, index: usize) -> ContainerResult<T> {
        downcast_ref::<T>(self.instance(index)?, &self.target).cloned()
    }

    pub fn provider<T: Any + Send + Sync>(&self, index: usize) -> ContainerResult<Provider<T>> {
        let deferred = downcast_ref::<Deferred>(self.instance(index)?, &self.target)?;
        Ok(Provider::from_deferred(deferred.clone()))
    }

    pub fn optional<T: Any + Send + Sync>(&self, index: usize) -> ContainerResult<Option<Arc<T>>> {
        let value = downcast_ref::<OptionalValue>(self.instance(index)?, &self.target)?;
        value.clone().map(downcast::<T>).transpose()
    }

    pub fn injection_point(&self, index: usize) -> ContainerResult<InjectionPoint> {
        downcast_ref::<InjectionPoint>(self.instance(index)?, &self.target).cloned()
    }

    pub fn bean(&self, index: usize) -> ContainerResult<BeanRef> {
        downcast_ref::<BeanRef>(self.instance(index)?, &self.target).cloned()
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("target", &self.target)
            .field("len", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_provider_defers_until_get() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let provider = Provider::<String>::from_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok("built".to_string())
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(*provider.get().unwrap(), "built");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_arguments_typed_access() {
        let some: OptionalValue = Some(Arc::new(7_u32));
        let none: OptionalValue = None;
        let args = Arguments::new(
            "test",
            vec![
                Arc::new("text".to_string()),
                Arc::new(some),
                Arc::new(none),
            ],
        );

        assert_eq!(*args.get::<String>(0).unwrap(), "text");
        assert_eq!(*args.optional::<u32>(1).unwrap().unwrap(), 7);
        assert!(args.optional::<u32>(2).unwrap().is_none());
        assert!(matches!(args.get::<u32>(0), Err(ContainerError::TypeMismatch { .. })));
        assert!(matches!(args.instance(5), Err(ContainerError::Definition(_))));
    }
}
