use std::any::{type_name, TypeId};
use std::fmt;

/// 原型作用域标记 - 每次请求都创建新实例，实例由创建它的上下文跟踪
pub struct Dependent;

/// 单例作用域标记 - 容器中只有一个实例
pub struct Singleton;

/// Bean 的作用域，由标记类型标识
///
/// 除了内置的 [`Dependent`] 和 [`Singleton`]，任意标记类型都可以通过
/// `BeanManager::register_scope` 注册自定义的缓存策略。
#[derive(Clone, Copy)]
pub struct ScopeType {
    id: TypeId,
    name: &'static str,
}

impl ScopeType {
    pub fn of<M: 'static>() -> Self {
        let full = type_name::<M>();
        Self {
            id: TypeId::of::<M>(),
            name: full.rsplit("::").next().unwrap_or(full),
        }
    }

    pub fn dependent() -> Self {
        Self::of::<Dependent>()
    }

    pub fn singleton() -> Self {
        Self::of::<Singleton>()
    }

    pub fn is_dependent(&self) -> bool {
        self.id == TypeId::of::<Dependent>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Default for ScopeType {
    fn default() -> Self {
        Self::dependent()
    }
}

impl PartialEq for ScopeType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ScopeType {}

impl std::hash::Hash for ScopeType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RequestScoped;

    #[test]
    fn test_scope_identity() {
        assert_eq!(ScopeType::default(), ScopeType::dependent());
        assert!(ScopeType::dependent().is_dependent());
        assert!(!ScopeType::singleton().is_dependent());
        assert_ne!(ScopeType::of::<RequestScoped>(), ScopeType::singleton());
        assert_eq!(ScopeType::of::<RequestScoped>().to_string(), "@RequestScoped");
    }
}
