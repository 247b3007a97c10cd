use crate::qualifier::Qualifiers;
use crate::scope::ScopeType;
use crate::types::{BeanType, TypeKey};

/// 可注入变量：类型闭包 + 限定符 + 作用域
///
/// 由 [`ElementManager`](super::ElementManager) 从类、字段或方法上读出，
/// 第一项是主类型，其余是声明的视图类型。
#[derive(Debug, Clone)]
pub struct Variable {
    types: Vec<BeanType>,
    qualifiers: Qualifiers,
    scope: ScopeType,
}

impl Variable {
    pub fn new(types: Vec<BeanType>, qualifiers: Qualifiers, scope: ScopeType) -> Self {
        Self {
            types,
            qualifiers,
            scope,
        }
    }

    /// 只有主类型的变量
    pub fn of(key: TypeKey, qualifiers: Qualifiers, scope: ScopeType) -> Self {
        Self::new(vec![BeanType::primary(key)], qualifiers, scope)
    }

    pub fn types(&self) -> &[BeanType] {
        &self.types
    }

    pub fn primary_type(&self) -> Option<&TypeKey> {
        self.types.first().map(|t| &t.key)
    }

    pub fn qualifiers(&self) -> &Qualifiers {
        &self.qualifiers
    }

    pub fn scope_type(&self) -> ScopeType {
        self.scope
    }

    /// 请求的类型是否在类型闭包中
    ///
    /// 对非泛型请求，泛型类型按其原始类型参与匹配。
    pub fn has_matching_type(&self, requested: &TypeKey) -> bool {
        self.find_type(requested).is_some()
    }

    pub(crate) fn find_type(&self, requested: &TypeKey) -> Option<&BeanType> {
        self.types.iter().find(|t| &t.key == requested).or_else(|| match requested {
            TypeKey::Class(raw) => self
                .types
                .iter()
                .find(|t| t.key.is_parameterized() && t.key.raw_type() == Some(*raw)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawType;
    use std::sync::Arc;

    trait Layout: Send + Sync {}
    struct Pattern;
    impl Layout for Pattern {}
    struct Sink<T>(std::marker::PhantomData<T>);

    #[test]
    fn test_matching_includes_views() {
        let variable = Variable::new(
            vec![
                BeanType::primary(TypeKey::of::<Pattern>()),
                BeanType::view_of::<Pattern, Arc<dyn Layout>, _>(|p| p as Arc<dyn Layout>),
            ],
            Qualifiers::none(),
            ScopeType::singleton(),
        );

        assert!(variable.has_matching_type(&TypeKey::of::<Pattern>()));
        assert!(variable.has_matching_type(&TypeKey::of::<Arc<dyn Layout>>()));
        assert!(!variable.has_matching_type(&TypeKey::of::<String>()));
        assert_eq!(variable.primary_type(), Some(&TypeKey::of::<Pattern>()));
    }

    #[test]
    fn test_raw_request_matches_parameterized_type() {
        let raw = RawType::of::<Sink<()>>();
        let strings = TypeKey::parameterized(raw, vec![TypeKey::of::<String>()]);
        let variable = Variable::of(strings.clone(), Qualifiers::none(), ScopeType::dependent());

        assert!(variable.has_matching_type(&TypeKey::Class(raw)));
        assert!(!variable.has_matching_type(&TypeKey::parameterized(raw, vec![TypeKey::of::<u8>()])));
    }
}
