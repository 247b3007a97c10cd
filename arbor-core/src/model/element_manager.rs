use std::sync::Weak;

use crate::bean::Bean;
use crate::error::{ContainerError, ContainerResult};
use crate::scope::ScopeType;
use crate::types::BeanType;

use super::injection_point::{InjectionElement, InjectionPoint};
use super::meta::{MetaClass, MetaConstructor, MetaField, MetaMethod, MetaParameter};
use super::variable::Variable;

/// 元模型读取器
///
/// BeanManager 只通过这个 trait 读取类描述符，判断可注入性、
/// 推导变量、选择构造函数以及生成注入点。
pub trait ElementManager: Send + Sync {
    /// 类是否可以作为注入目标 Bean
    fn is_injectable(&self, class: &MetaClass) -> bool;

    /// 类本身对应的变量
    fn create_class_variable(&self, class: &MetaClass) -> Variable;

    /// producer 字段对应的变量
    fn create_field_variable(&self, field: &MetaField) -> Variable;

    /// producer 方法对应的变量
    fn create_method_variable(&self, method: &MetaMethod) -> ContainerResult<Variable>;

    /// 选择用于构造实例的构造函数
    ///
    /// `resolvable` 判断单个参数当前能否被解析。
    fn injectable_constructor<'a>(
        &self,
        class: &'a MetaClass,
        resolvable: &dyn Fn(&MetaParameter) -> bool,
    ) -> ContainerResult<&'a MetaConstructor>;

    /// 构造函数或方法参数的注入点，顺序与参数一致
    fn create_executable_injection_points(
        &self,
        member: &str,
        parameters: &[MetaParameter],
        bean: Option<&Weak<Bean>>,
    ) -> Vec<InjectionPoint>;

    fn create_field_injection_point(&self, field: &MetaField, bean: Option<&Weak<Bean>>) -> InjectionPoint;
}

/// 默认的元模型读取器
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultElementManager;

impl DefaultElementManager {
    pub fn new() -> Self {
        Self
    }
}

impl ElementManager for DefaultElementManager {
    fn is_injectable(&self, class: &MetaClass) -> bool {
        class.injectable
            || class.scope.is_some()
            || !class.qualifiers.is_default()
            || class.constructors.iter().any(|c| c.inject)
            || class.fields.iter().any(|f| f.inject)
            || class.methods.iter().any(|m| m.inject)
    }

    fn create_class_variable(&self, class: &MetaClass) -> Variable {
        let mut types = vec![BeanType::primary(class.type_key.clone())];
        types.extend(class.views.iter().cloned());
        Variable::new(types, class.qualifiers.clone(), class.scope.unwrap_or_default())
    }

    fn create_field_variable(&self, field: &MetaField) -> Variable {
        let mut types = vec![BeanType::primary(field.type_key.clone())];
        types.extend(field.views.iter().cloned());
        Variable::new(types, field.qualifiers.clone(), field.scope.unwrap_or_else(ScopeType::dependent))
    }

    fn create_method_variable(&self, method: &MetaMethod) -> ContainerResult<Variable> {
        let return_type = method.return_type.clone().ok_or_else(|| {
            ContainerError::Definition(format!("producer method '{}' declares no return type", method.name))
        })?;
        let mut types = vec![BeanType::primary(return_type)];
        types.extend(method.views.iter().cloned());
        Ok(Variable::new(
            types,
            method.qualifiers.clone(),
            method.scope.unwrap_or_else(ScopeType::dependent),
        ))
    }

    fn injectable_constructor<'a>(
        &self,
        class: &'a MetaClass,
        resolvable: &dyn Fn(&MetaParameter) -> bool,
    ) -> ContainerResult<&'a MetaConstructor> {
        let marked: Vec<&MetaConstructor> = class.constructors.iter().filter(|c| c.inject).collect();
        match marked.len() {
            0 => {}
            1 => return Ok(marked[0]),
            n => {
                return Err(ContainerError::Definition(format!(
                    "class {} has {} inject-marked constructors",
                    class.name, n
                )))
            }
        }

        let satisfiable: Vec<&MetaConstructor> = class
            .constructors
            .iter()
            .filter(|c| c.parameters.iter().all(|p| resolvable(p)))
            .collect();
        if let [only] = satisfiable.as_slice() {
            return Ok(*only);
        }

        if let [only] = class.constructors.as_slice() {
            if only.is_no_args() {
                return Ok(only);
            }
        }

        class.constructors.iter().find(|c| c.is_no_args()).ok_or_else(|| {
            ContainerError::Definition(format!("no injectable constructor found for class {}", class.name))
        })
    }

    fn create_executable_injection_points(
        &self,
        member: &str,
        parameters: &[MetaParameter],
        bean: Option<&Weak<Bean>>,
    ) -> Vec<InjectionPoint> {
        parameters
            .iter()
            .enumerate()
            .map(|(index, parameter)| {
                InjectionPoint::new(
                    InjectionElement::Parameter {
                        member: member.to_string(),
                        index,
                        name: parameter.name.clone(),
                    },
                    parameter.type_key.clone(),
                    parameter.qualifiers.clone(),
                    bean.cloned(),
                )
            })
            .collect()
    }

    fn create_field_injection_point(&self, field: &MetaField, bean: Option<&Weak<Bean>>) -> InjectionPoint {
        InjectionPoint::new(
            InjectionElement::Field {
                name: field.name.clone(),
            },
            field.type_key.clone(),
            field.qualifiers.clone(),
            bean.cloned(),
        )
        .with_produces(field.produces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::meta::MetaClass;
    use crate::scope::Singleton;

    struct Plain;
    struct Service(u32);

    #[test]
    fn test_injectable_predicate() {
        let manager = DefaultElementManager::new();
        let plain = MetaClass::builder::<Plain>()
            .constructor(MetaConstructor::no_args(|| Plain))
            .build();
        let scoped = MetaClass::builder::<Plain>().scope::<Singleton>().build();
        let marked = MetaClass::builder::<Plain>().injectable().build();

        assert!(!manager.is_injectable(&plain));
        assert!(manager.is_injectable(&scoped));
        assert!(manager.is_injectable(&marked));
    }

    #[test]
    fn test_marked_constructor_wins() {
        let manager = DefaultElementManager::new();
        let class = MetaClass::builder::<Service>()
            .constructor(MetaConstructor::no_args(|| Service(0)))
            .constructor(MetaConstructor::inject(vec![MetaParameter::of::<u32>("value")], |args| {
                Ok(Service(*args.get::<u32>(0)?))
            }))
            .build();

        let chosen = manager.injectable_constructor(&class, &|_| false).unwrap();
        assert!(chosen.inject);
    }

    #[test]
    fn test_multiple_marked_constructors_rejected() {
        let manager = DefaultElementManager::new();
        let class = MetaClass::builder::<Service>()
            .constructor(MetaConstructor::inject(Vec::new(), |_| Ok(Service(0))))
            .constructor(MetaConstructor::inject(vec![MetaParameter::of::<u32>("value")], |args| {
                Ok(Service(*args.get::<u32>(0)?))
            }))
            .build();

        let result = manager.injectable_constructor(&class, &|_| true);
        assert!(matches!(result, Err(ContainerError::Definition(_))));
    }

    #[test]
    fn test_falls_back_to_zero_arg_constructor() {
        let manager = DefaultElementManager::new();
        let class = MetaClass::builder::<Service>()
            .constructor(MetaConstructor::new(vec![MetaParameter::of::<u32>("value")], |args| {
                Ok(Service(*args.get::<u32>(0)?))
            }))
            .constructor(MetaConstructor::no_args(|| Service(0)))
            .build();

        // 两个构造函数都可解析时不唯一，退回到无参构造函数
        let chosen = manager.injectable_constructor(&class, &|_| true).unwrap();
        assert!(chosen.is_no_args());

        let only_args = MetaClass::builder::<Service>()
            .constructor(MetaConstructor::new(vec![MetaParameter::of::<u32>("value")], |args| {
                Ok(Service(*args.get::<u32>(0)?))
            }))
            .build();
        assert!(manager.injectable_constructor(&only_args, &|_| true).is_ok());
        assert!(matches!(
            manager.injectable_constructor(&only_args, &|_| false),
            Err(ContainerError::Definition(_))
        ));
    }

    #[test]
    fn test_parameter_points_follow_declaration_order() {
        let manager = DefaultElementManager::new();
        let params = vec![
            MetaParameter::of::<String>("name").named("alpha"),
            MetaParameter::provider::<u32>("count"),
        ];

        let points = manager.create_executable_injection_points("Service::new", &params, None);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].qualifiers(), &crate::qualifier::Qualifiers::named("alpha"));
        assert_eq!(points[1].element().name(), "count");
        assert!(points[1].bean().is_none());
    }
}
