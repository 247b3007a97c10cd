// arbor-core: 插件系统使用的依赖注入容器
//
// 提供基于运行时元数据的 Bean 解析，支持：
// - 构造函数、字段和方法注入
// - producer 字段/方法与对应的 disposer
// - Provider / Optional / InjectionPoint 等合成注入
// - 可插拔作用域（默认有 Dependent 和 Singleton）
// - 按初始化上下文级联销毁

pub mod bean;
pub mod bean_manager;
pub mod config;
pub mod context;
pub mod error;
pub mod injector;
pub mod logging;
pub mod model;
pub mod qualifier;
pub mod registry;
pub mod scope;
pub mod scope_context;
pub mod types;
pub mod utils;
pub mod value;

// 重新导出常用类型
pub use bean::{Bean, BeanKind, BeanRef};
pub use bean_manager::BeanManager;
pub use config::{
    ConfigValue, ContainerSettings, Environment, EnvironmentPropertySource, MapPropertySource,
    PropertySource, TomlPropertySource,
};
pub use context::{ContextGuard, InitializationContext};
pub use error::{ContainerError, ContainerResult, Result};
pub use injector::Injector;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use model::{
    DefaultElementManager, ElementManager, InjectionElement, InjectionPoint, MetaClass,
    MetaClassBuilder, MetaConstructor, MetaField, MetaMethod, MetaParameter, Variable,
};
pub use qualifier::{Qualifier, Qualifiers};
pub use registry::{submitted_classes, BeanClassSubmission};
pub use scope::{Dependent, ScopeType, Singleton};
pub use scope_context::{DefaultScopeContext, DependentScopeContext, ScopeContext};
pub use types::{BeanType, RawType, TypeKey};
pub use value::{Arguments, Deferred, Instance, OptionalValue, Provider};

// 导出 inventory，供 submit_bean_class! 使用
pub use inventory;

/// Prelude 模块，包含描述和使用 Bean 时常用的类型
pub mod prelude {
    pub use crate::bean::{Bean, BeanRef};
    pub use crate::bean_manager::BeanManager;
    pub use crate::config::{ContainerSettings, Environment};
    pub use crate::error::{ContainerError, ContainerResult, Result};
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::model::{
        InjectionPoint, MetaClass, MetaConstructor, MetaField, MetaMethod, MetaParameter,
    };
    pub use crate::qualifier::{Qualifier, Qualifiers};
    pub use crate::scope::{Dependent, ScopeType, Singleton};
    pub use crate::submit_bean_class;
    pub use crate::types::TypeKey;
    pub use crate::value::{Arguments, Provider};
    pub use anyhow::{anyhow, Context};
}
