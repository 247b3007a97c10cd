//! 元模型：类描述符及其读取器

mod element_manager;
mod injection_point;
pub mod meta;
mod variable;

pub use element_manager::{DefaultElementManager, ElementManager};
pub use injection_point::{InjectionElement, InjectionPoint};
pub use meta::{MetaClass, MetaClassBuilder, MetaConstructor, MetaField, MetaMethod, MetaParameter};
pub use variable::Variable;
