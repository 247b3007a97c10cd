use std::fmt;
use std::sync::Weak;

use crate::bean::{Bean, BeanRef};
use crate::qualifier::Qualifiers;
use crate::types::TypeKey;

/// 注入点所在的元素
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionElement {
    /// 构造函数或方法的第 `index` 个参数
    Parameter {
        member: String,
        index: usize,
        name: String,
    },
    Field { name: String },
}

impl InjectionElement {
    pub fn name(&self) -> &str {
        match self {
            InjectionElement::Parameter { name, .. } | InjectionElement::Field { name } => name,
        }
    }
}

impl fmt::Display for InjectionElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectionElement::Parameter { member, index, name } => {
                write!(f, "parameter #{index} '{name}' of {member}")
            }
            InjectionElement::Field { name } => write!(f, "field '{name}'"),
        }
    }
}

/// 注入点：元素 + 需要的类型和限定符 + 声明它的 Bean
#[derive(Clone)]
pub struct InjectionPoint {
    element: InjectionElement,
    /// 元素本身带有 produces 标记
    produces: bool,
    type_key: TypeKey,
    qualifiers: Qualifiers,
    bean: Option<Weak<Bean>>,
}

impl InjectionPoint {
    pub fn new(
        element: InjectionElement,
        type_key: TypeKey,
        qualifiers: Qualifiers,
        bean: Option<Weak<Bean>>,
    ) -> Self {
        Self {
            element,
            produces: false,
            type_key,
            qualifiers,
            bean,
        }
    }

    pub(crate) fn with_produces(mut self, produces: bool) -> Self {
        self.produces = produces;
        self
    }

    pub fn element(&self) -> &InjectionElement {
        &self.element
    }

    pub fn is_producer_element(&self) -> bool {
        self.produces
    }

    pub fn type_key(&self) -> &TypeKey {
        &self.type_key
    }

    pub fn qualifiers(&self) -> &Qualifiers {
        &self.qualifiers
    }

    /// 声明此注入点的 Bean；不属于任何 Bean 或 Bean 已释放时为 None
    pub fn bean(&self) -> Option<BeanRef> {
        self.bean.as_ref().and_then(Weak::upgrade)
    }

    pub fn has_bean(&self) -> bool {
        self.bean.is_some()
    }
}

impl fmt::Debug for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionPoint")
            .field("element", &self.element)
            .field("type", &self.type_key)
            .field("qualifiers", &self.qualifiers)
            .field("bean", &self.bean().map(|b| b.name().to_string()))
            .finish()
    }
}

impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.qualifiers, self.type_key, self.element)?;
        if let Some(bean) = self.bean() {
            write!(f, " of bean '{}'", bean.name())?;
        }
        Ok(())
    }
}
