//! 编译期 Bean 类登记
//!
//! 插件 crate 用 [`submit_bean_class!`] 提交描述函数，
//! [`BeanManager::scan_and_load_beans`](crate::BeanManager::scan_and_load_beans) 在启动时一次性加载。

use std::sync::Arc;

use crate::model::MetaClass;

/// Bean 类提交记录
pub struct BeanClassSubmission {
    pub name: &'static str,
    pub create: fn() -> Arc<MetaClass>,
}

inventory::collect!(BeanClassSubmission);

/// 登记一个返回 `Arc<MetaClass>` 的描述函数
///
/// ```ignore
/// fn describe_console() -> Arc<MetaClass> {
///     MetaClass::builder::<ConsoleAppender>().build()
/// }
///
/// arbor_core::submit_bean_class!(describe_console);
/// ```
#[macro_export]
macro_rules! submit_bean_class {
    ($describe:path) => {
        $crate::inventory::submit! {
            $crate::registry::BeanClassSubmission {
                name: stringify!($describe),
                create: $describe,
            }
        }
    };
}

/// 收集所有已提交的类，按提交名排序以保证加载顺序稳定
pub fn submitted_classes() -> Vec<Arc<MetaClass>> {
    let mut submissions: Vec<&BeanClassSubmission> = inventory::iter::<BeanClassSubmission>.into_iter().collect();
    submissions.sort_by_key(|submission| submission.name);
    submissions
        .into_iter()
        .map(|submission| {
            tracing::trace!("Found submitted bean class: {}", submission.name);
            (submission.create)()
        })
        .collect()
}
