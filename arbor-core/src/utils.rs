//! 容器内部使用的工具函数

/// Bean 命名工具
pub mod naming {
    /// 去掉模块路径后的类型名
    ///
    /// 泛型参数里的路径一并保留原样，只截掉最外层类型之前的部分。
    ///
    /// ```
    /// use arbor_core::utils::naming::short_type_name;
    ///
    /// assert_eq!(short_type_name("demo::appender::ConsoleAppender"), "ConsoleAppender");
    /// assert_eq!(short_type_name("alloc::vec::Vec<demo::Layout>"), "Vec<demo::Layout>");
    /// assert_eq!(short_type_name("u32"), "u32");
    /// ```
    pub fn short_type_name(full: &str) -> &str {
        let head = full.split('<').next().unwrap_or(full);
        match head.rfind("::") {
            Some(pos) => &full[pos + 2..],
            None => full,
        }
    }

    /// PascalCase 类型名转 camelCase，作为默认 Bean 名称
    ///
    /// ```
    /// use arbor_core::utils::naming::to_camel_case;
    ///
    /// assert_eq!(to_camel_case("ConsoleAppender"), "consoleAppender");
    /// assert_eq!(to_camel_case("A"), "a");
    /// assert_eq!(to_camel_case(""), "");
    /// ```
    pub fn to_camel_case(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = String::with_capacity(s.len());
                result.extend(first.to_lowercase());
                result.push_str(chars.as_str());
                result
            }
        }
    }
}

/// 依赖解析工具
pub mod dependency {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread::{self, ThreadId};

    use parking_lot::RwLock;

    use crate::error::{ContainerError, ContainerResult};

    /// 跟踪每个线程上正在创建的 Bean，用于检测循环依赖
    ///
    /// 以线程区分：两个线程同时创建同一个单例是正常的竞争（由作用域缓存串行化），
    /// 只有同一线程在创建某个 Bean 的过程中再次进入它才是循环。
    #[derive(Debug, Default)]
    pub struct CreationTracker {
        creating: Arc<RwLock<HashMap<ThreadId, Vec<(u64, String)>>>>,
    }

    impl CreationTracker {
        pub fn new() -> Self {
            Self::default()
        }

        /// 当前线程是否正在创建该 Bean
        pub fn is_creating(&self, id: u64) -> bool {
            self.creating
                .read()
                .get(&thread::current().id())
                .is_some_and(|chain| chain.iter().any(|(creating, _)| *creating == id))
        }

        /// 标记开始创建，返回的守卫在离开作用域时结束标记
        ///
        /// # Errors
        ///
        /// 当前线程已经在创建该 Bean 时返回 `CircularDependency`，
        /// 错误信息包含完整的创建链。
        pub fn start_creating(&self, id: u64, name: &str) -> ContainerResult<CreationGuard> {
            let thread = thread::current().id();
            let mut creating = self.creating.write();
            let chain = creating.entry(thread).or_default();

            if chain.iter().any(|(creating, _)| *creating == id) {
                let mut names: Vec<&str> = chain.iter().map(|(_, name)| name.as_str()).collect();
                names.push(name);
                return Err(ContainerError::CircularDependency(names.join(" -> ")));
            }

            chain.push((id, name.to_string()));
            Ok(CreationGuard {
                creating: Arc::clone(&self.creating),
                thread,
                id,
            })
        }

        /// 当前线程的创建链快照
        pub fn current_creating(&self) -> Vec<String> {
            self.creating
                .read()
                .get(&thread::current().id())
                .map(|chain| chain.iter().map(|(_, name)| name.clone()).collect())
                .unwrap_or_default()
        }
    }

    /// 创建标记守卫，Drop 时从创建链中移除
    pub struct CreationGuard {
        creating: Arc<RwLock<HashMap<ThreadId, Vec<(u64, String)>>>>,
        thread: ThreadId,
        id: u64,
    }

    impl Drop for CreationGuard {
        fn drop(&mut self) {
            let mut creating = self.creating.write();
            if let Some(chain) = creating.get_mut(&self.thread) {
                if let Some(pos) = chain.iter().rposition(|(id, _)| *id == self.id) {
                    chain.remove(pos);
                }
                if chain.is_empty() {
                    creating.remove(&self.thread);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::dependency::CreationTracker;
    use super::naming::*;

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("a::b::Cache"), "Cache");
        assert_eq!(short_type_name("Cache"), "Cache");
    }

    #[test]
    fn test_to_camel_case() {
        assert_eq!(to_camel_case("PatternLayout"), "patternLayout");
        assert_eq!(to_camel_case("already"), "already");
    }

    #[test]
    fn test_creation_tracker_detects_reentry() {
        let tracker = CreationTracker::new();

        let outer = tracker.start_creating(1, "root").unwrap();
        let _inner = tracker.start_creating(2, "leaf").unwrap();
        assert!(tracker.is_creating(1));
        assert_eq!(tracker.current_creating(), vec!["root", "leaf"]);

        let err = tracker.start_creating(1, "root").err().unwrap();
        assert_eq!(
            err.to_string(),
            "Circular dependency detected: root -> leaf -> root"
        );

        drop(outer);
        assert!(!tracker.is_creating(1));
        assert!(tracker.is_creating(2));
    }

    #[test]
    fn test_creation_tracker_is_per_thread() {
        let tracker = CreationTracker::new();
        let _guard = tracker.start_creating(7, "shared").unwrap();

        std::thread::scope(|s| {
            s.spawn(|| {
                assert!(!tracker.is_creating(7));
                assert!(tracker.start_creating(7, "shared").is_ok());
            });
        });
    }
}
