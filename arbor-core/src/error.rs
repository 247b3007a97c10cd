//! 容器错误类型
//!
//! 所有容器操作都返回 [`ContainerResult`]。用户提供的构造/注入闭包返回
//! `anyhow::Result`，失败时被包装为 [`ContainerError::Injection`]。

use thiserror::Error;

/// 容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 元模型定义错误（多个 inject 构造函数、bean 之外的 producer 等）
    #[error("Definition error: {0}")]
    Definition(String),

    /// 解析错误（disposer 歧义、作用域未注册、容器已关闭）
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// 同一 (类型, 限定符) 匹配到多个 Bean
    #[error("Ambiguous beans for {target}: [{}]", .candidates.join(", "))]
    AmbiguousBean {
        target: String,
        candidates: Vec<String>,
    },

    /// 没有可满足的 Bean
    #[error("No bean found for {0}")]
    UnsatisfiedBean(String),

    /// 注入点校验失败（批量汇总）
    #[error("Validation failed with {} error(s):\n  {}", .0.len(), .0.join("\n  "))]
    Validation(Vec<String>),

    /// Bean 的 create 返回了空产品
    #[error("Illegal product: {0}")]
    IllegalProduct(String),

    /// 循环依赖
    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    /// 实例无法转换为请求的类型
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// 用户构造、注入或生命周期回调失败
    #[error("Injection into {target} failed: {source}")]
    Injection {
        target: String,
        #[source]
        source: anyhow::Error,
    },

    /// 配置读取失败
    #[error("Configuration error: {0}")]
    Config(String),

    /// 日志系统初始化失败
    #[error("Failed to initialize logging: {0}")]
    LoggingInitFailed(String),
}

impl ContainerError {
    /// 包装用户闭包的失败
    pub fn injection(target: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Injection {
            target: target.into(),
            source,
        }
    }

    /// 是否为循环依赖错误（嵌套创建时保持原样向上传播）
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::CircularDependency(_))
    }
}

/// 容器统一的结果类型
pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

/// 用户闭包使用的结果类型
pub use anyhow::Result;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_error() {
        let error = ContainerError::Validation(vec!["first".to_string(), "second".to_string()]);
        let message = error.to_string();

        assert!(message.contains("2 error(s)"));
        assert!(message.contains("first"));
        assert!(message.contains("second"));
    }

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let error = ContainerError::AmbiguousBean {
            target: "type String".to_string(),
            candidates: vec!["a".to_string(), "b".to_string()],
        };

        assert_eq!(error.to_string(), "Ambiguous beans for type String: [a, b]");
    }
}
