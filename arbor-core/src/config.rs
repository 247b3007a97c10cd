//! 配置
//!
//! 多个配置源按优先级合并为一个 [`Environment`]，容器自身的设置
//! （[`ContainerSettings`]）和日志设置都从中读取。

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::{ContainerError, ContainerResult};

/// 配置值类型
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 字符串形式的 true/false/yes/no/1/0 也视为布尔值
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn from_toml(value: &toml::Value) -> Self {
        match value {
            toml::Value::String(s) => ConfigValue::String(s.clone()),
            toml::Value::Integer(i) => ConfigValue::Int(*i),
            toml::Value::Float(f) => ConfigValue::Float(*f),
            toml::Value::Boolean(b) => ConfigValue::Bool(*b),
            toml::Value::Array(arr) => ConfigValue::Array(arr.iter().map(Self::from_toml).collect()),
            toml::Value::Table(table) => ConfigValue::Object(
                table.iter().map(|(k, v)| (k.clone(), Self::from_toml(v))).collect(),
            ),
            toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
        }
    }
}

/// 配置源
pub trait PropertySource: Send + Sync {
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<ConfigValue>;

    fn keys(&self) -> Vec<String>;

    /// 数字越大优先级越高
    fn priority(&self) -> i32 {
        0
    }
}

/// 按优先级合并的配置环境
pub struct Environment {
    sources: RwLock<Vec<Box<dyn PropertySource>>>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources = self.sources.read();
        f.debug_struct("Environment")
            .field("sources", &sources.iter().map(|s| s.name().to_string()).collect::<Vec<_>>())
            .finish()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
        }
    }

    pub fn with_source(self, source: impl PropertySource + 'static) -> Self {
        self.add_property_source(Box::new(source));
        self
    }

    pub fn add_property_source(&self, source: Box<dyn PropertySource>) {
        let mut sources = self.sources.write();
        tracing::debug!("Property source added: '{}' (priority {})", source.name(), source.priority());
        sources.push(source);
        sources.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        let sources = self.sources.read();
        for source in sources.iter() {
            if let Some(value) = source.get(key) {
                tracing::trace!("Config '{}' found in source '{}'", key, source.name());
                return Some(value);
            }
        }
        None
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(String::from))
    }

    /// 读取布尔值；键存在但无法解析时报错
    pub fn get_bool(&self, key: &str) -> ContainerResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_bool()
                .map(Some)
                .ok_or_else(|| ContainerError::Config(format!("'{key}' is not a boolean: {value:?}"))),
        }
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> ContainerResult<bool> {
        Ok(self.get_bool(key)?.unwrap_or(default))
    }

    /// 所有配置源中的键，去重后排序
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sources.read().iter().flat_map(|s| s.keys()).collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Property Sources ==========

/// 环境变量配置源
///
/// 键 `container.validate-on-load` 对应变量 `<PREFIX>CONTAINER_VALIDATE_ON_LOAD`。
pub struct EnvironmentPropertySource {
    prefix: String,
    priority: i32,
}

impl EnvironmentPropertySource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            priority: 100,
        }
    }

    /// APP_CONTAINER_VALIDATE -> container.validate
    fn env_to_key(&self, env_key: &str) -> String {
        let stripped = env_key.strip_prefix(&self.prefix).unwrap_or(env_key);
        stripped.to_lowercase().replace('_', ".")
    }

    fn key_to_env(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.replace(['.', '-'], "_").to_uppercase())
    }
}

impl PropertySource for EnvironmentPropertySource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        std::env::var(self.key_to_env(key)).ok().map(ConfigValue::String)
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars()
            .filter(|(k, _)| k.starts_with(&self.prefix))
            .map(|(k, _)| self.env_to_key(&k))
            .collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// TOML 配置源，嵌套表展平为点分隔的键
pub struct TomlPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl TomlPropertySource {
    pub fn from_file(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ContainerError::Config(format!("failed to read config file {}: {}", path.display(), e)))?;
        Self::parse(&content, path.to_string_lossy())
    }

    pub fn parse(content: &str, name: impl Into<String>) -> ContainerResult<Self> {
        let value: toml::Value =
            toml::from_str(content).map_err(|e| ContainerError::Config(format!("failed to parse TOML: {e}")))?;

        let mut properties = HashMap::new();
        Self::flatten(&value, String::new(), &mut properties);

        Ok(Self {
            name: name.into(),
            properties,
            priority: 0,
        })
    }

    /// { container: { validate-on-load: true } } -> { "container.validate-on-load": true }
    fn flatten(value: &toml::Value, prefix: String, result: &mut HashMap<String, ConfigValue>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let key = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    Self::flatten(val, key, result);
                }
            }
            other => {
                result.insert(prefix, ConfigValue::from_toml(other));
            }
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl PropertySource for TomlPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 内存配置源（测试或运行时覆盖）
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
            priority: 50,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

// ========== Container settings ==========

pub const VALIDATE_ON_LOAD_KEY: &str = "container.validate-on-load";
pub const PREINSTANTIATE_SINGLETONS_KEY: &str = "container.preinstantiate-singletons";

/// 容器行为设置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ContainerSettings {
    /// 加载后立即校验注入点
    pub validate_on_load: bool,
    /// 加载后立即创建单例
    pub preinstantiate_singletons: bool,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            validate_on_load: true,
            preinstantiate_singletons: false,
        }
    }
}

#[derive(Deserialize, Default)]
struct SettingsDocument {
    #[serde(default)]
    container: ContainerSettings,
}

impl ContainerSettings {
    pub fn from_environment(environment: &Environment) -> ContainerResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            validate_on_load: environment.get_bool_or(VALIDATE_ON_LOAD_KEY, defaults.validate_on_load)?,
            preinstantiate_singletons: environment
                .get_bool_or(PREINSTANTIATE_SINGLETONS_KEY, defaults.preinstantiate_singletons)?,
        })
    }

    /// 从 TOML 文档的 `[container]` 表读取
    pub fn from_toml(content: &str) -> ContainerResult<Self> {
        let document: SettingsDocument =
            toml::from_str(content).map_err(|e| ContainerError::Config(format!("invalid container settings: {e}")))?;
        Ok(document.container)
    }

    pub fn with_validate_on_load(mut self, validate: bool) -> Self {
        self.validate_on_load = validate;
        self
    }

    pub fn with_preinstantiate_singletons(mut self, preinstantiate: bool) -> Self {
        self.preinstantiate_singletons = preinstantiate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"
        [container]
        validate-on-load = false
        preinstantiate-singletons = true

        [logging]
        level = "debug"
    "#;

    #[test]
    fn test_toml_source_flattens_tables() {
        let source = TomlPropertySource::parse(SETTINGS, "settings").unwrap();

        assert_eq!(source.get(VALIDATE_ON_LOAD_KEY), Some(ConfigValue::Bool(false)));
        assert_eq!(source.get("logging.level"), Some(ConfigValue::String("debug".to_string())));
        assert!(source.get("container").is_none());
    }

    #[test]
    fn test_higher_priority_source_wins() {
        let env = Environment::new()
            .with_source(TomlPropertySource::parse(SETTINGS, "settings").unwrap())
            .with_source(
                MapPropertySource::new("overrides")
                    .with_property(VALIDATE_ON_LOAD_KEY, ConfigValue::String("yes".to_string())),
            );

        assert_eq!(env.get_bool(VALIDATE_ON_LOAD_KEY).unwrap(), Some(true));
        assert_eq!(env.get_string("logging.level").as_deref(), Some("debug"));
    }

    #[test]
    fn test_settings_from_environment() {
        let env = Environment::new().with_source(TomlPropertySource::parse(SETTINGS, "settings").unwrap());
        let settings = ContainerSettings::from_environment(&env).unwrap();

        assert!(!settings.validate_on_load);
        assert!(settings.preinstantiate_singletons);
        assert_eq!(
            ContainerSettings::from_environment(&Environment::new()).unwrap(),
            ContainerSettings::default()
        );
    }

    #[test]
    fn test_invalid_boolean_is_config_error() {
        let env = Environment::new().with_source(
            MapPropertySource::new("bad").with_property(VALIDATE_ON_LOAD_KEY, ConfigValue::String("maybe".to_string())),
        );

        assert!(matches!(ContainerSettings::from_environment(&env), Err(ContainerError::Config(_))));
    }

    #[test]
    fn test_settings_from_toml_document() {
        let settings = ContainerSettings::from_toml(SETTINGS).unwrap();
        assert!(settings.preinstantiate_singletons);

        let defaults = ContainerSettings::from_toml("[logging]\nlevel = \"info\"").unwrap();
        assert_eq!(defaults, ContainerSettings::default());
    }

    #[test]
    fn test_env_key_mapping() {
        let source = EnvironmentPropertySource::new("ARBOR_");
        assert_eq!(source.key_to_env(VALIDATE_ON_LOAD_KEY), "ARBOR_CONTAINER_VALIDATE_ON_LOAD");
        assert_eq!(source.env_to_key("ARBOR_LOGGING_LEVEL"), "logging.level");
    }
}
