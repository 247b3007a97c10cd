use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arbor_core::prelude::*;
use arbor_core::value::downcast;
use arbor_core::{ContextGuard, EnvironmentPropertySource, TomlPropertySource};
use parking_lot::Mutex;

// ==================== 插件定义 ====================

/// 日志输出端
trait Appender: Send + Sync {
    fn name(&self) -> &str;
    fn append(&self, logger: &str, message: &str);
}

/// 布局 - 单例，模式串来自配置
struct PatternLayout {
    pattern: String,
}

impl PatternLayout {
    fn format(&self, logger: &str, message: &str) -> String {
        self.pattern.replace("%c", logger).replace("%m", message)
    }
}

fn describe_layout() -> Arc<MetaClass> {
    MetaClass::builder::<PatternLayout>()
        .scope::<Singleton>()
        .constructor(MetaConstructor::inject(
            vec![MetaParameter::of::<Environment>("environment")],
            |args| {
                let environment = args.get::<Environment>(0)?;
                let pattern = environment
                    .get_string("layout.pattern")
                    .unwrap_or_else(|| "%c - %m".to_string());
                Ok(PatternLayout { pattern })
            },
        ))
        .build()
}

arbor_core::submit_bean_class!(describe_layout);

/// 控制台输出端 - 单例，以 `Arc<dyn Appender>` 暴露
struct ConsoleAppender {
    layout: Arc<PatternLayout>,
}

impl Appender for ConsoleAppender {
    fn name(&self) -> &str {
        "console"
    }

    fn append(&self, logger: &str, message: &str) {
        println!("{}", self.layout.format(logger, message));
    }
}

fn describe_console_appender() -> Arc<MetaClass> {
    MetaClass::builder::<ConsoleAppender>()
        .scope::<Singleton>()
        .named("console")
        .implements(|appender| appender as Arc<dyn Appender>)
        .constructor(MetaConstructor::inject(
            vec![MetaParameter::of::<PatternLayout>("layout")],
            |args| Ok(ConsoleAppender { layout: args.get(0)? }),
        ))
        .build()
}

arbor_core::submit_bean_class!(describe_console_appender);

/// 内存输出端 - 由 producer 创建，由 disposer 清理
struct MemoryAppender {
    layout: Arc<PatternLayout>,
    lines: Mutex<Vec<String>>,
}

impl Appender for MemoryAppender {
    fn name(&self) -> &str {
        "memory"
    }

    fn append(&self, logger: &str, message: &str) {
        self.lines.lock().push(self.layout.format(logger, message));
    }
}

/// 以请求方命名的日志器
struct Logger {
    name: String,
    appender: Arc<dyn Appender>,
}

impl Logger {
    fn info(&self, message: &str) {
        self.appender.append(&self.name, message);
    }
}

/// 插件工厂 - per-use，声明 producer 和 disposer
struct PluginFactory;

fn describe_plugin_factory() -> Arc<MetaClass> {
    MetaClass::builder::<PluginFactory>()
        .injectable()
        .constructor(MetaConstructor::no_args(|| PluginFactory))
        .method(
            MetaMethod::producer::<PluginFactory, MemoryAppender, _>(
                "memory_appender",
                vec![MetaParameter::of::<PatternLayout>("layout")],
                |_, args| {
                    Ok(Some(MemoryAppender {
                        layout: args.get(0)?,
                        lines: Mutex::new(Vec::new()),
                    }))
                },
            )
            .named("memory"),
        )
        .method(MetaMethod::disposer::<PluginFactory, _>(
            "close_memory_appender",
            vec![MetaParameter::disposes::<MemoryAppender>("appender").named("memory")],
            |_, args| {
                let appender = args.get::<MemoryAppender>(0)?;
                println!("🧹 Memory appender closed with {} buffered line(s)", appender.lines.lock().len());
                Ok(())
            },
        ))
        .method(MetaMethod::producer::<PluginFactory, Logger, _>(
            "logger",
            vec![
                MetaParameter::injection_point("point"),
                MetaParameter::of::<Arc<dyn Appender>>("appender").named("console"),
            ],
            |_, args| {
                let point = args.injection_point(0)?;
                let name = point
                    .bean()
                    .map(|bean| bean.name().to_string())
                    .unwrap_or_else(|| "root".to_string());
                let appender = args.get::<Arc<dyn Appender>>(1)?;
                Ok(Some(Logger {
                    name,
                    appender: appender.as_ref().clone(),
                }))
            },
        ))
        .build()
}

arbor_core::submit_bean_class!(describe_plugin_factory);

/// 可选的指标收集器，本示例未注册
struct Metrics;

/// 审计服务 - per-use，组合上述所有插件
struct AuditService {
    logger: Option<Arc<Logger>>,
    memory: Option<Arc<MemoryAppender>>,
    metrics: Option<Arc<Metrics>>,
    records: AtomicUsize,
}

impl AuditService {
    fn record(&self, event: &str) -> anyhow::Result<()> {
        let logger = self.logger.as_ref().ok_or_else(|| anyhow!("logger was not injected"))?;
        logger.info(event);
        if let Some(memory) = &self.memory {
            memory.append("audit", event);
        }
        self.records.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn describe_audit_service() -> Arc<MetaClass> {
    MetaClass::builder::<AuditService>()
        .constructor(MetaConstructor::inject(
            vec![MetaParameter::optional::<Metrics>("metrics")],
            |args| {
                Ok(AuditService {
                    logger: None,
                    memory: None,
                    metrics: args.optional::<Metrics>(0)?,
                    records: AtomicUsize::new(0),
                })
            },
        ))
        .field(MetaField::inject::<AuditService, Logger, _>("logger", |service, logger| {
            service.logger = Some(logger);
        }))
        .field(
            MetaField::inject::<AuditService, MemoryAppender, _>("memory", |service, memory| {
                service.memory = Some(memory);
            })
            .named("memory"),
        )
        .pre_destroy("flush", |service| {
            println!("👋 Audit service recorded {} event(s)", service.records.load(Ordering::Relaxed));
            Ok(())
        })
        .build()
}

arbor_core::submit_bean_class!(describe_audit_service);

// ==================== 主程序 ====================

fn main() -> anyhow::Result<()> {
    let config_paths = ["demos/plugin-demo/plugin.toml", "plugin.toml"];
    let mut environment = Environment::new().with_source(EnvironmentPropertySource::new("ARBOR_"));
    if let Some(path) = config_paths.iter().find(|p| Path::new(p).exists()) {
        environment = environment.with_source(TomlPropertySource::from_file(path)?);
    }

    LoggingConfig::from_environment(&environment)?.init()?;

    let manager = BeanManager::from_environment(Arc::new(environment))?;
    let beans = manager.scan_and_load_beans()?;
    tracing::info!("Plugin container ready with {} bean(s)", beans.len());

    // 在一个初始化上下文中使用 per-use Bean，守卫释放时级联销毁
    {
        let bean = manager
            .get_bean(&TypeKey::of::<AuditService>(), &Qualifiers::none())?
            .ok_or_else(|| anyhow!("audit service is not registered"))?;
        let guard = ContextGuard::new(manager.create_initialization_context(Some(&bean)));
        let audit = downcast::<AuditService>(manager.get_value(&bean, guard.context())?)?;

        audit.record("user alice logged in")?;
        audit.record("user alice changed password")?;
        println!("📊 Metrics collector present: {}", audit.metrics.is_some());
    }

    let appender = manager.get_qualified_instance::<Arc<dyn Appender>>(Qualifier::named("console"))?;
    println!("✅ Singleton appender '{}' is still available", appender.name());

    manager.close();
    Ok(())
}
