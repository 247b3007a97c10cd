//! producer/disposer 生命周期和初始化上下文级联销毁的集成测试
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arbor_core::prelude::*;
use arbor_core::value::downcast;
use arbor_core::{ContextGuard, InjectionElement};
use parking_lot::Mutex;

/// 记录生命周期事件的日志
#[derive(Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn record(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

struct Connection {
    url: String,
}

struct ConnectionFactory;

struct Repository {
    connection: Option<Arc<Connection>>,
}

fn connection_factory(journal: &Journal) -> Arc<MetaClass> {
    let produced = journal.clone();
    let disposed = journal.clone();
    MetaClass::builder::<ConnectionFactory>()
        .injectable()
        .constructor(MetaConstructor::no_args(|| ConnectionFactory))
        .method(MetaMethod::producer::<ConnectionFactory, Connection, _>(
            "connection",
            Vec::new(),
            move |_, _| {
                produced.record("open");
                Ok(Some(Connection {
                    url: "mem://audit".to_string(),
                }))
            },
        ))
        .method(MetaMethod::disposer::<ConnectionFactory, _>(
            "close",
            vec![MetaParameter::disposes::<Connection>("connection")],
            move |_, args| {
                let connection = args.get::<Connection>(0)?;
                disposed.record(format!("close {}", connection.url));
                Ok(())
            },
        ))
        .build()
}

fn repository(journal: &Journal) -> Arc<MetaClass> {
    let destroyed = journal.clone();
    MetaClass::builder::<Repository>()
        .constructor(MetaConstructor::no_args(|| Repository { connection: None }))
        .field(MetaField::inject::<Repository, Connection, _>("connection", |repository, connection| {
            repository.connection = Some(connection);
        }))
        .pre_destroy("release", move |_| {
            destroyed.record("release repository");
            Ok(())
        })
        .build()
}

#[test]
fn test_closing_context_cascades_to_disposers() {
    let journal = Journal::default();
    let manager = BeanManager::new();
    manager
        .load_beans([connection_factory(&journal), repository(&journal)])
        .unwrap();

    let bean = manager
        .get_bean(&TypeKey::of::<Repository>(), &Qualifiers::none())
        .unwrap()
        .unwrap();
    {
        let guard = ContextGuard::new(manager.create_initialization_context(Some(&bean)));
        let repository = downcast::<Repository>(manager.get_value(&bean, guard.context()).unwrap()).unwrap();
        assert_eq!(repository.connection.as_ref().unwrap().url, "mem://audit");
        assert_eq!(journal.events(), vec!["open"]);
    }

    assert_eq!(journal.events(), vec!["open", "release repository", "close mem://audit"]);
}

#[test]
fn test_context_close_is_idempotent() {
    let journal = Journal::default();
    let manager = BeanManager::new();
    manager
        .load_beans([connection_factory(&journal), repository(&journal)])
        .unwrap();

    let bean = manager
        .get_bean(&TypeKey::of::<Repository>(), &Qualifiers::none())
        .unwrap()
        .unwrap();
    let context = manager.create_initialization_context(Some(&bean));
    manager.get_value(&bean, &context).unwrap();

    context.close();
    context.close();

    assert!(context.is_closed());
    assert_eq!(journal.events().len(), 3);
}

struct SecondFactory;

#[test]
fn test_ambiguous_disposers_are_rejected() {
    let manager = BeanManager::new();
    let class = MetaClass::builder::<SecondFactory>()
        .injectable()
        .constructor(MetaConstructor::no_args(|| SecondFactory))
        .method(MetaMethod::producer::<SecondFactory, Connection, _>("connection", Vec::new(), |_, _| {
            Ok(Some(Connection { url: String::new() }))
        }))
        .method(MetaMethod::disposer::<SecondFactory, _>(
            "first",
            vec![MetaParameter::disposes::<Connection>("connection")],
            |_, _| Ok(()),
        ))
        .method(MetaMethod::disposer::<SecondFactory, _>(
            "second",
            vec![MetaParameter::disposes::<Connection>("connection")],
            |_, _| Ok(()),
        ))
        .build();

    assert!(matches!(manager.load_beans([class]), Err(ContainerError::Resolution(_))));
}

#[test]
fn test_disposer_needs_exactly_one_disposed_parameter() {
    let manager = BeanManager::new();
    let class = MetaClass::builder::<SecondFactory>()
        .injectable()
        .constructor(MetaConstructor::no_args(|| SecondFactory))
        .method(MetaMethod::disposer::<SecondFactory, _>(
            "twice",
            vec![
                MetaParameter::disposes::<Connection>("first"),
                MetaParameter::disposes::<Connection>("second"),
            ],
            |_, _| Ok(()),
        ))
        .build();

    assert!(matches!(manager.load_beans([class]), Err(ContainerError::Definition(_))));
}

struct Ticket;

struct Receipt;

struct TicketOffice;

#[test]
fn test_failed_creation_releases_built_dependencies() {
    let journal = Journal::default();
    let released = journal.clone();
    let manager = BeanManager::new();
    let ticket = MetaClass::builder::<Ticket>()
        .injectable()
        .constructor(MetaConstructor::no_args(|| Ticket))
        .pre_destroy("release", move |_| {
            released.record("release ticket");
            Ok(())
        })
        .build();
    let office = MetaClass::builder::<TicketOffice>()
        .method(MetaMethod::static_producer::<Receipt, _>(
            "receipt",
            vec![MetaParameter::of::<Ticket>("ticket")],
            |args| {
                args.get::<Ticket>(0)?;
                Ok(None)
            },
        ))
        .build();
    manager.load_beans([ticket, office]).unwrap();

    let bean = manager
        .get_bean(&TypeKey::of::<Receipt>(), &Qualifiers::none())
        .unwrap()
        .unwrap();
    {
        let guard = ContextGuard::new(manager.create_initialization_context(Some(&bean)));
        let result = manager.get_value(&bean, guard.context());
        assert!(matches!(result, Err(ContainerError::IllegalProduct(_))));
        assert_eq!(journal.events(), vec!["release ticket"]);
    }

    assert_eq!(journal.events(), vec!["release ticket"]);
}

// ==================== 注入点元数据 ====================

struct Label {
    owner: String,
    element: String,
}

struct LabelFactory;

struct Widget {
    label: Option<Arc<Label>>,
}

#[test]
fn test_producer_receives_requesting_injection_point() {
    let manager = BeanManager::new();
    let factory = MetaClass::builder::<LabelFactory>()
        .injectable()
        .constructor(MetaConstructor::no_args(|| LabelFactory))
        .method(MetaMethod::producer::<LabelFactory, Label, _>(
            "label",
            vec![MetaParameter::injection_point("point")],
            |_, args| {
                let point = args.injection_point(0)?;
                Ok(Some(Label {
                    owner: point.bean().map(|b| b.name().to_string()).unwrap_or_default(),
                    element: point.element().name().to_string(),
                }))
            },
        ))
        .build();
    let widget = MetaClass::builder::<Widget>()
        .named("mainWidget")
        .constructor(MetaConstructor::no_args(|| Widget { label: None }))
        .field(MetaField::inject::<Widget, Label, _>("label", |widget, label| {
            widget.label = Some(label);
        }))
        .build();
    manager.load_beans([factory, widget]).unwrap();

    let widget = manager.get_qualified_instance::<Widget>(Qualifier::named("mainWidget")).unwrap();
    let label = widget.label.as_ref().unwrap();
    assert_eq!(label.owner, "mainWidget");
    assert_eq!(label.element, "label");
}

#[test]
fn test_injection_point_elements_are_recorded() {
    let manager = BeanManager::new();
    let journal = Journal::default();
    let beans = manager.load_beans([repository(&journal), connection_factory(&journal)]).unwrap();

    let repository = beans
        .iter()
        .find(|bean| bean.has_matching_type(&TypeKey::of::<Repository>()))
        .unwrap();
    let points = repository.injection_points();
    assert_eq!(points.len(), 1);
    assert!(matches!(points[0].element(), InjectionElement::Field { name } if name == "connection"));
    assert!(points[0].bean().is_some_and(|owner| owner.id() == repository.id()));
}

// ==================== 单例与未完成实例 ====================

static PARTS_BUILT: AtomicUsize = AtomicUsize::new(0);

struct Part;

struct Engine {
    first: Arc<Part>,
    second: Arc<Part>,
}

#[test]
fn test_per_use_dependency_is_shared_within_singleton_graph() {
    let manager = BeanManager::new();
    let part = MetaClass::builder::<Part>()
        .injectable()
        .constructor(MetaConstructor::no_args(|| {
            PARTS_BUILT.fetch_add(1, Ordering::SeqCst);
            Part
        }))
        .build();
    let engine = MetaClass::builder::<Engine>()
        .scope::<Singleton>()
        .constructor(MetaConstructor::inject(
            vec![MetaParameter::of::<Part>("first"), MetaParameter::of::<Part>("second")],
            |args| {
                Ok(Engine {
                    first: args.get(0)?,
                    second: args.get(1)?,
                })
            },
        ))
        .build();
    manager.load_beans([part, engine]).unwrap();

    let engine = manager.get_instance::<Engine>().unwrap();
    assert!(Arc::ptr_eq(&engine.first, &engine.second));
    assert_eq!(PARTS_BUILT.load(Ordering::SeqCst), 1);
}

#[test]
fn test_preinstantiation_builds_singletons_on_load() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let manager = BeanManager::with_settings(ContainerSettings::default().with_preinstantiate_singletons(true));
    let class = MetaClass::builder::<Part>()
        .scope::<Singleton>()
        .constructor(MetaConstructor::no_args(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Part
        }))
        .build();

    manager.load_beans([class]).unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 1);

    manager.get_instance::<Part>().unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 1);
}
