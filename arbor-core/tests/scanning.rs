//! 通过 submit_bean_class! 登记的类在扫描时被加载
use std::sync::Arc;

use arbor_core::prelude::*;
use arbor_core::registry::submitted_classes;

struct Clock;

struct Scheduler {
    clock: Arc<Clock>,
}

fn describe_clock() -> Arc<MetaClass> {
    MetaClass::builder::<Clock>()
        .scope::<Singleton>()
        .constructor(MetaConstructor::no_args(|| Clock))
        .build()
}

fn describe_scheduler() -> Arc<MetaClass> {
    MetaClass::builder::<Scheduler>()
        .constructor(MetaConstructor::inject(vec![MetaParameter::of::<Clock>("clock")], |args| {
            Ok(Scheduler { clock: args.get(0)? })
        }))
        .build()
}

submit_bean_class!(describe_clock);
submit_bean_class!(describe_scheduler);

#[test]
fn test_submitted_classes_are_collected() {
    let names: Vec<String> = submitted_classes().iter().map(|class| class.name.clone()).collect();

    assert_eq!(names.len(), 2);
    assert!(names.contains(&"Clock".to_string()));
    assert!(names.contains(&"Scheduler".to_string()));
}

#[test]
fn test_scan_and_load_beans() {
    let manager = BeanManager::new();
    let loaded = manager.scan_and_load_beans().unwrap();
    assert_eq!(loaded.len(), 2);

    let scheduler = manager.get_instance::<Scheduler>().unwrap();
    let clock = manager.get_instance::<Clock>().unwrap();
    assert!(Arc::ptr_eq(&scheduler.clock, &clock));
}
