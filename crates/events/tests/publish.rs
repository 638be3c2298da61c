mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;

use shapebus_events::{
    BusConfig, DispatchError, Event, EventBus, Handler, MemorySink, Priority,
};

use common::{Auditable, CallLog, DomainEvent, Order, Ping, RushOrder};

fn bus_with_sink() -> (EventBus, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let bus = EventBus::builder().sink(sink.clone()).build().unwrap();
    (bus, sink)
}

#[test]
fn concrete_and_interface_handlers_run_by_priority_then_event_is_disposed() {
    let bus = EventBus::new();
    let log = CallLog::new();

    let l = log.clone();
    bus.subscribe_fn::<dyn Auditable, _>(
        move |a| {
            l.push(format!("audit: {}", a.audit_line()));
            Ok(())
        },
        5,
    );
    let l = log.clone();
    bus.subscribe_fn::<Order, _>(
        move |o| {
            l.push(format!("order: {}", o.number));
            Ok(())
        },
        10,
    );

    let order = Order::new(7);
    assert!(bus.publish(&order).unwrap());
    assert_eq!(log.entries(), vec!["order: 7", "audit: order #7"]);
    assert!(order.is_disposed());
    assert_eq!(order.releases.load(Ordering::SeqCst), 1);

    let err = bus.publish(&order).unwrap_err();
    assert!(matches!(err, DispatchError::InvalidState(_)));
    assert_eq!(log.entries().len(), 2);
}

#[test]
fn equal_priorities_keep_registration_order() {
    let bus = EventBus::new();
    let log = CallLog::new();

    for name in ["first", "second", "third"] {
        let l = log.clone();
        bus.subscribe_nullary::<Ping, _>(
            move || {
                l.push(name);
                Ok(())
            },
            Priority::Unset,
        );
    }

    assert!(bus.publish(&Ping::new()).unwrap());
    assert_eq!(log.entries(), vec!["first", "second", "third"]);
}

#[test]
fn unset_priority_runs_after_every_explicit_level() {
    let bus = EventBus::new();
    let log = CallLog::new();

    let l = log.clone();
    bus.subscribe_nullary::<Ping, _>(
        move || {
            l.push("unset");
            Ok(())
        },
        Priority::Unset,
    );
    let l = log.clone();
    bus.subscribe_nullary::<Ping, _>(
        move || {
            l.push("negative");
            Ok(())
        },
        -40,
    );
    let l = log.clone();
    bus.subscribe_nullary::<Ping, _>(
        move || {
            l.push("high");
            Ok(())
        },
        Priority::HIGH,
    );

    bus.publish(&Ping::new()).unwrap();
    assert_eq!(log.entries(), vec!["high", "negative", "unset"]);
}

#[test]
fn unsubscribe_removes_only_that_handler() {
    let bus = EventBus::new();
    let log = CallLog::new();

    let l = log.clone();
    let keep = bus.subscribe_fn::<Ping, _>(
        move |_| {
            l.push("keep");
            Ok(())
        },
        1,
    );
    let l = log.clone();
    let drop_me = bus.subscribe_fn::<Ping, _>(
        move |_| {
            l.push("drop");
            Ok(())
        },
        2,
    );

    assert_eq!(bus.unsubscribe(&drop_me), 1);
    bus.publish(&Ping::new()).unwrap();
    assert_eq!(log.entries(), vec!["keep"]);

    let stranger = Handler::<Ping>::new(|_| Ok(()));
    assert_eq!(bus.unsubscribe(&stranger), 0);
    assert_eq!(bus.unsubscribe(&keep), 1);
    assert!(!bus.publish(&Ping::new()).unwrap());
}

#[test]
fn publish_without_matching_handlers_returns_false() {
    let bus = EventBus::new();
    bus.subscribe_fn::<Order, _>(|_| Ok(()), 1);

    let ping = Ping::new();
    assert!(!bus.publish(&ping).unwrap());
    assert!(!ping.is_disposed());
}

#[test]
fn disabled_auto_dispose_keeps_event_publishable() {
    let bus = EventBus::builder()
        .config(BusConfig::default().with_auto_dispose(false))
        .build()
        .unwrap();
    let log = CallLog::new();
    let l = log.clone();
    bus.subscribe_fn::<Order, _>(
        move |o| {
            l.push(o.number.to_string());
            Ok(())
        },
        1,
    );

    let order = Order::new(3);
    assert!(bus.publish(&order).unwrap());
    assert!(bus.publish(&order).unwrap());
    assert!(!order.is_disposed());
    assert_eq!(log.entries(), vec!["3", "3"]);

    assert!(bus.publish_with(&order, true).unwrap());
    assert!(order.is_disposed());
}

#[test]
fn handler_disposing_the_event_stops_lower_priority_handlers() {
    let bus = EventBus::new();
    let log = CallLog::new();

    let l = log.clone();
    bus.subscribe_fn::<Order, _>(
        move |o| {
            l.push("consumer");
            o.dispose();
            Ok(())
        },
        Priority::HIGHEST,
    );
    let l = log.clone();
    bus.subscribe_fn::<dyn Auditable, _>(
        move |_| {
            l.push("audit");
            Ok(())
        },
        Priority::LOWEST,
    );

    let order = Order::new(1);
    assert!(bus.publish(&order).unwrap());
    assert_eq!(log.entries(), vec!["consumer"]);
    assert_eq!(order.releases.load(Ordering::SeqCst), 1);
}

#[test]
fn errors_and_panics_are_contained_and_reported() {
    let (bus, sink) = bus_with_sink();
    let log = CallLog::new();

    bus.subscribe_fn::<Ping, _>(|_| anyhow::bail!("database unavailable"), 30);
    bus.subscribe_nullary::<Ping, _>(|| panic!("handler bug"), 20);
    let l = log.clone();
    bus.subscribe_nullary::<Ping, _>(
        move || {
            l.push("survivor");
            Ok(())
        },
        10,
    );

    let ping = Ping::new();
    assert!(bus.publish(&ping).unwrap());
    assert_eq!(log.entries(), vec!["survivor"]);
    assert!(ping.is_disposed());

    let reported = sink.reported();
    assert_eq!(reported.len(), 2);
    assert_eq!(reported[0].kind, "error");
    assert!(reported[0].message.contains("database unavailable"));
    assert_eq!(reported[1].kind, "panic");
    assert!(reported[1].message.contains("handler bug"));
    assert!(reported.iter().all(|r| r.event_id == ping.id()));
}

#[test]
fn ancestor_and_inherited_interface_handlers_receive_derived_events() {
    let bus = EventBus::new();
    let log = CallLog::new();

    let l = log.clone();
    bus.subscribe_fn::<RushOrder, _>(
        move |r| {
            l.push(format!("rush {}h", r.deadline_hours));
            Ok(())
        },
        Priority::Unset,
    );
    let l = log.clone();
    bus.subscribe_fn::<dyn Auditable, _>(
        move |a| {
            l.push(a.audit_line());
            Ok(())
        },
        Priority::Unset,
    );
    let l = log.clone();
    bus.subscribe_fn::<DomainEvent, _>(
        move |d| {
            l.push(format!("base {}", d.source));
            Ok(())
        },
        Priority::Unset,
    );

    let rush = RushOrder::new(4);
    assert!(bus.publish(&rush).unwrap());
    assert_eq!(
        log.entries(),
        vec![
            "rush 4h",
            "domain event from warehouse",
            "base warehouse",
        ]
    );
    assert!(rush.base.is_disposed());
}

#[test]
fn base_event_does_not_reach_derived_handlers() {
    let bus = EventBus::new();
    let log = CallLog::new();
    let l = log.clone();
    bus.subscribe_fn::<RushOrder, _>(
        move |_| {
            l.push("rush");
            Ok(())
        },
        1,
    );

    assert!(!bus.publish(&DomainEvent::new("billing")).unwrap());
    assert!(log.entries().is_empty());
}

#[test]
fn resolve_exposes_invocation_order_without_running_handlers() {
    let bus = EventBus::new();
    let log = CallLog::new();
    let l = log.clone();
    bus.subscribe_fn::<dyn Auditable, _>(
        move |_| {
            l.push("audit");
            Ok(())
        },
        Priority::HIGH,
    );
    bus.subscribe_fn::<Order, _>(|_| Ok(()), Priority::LOW);

    let order = Order::new(9);
    let handlers = bus.resolve(&order).unwrap().unwrap();
    let priorities: Vec<_> = handlers.iter().map(|h| h.priority()).collect();
    assert_eq!(priorities, vec![Priority::HIGH, Priority::LOW]);
    assert!(log.entries().is_empty());
    assert!(!order.is_disposed());
}

#[test]
fn concurrent_subscribers_and_publishers_do_not_lose_registrations() {
    let bus = Arc::new(EventBus::new());
    let threads: Vec<_> = (0..8)
        .map(|i| {
            let bus = bus.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    bus.subscribe_fn::<Ping, _>(|_| Ok(()), i);
                    bus.publish(&Ping::new()).unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(bus.subscription_count(), 8 * 50);
    let handlers = bus.resolve(&Ping::new()).unwrap().unwrap();
    assert_eq!(handlers.len(), 8 * 50);
    assert!(
        handlers
            .windows(2)
            .all(|w| w[0].priority() >= w[1].priority())
    );
}
