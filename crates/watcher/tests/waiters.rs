//! End-to-end waiter behaviour on listing-style pages

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use dom::snapshot::load_document;
use dom::{Document, NodeId, Selector};
use tokio_test::{assert_pending, assert_ready, task};
use watcher::{
    all_elements_available, all_elements_click_handled, bind_click, elements_available,
    elements_click_handled, input_has_value, on_element_available, on_element_inserted,
    on_input_has_value, WaitOutcome, WaiterKind, WatchConfig, WatchEvent, Page,
};

fn css(source: &str) -> Selector {
    Selector::parse(source).unwrap()
}

fn css_all(sources: &[&str]) -> Vec<Selector> {
    Selector::parse_all(sources).unwrap()
}

fn append(page: &Page, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
    let body = page.observe_root();
    let mut doc = page.document_mut();
    let node = doc.create_element_with(tag, attrs);
    doc.append_child(body, node).unwrap();
    node
}

#[test]
fn insertion_callbacks_match_insertion_count() {
    let page = Page::blank();
    let body = page.observe_root();
    let hits = Rc::new(Cell::new(0));

    let counter = hits.clone();
    on_element_inserted(&page, css("div.review"), move |_, _| counter.set(counter.get() + 1))
        .unwrap();

    append(&page, "div", &[("class", "review")]);
    append(&page, "div", &[("class", "ad")]);
    page.flush();

    let batch: Vec<NodeId> = {
        let mut doc = page.document_mut();
        let nodes = vec![
            doc.create_element_with("div", &[("class", "review")]),
            doc.create_element_with("div", &[("class", "review")]),
            doc.create_text("3 reviews"),
        ];
        doc.append_children(body, &nodes).unwrap();
        nodes
    };
    page.flush();
    assert_eq!(hits.get(), 3);

    page.document_mut().remove(batch[0]).unwrap();
    page.document_mut().append_child(body, batch[0]).unwrap();
    page.flush();
    assert_eq!(hits.get(), 4);
}

#[test]
fn element_available_reports_existing_matches_first() {
    let page = Page::blank();
    for _ in 0..3 {
        append(&page, "li", &[("class", "hotel")]);
    }
    page.flush();

    let seen = Rc::new(Cell::new(0));
    let counter = seen.clone();
    on_element_available(&page, css("li.hotel"), move |_, _| counter.set(counter.get() + 1))
        .unwrap();
    assert!(seen.get() >= 3);
}

#[test]
fn all_available_fires_once_for_any_arrival_order() {
    let orders: Vec<Vec<Vec<&str>>> = vec![
        vec![vec!["a"], vec!["b"]],
        vec![vec!["b"], vec!["a"]],
        vec![vec!["a", "b"]],
    ];

    for order in &orders {
        let page = Page::blank();
        let body = page.observe_root();
        let fired = Rc::new(Cell::new(0));

        let counter = fired.clone();
        let outcome = all_elements_available(&page, css_all(&["a", "b"]), move |_| {
            counter.set(counter.get() + 1)
        })
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Pending);

        for batch in order {
            {
                let mut doc = page.document_mut();
                let nodes: Vec<NodeId> = batch.iter().map(|tag| doc.create_element(tag)).collect();
                doc.append_children(body, &nodes).unwrap();
            }
            page.flush();
        }
        append(&page, "b", &[]);
        page.flush();

        assert_eq!(fired.get(), 1, "arrival order {:?}", order);
    }
}

#[test]
fn click_fast_path_adds_no_subscriptions() {
    let page = Page::blank();
    append(&page, "a", &[("onclick", "showMore()")]);
    let button = append(&page, "button", &[]);
    bind_click(&page, button, |_, _| {}).unwrap();
    page.flush();

    let observers = page.observer_count();
    let listeners = page.listener_count();
    let fired = Rc::new(Cell::new(false));

    let flag = fired.clone();
    let outcome =
        all_elements_click_handled(&page, css_all(&["a", "button"]), move |_| flag.set(true))
            .unwrap();

    assert_eq!(outcome, WaitOutcome::Immediate);
    assert!(fired.get());
    assert_eq!(page.observer_count(), observers);
    assert_eq!(page.listener_count(), listeners);
}

#[test]
fn click_waiter_ignores_selectors_already_satisfied() {
    let page = Page::blank();
    let more = append(&page, "a", &[("class", "more"), ("onclick", "more()")]);
    let next = append(&page, "a", &[("class", "next")]);
    page.flush();

    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    all_elements_click_handled(&page, css_all(&["a.more", "a.next"]), move |_| {
        counter.set(counter.get() + 1)
    })
    .unwrap();

    // Only the missing selector gets a signal listener
    assert!(!page.has_listener(more, "click_event_handled"));
    assert!(page.has_listener(next, "click_event_handled"));

    bind_click(&page, next, |_, _| {}).unwrap();
    assert_eq!(fired.get(), 1);
    assert!(!page.has_listener(next, "click_event_handled"));
}

#[test]
fn input_waiter_fires_once() {
    let page = Page::blank();
    let input = append(&page, "input", &[("name", "city")]);
    let fired = Rc::new(Cell::new(0));

    let counter = fired.clone();
    on_input_has_value(&page, css("input[name=city]"), "Lisboa", move |_| {
        counter.set(counter.get() + 1)
    })
    .unwrap();

    page.document_mut().set_value(input, "Lisboa").unwrap();
    page.dispatch_event(input, "input").unwrap();
    page.dispatch_event(input, "input").unwrap();
    page.dispatch_event(input, "change").unwrap();

    assert_eq!(fired.get(), 1);
    assert_eq!(page.listener_count(), 0);
}

#[test]
fn satisfied_composite_reregistration_is_immediate() {
    let page = Page::blank();
    let fired = Rc::new(Cell::new(0));

    let counter = fired.clone();
    all_elements_available(&page, css_all(&["table", "form"]), move |_| {
        counter.set(counter.get() + 1)
    })
    .unwrap();
    append(&page, "table", &[]);
    append(&page, "form", &[]);
    page.flush();
    assert_eq!(fired.get(), 1);

    let observers = page.observer_count();
    let counter = fired.clone();
    let outcome = all_elements_available(&page, css_all(&["table", "form"]), move |_| {
        counter.set(counter.get() + 1)
    })
    .unwrap();

    assert_eq!(outcome, WaitOutcome::Immediate);
    assert_eq!(fired.get(), 2);
    assert_eq!(page.observer_count(), observers);
}

#[test]
fn callbacks_may_drive_other_waiters() {
    let page = Page::blank();
    let fired = Rc::new(Cell::new(false));

    let flag = fired.clone();
    all_elements_available(&page, css_all(&["#results", "#pager"]), move |_| flag.set(true))
        .unwrap();

    // Rendering the results list renders its pager from inside the callback
    on_element_inserted(&page, css("#results"), |page, _| {
        append(page, "nav", &[("id", "pager")]);
    })
    .unwrap();

    append(&page, "ul", &[("id", "results")]);
    page.flush();

    assert!(fired.get());
    assert!(!page.has_pending_records());
}

#[test]
fn event_bus_reports_waiter_lifecycle() {
    let page = Page::blank();
    let mut events = page.event_bus().subscribe();

    all_elements_click_handled(&page, css_all(&["button"]), |_| {}).unwrap();
    let button = append(&page, "button", &[]);
    page.flush();
    // Signal listeners are attached to elements present at registration only
    bind_click(&page, button, |_, _| {}).unwrap();

    let waiter = match events.try_recv().unwrap() {
        WatchEvent::WaiterRegistered { waiter, kind } => {
            assert_eq!(kind, WaiterKind::AllElementsClickHandled);
            waiter
        }
        other => panic!("expected WaiterRegistered, got {:?}", other),
    };
    let rest: Vec<WatchEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert!(rest.contains(&WatchEvent::ClickBound { node: button }));
    assert!(!rest
        .iter()
        .any(|e| matches!(e, WatchEvent::WaiterResolved { waiter: w, .. } if *w == waiter)));

    // The button is handled now, so a fresh waiter resolves on registration
    all_elements_click_handled(&page, css_all(&["button"]), |_| {}).unwrap();
    let fresh: Vec<WatchEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    match fresh.as_slice() {
        [WatchEvent::WaiterRegistered { waiter: a, .. }, WatchEvent::WaiterResolved { waiter: b, kind }] =>
        {
            assert_eq!(a, b);
            assert_ne!(*a, waiter);
            assert_eq!(*kind, WaiterKind::AllElementsClickHandled);
        }
        other => panic!("unexpected events {:?}", other),
    }
}

#[test]
fn snapshot_page_with_custom_root() {
    let snapshot = serde_json::json!({
        "root": {
            "nodeType": 9,
            "nodeName": "#document",
            "children": [{
                "nodeType": 1,
                "nodeName": "HTML",
                "children": [{
                    "nodeType": 1,
                    "nodeName": "BODY",
                    "children": [
                        {"nodeType": 1, "nodeName": "HEADER", "attributes": ["id", "top"]},
                        {"nodeType": 1, "nodeName": "MAIN", "attributes": ["id", "app"]}
                    ]
                }]
            }]
        }
    });
    let config = WatchConfig::from_json_str(r##"{"observe_root": "#app"}"##).unwrap();
    let page = Page::with_config(load_document(&snapshot).unwrap(), config).unwrap();
    let app = page.observe_root();
    let header = page.document().arena().find_by_id("top").unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    on_element_inserted(&page, css("article"), move |_, node| sink.borrow_mut().push(node))
        .unwrap();

    let (inside, outside) = {
        let mut doc = page.document_mut();
        let inside = doc.create_element("article");
        let outside = doc.create_element("article");
        doc.append_child(app, inside).unwrap();
        doc.append_child(header, outside).unwrap();
        (inside, outside)
    };
    page.flush();

    assert_eq!(*seen.borrow(), vec![inside]);
    assert_ne!(inside, outside);
}

#[test]
fn async_adapters_resolve_when_driven() {
    let page = Page::with_config(Document::new(), WatchConfig::default()).unwrap();
    let input = append(&page, "input", &[("id", "checkin")]);

    let mut available =
        task::spawn(elements_available(&page, css_all(&["h1", "footer"])).unwrap());
    let mut clickable = task::spawn(elements_click_handled(&page, css_all(&["input"])).unwrap());
    let mut typed = task::spawn(input_has_value(&page, css("#checkin"), "2024-05-01").unwrap());
    assert_pending!(available.poll());
    assert_pending!(clickable.poll());
    assert_pending!(typed.poll());

    append(&page, "h1", &[]);
    append(&page, "footer", &[]);
    page.flush();
    assert!(assert_ready!(available.poll()).is_ok());

    bind_click(&page, input, |_, _| {}).unwrap();
    assert!(assert_ready!(clickable.poll()).is_ok());

    page.document_mut().set_value(input, "2024-05-01").unwrap();
    page.dispatch_event(input, "paste").unwrap();
    assert!(assert_ready!(typed.poll()).is_ok());
}

#[tokio::test]
async fn element_available_awaits_insertion() {
    let page = Page::blank();
    let rx = watcher::element_available(&page, css("span.rating")).unwrap();

    let rating = append(&page, "span", &[("class", "rating")]);
    page.flush();

    assert_eq!(rx.await.unwrap(), rating);
}
