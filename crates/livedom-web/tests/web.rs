//! Browser tests. Run with `wasm-pack test --headless --firefox crates/livedom-web`.

#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use livedom_web::{Error, LifecycleEvent, ListenerOptions, Notification, ObserverConfig, WebHost};
use wasm_bindgen::prelude::*;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::Element;

wasm_bindgen_test_configure!(run_in_browser);

fn host() -> WebHost {
    WebHost::new().unwrap()
}

fn mount(host: &WebHost, html: &str) -> Element {
    let container = host.document().create_element("div").unwrap();
    container.set_inner_html(html);
    host.document().body().unwrap().append_child(&container).unwrap();
    container
}

/// Resolves after pending microtasks, which is when mutation observers run.
async fn tick() {
    let promise = js_sys::Promise::resolve(&JsValue::NULL);
    wasm_bindgen_futures::JsFuture::from(promise).await.unwrap();
}

#[wasm_bindgen_test]
fn initial_match_in_document_order() {
    let host = host();
    let root = mount(&host, r#"<ul><li class="a">1</li><li class="a">2</li></ul>"#);
    let query = livedom_web::LiveQuery::collection(
        host.clone(),
        "li.a",
        Some(root.clone()),
        ObserverConfig::default(),
    )
    .unwrap();
    let text: Vec<String> = query.map(|el| el.text_content().unwrap_or_default());
    assert_eq!(text, vec!["1".to_owned(), "2".to_owned()]);
    root.remove();
}

#[wasm_bindgen_test]
fn invalid_selector_is_rejected() {
    let host = host();
    let err = host.collection("li[", ObserverConfig::default()).unwrap_err();
    assert_eq!(err, Error::InvalidSelector("li[".into()));
}

#[wasm_bindgen_test]
fn non_targets_and_non_functions_are_invalid() {
    let host = host();
    let root = mount(&host, "<p></p>");
    let query = livedom_web::LiveQuery::single(host.clone(), "p", Some(root.clone()), ObserverConfig::default())
        .unwrap();
    let listener: JsValue = Closure::<dyn Fn()>::new(|| {}).into_js_value();

    assert!(matches!(
        query.add_delegated_event_listener(
            JsValue::from_str("window"),
            "resize",
            listener.clone(),
            ListenerOptions::default()
        ),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        query.add_event_listener("click", JsValue::from_f64(1.0), false),
        Err(Error::InvalidArgument(_))
    ));
    let window: JsValue = web_sys::window().unwrap().into();
    assert!(
        query
            .add_delegated_event_listener(window, "resize", listener, ListenerOptions::default())
            .is_ok()
    );
    root.remove();
}

#[wasm_bindgen_test]
async fn mutation_observer_drives_updates() {
    let host = host();
    let root = mount(&host, r#"<li class="a"></li>"#);
    let query = livedom_web::LiveQuery::collection(
        host.clone(),
        ".a",
        Some(root.clone()),
        ObserverConfig::default(),
    )
    .unwrap();
    let seen: Rc<RefCell<Vec<usize>>> = Rc::default();
    let sink = Rc::clone(&seen);
    query.on(
        LifecycleEvent::Update,
        Rc::new(move |n: &Notification<Element>| {
            if let Some(update) = n.update() {
                sink.borrow_mut().push(update.entered().len());
            }
        }),
    );

    let added = host.document().create_element("li").unwrap();
    added.set_class_name("a");
    root.append_child(&added).unwrap();
    tick().await;

    assert_eq!(*seen.borrow(), vec![1]);
    assert_eq!(query.len(), 2);

    query.pause();
    let ignored = host.document().create_element("li").unwrap();
    ignored.set_class_name("a");
    root.append_child(&ignored).unwrap();
    tick().await;
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(query.len(), 2);

    query.resume();
    assert_eq!(*seen.borrow(), vec![1, 1]);
    assert_eq!(query.len(), 3);

    query.dispose();
    root.remove();
}
