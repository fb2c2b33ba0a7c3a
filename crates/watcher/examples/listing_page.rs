//! Listing page example - a scraper script waiting for a page to settle

use dom::serializer::DomSerializer;
use dom::snapshot::load_document;
use dom::Selector;
use watcher::{
    all_elements_click_handled, bind_click, elements_available, input_has_value,
    on_element_available, Page, WatchConfig,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Initial render, as DOM.getDocument would return it
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
                        {"nodeType": 1, "nodeName": "INPUT", "attributes": ["id", "city"]},
                        {"nodeType": 1, "nodeName": "UL", "attributes": ["id", "hotels"]}
                    ]
                }]
            }]
        }
    });

    let config = WatchConfig::from_json_str(r#"{"observe_root": "body"}"#)?;
    let page = Page::with_config(load_document(&snapshot)?, config)?;
    let mut events = page.event_bus().subscribe();

    on_element_available(&page, Selector::parse("li.hotel")?, |page, node| {
        println!("🏨 Hotel card: {}", page.describe(node));
    })?;

    let selectors = Selector::parse_all(&["li.hotel", "a.next-page"])?;
    if let Some(any) = Selector::union(&selectors) {
        println!("⏳ Waiting for: {}", any);
    }
    let rendered = elements_available(&page, selectors)?;
    let typed = input_has_value(&page, Selector::parse("#city")?, "Valencia")?;

    // The page script renders results and a pager
    let (hotels, city) = {
        let doc = page.document();
        (
            doc.arena().find_by_id("hotels").ok_or("missing #hotels")?,
            doc.arena().find_by_id("city").ok_or("missing #city")?,
        )
    };
    let next = {
        let mut doc = page.document_mut();
        for name in ["Hotel Balneario", "Casa Lola"] {
            let card = doc.create_element_with("li", &[("class", "hotel"), ("title", name)]);
            doc.append_child(hotels, card)?;
        }
        let next = doc.create_element_with("a", &[("class", "next-page")]);
        let body = doc.body().ok_or("missing body")?;
        doc.append_child(body, next)?;
        next
    };
    page.flush();
    rendered.await?;
    println!("✅ Results rendered");

    all_elements_click_handled(&page, Selector::parse_all(&["a.next-page"])?, |_| {
        println!("🖱️  Pager is clickable");
    })?;
    bind_click(&page, next, |_, event| {
        println!("➡️  Next page requested from node {}", event.target);
    })?;
    page.dispatch_event(next, "click")?;

    page.document_mut().set_value(city, "Valencia")?;
    page.dispatch_event(city, "change")?;
    typed.await?;
    println!("✅ Search box filled");

    while let Ok(event) = events.try_recv() {
        println!("📢 Event: {:?}", event);
    }

    let markup = DomSerializer::new().serialize(page.document().arena())?;
    println!("{}", markup);
    Ok(())
}
