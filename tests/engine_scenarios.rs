//! End-to-end engine scenarios over parsed pages, one or more tabs per test.

use std::sync::Arc;

use read_trail::constants::{MAGNET_CLASS, READ_CLASS};
use read_trail::{
    Document, Engine, EngineState, KeyScheme, MemoryBackend, Modifiers, MouseButton, NodeId,
    PageEvent, ReadRecord, ReadStore, StorageEvent, SyncBus, TrailConfig,
};

const LISTING: &str = "https://forum.example.com/forum-2-1.html";
const THREAD: &str = "https://forum.example.com/thread-12-3-4.html";

const LISTING_HTML: &str = r#"
<html><head></head><body>
  <div class="thread">
    <a id="welcome" href="/thread-12-3-4.html">Welcome thread</a>
    <span class="replies">1,024</span>
  </div>
  <aside><a id="sidebar" href="https://forum.example.com/thread-12-3-4.html">Welcome (sidebar)</a></aside>
  <a id="home" href="/">Home</a>
</body></html>
"#;

/// Route engine logs to the test harness; set `RUST_LOG=read_trail=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn by_id(doc: &Document, id: &str) -> NodeId {
    doc.anchors()
        .into_iter()
        .find(|node| doc.element(*node).and_then(|el| el.attr("id")) == Some(id))
        .expect("anchor with id")
}

fn is_marked(doc: &Document, node: NodeId) -> bool {
    doc.element(node).is_some_and(|el| el.has_class(READ_CLASS))
}

/// Fresh `visited_at` for the thread as persisted, bypassing the reader's cache.
async fn stamp(reader: &Engine<MemoryBackend>) -> Option<i64> {
    reader.store().invalidate_all();
    reader
        .store()
        .get(THREAD)
        .await
        .expect("get")
        .map(|record| record.visited_at)
}

fn click(target: NodeId) -> PageEvent {
    PageEvent::Click {
        target,
        button: MouseButton::Primary,
        modifiers: Modifiers::default(),
    }
}

#[tokio::test]
async fn clicking_a_thread_records_and_marks_it() {
    init_tracing();
    let bus = SyncBus::default();
    let mut doc = Document::parse(LISTING_HTML, LISTING);
    let mut engine = Engine::for_tab(MemoryBackend::new(), &bus, &TrailConfig::default());
    engine.initialize(&mut doc).await;
    assert_eq!(engine.state(), EngineState::Active);

    let welcome = by_id(&doc, "welcome");
    let sidebar = by_id(&doc, "sidebar");
    let home = by_id(&doc, "home");
    assert!(engine.is_tracked(welcome));
    assert!(!engine.is_tracked(home));
    assert!(!is_marked(&doc, welcome));

    let before = engine.store().now();
    engine.dispatch(&mut doc, click(welcome)).await;
    engine.settle(&mut doc).await;

    let record = engine
        .store()
        .get(THREAD)
        .await
        .expect("get")
        .expect("recorded");
    assert_eq!(record.url, THREAD);
    assert_eq!(record.reply_count, 1024);
    assert!(record.visited_at >= before);

    let anchor = doc.element(welcome).expect("welcome");
    assert!(anchor.has_class(READ_CLASS));
    assert!(anchor.style().get("--rt-bg-color").is_some());
    assert!(anchor.attr("title").is_some_and(|t| t.starts_with("Read on ")));
    // Every link to the same thread is marked after the write.
    assert!(is_marked(&doc, sidebar));
    assert!(!is_marked(&doc, home));
}

#[tokio::test]
async fn middle_clicked_magnet_is_marked_as_magnet() {
    init_tracing();
    let bus = SyncBus::default();
    let mut doc = Document::parse(
        r#"<table><tr><td class="date"><a href="magnet:?xt=urn:btih:feedface">1</a></td></tr></table>"#,
        LISTING,
    );
    let mut engine = Engine::for_tab(MemoryBackend::new(), &bus, &TrailConfig::default());
    engine.initialize(&mut doc).await;
    let magnet = doc.anchors()[0];
    assert!(engine.is_tracked(magnet));

    engine
        .dispatch(
            &mut doc,
            PageEvent::AuxClick {
                target: magnet,
                button: MouseButton::Middle,
            },
        )
        .await;
    engine.settle(&mut doc).await;

    let anchor = doc.element(magnet).expect("magnet");
    assert!(anchor.has_class(READ_CLASS));
    assert!(anchor.has_class(MAGNET_CLASS));
}

#[tokio::test]
async fn mutation_batch_marks_only_the_known_positive() {
    init_tracing();
    let backend = MemoryBackend::new();
    let seed = ReadStore::new(backend.clone(), KeyScheme::PerUrl);
    seed.set(THREAD, ReadRecord::new(THREAD)).await.expect("seed");

    let bus = SyncBus::default();
    let mut doc = Document::parse("<html><head></head><body><ul id=\"list\"></ul></body></html>", LISTING);
    let mut engine = Engine::for_tab(backend, &bus, &TrailConfig::default());
    engine.initialize(&mut doc).await;
    assert_eq!(engine.tracked_len(), 0);

    let body = doc.body().expect("body");
    doc.append_html(
        body,
        r#"<a id="known" href="/thread-12-3-4.html">Welcome thread</a>
           <a id="unseen" href="/thread-9-9-9.html">Another thread</a>
           <a id="about" href="/about">About us</a>"#,
    );
    let known = by_id(&doc, "known");
    let unseen = by_id(&doc, "unseen");
    let about = by_id(&doc, "about");
    let untouched = |doc: &Document, node: NodeId| {
        let el = doc.element(node).expect("anchor");
        (el.classes().to_vec(), el.style().clone(), el.attr("title").map(str::to_string))
    };
    let unseen_before = untouched(&doc, unseen);
    let about_before = untouched(&doc, about);

    engine.poll(&mut doc).await;

    assert!(is_marked(&doc, known));
    assert_eq!(untouched(&doc, unseen), unseen_before);
    assert_eq!(untouched(&doc, about), about_before);
    assert!(engine.is_tracked(unseen));
    assert!(!engine.is_tracked(about));
}

#[tokio::test]
async fn repeated_refreshes_do_not_stack_markers() {
    init_tracing();
    let backend = MemoryBackend::new();
    let seed = ReadStore::new(backend.clone(), KeyScheme::PerUrl);
    seed.set(THREAD, ReadRecord::new(THREAD)).await.expect("seed");

    let mut doc = Document::parse(LISTING_HTML, LISTING);
    let store = Arc::new(ReadStore::new(backend, KeyScheme::PerUrl));
    let mut engine = Engine::new(store, &TrailConfig::default());
    engine.initialize(&mut doc).await;

    let welcome = by_id(&doc, "welcome");
    let snapshot = |doc: &Document| {
        let el = doc.element(welcome).expect("welcome");
        (el.classes().to_vec(), el.style().clone(), el.attr("title").map(str::to_string))
    };
    let first = snapshot(&doc);
    assert!(first.0.iter().any(|class| class == READ_CLASS));

    for _ in 0..3 {
        engine.dispatch(&mut doc, PageEvent::VisibilityChange).await;
        engine.dispatch(&mut doc, click(welcome)).await;
        engine.settle(&mut doc).await;
    }
    assert_eq!(snapshot(&doc), first);
    assert_eq!(
        first.0.iter().filter(|class| class.as_str() == READ_CLASS).count(),
        1
    );
}

#[tokio::test]
async fn write_in_one_tab_marks_the_other_after_doorbell() {
    init_tracing();
    let backend = MemoryBackend::new();
    let bus = SyncBus::default();
    let config = TrailConfig::default();

    let mut doc_a = Document::parse(LISTING_HTML, LISTING);
    let mut doc_b = Document::parse(LISTING_HTML, LISTING);
    let mut tab_a = Engine::for_tab(backend.clone(), &bus, &config);
    let mut tab_b = Engine::for_tab(backend, &bus, &config);
    tab_a.initialize(&mut doc_a).await;
    tab_b.initialize(&mut doc_b).await;

    let welcome_b = by_id(&doc_b, "welcome");
    assert!(!is_marked(&doc_b, welcome_b));

    let welcome_a = by_id(&doc_a, "welcome");
    tab_a.dispatch(&mut doc_a, click(welcome_a)).await;
    tab_a.settle(&mut doc_a).await;
    assert!(!is_marked(&doc_b, welcome_b));

    tab_b.poll(&mut doc_b).await;
    assert!(is_marked(&doc_b, welcome_b));
    assert!(is_marked(&doc_b, by_id(&doc_b, "sidebar")));

    // Tab a hears nothing from its own write.
    tab_a.poll(&mut doc_a).await;
    assert!(is_marked(&doc_a, welcome_a));
}

#[tokio::test]
async fn visibility_regain_rereads_a_stale_cache() {
    init_tracing();
    let backend = MemoryBackend::new();
    let config = TrailConfig::default();
    let mut doc = Document::parse(LISTING_HTML, LISTING);
    let store = Arc::new(ReadStore::new(backend.clone(), KeyScheme::PerUrl));
    let mut engine = Engine::new(store, &config);
    engine.initialize(&mut doc).await;
    let welcome = by_id(&doc, "welcome");

    let elsewhere = ReadStore::new(backend, KeyScheme::PerUrl);
    elsewhere.set(THREAD, ReadRecord::new(THREAD)).await.expect("write elsewhere");

    doc.set_visible(false);
    engine.dispatch(&mut doc, PageEvent::VisibilityChange).await;
    assert!(!is_marked(&doc, welcome));

    // A doorbell under some other key is not ours to handle.
    engine
        .dispatch(
            &mut doc,
            PageEvent::Storage(StorageEvent {
                key: "unrelated".to_string(),
                new_value: Some("x".to_string()),
            }),
        )
        .await;
    assert!(!is_marked(&doc, welcome));

    doc.set_visible(true);
    engine.dispatch(&mut doc, PageEvent::VisibilityChange).await;
    assert!(is_marked(&doc, welcome));
}

#[tokio::test]
async fn failed_write_leaves_link_unmarked_and_engine_alive() {
    init_tracing();
    let backend = MemoryBackend::new();
    let bus = SyncBus::default();
    let mut doc = Document::parse(LISTING_HTML, LISTING);
    let mut engine = Engine::for_tab(backend.clone(), &bus, &TrailConfig::default());
    engine.initialize(&mut doc).await;
    let welcome = by_id(&doc, "welcome");

    backend.set_fail_writes(true);
    engine.dispatch(&mut doc, click(welcome)).await;
    engine.settle(&mut doc).await;
    assert!(!is_marked(&doc, welcome));
    assert_eq!(engine.state(), EngineState::Active);
    assert_eq!(engine.store().get(THREAD).await.expect("get"), None);

    backend.set_fail_writes(false);
    engine.dispatch(&mut doc, click(welcome)).await;
    engine.settle(&mut doc).await;
    assert!(is_marked(&doc, welcome));
}

#[tokio::test]
async fn arriving_from_a_referrer_records_an_implicit_visit() {
    init_tracing();
    let backend = MemoryBackend::new();
    let config = TrailConfig::default();
    let open = |clock: i64| {
        let store = ReadStore::new(backend.clone(), KeyScheme::PerUrl).with_clock(move || clock);
        Engine::new(Arc::new(store), &config)
    };
    let page = |referrer: Option<&str>| {
        let mut doc = Document::parse(
            r#"<a id="self" href="/thread-12-3-4.html">Welcome thread</a>"#,
            THREAD,
        );
        doc.set_referrer(referrer);
        doc
    };

    let mut direct = page(None);
    open(1_000).initialize(&mut direct).await;
    assert_eq!(backend.len(), 0);

    let mut from_listing = page(Some(LISTING));
    open(1_000).initialize(&mut from_listing).await;
    let reader = open(0);
    assert_eq!(stamp(&reader).await, Some(1_000));
    assert!(is_marked(&from_listing, by_id(&from_listing, "self")));

    // Within the window the opener's record stands.
    let mut reopened = page(Some(LISTING));
    open(3_000).initialize(&mut reopened).await;
    assert_eq!(stamp(&reader).await, Some(1_000));

    let mut later = page(Some(LISTING));
    open(10_000).initialize(&mut later).await;
    assert_eq!(stamp(&reader).await, Some(10_000));
}

#[tokio::test]
async fn implicit_visit_waits_for_load() {
    init_tracing();
    let backend = MemoryBackend::new();
    let store = Arc::new(ReadStore::new(backend.clone(), KeyScheme::PerUrl));
    let mut engine = Engine::new(store, &TrailConfig::default());
    let mut doc = Document::parse("<p>loading</p>", THREAD);
    doc.set_referrer(Some(LISTING));
    doc.set_loaded(false);

    engine.initialize(&mut doc).await;
    assert_eq!(backend.len(), 0);

    doc.set_loaded(true);
    engine.dispatch(&mut doc, PageEvent::Load).await;
    engine.dispatch(&mut doc, PageEvent::Load).await;
    assert_eq!(backend.len(), 1);
}

#[tokio::test]
async fn implicit_visit_survives_an_ancient_stamp() {
    init_tracing();
    let backend = MemoryBackend::new();
    let store = ReadStore::new(backend.clone(), KeyScheme::PerUrl).with_clock(|| 5_000);
    backend.insert_raw(
        &store.key_for(THREAD),
        &format!(r#"{{"url":"{THREAD}","visitedAt":{},"replyCount":0}}"#, i64::MIN),
    );
    let mut engine = Engine::new(Arc::new(store), &TrailConfig::default());
    let mut doc = Document::parse("<p>thread body</p>", THREAD);
    doc.set_referrer(Some(LISTING));

    engine.initialize(&mut doc).await;
    assert_eq!(engine.state(), EngineState::Active);
    assert_eq!(stamp(&engine).await, Some(5_000));
}

#[tokio::test]
async fn first_implicit_visit_reads_the_page_reply_count() {
    init_tracing();
    let backend = MemoryBackend::new();
    let store = Arc::new(ReadStore::new(backend, KeyScheme::PerUrl));
    let mut engine = Engine::new(store, &TrailConfig::default());
    let mut doc = Document::parse(
        r#"<div class="post"><h1>Welcome thread</h1><span class="replies">57</span></div>"#,
        THREAD,
    );
    doc.set_referrer(Some(LISTING));

    engine.initialize(&mut doc).await;
    engine.store().invalidate_all();
    let record = engine
        .store()
        .get(THREAD)
        .await
        .expect("get")
        .expect("implicit visit recorded");
    assert_eq!(record.reply_count, 57);
}

#[tokio::test]
async fn cleanup_lets_issued_writes_land() {
    init_tracing();
    let backend = MemoryBackend::new();
    let bus = SyncBus::default();
    let mut doc = Document::parse(LISTING_HTML, LISTING);
    let mut engine = Engine::for_tab(backend.clone(), &bus, &TrailConfig::default());
    engine.initialize(&mut doc).await;

    let welcome = by_id(&doc, "welcome");
    engine.dispatch(&mut doc, click(welcome)).await;
    engine.cleanup(&mut doc);
    assert_eq!(engine.pending_writes(), 0);

    for _ in 0..16 {
        if backend.len() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(backend.len(), 1);
}
