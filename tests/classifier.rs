//! Classifier properties over realistic listing markup.
//!
//! Every fixture is parsed into a `Document`, so hrefs are resolved against the page URL
//! exactly as the engine sees them.

use read_trail::{Classifier, Document, KeyScheme, TrailConfig, derive_key};

const PAGE: &str = "https://bbs.example.org/list-2-1.html";

fn trackable(classifier: &Classifier, html: &str) -> Vec<bool> {
    let doc = Document::parse(html, PAGE);
    doc.anchors()
        .into_iter()
        .map(|id| classifier.is_trackable(doc.element(id).expect("anchor")))
        .collect()
}

#[test]
fn asset_extensions_lose_whatever_the_markup() {
    let classifier = Classifier::default();
    for href in ["/thread-1-1-1.jpg", "/t/12/banner.webp", "/topic/style.css", "/thread/app.js"] {
        let html = format!(
            r#"<div class="thread"><h3 class="topic-title"><a href="{href}">[123] Great thread title</a></h3></div>"#
        );
        assert_eq!(trackable(&classifier, &html), vec![false], "{href}");
    }
}

#[test]
fn time_wrapped_and_dated_anchors_are_rejected() {
    let classifier = Classifier::default();
    let html = r#"
        <time datetime="2024-05-01"><a href="/thread-1-2-3.html">Wrapped by a time element</a></time>
        <a href="/thread-1-2-4.html"><time>yesterday at noon</time></a>
        <a href="/thread-1-2-5.html" datetime="2024-05-01">Datetime attribute</a>
        <a href="/thread-1-2-6.html" title="05/01/2024">Date-valued title</a>
    "#;
    assert_eq!(trackable(&classifier, html), vec![false, false, false, false]);
}

#[test]
fn numeric_text_needs_rich_children() {
    let classifier = Classifier::default();
    let html = r#"
        <a href="/thread-5-6-7.html">12</a>
        <a href="/thread-5-6-7.html">12<span>New Thread</span></a>
    "#;
    assert_eq!(trackable(&classifier, html), vec![false, true]);
}

#[test]
fn typical_listing_row() {
    let classifier = Classifier::default();
    let html = r#"
        <table>
          <tr class="thread">
            <td class="subject"><a href="/viewthread.php?tid=991">Release notes for spring</a></td>
            <td class="replies"><a href="/viewthread.php?tid=991&page=9">9</a></td>
            <td class="date"><a href="/viewthread.php?tid=991&lastpost=1">Last post by admin</a></td>
            <td><a href="/space/uid-3.html">Profile of admin</a></td>
          </tr>
        </table>
    "#;
    assert_eq!(trackable(&classifier, html), vec![true, false, false, false]);
}

#[test]
fn magnet_links_are_trackable_anywhere() {
    let classifier = Classifier::default();
    let html = r#"
        <span class="date"><a href="magnet:?xt=urn:btih:0123456789abcdef">1</a></span>
        <a href="thunder:QUFodHRwOi8vZXhhbXBsZS5vcmcvYS56aXBaWg==">x</a>
    "#;
    assert_eq!(trackable(&classifier, html), vec![true, true]);
}

#[test]
fn broken_config_degrades_to_false() {
    let mut config = TrailConfig::default();
    config.patterns.forum = "(".to_string();
    config.selectors.title_elements = "h3 >".to_string();
    let classifier = Classifier::new(&config);
    let html = r#"
        <h3 class="topic-title"><a href="/index.php?id=5">Weekly meetup notes</a></h3>
        <a href="/board/thread/44">Contains the thread keyword</a>
    "#;
    // Title container and forum regex are disabled; the `thread` substring still counts.
    assert_eq!(trackable(&classifier, html), vec![false, true]);
}

#[test]
fn combinator_and_negation_selectors_from_config() {
    let mut config = TrailConfig::default();
    config.selectors.title_elements = "h2 > .subject".to_string();
    config.selectors.forum_elements = ".board > li:not(.sticky)".to_string();
    let classifier = Classifier::new(&config);
    let html = r#"
        <h2><span class="subject"><a href="/index.php?id=7">Spring release notes</a></span></h2>
        <div><span class="subject"><a href="/index.php?id=8">Not under a heading</a></span></div>
        <ul class="board">
          <li><a href="/index.php?mod=viewtopic&id=9">Regular row</a></li>
          <li class="sticky"><a href="/index.php?mod=viewtopic&id=10">Pinned rules</a></li>
        </ul>
    "#;
    // Keyword hrefs count only inside a non-sticky board row.
    assert_eq!(trackable(&classifier, html), vec![true, false, true, false]);
}

#[test]
fn keys_are_stable_for_identical_input() {
    let url = "https://forum.example.com/thread-12-3-4.html";
    let first = derive_key(url, KeyScheme::PerUrl);
    assert_eq!(first, derive_key(url, KeyScheme::PerUrl));
    assert!(first.starts_with("@rt:forum.example.com:"));
    assert_eq!(
        derive_key(url, KeyScheme::DomainSharded),
        "@rt:forum.example.com"
    );
}
