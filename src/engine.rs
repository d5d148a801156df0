//! Reactive marking engine: one instance per page.
//!
//! The engine owns the tracked link set and composes classifier, store and effects in
//! response to [`PageEvent`]s. Nothing here blocks navigation: clicks schedule their write
//! on a [`JoinSet`] and return immediately; completed writes are applied on the next
//! [`Engine::poll`] or [`Engine::settle`].

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};

use crate::classify::Classifier;
use crate::constants::{READ_CLASS, SYNC_EVENT_KEY};
use crate::dom::{Document, ElementRef, MutationRecord, NodeId};
use crate::effects::StyleManager;
use crate::error::Result;
use crate::store::{PersistenceBackend, ReadStore, StorageEvent, SyncBus, SyncListener};
use crate::types::{ReadRecord, TrailConfig};

/// Lifecycle of one page's engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Uninitialized,
    Scanning,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Middle,
    Secondary,
}

/// Modifier keys held during a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    #[must_use]
    pub fn any(&self) -> bool {
        self.ctrl || self.shift || self.alt || self.meta
    }
}

/// Browser-delivered events the engine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Click {
        target: NodeId,
        button: MouseButton,
        modifiers: Modifiers,
    },
    AuxClick {
        target: NodeId,
        button: MouseButton,
    },
    Load,
    VisibilityChange,
    Storage(StorageEvent),
    /// The document's pending mutation batch is ready.
    Mutations,
}

pub struct Engine<B> {
    store: Arc<ReadStore<B>>,
    listener: Option<SyncListener>,
    classifier: Classifier,
    styles: StyleManager,
    tracked: BTreeSet<NodeId>,
    pending: JoinSet<Result<ReadRecord>>,
    implicit_visit_window_ms: i64,
    implicit_checked: bool,
    state: EngineState,
}

impl<B> std::fmt::Debug for Engine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("tracked", &self.tracked.len())
            .field("pending_writes", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<B: PersistenceBackend + 'static> Engine<B> {
    #[must_use]
    pub fn new(store: Arc<ReadStore<B>>, config: &TrailConfig) -> Self {
        Self {
            store,
            listener: None,
            classifier: Classifier::new(config),
            styles: StyleManager::new(),
            tracked: BTreeSet::new(),
            pending: JoinSet::new(),
            implicit_visit_window_ms: config.implicit_visit_window_ms,
            implicit_checked: false,
            state: EngineState::Uninitialized,
        }
    }

    /// A tab attached to `bus`: its store rings the bus after writes and the engine
    /// listens for other tabs' doorbells.
    #[must_use]
    pub fn for_tab(backend: B, bus: &SyncBus, config: &TrailConfig) -> Self {
        let port = bus.attach();
        let listener = port.listen();
        let store = ReadStore::new(backend, config.key_scheme).with_sync_port(port);
        Self::new(Arc::new(store), config).with_listener(listener)
    }

    #[must_use]
    pub fn with_listener(mut self, listener: SyncListener) -> Self {
        self.listener = Some(listener);
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<ReadStore<B>> {
        &self.store
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    #[must_use]
    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }

    #[must_use]
    pub fn is_tracked(&self, anchor: NodeId) -> bool {
        self.tracked.contains(&anchor)
    }

    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Inject styles, start observing, scan the whole document and mark what is known.
    ///
    /// Calling it again on an initialized engine does nothing.
    pub async fn initialize(&mut self, doc: &mut Document) {
        if self.state != EngineState::Uninitialized {
            tracing::debug!(engine.state = ?self.state, "already initialized");
            return;
        }
        self.state = EngineState::Scanning;
        self.styles.initialize(doc);
        doc.observe();

        let found = self.scan(doc, doc.root());
        tracing::info!(engine.url = %doc.location(), engine.tracked = found.len(), "initial scan complete");
        self.refresh(doc).await;
        self.state = EngineState::Active;

        if doc.is_loaded() {
            self.implicit_visit(doc).await;
        }
    }

    /// Remove the stylesheet, stop observing and forget tracked links.
    ///
    /// Writes already issued keep running detached; their records still land in the store.
    pub fn cleanup(&mut self, doc: &mut Document) {
        self.styles.cleanup(doc);
        doc.disconnect();
        self.tracked.clear();
        self.pending.detach_all();
        self.implicit_checked = false;
        self.state = EngineState::Uninitialized;
        tracing::info!(engine.url = %doc.location(), "engine cleaned up");
    }

    /// Handle one page event. Store failures are logged and never surface here.
    pub async fn dispatch(&mut self, doc: &mut Document, event: PageEvent) {
        if self.state != EngineState::Active {
            tracing::debug!(engine.event = ?event, "event before initialize; ignored");
            return;
        }
        match event {
            PageEvent::Click {
                target,
                button: MouseButton::Primary,
                modifiers,
            } if !modifiers.any() => self.record_click(doc, target),
            PageEvent::AuxClick {
                target,
                button: MouseButton::Middle,
            } => self.record_click(doc, target),
            PageEvent::Click { .. } | PageEvent::AuxClick { .. } => {}
            PageEvent::Load => self.implicit_visit(doc).await,
            PageEvent::VisibilityChange => {
                if doc.is_visible() {
                    self.store.invalidate_all();
                    self.refresh(doc).await;
                }
            }
            PageEvent::Storage(event) => {
                if self.absorb_storage_event(&event) {
                    self.refresh(doc).await;
                }
            }
            PageEvent::Mutations => {
                let batch = doc.take_mutations();
                self.handle_mutations(doc, &batch).await;
            }
        }
    }

    /// Apply finished writes, the pending mutation batch and queued doorbells.
    pub async fn poll(&mut self, doc: &mut Document) {
        while let Some(outcome) = self.pending.try_join_next() {
            self.apply_write(doc, outcome);
        }
        self.pump(doc).await;
    }

    /// Wait for every scheduled write, then behave like [`Engine::poll`].
    pub async fn settle(&mut self, doc: &mut Document) {
        while let Some(outcome) = self.pending.join_next().await {
            self.apply_write(doc, outcome);
        }
        self.pump(doc).await;
    }

    async fn pump(&mut self, doc: &mut Document) {
        if self.state != EngineState::Active {
            return;
        }
        let batch = doc.take_mutations();
        if !batch.is_empty() {
            self.handle_mutations(doc, &batch).await;
        }

        let events = self
            .listener
            .as_mut()
            .map(SyncListener::drain)
            .unwrap_or_default();
        let mut wake = false;
        for event in &events {
            wake |= self.absorb_storage_event(event);
        }
        if wake {
            self.refresh(doc).await;
        }
    }

    /// Invalidate for a doorbell; returns whether a refresh is due.
    fn absorb_storage_event(&self, event: &StorageEvent) -> bool {
        if event.key != SYNC_EVENT_KEY {
            return false;
        }
        self.store.invalidate_from_signal(event.new_value.as_deref());
        true
    }

    fn record_click(&mut self, doc: &Document, target: NodeId) {
        let Some(anchor) = doc.element(target).and_then(enclosing_anchor) else {
            return;
        };
        if !self.classifier.is_trackable(anchor) {
            return;
        }
        let Some(url) = anchor.href() else {
            return;
        };
        let replies = self.classifier.reply_count_near(anchor);
        self.tracked.insert(anchor.id());
        tracing::debug!(engine.url = %url, engine.replies = replies, "recording click");

        let store = Arc::clone(&self.store);
        let record = ReadRecord::new(url.as_str()).with_reply_count(replies);
        self.pending
            .spawn(async move { store.set(&url, record).await });
    }

    fn apply_write(
        &mut self,
        doc: &mut Document,
        outcome: std::result::Result<Result<ReadRecord>, JoinError>,
    ) {
        match outcome {
            Ok(Ok(record)) => self.mark_matching(doc, &record),
            Ok(Err(err)) => tracing::warn!(error = %err, "visit write failed; link left unmarked"),
            Err(err) if err.is_cancelled() => {}
            Err(err) => tracing::warn!(error = %err, "visit write task failed"),
        }
    }

    /// Mark every anchor whose href is `record.url`, not only the one that was clicked.
    fn mark_matching(&mut self, doc: &mut Document, record: &ReadRecord) {
        let matching: Vec<(NodeId, bool)> = doc
            .anchors()
            .into_iter()
            .filter_map(|id| {
                let anchor = doc.element(id)?;
                (anchor.href()? == record.url).then(|| (id, self.classifier.is_trackable(anchor)))
            })
            .collect();
        for (id, trackable) in matching {
            if trackable {
                self.tracked.insert(id);
            }
            self.styles.mark_link(doc, id, record);
        }
    }

    /// Track classifier-positive anchors at or under `root`; returns only the newly seen ones.
    fn scan(&mut self, doc: &Document, root: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        for id in std::iter::once(root).chain(doc.descendants(root)) {
            let Some(element) = doc.element(id) else {
                continue;
            };
            if element.tag() != "a" || self.tracked.contains(&id) {
                continue;
            }
            if self.classifier.is_trackable(element) {
                self.tracked.insert(id);
                found.push(id);
            }
        }
        found
    }

    async fn handle_mutations(&mut self, doc: &mut Document, batch: &[MutationRecord]) {
        let mut found = Vec::new();
        for added in batch.iter().flat_map(|record| record.added_nodes.iter()) {
            if doc.is_connected(*added) {
                found.extend(self.scan(doc, *added));
            }
        }
        if found.is_empty() {
            return;
        }
        tracing::debug!(engine.added = found.len(), "incremental scan");
        self.mark_from_store(doc, &found).await;
    }

    /// Re-query the store for every tracked link and mark the ones with a record.
    async fn refresh(&mut self, doc: &mut Document) {
        let tracked: Vec<NodeId> = self.tracked.iter().copied().collect();
        self.mark_from_store(doc, &tracked).await;
    }

    async fn mark_from_store(&mut self, doc: &mut Document, anchors: &[NodeId]) {
        for &id in anchors {
            let Some(url) = doc
                .element(id)
                .filter(|anchor| anchor.is_connected() && !anchor.has_class(READ_CLASS))
                .and_then(|anchor| anchor.href())
            else {
                continue;
            };
            match self.store.get(&url).await {
                Ok(Some(record)) => {
                    self.styles.mark_link(doc, id, &record);
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(engine.url = %url, error = %err, "store read failed"),
            }
        }
    }

    /// Record the current page when it was opened from elsewhere and looks like a thread.
    async fn implicit_visit(&mut self, doc: &mut Document) {
        if self.implicit_checked {
            return;
        }
        self.implicit_checked = true;

        if doc.referrer().is_none_or(|referrer| referrer.trim().is_empty()) {
            return;
        }
        let url = doc.location();
        if !self.classifier.is_forum_like_url(&url) {
            return;
        }

        let previous = match self.store.get(&url).await {
            Ok(previous) => previous,
            Err(err) => {
                tracing::warn!(engine.url = %url, error = %err, "store read failed before implicit visit");
                None
            }
        };
        if let Some(previous) = &previous {
            let age = self.store.now().saturating_sub(previous.visited_at);
            if age < self.implicit_visit_window_ms {
                tracing::debug!(engine.url = %url, "recent visit already recorded");
                return;
            }
        }

        let mut record = ReadRecord::new(url.as_str());
        match previous {
            Some(previous) => {
                record.reply_count = previous.reply_count;
                record.note = previous.note;
            }
            None => {
                record.reply_count = doc
                    .body()
                    .and_then(|body| doc.element(body))
                    .map_or(0, |body| self.classifier.find_reply_count(body));
            }
        }
        match self.store.set(&url, record).await {
            Ok(record) => {
                tracing::debug!(engine.url = %url, "implicit visit recorded");
                self.mark_matching(doc, &record);
            }
            Err(err) => tracing::warn!(engine.url = %url, error = %err, "implicit visit write failed"),
        }
    }
}

fn enclosing_anchor(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut cursor = Some(element);
    while let Some(current) = cursor {
        if current.tag() == "a" {
            return Some(current);
        }
        cursor = current.parent_element();
    }
    None
}
