//! In-process backend implementing the service contracts.
//!
//! Used by the demo binary and by tests. Items posted through
//! [`SocialService::update_status_with_fields`] stay pending until a view is
//! refreshed, mirroring how real backends only surface new statuses on the next
//! fetch. Published, changed and retracted items reach open views immediately.
use crate::caps::CapabilitySet;
use crate::item::{fields, Item, ItemId};
use crate::service::{
    ItemView, ServiceError, ServiceSignal, SocialClient, SocialService, StatusFields, ViewEvent,
    ViewParams,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use tokio::sync::{broadcast, mpsc};

const SIGNAL_CAPACITY: usize = 64;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Feed {
    items: Mutex<Vec<Arc<Item>>>,
    pending: Mutex<Vec<Arc<Item>>>,
    sinks: DashMap<u64, Vec<mpsc::UnboundedSender<ViewEvent>>>,
    next_view: AtomicU64,
}

impl Feed {
    fn emit(&self, event: ViewEvent) {
        for mut entry in self.sinks.iter_mut() {
            entry
                .value_mut()
                .retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    fn flush_pending(&self) {
        let fresh: Vec<Arc<Item>> = std::mem::take(&mut *lock(&self.pending));
        if fresh.is_empty() {
            return;
        }
        {
            let mut items = lock(&self.items);
            for (position, item) in fresh.iter().enumerate() {
                items.insert(position, item.clone());
            }
        }
        for (position, item) in fresh.into_iter().enumerate() {
            self.emit(ViewEvent::Added { item, position });
        }
    }
}

pub struct MemoryView {
    id: u64,
    feed: Arc<Feed>,
    closed: AtomicBool,
}

#[async_trait]
impl ItemView for MemoryView {
    fn events(&self) -> mpsc::UnboundedReceiver<ViewEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.closed.load(Ordering::SeqCst) {
            self.feed.sinks.entry(self.id).or_default().push(tx);
        }
        rx
    }

    async fn snapshot(&self) -> Result<Vec<Arc<Item>>, ServiceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ServiceError::Closed);
        }
        Ok(lock(&self.feed.items).clone())
    }

    fn refresh(&self) {
        if !self.closed.load(Ordering::SeqCst) {
            self.feed.flush_pending();
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.feed.sinks.remove(&self.id);
            tracing::debug!(view = self.id, "memory.view.closed");
        }
    }
}

pub struct MemoryService {
    name: String,
    static_caps: CapabilitySet,
    dynamic_caps: Mutex<CapabilitySet>,
    feed: Arc<Feed>,
    views: Vec<String>,
    signals: broadcast::Sender<ServiceSignal>,
    fail_updates: AtomicBool,
    posted: AtomicU64,
}

impl MemoryService {
    pub fn new(name: impl Into<String>) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            name: name.into(),
            static_caps: CapabilitySet::new(),
            dynamic_caps: Mutex::new(CapabilitySet::new()),
            feed: Arc::new(Feed::default()),
            views: vec!["feed".to_string()],
            signals,
            fail_updates: AtomicBool::new(false),
            posted: AtomicU64::new(0),
        }
    }

    pub fn with_static_caps(mut self, caps: CapabilitySet) -> Self {
        self.static_caps = caps;
        self
    }

    pub fn with_dynamic_caps(self, caps: CapabilitySet) -> Self {
        *lock(&self.dynamic_caps) = caps;
        self
    }

    /// Seed the feed, newest first.
    pub fn with_items(self, items: impl IntoIterator<Item = Item>) -> Self {
        lock(&self.feed.items).extend(items.into_iter().map(Arc::new));
        self
    }

    /// Names accepted by `open_view`; defaults to `feed`.
    pub fn with_views(mut self, views: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.views = views.into_iter().map(Into::into).collect();
        self
    }

    /// Make every subsequent status update fail with a transport error.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Replace the dynamic capabilities and emit `capabilities-changed`.
    pub fn set_dynamic_caps(&self, caps: CapabilitySet) {
        *lock(&self.dynamic_caps) = caps.clone();
        let _ = self.signals.send(ServiceSignal::CapabilitiesChanged(caps));
    }

    /// Insert an item at `position` (clamped) and tell every open view.
    pub fn publish(&self, item: Item, position: usize) {
        let item = Arc::new(item);
        let position = {
            let mut items = lock(&self.feed.items);
            items.retain(|existing| existing.id != item.id);
            let position = position.min(items.len());
            items.insert(position, item.clone());
            position
        };
        self.feed.emit(ViewEvent::Added { item, position });
    }

    /// Replace an item's content in place. Unknown ids are ignored.
    pub fn change(&self, item: Item) {
        let item = Arc::new(item);
        let found = {
            let mut items = lock(&self.feed.items);
            match items.iter_mut().find(|existing| existing.id == item.id) {
                Some(slot) => {
                    *slot = item.clone();
                    true
                }
                None => false,
            }
        };
        if found {
            self.feed.emit(ViewEvent::Updated(item));
        }
    }

    pub fn retract(&self, id: &ItemId) {
        let removed = {
            let mut items = lock(&self.feed.items);
            let before = items.len();
            items.retain(|existing| &existing.id != id);
            before != items.len()
        };
        if removed {
            self.feed.emit(ViewEvent::Removed(id.clone()));
        }
    }

    /// Number of views currently holding an event subscription.
    pub fn open_views(&self) -> usize {
        self.feed.sinks.len()
    }

    pub fn items(&self) -> Vec<Arc<Item>> {
        lock(&self.feed.items).clone()
    }
}

#[async_trait]
impl SocialService for MemoryService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn static_capabilities(&self) -> Result<CapabilitySet, ServiceError> {
        Ok(self.static_caps.clone())
    }

    async fn dynamic_capabilities(&self) -> Result<CapabilitySet, ServiceError> {
        Ok(lock(&self.dynamic_caps).clone())
    }

    async fn open_view(
        &self,
        view: &str,
        _params: &ViewParams,
    ) -> Result<Arc<dyn ItemView>, ServiceError> {
        if !self.views.iter().any(|known| known == view) {
            return Err(ServiceError::Unsupported(format!(
                "{} has no '{view}' view",
                self.name
            )));
        }
        let id = self.feed.next_view.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(service = %self.name, view, id, "memory.view.opened");
        Ok(Arc::new(MemoryView {
            id,
            feed: self.feed.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn update_status_with_fields(
        &self,
        text: &str,
        extra: &StatusFields,
    ) -> Result<(), ServiceError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            let _ = self.signals.send(ServiceSignal::StatusUpdated(false));
            return Err(ServiceError::Transport(format!(
                "{} rejected the status update",
                self.name
            )));
        }

        let n = self.posted.fetch_add(1, Ordering::Relaxed);
        let mut item = Item::new(format!("{}-local-{n}", self.name))
            .with_field(fields::AUTHOR, "You")
            .with_field(fields::AUTHOR_ID, "me")
            .with_field(fields::CONTENT, text);
        for (name, value) in extra {
            item = item.with_field(name.as_str(), value.as_str());
        }
        lock(&self.feed.pending).push(Arc::new(item));

        let _ = self.signals.send(ServiceSignal::StatusUpdated(true));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ServiceSignal> {
        self.signals.subscribe()
    }
}

/// Client over a fixed list of in-memory services.
#[derive(Default)]
pub struct MemoryClient {
    services: Vec<Arc<MemoryService>>,
}

impl MemoryClient {
    pub fn new(services: Vec<Arc<MemoryService>>) -> Self {
        Self { services }
    }

    pub fn service(&self, name: &str) -> Option<Arc<MemoryService>> {
        self.services.iter().find(|s| s.name == name).cloned()
    }
}

#[async_trait]
impl SocialClient for MemoryClient {
    async fn services(&self) -> Result<Vec<Arc<dyn SocialService>>, ServiceError> {
        Ok(self
            .services
            .iter()
            .map(|s| s.clone() as Arc<dyn SocialService>)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::CAN_UPDATE_STATUS;

    fn tweet(id: &str, author: &str) -> Item {
        Item::new(id)
            .with_field(fields::AUTHOR_ID, author)
            .with_field(fields::CONTENT, format!("from {author}"))
    }

    #[tokio::test]
    async fn posted_status_appears_after_refresh() {
        let svc = MemoryService::new("twitter").with_items([tweet("a", "alice")]);
        let mut signals = svc.subscribe();
        let view = svc.open_view("feed", &ViewParams::new()).await.unwrap();
        let mut events = view.events();

        svc.update_status_with_fields("hello", &StatusFields::new())
            .await
            .unwrap();
        assert_eq!(signals.recv().await.unwrap(), ServiceSignal::StatusUpdated(true));
        assert!(events.try_recv().is_err());

        view.refresh();
        match events.try_recv().unwrap() {
            ViewEvent::Added { item, position } => {
                assert_eq!(position, 0);
                assert_eq!(item.get(fields::CONTENT), Some("hello"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(view.snapshot().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failing_updates_report_transport_error() {
        let svc = MemoryService::new("twitter");
        svc.set_fail_updates(true);
        let err = svc
            .update_status_with_fields("nope", &StatusFields::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Transport(_)));
    }

    #[tokio::test]
    async fn closed_view_stops_events() {
        let svc = MemoryService::new("twitter");
        let view = svc.open_view("feed", &ViewParams::new()).await.unwrap();
        let mut events = view.events();
        assert_eq!(svc.open_views(), 1);

        view.close();
        view.close();
        svc.publish(tweet("b", "bob"), 0);

        assert_eq!(svc.open_views(), 0);
        assert!(events.recv().await.is_none());
        assert_eq!(view.snapshot().await.unwrap_err(), ServiceError::Closed);
    }

    #[tokio::test]
    async fn unknown_view_is_unsupported() {
        let svc = MemoryService::new("flickr");
        let err = svc
            .open_view("photos", &ViewParams::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ServiceError::Unsupported(_)));
    }

    #[tokio::test]
    async fn dynamic_caps_change_is_signalled() {
        let svc = MemoryService::new("twitter");
        let mut signals = svc.subscribe();
        let caps: CapabilitySet = [CAN_UPDATE_STATUS].into_iter().collect();
        svc.set_dynamic_caps(caps.clone());

        assert_eq!(
            signals.recv().await.unwrap(),
            ServiceSignal::CapabilitiesChanged(caps.clone())
        );
        assert_eq!(svc.dynamic_capabilities().await.unwrap(), caps);
    }

    #[tokio::test]
    async fn change_and_retract_reach_views() {
        let svc = MemoryService::new("twitter").with_items([tweet("a", "alice")]);
        let view = svc.open_view("feed", &ViewParams::new()).await.unwrap();
        let mut events = view.events();

        svc.change(tweet("a", "alice2"));
        svc.change(tweet("zzz", "nobody"));
        svc.retract(&ItemId::from("a"));
        svc.retract(&ItemId::from("a"));

        assert!(matches!(events.try_recv().unwrap(), ViewEvent::Updated(_)));
        assert_eq!(
            events.try_recv().unwrap(),
            ViewEvent::Removed(ItemId::from("a"))
        );
        assert!(events.try_recv().is_err());
    }
}
