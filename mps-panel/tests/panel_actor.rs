mod common;

use common::{eventually, init_test_tracing};
use mps_actors::actor::{spawn_actor, ActorHandle};
use mps_panel::geotag::LocationChoice;
use async_trait::async_trait;
use mps_panel::pane::{PaneSettings, NOT_ONLINE_TEXT};
use mps_panel::switcher::PLACEHOLDER_TEXT;
use mps_panel::{PanelActor, PanelHandle, PanelMsg, UserAction};
use mps_social::caps::{CAN_UPDATE_STATUS, CAN_UPDATE_STATUS_WITH_GEOTAG};
use mps_social::item::fields;
use mps_social::memory::{MemoryClient, MemoryService};
use mps_social::online::OnlineMonitor;
use mps_social::{
    CapabilitySet, Item, ItemId, ItemView, ServiceError, ServiceSignal, SocialClient,
    SocialService, StatusFields, ViewEvent, ViewParams,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

fn caps(tokens: &[&str]) -> CapabilitySet {
    tokens.iter().copied().collect()
}

fn tweet(id: &str, author: &str, content: &str) -> Item {
    Item::new(id)
        .with_field(fields::AUTHOR, author)
        .with_field(fields::AUTHOR_ID, author.to_lowercase())
        .with_field(fields::CONTENT, content)
}

fn twitter() -> Arc<MemoryService> {
    Arc::new(
        MemoryService::new("twitter")
            .with_static_caps(caps(&[CAN_UPDATE_STATUS]))
            .with_dynamic_caps(caps(&[CAN_UPDATE_STATUS]))
            .with_items([tweet("t2", "Bob", "second"), tweet("t1", "Alice", "first")]),
    )
}

struct Harness {
    panel: PanelHandle,
    monitor: Arc<OnlineMonitor>,
    task: tokio::task::JoinHandle<anyhow::Result<()>>,
}

async fn start(services: Vec<Arc<MemoryService>>) -> Harness {
    start_with(Arc::new(MemoryClient::new(services))).await
}

async fn start_with(client: Arc<dyn SocialClient>) -> Harness {
    init_test_tracing();
    let monitor = Arc::new(OnlineMonitor::new(true));
    let actor = PanelActor::new(client, PaneSettings::default(), monitor.clone());
    let ActorHandle { addr, task } = spawn_actor(actor, 64);
    let panel = PanelHandle::new(addr);
    panel.start().await.expect("start");
    Harness {
        panel,
        monitor,
        task,
    }
}

/// View whose items are fixed; optionally retracts them while a snapshot is in flight.
struct ScriptedView {
    items: Vec<Arc<Item>>,
    retract_during_snapshot: bool,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ViewEvent>>>,
}

impl ScriptedView {
    fn new(items: Vec<Item>, retract_during_snapshot: bool) -> Arc<Self> {
        Arc::new(Self {
            items: items.into_iter().map(Arc::new).collect(),
            retract_during_snapshot,
            subscribers: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ItemView for ScriptedView {
    fn events(&self) -> mpsc::UnboundedReceiver<ViewEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    async fn snapshot(&self) -> Result<Vec<Arc<Item>>, ServiceError> {
        let captured = self.items.clone();
        if self.retract_during_snapshot {
            {
                let subscribers = self.subscribers.lock().unwrap();
                for item in &captured {
                    for tx in subscribers.iter() {
                        let _ = tx.send(ViewEvent::Removed(item.id().clone()));
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(captured)
    }

    fn refresh(&self) {}

    fn close(&self) {
        self.subscribers.lock().unwrap().clear();
    }
}

/// Service whose dynamic capabilities can change without emitting a signal.
struct ScriptedService {
    caps: Mutex<CapabilitySet>,
    view: Arc<ScriptedView>,
    signals: broadcast::Sender<ServiceSignal>,
}

impl ScriptedService {
    fn new(view: Arc<ScriptedView>) -> Arc<Self> {
        let (signals, _) = broadcast::channel(8);
        Arc::new(Self {
            caps: Mutex::new(caps(&[CAN_UPDATE_STATUS])),
            view,
            signals,
        })
    }
}

#[async_trait]
impl SocialService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn static_capabilities(&self) -> Result<CapabilitySet, ServiceError> {
        Ok(caps(&[CAN_UPDATE_STATUS]))
    }

    async fn dynamic_capabilities(&self) -> Result<CapabilitySet, ServiceError> {
        Ok(self.caps.lock().unwrap().clone())
    }

    async fn open_view(
        &self,
        _view: &str,
        _params: &ViewParams,
    ) -> Result<Arc<dyn ItemView>, ServiceError> {
        Ok(self.view.clone())
    }

    async fn update_status_with_fields(
        &self,
        _text: &str,
        _fields: &StatusFields,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ServiceSignal> {
        self.signals.subscribe()
    }
}

struct ScriptedClient(Arc<ScriptedService>);

#[async_trait]
impl SocialClient for ScriptedClient {
    async fn services(&self) -> Result<Vec<Arc<dyn SocialService>>, ServiceError> {
        Ok(vec![self.0.clone() as Arc<dyn SocialService>])
    }
}

fn card_ids(snapshot: &mps_panel::PanelSnapshot) -> Vec<String> {
    snapshot
        .pane
        .as_ref()
        .map(|p| p.cards.iter().map(|c| c.id.clone()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn eligible_service_shows_its_feed() {
    let h = start(vec![twitter()]).await;

    let snapshot = eventually(&h.panel, "initial cards", |s| card_ids(s).len() == 2).await;
    assert_eq!(snapshot.active_service(), Some("twitter"));
    assert_eq!(snapshot.page, 1);
    assert_eq!(snapshot.placeholder, None);
    assert_eq!(card_ids(&snapshot), vec!["t2", "t1"]);

    let pane = snapshot.pane.unwrap();
    assert!(pane.composer_visible);
    assert!(!pane.fallback_visible);
    assert_eq!(pane.cards[1].markup, "<b>Alice</b> first");
    assert_eq!(pane.cards[1].avatar, "/usr/share/mps/theme/avatar_icon.png");
}

#[tokio::test]
async fn ineligible_services_never_get_a_button() {
    let plain = Arc::new(MemoryService::new("flickr").with_dynamic_caps(caps(&[CAN_UPDATE_STATUS])));
    let h = start(vec![plain, twitter()]).await;

    let snapshot = eventually(&h.panel, "twitter button", |s| !s.buttons.is_empty()).await;
    let names: Vec<&str> = snapshot.buttons.iter().map(|b| b.service.as_str()).collect();
    assert_eq!(names, vec!["twitter"]);
}

#[tokio::test]
async fn no_services_shows_placeholder() {
    let h = start(Vec::new()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    let snapshot = h.panel.snapshot().await.unwrap();
    assert_eq!(snapshot.page, 0);
    assert_eq!(snapshot.placeholder, Some(PLACEHOLDER_TEXT));
    assert!(snapshot.pane.is_none());
}

#[tokio::test]
async fn live_events_keep_cards_in_source_order() {
    let svc = twitter();
    let h = start(vec![svc.clone()]).await;
    eventually(&h.panel, "initial cards", |s| card_ids(s).len() == 2).await;

    svc.publish(tweet("t3", "Carol", "third"), 0);
    svc.publish(tweet("t0", "Dan", "zeroth"), 99);
    svc.change(tweet("t1", "Alice", "first, edited"));
    svc.retract(&ItemId::from("t2"));
    svc.retract(&ItemId::from("missing"));

    let snapshot = eventually(&h.panel, "live updates", |s| {
        card_ids(s) == vec!["t3", "t1", "t0"]
    })
    .await;
    let pane = snapshot.pane.unwrap();
    assert_eq!(pane.cards[1].markup, "<b>Alice</b> first, edited");
}

#[tokio::test]
async fn successful_update_refreshes_and_clears_composer() {
    let svc = twitter();
    let h = start(vec![svc.clone()]).await;
    eventually(&h.panel, "initial cards", |s| card_ids(s).len() == 2).await;

    h.panel
        .act(UserAction::Compose("hello panel".into()))
        .await
        .unwrap();
    h.panel.act(UserAction::Submit).await.unwrap();

    let snapshot = eventually(&h.panel, "posted status", |s| card_ids(s).len() == 3).await;
    let pane = snapshot.pane.unwrap();
    assert_eq!(pane.composer_text, "");
    assert_eq!(pane.cards[0].id, "twitter-local-0");
    assert_eq!(pane.cards[0].markup, "<b>You</b> hello panel");
}

#[tokio::test]
async fn failed_update_keeps_composer_text() {
    let svc = twitter();
    svc.set_fail_updates(true);
    let h = start(vec![svc.clone()]).await;
    eventually(&h.panel, "initial cards", |s| card_ids(s).len() == 2).await;

    h.panel.act(UserAction::Compose("draft".into())).await.unwrap();
    h.panel.act(UserAction::Submit).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let snapshot = h.panel.snapshot().await.unwrap();
    let pane = snapshot.pane.unwrap();
    assert_eq!(pane.composer_text, "draft");
    assert_eq!(pane.cards.len(), 2);
}

#[tokio::test]
async fn reply_and_retweet_fill_the_composer() {
    let h = start(vec![twitter()]).await;
    eventually(&h.panel, "initial cards", |s| card_ids(s).len() == 2).await;

    h.panel.act(UserAction::Reply { card: 1 }).await.unwrap();
    let snapshot = h.panel.snapshot().await.unwrap();
    let pane = snapshot.pane.unwrap();
    assert_eq!(pane.composer_text, "@alice ");
    assert!(pane.composer_focused);

    h.panel.act(UserAction::Retweet { card: 0 }).await.unwrap();
    let snapshot = h.panel.snapshot().await.unwrap();
    assert_eq!(snapshot.pane.unwrap().composer_text, "RT @bob: second");
}

#[tokio::test]
async fn geotagged_updates_carry_coordinates() {
    let svc = Arc::new(
        MemoryService::new("twitter")
            .with_static_caps(caps(&[CAN_UPDATE_STATUS]))
            .with_dynamic_caps(caps(&[CAN_UPDATE_STATUS, CAN_UPDATE_STATUS_WITH_GEOTAG])),
    );
    let h = start(vec![svc.clone()]).await;
    eventually(&h.panel, "location row", |s| {
        s.pane.as_ref().is_some_and(|p| p.location_row_visible)
    })
    .await;

    h.panel.act(UserAction::ShowLocationPicker).await.unwrap();
    h.panel
        .act(UserAction::ChooseLocation(LocationChoice {
            enabled: true,
            guess_location: false,
            latitude: 1.5,
            longitude: -2.25,
        }))
        .await
        .unwrap();
    let snapshot = h.panel.snapshot().await.unwrap();
    let pane = snapshot.pane.unwrap();
    assert!(!pane.showing_geotag);
    assert_eq!(
        pane.location_label,
        "Your location is currently shared as: 1.500000 -2.250000"
    );

    h.panel.act(UserAction::Compose("here".into())).await.unwrap();
    h.panel.act(UserAction::Submit).await.unwrap();
    eventually(&h.panel, "posted status", |s| card_ids(s).len() == 1).await;

    let posted = &svc.items()[0];
    assert_eq!(posted.get(fields::LATITUDE), Some("1.500000"));
    assert_eq!(posted.get(fields::LONGITUDE), Some("-2.250000"));
}

#[tokio::test]
async fn losing_the_capability_detaches_and_regaining_reattaches() {
    let svc = twitter();
    let h = start(vec![svc.clone()]).await;
    eventually(&h.panel, "initial cards", |s| card_ids(s).len() == 2).await;

    svc.set_dynamic_caps(caps(&[]));
    let snapshot = eventually(&h.panel, "placeholder", |s| s.buttons.is_empty()).await;
    assert_eq!(snapshot.page, 0);
    assert_eq!(snapshot.placeholder, Some(PLACEHOLDER_TEXT));

    svc.set_dynamic_caps(caps(&[CAN_UPDATE_STATUS]));
    let snapshot = eventually(&h.panel, "reattached", |s| s.active_service().is_some()).await;
    assert_eq!(snapshot.page, 1);
    // the cached pane keeps its cards and its single view subscription
    assert_eq!(card_ids(&snapshot), vec!["t2", "t1"]);
    assert_eq!(svc.open_views(), 1);
}

#[tokio::test]
async fn offline_pane_refetches_and_keeps_one_visible_control() {
    let svc = twitter();
    let h = start(vec![svc.clone()]).await;
    eventually(&h.panel, "initial cards", |s| card_ids(s).len() == 2).await;
    assert_eq!(h.monitor.listener_count(), 1);

    h.monitor.set_online(false);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let pane = h.panel.snapshot().await.unwrap().pane.unwrap();
    assert!(pane.composer_visible ^ pane.fallback_visible);
}

#[tokio::test]
async fn retiring_and_stopping_release_everything() {
    let svc = twitter();
    let other = Arc::new(
        MemoryService::new("identica")
            .with_static_caps(caps(&[CAN_UPDATE_STATUS]))
            .with_dynamic_caps(caps(&[CAN_UPDATE_STATUS])),
    );
    let h = start(vec![svc.clone(), other.clone()]).await;
    eventually(&h.panel, "two buttons", |s| s.buttons.len() == 2).await;
    eventually(&h.panel, "views open", |_| {
        svc.open_views() == 1 && other.open_views() == 1
    })
    .await;
    assert_eq!(h.monitor.listener_count(), 2);

    h.panel
        .act(UserAction::Retire("twitter".into()))
        .await
        .unwrap();
    let snapshot = h.panel.snapshot().await.unwrap();
    let names: Vec<&str> = snapshot.buttons.iter().map(|b| b.service.as_str()).collect();
    assert_eq!(names, vec!["identica"]);
    assert_eq!(svc.open_views(), 0);
    assert_eq!(h.monitor.listener_count(), 1);

    h.panel.stop().await.unwrap();
    h.task.await.unwrap().unwrap();
    assert_eq!(other.open_views(), 0);
    assert_eq!(h.monitor.listener_count(), 0);
}

#[tokio::test]
async fn item_removed_while_loading_stays_removed() {
    let view = ScriptedView::new(vec![tweet("x", "Xavier", "gone")], true);
    let h = start_with(Arc::new(ScriptedClient(ScriptedService::new(view)))).await;
    eventually(&h.panel, "scripted pane", |s| {
        s.active_service() == Some("scripted") && s.pane.is_some()
    })
    .await;

    tokio::time::sleep(Duration::from_millis(120)).await;
    let snapshot = h.panel.snapshot().await.unwrap();
    assert!(card_ids(&snapshot).is_empty());
}

#[tokio::test]
async fn connectivity_change_survives_a_full_mailbox() {
    let view = ScriptedView::new(vec![tweet("x", "Xavier", "here")], false);
    let svc = ScriptedService::new(view);
    let h = start_with(Arc::new(ScriptedClient(svc.clone()))).await;
    eventually(&h.panel, "scripted cards", |s| card_ids(s) == vec!["x"]).await;

    // the next fetch sees no capabilities, but nothing announces it
    *svc.caps.lock().unwrap() = CapabilitySet::default();
    while h
        .panel
        .addr()
        .try_send(PanelMsg::Inspect(oneshot::channel().0))
        .is_ok()
    {}
    h.monitor.set_online(false);

    let snapshot = eventually(&h.panel, "offline fallback", |s| {
        s.pane.as_ref().is_some_and(|p| p.fallback_visible)
    })
    .await;
    let pane = snapshot.pane.unwrap();
    assert_eq!(pane.fallback_text, Some(NOT_ONLINE_TEXT));
    assert!(!pane.composer_visible);
}
