//! One service's feed: composer, fallback message, location row and cards.
//!
//! `FeedPane` never performs I/O. Every method that needs the service returns
//! [`PaneCommand`]s; the panel actor runs them and feeds the completions back
//! through the matching `*_result`/`*_loaded` methods.
use crate::bridge::{BindingGeneration, BridgeState, ViewBridge};
use crate::card::{Card, TweetCard};
use crate::container::ChildList;
use crate::geotag::{GeotagPane, LocationChoice};
use crate::snapshot::{CardSnapshot, PaneSnapshot};
use mps_social::item::fields;
use mps_social::{
    classify, CapabilitySet, Item, ItemView, ServiceError, ServiceSignal, StatusFields, ViewEvent,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const SOMETHING_WRONG_TEXT: &str =
    "Unable to update status. The service may be unavailable or your password could be wrong.";
pub const NOT_ONLINE_TEXT: &str = "Unable to update status: You're not online.";
pub const COMPOSER_HINT: &str = "What's happening?";

/// Settings shared by every pane the switcher creates.
#[derive(Debug, Clone)]
pub struct PaneSettings {
    pub feed_view: String,
    pub default_avatar: Arc<str>,
}

impl Default for PaneSettings {
    fn default() -> Self {
        Self {
            feed_view: "feed".to_string(),
            default_avatar: Arc::from("/usr/share/mps/theme/avatar_icon.png"),
        }
    }
}

/// Side effects a pane asks its owner to perform.
pub enum PaneCommand {
    WatchConnectivity,
    FetchDynamicCaps,
    OpenView {
        view: String,
    },
    /// Subscribe to the view's events, then load its snapshot.
    WatchView {
        generation: BindingGeneration,
        view: Arc<dyn ItemView>,
    },
    SendStatus {
        text: String,
        fields: StatusFields,
    },
}

impl std::fmt::Debug for PaneCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WatchConnectivity => f.write_str("WatchConnectivity"),
            Self::FetchDynamicCaps => f.write_str("FetchDynamicCaps"),
            Self::OpenView { view } => f.debug_struct("OpenView").field("view", view).finish(),
            Self::WatchView { generation, .. } => f
                .debug_struct("WatchView")
                .field("generation", generation)
                .finish_non_exhaustive(),
            Self::SendStatus { text, fields } => f
                .debug_struct("SendStatus")
                .field("text", text)
                .field("fields", fields)
                .finish(),
        }
    }
}

/// Clicks on a card's reply/retweet buttons, queued by the card factory.
#[derive(Debug, Clone)]
enum CardAction {
    Reply(Arc<Item>),
    Retweet(Arc<Item>),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Composer {
    text: String,
    focused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Visibility {
    composer: bool,
    fallback: bool,
    fallback_text: &'static str,
    location_row: bool,
}

pub struct FeedPane {
    service: String,
    feed_view: String,
    composer: Composer,
    visibility: Visibility,
    caps: Option<CapabilitySet>,
    online: bool,
    geotag: GeotagPane,
    location_label: String,
    showing_geotag: bool,
    bridge: ViewBridge<ChildList<TweetCard>>,
    actions: mpsc::UnboundedReceiver<CardAction>,
    disposed: bool,
}

impl FeedPane {
    /// Build a pane and the commands that start it: connectivity watch, dynamic
    /// capability fetch and the feed view.
    pub fn new(
        service: impl Into<String>,
        online: bool,
        settings: &PaneSettings,
    ) -> (Self, Vec<PaneCommand>) {
        let (tx, actions) = mpsc::unbounded_channel();
        let default_avatar = settings.default_avatar.clone();
        let factory = Box::new(move |item: &Arc<Item>| {
            let mut card = TweetCard::new(item.clone(), default_avatar.clone());
            let reply = tx.clone();
            card.connect_reply(move |item| {
                let _ = reply.send(CardAction::Reply(item.clone()));
            });
            let retweet = tx.clone();
            card.connect_retweet(move |item| {
                let _ = retweet.send(CardAction::Retweet(item.clone()));
            });
            card
        });

        let geotag = GeotagPane::default();
        let pane = Self {
            service: service.into(),
            feed_view: settings.feed_view.clone(),
            composer: Composer::default(),
            visibility: Visibility {
                composer: true,
                fallback: false,
                fallback_text: SOMETHING_WRONG_TEXT,
                location_row: false,
            },
            caps: None,
            online,
            location_label: geotag.location_label(),
            geotag,
            showing_geotag: false,
            bridge: ViewBridge::new(ChildList::new(), factory),
            actions,
            disposed: false,
        };
        let commands = vec![
            PaneCommand::WatchConnectivity,
            PaneCommand::FetchDynamicCaps,
            PaneCommand::OpenView {
                view: pane.feed_view.clone(),
            },
        ];
        (pane, commands)
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Recompute visibility from the last capabilities and connectivity.
    ///
    /// Idempotent; exactly one of composer and fallback ends up visible.
    pub fn apply_visibility(&mut self) {
        let state = classify(self.caps.as_ref());
        self.visibility = Visibility {
            composer: state.status_update_enabled,
            fallback: !state.status_update_enabled,
            fallback_text: if self.online {
                SOMETHING_WRONG_TEXT
            } else {
                NOT_ONLINE_TEXT
            },
            location_row: state.geotag_enabled,
        };
    }

    pub fn apply_capabilities(&mut self, caps: Option<CapabilitySet>) {
        self.caps = caps;
        self.apply_visibility();
    }

    /// A failed fetch counts as "no capabilities".
    pub fn dynamic_caps_result(&mut self, result: Result<CapabilitySet, ServiceError>) {
        match result {
            Ok(caps) => self.apply_capabilities(Some(caps)),
            Err(error) => {
                warn!(service = %self.service, %error, "panel.pane.caps_failed");
                self.apply_capabilities(None);
            }
        }
    }

    pub fn set_online(&mut self, online: bool) -> Vec<PaneCommand> {
        debug!(service = %self.service, online, "panel.pane.online_changed");
        self.online = online;
        self.apply_visibility();
        vec![PaneCommand::FetchDynamicCaps]
    }

    pub fn handle_signal(&mut self, signal: &ServiceSignal) {
        match signal {
            ServiceSignal::StatusUpdated(true) => {
                self.bridge.refresh();
                self.composer.text.clear();
            }
            ServiceSignal::StatusUpdated(false) => {
                debug!(service = %self.service, "panel.pane.status_not_updated");
            }
            ServiceSignal::CapabilitiesChanged(caps) => self.apply_capabilities(Some(caps.clone())),
        }
    }

    pub fn view_opened(
        &mut self,
        result: Result<Arc<dyn ItemView>, ServiceError>,
    ) -> Vec<PaneCommand> {
        match result {
            Ok(view) => {
                let generation = self.bridge.set_view(view.clone());
                vec![PaneCommand::WatchView { generation, view }]
            }
            Err(error) => {
                warn!(
                    service = %self.service,
                    view = %self.feed_view,
                    %error,
                    "panel.view.open_failed"
                );
                let generation = self.bridge.generation();
                self.bridge.fail(generation, error);
                Vec::new()
            }
        }
    }

    pub fn snapshot_loaded(
        &mut self,
        generation: BindingGeneration,
        result: Result<Vec<Arc<Item>>, ServiceError>,
    ) {
        match result {
            Ok(items) => self.bridge.populate(generation, items),
            Err(error) => {
                warn!(service = %self.service, %error, "panel.view.snapshot_failed");
                self.bridge.fail(generation, error);
            }
        }
    }

    pub fn view_event(&mut self, generation: BindingGeneration, event: ViewEvent) {
        self.bridge.apply(generation, event);
    }

    pub fn set_composer_text(&mut self, text: impl Into<String>) {
        self.composer.text = text.into();
    }

    pub fn composer_text(&self) -> &str {
        &self.composer.text
    }

    pub fn composer_focused(&self) -> bool {
        self.composer.focused
    }

    /// Send whatever the composer holds, empty text included.
    pub fn submit(&mut self) -> Vec<PaneCommand> {
        info!(service = %self.service, geotag = self.geotag.enabled(), "panel.status.submit");
        vec![PaneCommand::SendStatus {
            text: self.composer.text.clone(),
            fields: self.geotag.status_fields(),
        }]
    }

    /// Failures are logged only; the composer keeps its text.
    pub fn status_sent(&mut self, result: Result<(), ServiceError>) {
        if let Err(error) = result {
            warn!(service = %self.service, %error, "panel.status.update_failed");
        }
    }

    pub fn reply_to(&mut self, item: &Item) {
        self.composer.text = format!("@{} ", item.get_or_empty(fields::AUTHOR_ID));
        self.composer.focused = true;
    }

    pub fn retweet(&mut self, item: &Item) {
        self.composer.text = format!(
            "RT @{}: {}",
            item.get_or_empty(fields::AUTHOR_ID),
            item.get_or_empty(fields::CONTENT)
        );
        self.composer.focused = true;
    }

    /// Press the reply button of the card at `index`.
    pub fn click_reply(&mut self, index: usize) {
        if let Some(card) = self.bridge.card(index) {
            card.click_reply();
        }
        self.drain_card_actions();
    }

    pub fn click_retweet(&mut self, index: usize) {
        if let Some(card) = self.bridge.card(index) {
            card.click_retweet();
        }
        self.drain_card_actions();
    }

    fn drain_card_actions(&mut self) {
        while let Ok(action) = self.actions.try_recv() {
            match action {
                CardAction::Reply(item) => self.reply_to(&item),
                CardAction::Retweet(item) => self.retweet(&item),
            }
        }
    }

    /// The location row's "Change" button: swap the cards for the geotag pane.
    pub fn show_location_picker(&mut self) {
        self.showing_geotag = true;
    }

    pub fn choose_location(&mut self, choice: LocationChoice) {
        self.geotag.choose(choice);
        self.location_label = self.geotag.location_label();
        self.showing_geotag = false;
    }

    pub fn set_reverse_location(&mut self, name: Option<String>) {
        self.geotag.set_reverse_location(name);
        self.location_label = self.geotag.location_label();
    }

    pub fn location_label(&self) -> &str {
        &self.location_label
    }

    pub fn composer_visible(&self) -> bool {
        self.visibility.composer
    }

    pub fn fallback_visible(&self) -> bool {
        self.visibility.fallback
    }

    pub fn fallback_text(&self) -> &'static str {
        self.visibility.fallback_text
    }

    pub fn location_row_visible(&self) -> bool {
        self.visibility.location_row
    }

    pub fn card_count(&self) -> usize {
        self.bridge.len()
    }

    pub fn card_ids(&self) -> Vec<String> {
        self.bridge
            .cards()
            .map(|card| card.item_id().to_string())
            .collect()
    }

    pub fn feed_error(&self) -> Option<&ServiceError> {
        match self.bridge.state() {
            BridgeState::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Close the view and drop every card. Later completions are ignored.
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.bridge.close();
            self.disposed = true;
            debug!(service = %self.service, "panel.pane.disposed");
        }
    }

    pub fn snapshot(&self) -> PaneSnapshot {
        PaneSnapshot {
            service: self.service.clone(),
            composer_visible: self.visibility.composer,
            composer_text: self.composer.text.clone(),
            composer_focused: self.composer.focused,
            composer_hint: COMPOSER_HINT,
            fallback_visible: self.visibility.fallback,
            fallback_text: self.visibility.fallback.then_some(self.visibility.fallback_text),
            location_row_visible: self.visibility.location_row,
            location_label: self.location_label.clone(),
            showing_geotag: self.showing_geotag,
            feed_error: self.feed_error().map(ToString::to_string),
            cards: self
                .bridge
                .cards()
                .map(|card| CardSnapshot {
                    id: card.item_id().to_string(),
                    avatar: card.avatar().to_string(),
                    markup: card.markup().to_string(),
                })
                .collect(),
        }
    }
}
