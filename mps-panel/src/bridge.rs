//! Keeps an ordered list of cards in step with a live item view.
//!
//! The bridge owns the card container and the view subscription. Events and
//! snapshots are tagged with the [`BindingGeneration`] current when they were
//! requested; anything carrying an older generation belongs to a view that has
//! since been replaced or closed and is dropped.
//!
//! Card order always mirrors source order. Invariants maintained here:
//! - at most one card per [`ItemId`]
//! - `added` clamps its position to the current length
//! - `updated` never repositions
//! - `removed` of an unknown id is a no-op
//! - no card is shown before the snapshot; events received while loading are
//!   held back and replayed after it
use crate::card::Card;
use crate::container::HostContainer;
use mps_social::{Item, ItemId, ItemView, ServiceError, ViewEvent};
use std::sync::Arc;
use tracing::{debug, trace};

/// Builds the card for a newly added item. Called synchronously from `added`.
pub type CardFactory<C> = Box<dyn FnMut(&Arc<Item>) -> C + Send>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingGeneration(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeState {
    Unbound,
    Loading,
    Live,
    Failed(ServiceError),
}

pub struct ViewBridge<K>
where
    K: HostContainer,
    K::Child: Card,
{
    container: K,
    factory: CardFactory<K::Child>,
    view: Option<Arc<dyn ItemView>>,
    generation: BindingGeneration,
    state: BridgeState,
    /// Events of the current binding that arrived before its snapshot.
    pending: Vec<ViewEvent>,
}

impl<K> ViewBridge<K>
where
    K: HostContainer,
    K::Child: Card,
{
    pub fn new(container: K, factory: CardFactory<K::Child>) -> Self {
        Self {
            container,
            factory,
            view: None,
            generation: BindingGeneration::default(),
            state: BridgeState::Unbound,
            pending: Vec::new(),
        }
    }

    pub fn generation(&self) -> BindingGeneration {
        self.generation
    }

    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    pub fn is_current(&self, generation: BindingGeneration) -> bool {
        generation == self.generation
    }

    /// Bind a new view: the previous one is closed and every card dropped.
    pub fn set_view(&mut self, view: Arc<dyn ItemView>) -> BindingGeneration {
        self.unbind();
        self.view = Some(view);
        self.state = BridgeState::Loading;
        debug!(generation = self.generation.0, "panel.bridge.bound");
        self.generation
    }

    /// Replay an initial snapshot as a sequence of `added` calls, then the
    /// events that arrived while it was loading.
    pub fn populate(&mut self, generation: BindingGeneration, items: Vec<Arc<Item>>) {
        if !self.is_current(generation) {
            debug!(generation = generation.0, "panel.bridge.stale_snapshot");
            return;
        }
        for (position, item) in items.into_iter().enumerate() {
            self.added(item, position);
        }
        self.state = BridgeState::Live;
        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            debug!(events = pending.len(), "panel.bridge.replay_pending");
        }
        for event in pending {
            self.dispatch(event);
        }
    }

    /// Apply one view event. Returns `false` when the event was stale.
    pub fn apply(&mut self, generation: BindingGeneration, event: ViewEvent) -> bool {
        if !self.is_current(generation) {
            trace!(generation = generation.0, "panel.bridge.stale_event");
            return false;
        }
        if self.state == BridgeState::Loading {
            self.pending.push(event);
        } else {
            self.dispatch(event);
        }
        true
    }

    fn dispatch(&mut self, event: ViewEvent) {
        match event {
            ViewEvent::Added { item, position } => self.added(item, position),
            ViewEvent::Updated(item) => self.updated(item),
            ViewEvent::Removed(id) => self.removed(&id),
        }
    }

    pub fn added(&mut self, item: Arc<Item>, position: usize) {
        if let Some(existing) = self.position_of(&item.id) {
            if let Some(card) = self.container.child_mut(existing) {
                card.set_item(item);
            }
            return;
        }
        let card = (self.factory)(&item);
        let position = position.min(self.container.len());
        self.container.insert_child(position, card);
    }

    pub fn updated(&mut self, item: Arc<Item>) {
        match self.position_of(&item.id) {
            Some(index) => {
                if let Some(card) = self.container.child_mut(index) {
                    card.set_item(item);
                }
            }
            None => {
                let end = self.container.len();
                self.added(item, end);
            }
        }
    }

    pub fn removed(&mut self, id: &ItemId) {
        match self.position_of(id) {
            Some(index) => {
                self.container.remove_child(index);
            }
            None => trace!(item = %id, "panel.bridge.remove_unknown"),
        }
    }

    /// The view or its snapshot failed: show nothing and remember why.
    pub fn fail(&mut self, generation: BindingGeneration, error: ServiceError) {
        if !self.is_current(generation) {
            return;
        }
        self.container.clear();
        self.pending.clear();
        self.state = BridgeState::Failed(error);
    }

    pub fn refresh(&self) {
        if let Some(view) = &self.view {
            view.refresh();
        }
    }

    /// Tear down the binding. In-flight snapshots and events become stale.
    pub fn close(&mut self) {
        self.unbind();
        self.state = BridgeState::Unbound;
    }

    fn unbind(&mut self) {
        if let Some(view) = self.view.take() {
            view.close();
        }
        self.container.clear();
        self.pending.clear();
        self.generation = BindingGeneration(self.generation.0 + 1);
    }

    pub fn position_of(&self, id: &ItemId) -> Option<usize> {
        (0..self.container.len())
            .find(|&i| self.container.child(i).is_some_and(|c| c.item_id() == id))
    }

    pub fn len(&self) -> usize {
        self.container.len()
    }

    pub fn is_empty(&self) -> bool {
        self.container.is_empty()
    }

    pub fn card(&self, index: usize) -> Option<&K::Child> {
        self.container.child(index)
    }

    pub fn cards(&self) -> impl Iterator<Item = &K::Child> {
        (0..self.container.len()).filter_map(|i| self.container.child(i))
    }
}

impl<K> Drop for ViewBridge<K>
where
    K: HostContainer,
    K::Child: Card,
{
    fn drop(&mut self) {
        if let Some(view) = self.view.take() {
            view.close();
        }
    }
}
