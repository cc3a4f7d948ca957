//! Contracts the panel consumes from a social-web backend.
//!
//! Every call is asynchronous; the panel dispatches them from its actor and
//! receives the completion as a message, so implementations must never assume
//! the caller is still around when they finish.
use crate::caps::CapabilitySet;
use crate::item::{Item, ItemId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Extra fields sent along with a status update (`latitude`, `longitude`, ...).
pub type StatusFields = BTreeMap<String, String>;
/// Parameters passed when opening a view.
pub type ViewParams = BTreeMap<String, String>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("View closed")]
    Closed,
}

/// Signals a service emits outside of any request.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceSignal {
    StatusUpdated(bool),
    CapabilitiesChanged(CapabilitySet),
}

/// Incremental change reported by a live view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Added { item: Arc<Item>, position: usize },
    Updated(Arc<Item>),
    Removed(ItemId),
}

/// A live, server-maintained ordered collection of items.
#[async_trait]
pub trait ItemView: Send + Sync {
    /// Register a new event subscriber. The channel closes when the view does.
    fn events(&self) -> mpsc::UnboundedReceiver<ViewEvent>;

    /// Current full contents in display order.
    async fn snapshot(&self) -> Result<Vec<Arc<Item>>, ServiceError>;

    /// Ask the backend to recompute the view; changes arrive as events.
    fn refresh(&self);

    /// Release the subscription. Idempotent.
    fn close(&self);
}

#[async_trait]
pub trait SocialService: Send + Sync {
    /// Stable name used to key panes and buttons.
    fn name(&self) -> &str;

    async fn static_capabilities(&self) -> Result<CapabilitySet, ServiceError>;

    async fn dynamic_capabilities(&self) -> Result<CapabilitySet, ServiceError>;

    async fn open_view(
        &self,
        view: &str,
        params: &ViewParams,
    ) -> Result<Arc<dyn ItemView>, ServiceError>;

    async fn update_status_with_fields(
        &self,
        text: &str,
        fields: &StatusFields,
    ) -> Result<(), ServiceError>;

    fn subscribe(&self) -> broadcast::Receiver<ServiceSignal>;
}

/// Entry point enumerating the services a user has configured.
#[async_trait]
pub trait SocialClient: Send + Sync {
    async fn services(&self) -> Result<Vec<Arc<dyn SocialService>>, ServiceError>;
}
