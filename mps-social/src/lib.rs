//! Social-web collaborator contracts consumed by the status panel.
//!
//! - [`item`]: feed items and their field accessors
//! - [`caps`]: capability sets and the capability evaluator
//! - [`service`]: async traits for services, views and the client
//! - [`online`]: process-wide connectivity notifications
//! - [`memory`]: an in-process backend implementing the traits
pub mod caps;
pub mod item;
pub mod memory;
pub mod online;
pub mod service;

pub use caps::{classify, has_capability, CapabilitySet, CapabilityState};
pub use item::{Item, ItemId};
pub use service::{
    ItemView, ServiceError, ServiceSignal, SocialClient, SocialService, StatusFields, ViewEvent,
    ViewParams,
};
