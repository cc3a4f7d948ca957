//! Mailbox actors used to serialise all panel work onto one logical thread.
//!
//! - [`actor`]: the [`Actor`](actor::Actor) trait, addresses and spawning
//! - [`system`]: shutdown broadcast and task tracking
pub mod actor;
pub mod system;
