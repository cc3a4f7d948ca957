//! Shared types and utilities for the status panel crates.
//!
//! This crate holds the error type used at wiring boundaries and the tracing
//! initialiser. It stays dependency-light so every crate in the workspace can
//! depend on it.
//!
//! # Overview
//!
//! - [`PanelError`] and [`Result`]: errors raised while wiring actors, loading
//!   configuration or driving the terminal
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use mps_common::PanelError;
//!
//! let err = PanelError::MailboxClosed("panel");
//! assert_eq!(err.to_string(), "Mailbox closed: panel");
//! ```

pub mod observability;

/// Error types used across the panel workspace.
#[derive(thiserror::Error, Debug)]
pub enum PanelError {
    /// An actor mailbox was dropped before a message could be delivered.
    #[error("Mailbox closed: {0}")]
    MailboxClosed(&'static str),

    /// A reply channel was dropped before the answer arrived.
    #[error("Reply dropped: {0}")]
    ReplyDropped(&'static str),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The terminal backend reported an error.
    #[error("Terminal error: {0}")]
    Terminal(#[from] std::io::Error),

    /// Anything else bubbling up from lower layers.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`PanelError`].
pub type Result<T> = std::result::Result<T, PanelError>;
