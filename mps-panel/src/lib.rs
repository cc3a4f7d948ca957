//! Feed panel: live card lists, the status composer and the service switcher.
//!
//! The crate is split into a synchronous core and one actor:
//!
//! - [`container`]: ordered child lists a toolkit backend can stand in for
//! - [`card`]: tweet cards built from feed items
//! - [`bridge`]: the view bridge keeping cards in step with a live view
//! - [`geotag`]: location sharing state and its label texts
//! - [`pane`]: one service's feed pane and the commands it issues
//! - [`switcher`]: per-service buttons and the pane notebook
//! - [`actor`]: [`PanelActor`], which runs the commands and routes completions
//! - [`snapshot`]: serialisable state for renderers and tests
pub mod actor;
pub mod bridge;
pub mod card;
pub mod container;
pub mod geotag;
pub mod pane;
pub mod slots;
pub mod snapshot;
pub mod switcher;

pub use actor::{PanelActor, PanelHandle, PanelMsg, UserAction};
pub use pane::{FeedPane, PaneSettings};
pub use snapshot::{PanelSnapshot, PaneSnapshot};
pub use switcher::{FeedSwitcher, PaneId};
