//! Read-only view of the panel, as handed to renderers and tests.
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardSnapshot {
    pub id: String,
    pub avatar: String,
    pub markup: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaneSnapshot {
    pub service: String,
    pub composer_visible: bool,
    pub composer_text: String,
    pub composer_focused: bool,
    pub composer_hint: &'static str,
    pub fallback_visible: bool,
    pub fallback_text: Option<&'static str>,
    pub location_row_visible: bool,
    pub location_label: String,
    pub showing_geotag: bool,
    pub feed_error: Option<String>,
    pub cards: Vec<CardSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonSnapshot {
    pub service: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelSnapshot {
    /// Attached service buttons in box order; the add-service button is implied last.
    pub buttons: Vec<ButtonSnapshot>,
    pub add_service_label: &'static str,
    /// Notebook page on display; 0 is the placeholder.
    pub page: usize,
    /// Set when the placeholder page is showing.
    pub placeholder: Option<&'static str>,
    /// The pane on display, if any.
    pub pane: Option<PaneSnapshot>,
}

impl PanelSnapshot {
    pub fn active_service(&self) -> Option<&str> {
        self.buttons
            .iter()
            .find(|b| b.active)
            .map(|b| b.service.as_str())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
