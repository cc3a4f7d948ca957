//! Per-service buttons over a notebook of feed panes.
//!
//! Each configured service walks through
//! `Unknown -> StaticChecked -> {Ineligible | Active}`. Only services whose
//! static capabilities include `can-update-status` are monitored afterwards;
//! their dynamic capabilities decide, as often as they change, whether the
//! service's button and pane are attached. Panes and buttons are created once
//! per service and cached while detached.
use crate::container::{ChildList, HostContainer};
use crate::pane::{FeedPane, PaneCommand, PaneSettings};
use crate::slots::{SlotId, Slots};
use crate::snapshot::{ButtonSnapshot, PanelSnapshot};
use mps_social::caps::CAN_UPDATE_STATUS;
use mps_social::online::OnlineMonitor;
use mps_social::{has_capability, CapabilitySet, ServiceError, ServiceSignal};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub type PaneId = SlotId;

pub const PLACEHOLDER_TEXT: &str = "You don't appear to have any web services configured. \
     Or there is a problem with their configuration.";
pub const ADD_SERVICE_LABEL: &str = "Add new web service";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceState {
    Unknown,
    StaticChecked,
    Ineligible,
    Active,
}

#[derive(Debug)]
struct ServiceEntry {
    state: ServiceState,
    monitored: bool,
    pane: Option<PaneId>,
}

impl ServiceEntry {
    fn new() -> Self {
        Self {
            state: ServiceState::Unknown,
            monitored: false,
            pane: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BoxEntry {
    AddService,
    Service(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Placeholder,
    Pane(PaneId),
}

/// Work the switcher needs done outside of itself.
#[derive(Debug)]
pub enum Command {
    FetchStaticCaps {
        service: String,
    },
    FetchDynamicCaps {
        service: String,
    },
    Pane {
        pane: PaneId,
        service: String,
        command: PaneCommand,
    },
    /// The pane is gone: drop its connectivity watch and event forwarder.
    ReleasePane {
        pane: PaneId,
    },
}

pub struct FeedSwitcher {
    settings: PaneSettings,
    monitor: Arc<OnlineMonitor>,
    services: BTreeMap<String, ServiceEntry>,
    panes: Slots<FeedPane>,
    button_box: ChildList<BoxEntry>,
    notebook: ChildList<Page>,
    active: Option<String>,
}

impl FeedSwitcher {
    pub fn new(settings: PaneSettings, monitor: Arc<OnlineMonitor>) -> Self {
        let mut button_box = ChildList::new();
        button_box.insert_child(0, BoxEntry::AddService);
        let mut notebook = ChildList::new();
        notebook.insert_child(0, Page::Placeholder);
        Self {
            settings,
            monitor,
            services: BTreeMap::new(),
            panes: Slots::new(),
            button_box,
            notebook,
            active: None,
        }
    }

    /// Register the client's services and ask each for its static capabilities.
    pub fn services_listed<I, S>(&mut self, names: I) -> Vec<Command>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut commands = Vec::new();
        for name in names {
            let name = name.into();
            debug!(service = %name, "panel.switcher.service_listed");
            self.services.entry(name.clone()).or_insert_with(ServiceEntry::new);
            commands.push(Command::FetchStaticCaps { service: name });
        }
        commands
    }

    pub fn static_caps_result(
        &mut self,
        service: &str,
        result: Result<CapabilitySet, ServiceError>,
    ) -> Vec<Command> {
        let Some(entry) = self.services.get_mut(service) else {
            debug!(service, "panel.switcher.stale_static_caps");
            return Vec::new();
        };
        let caps = result
            .inspect_err(|error| warn!(service, %error, "panel.switcher.static_caps_failed"))
            .ok();
        if has_capability(caps.as_ref(), CAN_UPDATE_STATUS) {
            entry.state = ServiceState::StaticChecked;
            entry.monitored = true;
            vec![Command::FetchDynamicCaps {
                service: service.to_string(),
            }]
        } else {
            debug!(service, "panel.switcher.ineligible");
            entry.state = ServiceState::Ineligible;
            entry.monitored = false;
            Vec::new()
        }
    }

    pub fn dynamic_caps_result(
        &mut self,
        service: &str,
        result: Result<CapabilitySet, ServiceError>,
    ) -> Vec<Command> {
        let caps = result
            .inspect_err(|error| warn!(service, %error, "panel.switcher.dynamic_caps_failed"))
            .ok();
        self.capabilities_changed(service, caps.as_ref())
    }

    /// Dynamic capabilities arrived or changed for a monitored service.
    pub fn capabilities_changed(
        &mut self,
        service: &str,
        caps: Option<&CapabilitySet>,
    ) -> Vec<Command> {
        if !self.services.get(service).is_some_and(|e| e.monitored) {
            debug!(service, "panel.switcher.unmonitored_caps");
            return Vec::new();
        }
        if has_capability(caps, CAN_UPDATE_STATUS) {
            self.ensure_service(service)
        } else {
            if let Some(entry) = self.services.get_mut(service) {
                entry.state = ServiceState::Ineligible;
            }
            self.remove_service(service);
            Vec::new()
        }
    }

    /// Attach the service's pane and button, creating them on first use.
    pub fn ensure_service(&mut self, service: &str) -> Vec<Command> {
        let mut commands = Vec::new();
        let entry = self
            .services
            .entry(service.to_string())
            .or_insert_with(ServiceEntry::new);
        entry.state = ServiceState::Active;

        let pane = match entry.pane.filter(|id| self.panes.contains(*id)) {
            Some(id) => id,
            None => {
                let (pane, startup) =
                    FeedPane::new(service, self.monitor.is_online(), &self.settings);
                let id = self.panes.insert(pane);
                entry.pane = Some(id);
                info!(service, "panel.switcher.pane_created");
                commands.extend(startup.into_iter().map(|command| Command::Pane {
                    pane: id,
                    service: service.to_string(),
                    command,
                }));
                id
            }
        };

        if self.notebook.position(|p| *p == Page::Pane(pane)).is_none() {
            let end = self.notebook.len();
            self.notebook.insert_child(end, Page::Pane(pane));
        }

        let button = BoxEntry::Service(service.to_string());
        if self.button_box.position(|b| *b == button).is_none() {
            let end = self.button_box.len();
            self.button_box.insert_child(end, button);
            if let Some(add) = self.button_box.position(|b| *b == BoxEntry::AddService) {
                self.button_box.raise_child(add);
            }
        }

        if self.active.is_none() {
            self.activate(Some(service));
        }
        commands
    }

    /// Detach the service's button and pane. Both stay cached for re-entry.
    pub fn remove_service(&mut self, service: &str) {
        let Some(entry) = self.services.get_mut(service) else {
            return;
        };
        if entry.state == ServiceState::Active {
            entry.state = ServiceState::Ineligible;
        }
        debug!(service, "panel.switcher.remove_service");

        let button = BoxEntry::Service(service.to_string());
        if let Some(index) = self.button_box.position(|b| *b == button) {
            self.button_box.remove_child(index);
        }
        if self.active.as_deref() == Some(service) {
            self.active = None;
        }
        if let Some(pane) = entry.pane {
            if let Some(index) = self.notebook.position(|p| *p == Page::Pane(pane)) {
                self.notebook.remove_child(index);
            }
        }
    }

    /// Select a service's button, or none. Only attached buttons can be active.
    pub fn activate(&mut self, service: Option<&str>) {
        match service {
            None => self.active = None,
            Some(name) if self.is_attached(name) => self.active = Some(name.to_string()),
            Some(name) => warn!(service = name, "panel.switcher.activate_detached"),
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_pane(&self) -> Option<PaneId> {
        let name = self.active.as_deref()?;
        self.services.get(name)?.pane
    }

    /// Notebook page on display: the active pane's index, or the placeholder.
    pub fn current_page(&self) -> usize {
        self.active_pane()
            .and_then(|pane| self.notebook.position(|p| *p == Page::Pane(pane)))
            .unwrap_or(0)
    }

    pub fn is_attached(&self, service: &str) -> bool {
        let button = BoxEntry::Service(service.to_string());
        self.button_box.position(|b| *b == button).is_some()
    }

    pub fn state(&self, service: &str) -> Option<ServiceState> {
        self.services.get(service).map(|e| e.state)
    }

    pub fn is_monitored(&self, service: &str) -> bool {
        self.services.get(service).is_some_and(|e| e.monitored)
    }

    /// Attached service buttons in display order.
    pub fn buttons(&self) -> Vec<&str> {
        self.button_box
            .iter()
            .filter_map(|b| match b {
                BoxEntry::Service(name) => Some(name.as_str()),
                BoxEntry::AddService => None,
            })
            .collect()
    }

    pub fn add_service_is_last(&self) -> bool {
        self.button_box
            .child(self.button_box.len().saturating_sub(1))
            .is_some_and(|b| *b == BoxEntry::AddService)
    }

    pub fn pane_for(&self, service: &str) -> Option<PaneId> {
        self.services
            .get(service)?
            .pane
            .filter(|id| self.panes.contains(*id))
    }

    pub fn pane(&self, id: PaneId) -> Option<&FeedPane> {
        self.panes.get(id)
    }

    pub fn pane_mut(&mut self, id: PaneId) -> Option<&mut FeedPane> {
        self.panes.get_mut(id)
    }

    /// Run `f` against a live pane and wrap whatever it asks for.
    ///
    /// Returns `None` when the id is stale, i.e. the pane was retired.
    pub fn with_pane<F>(&mut self, id: PaneId, f: F) -> Option<Vec<Command>>
    where
        F: FnOnce(&mut FeedPane) -> Vec<PaneCommand>,
    {
        let pane = self.panes.get_mut(id)?;
        let service = pane.service().to_string();
        Some(
            f(pane)
                .into_iter()
                .map(|command| Command::Pane {
                    pane: id,
                    service: service.clone(),
                    command,
                })
                .collect(),
        )
    }

    /// Fan a service signal out to the switcher and the service's pane.
    pub fn handle_signal(&mut self, service: &str, signal: &ServiceSignal) -> Vec<Command> {
        let mut commands = Vec::new();
        if let ServiceSignal::CapabilitiesChanged(caps) = signal {
            commands.extend(self.capabilities_changed(service, Some(caps)));
        }
        if let Some(pane) = self.pane_for(service) {
            if let Some(more) = self.with_pane(pane, |p| {
                p.handle_signal(signal);
                Vec::new()
            }) {
                commands.extend(more);
            }
        }
        commands
    }

    /// Forget a service entirely and dispose of its pane.
    pub fn retire_service(&mut self, service: &str) -> Vec<Command> {
        self.remove_service(service);
        let Some(entry) = self.services.remove(service) else {
            return Vec::new();
        };
        info!(service, "panel.switcher.retired");
        entry
            .pane
            .and_then(|id| self.panes.remove(id).map(|pane| (id, pane)))
            .map(|(id, mut pane)| {
                pane.dispose();
                vec![Command::ReleasePane { pane: id }]
            })
            .unwrap_or_default()
    }

    /// Retire every service. Used at shutdown.
    pub fn dispose(&mut self) -> Vec<Command> {
        let names: Vec<String> = self.services.keys().cloned().collect();
        names
            .iter()
            .flat_map(|name| self.retire_service(name))
            .collect()
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        let active = self.active.as_deref();
        let pane = self.active_pane().and_then(|id| self.panes.get(id));
        PanelSnapshot {
            buttons: self
                .buttons()
                .into_iter()
                .map(|service| ButtonSnapshot {
                    service: service.to_string(),
                    active: Some(service) == active,
                })
                .collect(),
            add_service_label: ADD_SERVICE_LABEL,
            page: self.current_page(),
            placeholder: pane.is_none().then_some(PLACEHOLDER_TEXT),
            pane: pane.map(FeedPane::snapshot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mps_social::caps::CAN_UPDATE_STATUS_WITH_GEOTAG;

    fn switcher() -> FeedSwitcher {
        FeedSwitcher::new(PaneSettings::default(), Arc::new(OnlineMonitor::new(true)))
    }

    fn caps(tokens: &[&str]) -> CapabilitySet {
        tokens.iter().copied().collect()
    }

    fn eligible(s: &mut FeedSwitcher, name: &str) -> Vec<Command> {
        s.services_listed([name]);
        s.static_caps_result(name, Ok(caps(&[CAN_UPDATE_STATUS])));
        s.dynamic_caps_result(name, Ok(caps(&[CAN_UPDATE_STATUS])))
    }

    #[test]
    fn static_gate_controls_monitoring() {
        let mut s = switcher();
        let commands = s.services_listed(["twitter", "flickr"]);
        assert_eq!(commands.len(), 2);
        assert_eq!(s.state("twitter"), Some(ServiceState::Unknown));

        let next = s.static_caps_result("flickr", Ok(caps(&[CAN_UPDATE_STATUS_WITH_GEOTAG])));
        assert!(next.is_empty());
        assert_eq!(s.state("flickr"), Some(ServiceState::Ineligible));
        assert!(!s.is_monitored("flickr"));

        let next = s.static_caps_result("twitter", Ok(caps(&[CAN_UPDATE_STATUS])));
        assert!(matches!(next.as_slice(), [Command::FetchDynamicCaps { service }] if service == "twitter"));
        assert!(s.is_monitored("twitter"));

        // capability changes for unmonitored services are ignored
        assert!(s.capabilities_changed("flickr", Some(&caps(&[CAN_UPDATE_STATUS]))).is_empty());
        assert!(!s.is_attached("flickr"));
    }

    #[test]
    fn static_error_is_ineligible() {
        let mut s = switcher();
        s.services_listed(["twitter"]);
        s.static_caps_result("twitter", Err(ServiceError::Transport("down".into())));
        assert_eq!(s.state("twitter"), Some(ServiceState::Ineligible));
    }

    #[test]
    fn failed_dynamic_check_is_ineligible() {
        let mut s = switcher();
        s.services_listed(["twitter", "identica"]);
        s.static_caps_result("twitter", Ok(caps(&[CAN_UPDATE_STATUS])));
        s.dynamic_caps_result("twitter", Err(ServiceError::Transport("down".into())));
        assert_eq!(s.state("twitter"), Some(ServiceState::Ineligible));
        assert!(!s.is_attached("twitter"));

        s.static_caps_result("identica", Ok(caps(&[CAN_UPDATE_STATUS])));
        s.dynamic_caps_result("identica", Ok(caps(&[])));
        assert_eq!(s.state("identica"), Some(ServiceState::Ineligible));

        // still monitored, so a later change can bring it back
        s.capabilities_changed("twitter", Some(&caps(&[CAN_UPDATE_STATUS])));
        assert_eq!(s.state("twitter"), Some(ServiceState::Active));
    }

    #[test]
    fn first_ensured_service_becomes_active() {
        let mut s = switcher();
        assert_eq!(s.current_page(), 0);
        assert_eq!(s.snapshot().placeholder, Some(PLACEHOLDER_TEXT));

        let commands = eligible(&mut s, "twitter");
        assert_eq!(
            commands
                .iter()
                .filter(|c| matches!(c, Command::Pane { .. }))
                .count(),
            3
        );
        eligible(&mut s, "identica");

        assert_eq!(s.active(), Some("twitter"));
        assert_eq!(s.buttons(), vec!["twitter", "identica"]);
        assert!(s.add_service_is_last());
        assert_eq!(s.current_page(), 1);

        s.activate(Some("identica"));
        assert_eq!(s.current_page(), 2);
        assert_eq!(s.snapshot().active_service(), Some("identica"));
    }

    #[test]
    fn remove_and_reensure_reuses_pane() {
        let mut s = switcher();
        eligible(&mut s, "twitter");
        let pane = s.pane_for("twitter").unwrap();

        s.capabilities_changed("twitter", Some(&caps(&[])));
        assert!(!s.is_attached("twitter"));
        assert_eq!(s.active(), None);
        assert_eq!(s.current_page(), 0);
        assert_eq!(s.pane_for("twitter"), Some(pane));

        let commands = s.capabilities_changed("twitter", Some(&caps(&[CAN_UPDATE_STATUS])));
        assert!(commands.is_empty());
        assert_eq!(s.pane_for("twitter"), Some(pane));
        assert_eq!(s.buttons(), vec!["twitter"]);
        assert_eq!(s.active(), Some("twitter"));
    }

    #[test]
    fn removing_inactive_service_keeps_selection() {
        let mut s = switcher();
        eligible(&mut s, "twitter");
        eligible(&mut s, "identica");
        s.remove_service("identica");
        assert_eq!(s.active(), Some("twitter"));
        assert_eq!(s.current_page(), 1);
    }

    #[test]
    fn activating_detached_service_is_ignored() {
        let mut s = switcher();
        s.services_listed(["twitter"]);
        s.activate(Some("twitter"));
        assert_eq!(s.active(), None);
        s.activate(None);
        assert_eq!(s.current_page(), 0);
    }

    #[test]
    fn retire_releases_pane_and_stale_ids() {
        let mut s = switcher();
        eligible(&mut s, "twitter");
        let pane = s.pane_for("twitter").unwrap();

        let commands = s.retire_service("twitter");
        assert!(matches!(commands.as_slice(), [Command::ReleasePane { pane: p }] if *p == pane));
        assert!(s.with_pane(pane, |_| Vec::new()).is_none());
        assert_eq!(s.state("twitter"), None);
        assert!(s.dispose().is_empty());
    }

    #[test]
    fn status_signal_reaches_pane() {
        let mut s = switcher();
        eligible(&mut s, "twitter");
        let pane = s.pane_for("twitter").unwrap();
        s.pane_mut(pane).unwrap().set_composer_text("draft");

        s.handle_signal("twitter", &ServiceSignal::StatusUpdated(true));
        assert_eq!(s.pane(pane).unwrap().composer_text(), "");
    }
}
