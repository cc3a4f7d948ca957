use anyhow::Result;
use mps_actors::system::ActorSystem;
use mps_config::{PanelConfig, PanelSettings, ServiceDetails, ServiceSpec};
use mps_panel::{PaneSettings, PanelActor, PanelHandle};
use mps_social::item::Item;
use mps_social::memory::{MemoryClient, MemoryService};
use mps_social::online::OnlineMonitor;
use mps_tui::{TuiActor, spawn_tui_feeders};
use std::sync::Arc;

const TUI_MAILBOX: usize = 256;

pub struct Tether {
    system: ActorSystem,
}

impl Tether {
    pub fn new() -> Self {
        Self {
            system: ActorSystem::new(),
        }
    }

    pub fn system_mut(&mut self) -> &mut ActorSystem {
        &mut self.system
    }

    pub async fn run(self) -> Result<()> {
        self.system.run_until_ctrl_c().await
    }

    pub async fn shutdown(self) -> Result<()> {
        self.system.graceful_shutdown().await
    }
}

pub fn pane_settings(settings: &PanelSettings) -> PaneSettings {
    PaneSettings {
        feed_view: settings.feed_view.clone(),
        default_avatar: Arc::from(settings.default_avatar.as_str()),
    }
}

fn build_service(spec: &ServiceSpec) -> MemoryService {
    match &spec.details {
        ServiceDetails::Memory { config } => {
            let items = config.items.iter().map(|item| {
                item.fields
                    .iter()
                    .fold(Item::new(item.id.as_str()), |acc, (k, v)| {
                        acc.with_field(k.as_str(), v.as_str())
                    })
            });
            let service = MemoryService::new(spec.name.as_str())
                .with_static_caps(config.static_caps.iter().cloned().collect())
                .with_dynamic_caps(config.dynamic_caps.iter().cloned().collect())
                .with_items(items);
            if config.views.is_empty() {
                service
            } else {
                service.with_views(config.views.iter().cloned())
            }
        }
    }
}

/// Enabled services, in configuration order.
pub fn build_services(cfg: &PanelConfig) -> Vec<Arc<MemoryService>> {
    cfg.services
        .iter()
        .filter(|s| s.enabled.unwrap_or(true))
        .map(|s| Arc::new(build_service(s)))
        .collect()
}

/// Spawn the panel and, when `interactive`, the terminal UI that drives it.
/// The caller sends `start` once everything is wired.
pub fn build_from_config(
    t: &mut Tether,
    cfg: &PanelConfig,
    monitor: Arc<OnlineMonitor>,
    interactive: bool,
) -> Result<PanelHandle> {
    let services = build_services(cfg);
    tracing::info!(services = services.len(), "app.services");

    let client = Arc::new(MemoryClient::new(services));
    let system = t.system_mut();
    let shutdown = system.shutdown_handle();

    let actor = PanelActor::new(client, pane_settings(&cfg.panel), monitor.clone());
    let panel = PanelHandle::new(system.spawn(actor, cfg.panel.mailbox.max(1)));

    if interactive {
        let tui = TuiActor::new(panel.clone(), monitor, shutdown.clone())?;
        let tui_addr = system.spawn(tui, TUI_MAILBOX);
        spawn_tui_feeders(tui_addr, shutdown);
    }

    Ok(panel)
}
