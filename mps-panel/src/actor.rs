//! The panel's single logical UI thread.
//!
//! `PanelActor` owns the switcher and every pane. Service calls run on spawned
//! tasks and report back as [`PanelMsg`] completions; pane ids and binding
//! generations carried by those completions make late arrivals harmless.
use crate::bridge::BindingGeneration;
use crate::geotag::LocationChoice;
use crate::pane::{PaneCommand, PaneSettings};
use crate::snapshot::PanelSnapshot;
use crate::switcher::{Command, FeedSwitcher, PaneId};
use anyhow::Result;
use mps_actors::actor::{Actor, Addr, Context};
use mps_common::PanelError;
use mps_social::online::{NotifyToken, OnlineMonitor};
use mps_social::{
    CapabilitySet, Item, ItemView, ServiceError, ServiceSignal, SocialClient, SocialService,
    ViewEvent, ViewParams,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast::error::RecvError, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type CapsResult = Result<CapabilitySet, ServiceError>;

/// Input from the user, always applied to the active pane.
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    Select(Option<String>),
    Compose(String),
    Submit,
    Reply { card: usize },
    Retweet { card: usize },
    ShowLocationPicker,
    ChooseLocation(LocationChoice),
    ReverseLocation(Option<String>),
    Retire(String),
}

pub enum PanelMsg {
    /// Ask the client for its services.
    Start,
    ServicesListed(Result<Vec<Arc<dyn SocialService>>, ServiceError>),
    StaticCaps {
        service: String,
        result: CapsResult,
    },
    DynamicCaps {
        service: String,
        result: CapsResult,
    },
    PaneCaps {
        pane: PaneId,
        result: CapsResult,
    },
    ViewOpened {
        pane: PaneId,
        result: Result<Arc<dyn ItemView>, ServiceError>,
    },
    Snapshot {
        pane: PaneId,
        generation: BindingGeneration,
        result: Result<Vec<Arc<Item>>, ServiceError>,
    },
    View {
        pane: PaneId,
        generation: BindingGeneration,
        event: ViewEvent,
    },
    StatusSent {
        pane: PaneId,
        result: Result<(), ServiceError>,
    },
    Signal {
        service: String,
        signal: ServiceSignal,
    },
    /// Connectivity changed; the pane rereads the monitor when this is handled.
    Online {
        pane: PaneId,
    },
    User(UserAction),
    Inspect(oneshot::Sender<PanelSnapshot>),
    Stop,
}

/// Resources held on a pane's behalf outside the pane itself.
#[derive(Default)]
struct PaneLinks {
    notify: Option<NotifyToken>,
    forwarder: Option<JoinHandle<()>>,
}

pub struct PanelActor {
    client: Arc<dyn SocialClient>,
    monitor: Arc<OnlineMonitor>,
    switcher: FeedSwitcher,
    services: HashMap<String, Arc<dyn SocialService>>,
    signal_tasks: HashMap<String, JoinHandle<()>>,
    links: HashMap<PaneId, PaneLinks>,
}

impl PanelActor {
    pub fn new(
        client: Arc<dyn SocialClient>,
        settings: PaneSettings,
        monitor: Arc<OnlineMonitor>,
    ) -> Self {
        Self {
            client,
            switcher: FeedSwitcher::new(settings, monitor.clone()),
            monitor,
            services: HashMap::new(),
            signal_tasks: HashMap::new(),
            links: HashMap::new(),
        }
    }

    fn services_listed(&mut self, services: Vec<Arc<dyn SocialService>>, me: &Addr<Self>) {
        let mut names = Vec::with_capacity(services.len());
        for service in services {
            let name = service.name().to_string();
            if !self.signal_tasks.contains_key(&name) {
                let task = forward_signals(service.clone(), me.clone());
                self.signal_tasks.insert(name.clone(), task);
            }
            self.services.insert(name.clone(), service);
            names.push(name);
        }
        info!(count = names.len(), "panel.services.listed");
        let commands = self.switcher.services_listed(names);
        self.execute(commands, me);
    }

    fn execute(&mut self, commands: Vec<Command>, me: &Addr<Self>) {
        for command in commands {
            match command {
                Command::FetchStaticCaps { service } => {
                    let Some(svc) = self.service(&service) else { continue };
                    complete(me, async move {
                        let result = svc.static_capabilities().await;
                        PanelMsg::StaticCaps { service, result }
                    });
                }
                Command::FetchDynamicCaps { service } => {
                    let Some(svc) = self.service(&service) else { continue };
                    complete(me, async move {
                        let result = svc.dynamic_capabilities().await;
                        PanelMsg::DynamicCaps { service, result }
                    });
                }
                Command::Pane {
                    pane,
                    service,
                    command,
                } => self.execute_pane(pane, &service, command, me),
                Command::ReleasePane { pane } => self.release(pane),
            }
        }
    }

    fn execute_pane(&mut self, pane: PaneId, service: &str, command: PaneCommand, me: &Addr<Self>) {
        match command {
            PaneCommand::WatchConnectivity => {
                // The callback may fire on any thread, and a full mailbox must
                // delay the notification rather than lose it.
                let addr = me.clone();
                let runtime = tokio::runtime::Handle::current();
                let token = self.monitor.add_notify(move |online| {
                    let addr = addr.clone();
                    runtime.spawn(async move {
                        if addr.send(PanelMsg::Online { pane }).await.is_err() {
                            debug!(online, "panel.online.notify_dropped");
                        }
                    });
                });
                let links = self.links.entry(pane).or_default();
                if let Some(old) = links.notify.replace(token) {
                    self.monitor.remove_notify(old);
                }
            }
            PaneCommand::FetchDynamicCaps => {
                let Some(svc) = self.service(service) else { return };
                complete(me, async move {
                    let result = svc.dynamic_capabilities().await;
                    PanelMsg::PaneCaps { pane, result }
                });
            }
            PaneCommand::OpenView { view } => {
                let Some(svc) = self.service(service) else { return };
                complete(me, async move {
                    let result = svc.open_view(&view, &ViewParams::new()).await;
                    PanelMsg::ViewOpened { pane, result }
                });
            }
            PaneCommand::WatchView { generation, view } => {
                // Subscribe before asking for the snapshot so nothing falls in between.
                let mut events = view.events();
                let addr = me.clone();
                let forwarder = tokio::spawn(async move {
                    while let Some(event) = events.recv().await {
                        let msg = PanelMsg::View {
                            pane,
                            generation,
                            event,
                        };
                        if addr.send(msg).await.is_err() {
                            break;
                        }
                    }
                });
                let links = self.links.entry(pane).or_default();
                if let Some(old) = links.forwarder.replace(forwarder) {
                    old.abort();
                }
                complete(me, async move {
                    let result = view.snapshot().await;
                    PanelMsg::Snapshot {
                        pane,
                        generation,
                        result,
                    }
                });
            }
            PaneCommand::SendStatus { text, fields } => {
                let Some(svc) = self.service(service) else { return };
                complete(me, async move {
                    let result = svc.update_status_with_fields(&text, &fields).await;
                    PanelMsg::StatusSent { pane, result }
                });
            }
        }
    }

    fn service(&self, name: &str) -> Option<Arc<dyn SocialService>> {
        let found = self.services.get(name).cloned();
        if found.is_none() {
            warn!(service = name, "panel.service.unknown");
        }
        found
    }

    fn release(&mut self, pane: PaneId) {
        let Some(links) = self.links.remove(&pane) else {
            return;
        };
        if let Some(token) = links.notify {
            self.monitor.remove_notify(token);
        }
        if let Some(forwarder) = links.forwarder {
            forwarder.abort();
        }
        debug!(?pane, "panel.pane.released");
    }

    /// Apply `f` to a live pane and run what it asks for. Stale ids are dropped.
    fn on_pane<F>(&mut self, pane: PaneId, me: &Addr<Self>, f: F)
    where
        F: FnOnce(&mut crate::pane::FeedPane) -> Vec<PaneCommand>,
    {
        match self.switcher.with_pane(pane, f) {
            Some(commands) => self.execute(commands, me),
            None => debug!(?pane, "panel.pane.stale_completion"),
        }
    }

    fn user_action(&mut self, action: UserAction, me: &Addr<Self>) {
        debug!(?action, "panel.user.action");
        match action {
            UserAction::Select(service) => self.switcher.activate(service.as_deref()),
            UserAction::Retire(service) => {
                let commands = self.switcher.retire_service(&service);
                self.execute(commands, me);
            }
            action => {
                let Some(pane) = self.switcher.active_pane() else {
                    debug!("panel.user.no_active_pane");
                    return;
                };
                self.on_pane(pane, me, move |p| match action {
                    UserAction::Compose(text) => {
                        p.set_composer_text(text);
                        Vec::new()
                    }
                    UserAction::Submit => p.submit(),
                    UserAction::Reply { card } => {
                        p.click_reply(card);
                        Vec::new()
                    }
                    UserAction::Retweet { card } => {
                        p.click_retweet(card);
                        Vec::new()
                    }
                    UserAction::ShowLocationPicker => {
                        p.show_location_picker();
                        Vec::new()
                    }
                    UserAction::ChooseLocation(choice) => {
                        p.choose_location(choice);
                        Vec::new()
                    }
                    UserAction::ReverseLocation(name) => {
                        p.set_reverse_location(name);
                        Vec::new()
                    }
                    UserAction::Select(_) | UserAction::Retire(_) => Vec::new(),
                });
            }
        }
    }
}

#[async_trait::async_trait]
impl Actor for PanelActor {
    type Msg = PanelMsg;

    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
        let me = ctx.addr();
        match msg {
            PanelMsg::Start => {
                let client = self.client.clone();
                complete(&me, async move { PanelMsg::ServicesListed(client.services().await) });
            }
            PanelMsg::ServicesListed(Ok(services)) => self.services_listed(services, &me),
            PanelMsg::ServicesListed(Err(error)) => {
                warn!(%error, "panel.services.list_failed");
            }
            PanelMsg::StaticCaps { service, result } => {
                let commands = self.switcher.static_caps_result(&service, result);
                self.execute(commands, &me);
            }
            PanelMsg::DynamicCaps { service, result } => {
                let commands = self.switcher.dynamic_caps_result(&service, result);
                self.execute(commands, &me);
            }
            PanelMsg::PaneCaps { pane, result } => self.on_pane(pane, &me, |p| {
                p.dynamic_caps_result(result);
                Vec::new()
            }),
            PanelMsg::ViewOpened { pane, result } => {
                if self.switcher.pane(pane).is_none() {
                    debug!(?pane, "panel.view.opened_for_stale_pane");
                    if let Ok(view) = result {
                        view.close();
                    }
                    return Ok(());
                }
                self.on_pane(pane, &me, |p| p.view_opened(result));
            }
            PanelMsg::Snapshot {
                pane,
                generation,
                result,
            } => self.on_pane(pane, &me, |p| {
                p.snapshot_loaded(generation, result);
                Vec::new()
            }),
            PanelMsg::View {
                pane,
                generation,
                event,
            } => self.on_pane(pane, &me, |p| {
                p.view_event(generation, event);
                Vec::new()
            }),
            PanelMsg::StatusSent { pane, result } => self.on_pane(pane, &me, |p| {
                p.status_sent(result);
                Vec::new()
            }),
            PanelMsg::Signal { service, signal } => {
                debug!(service, ?signal, "panel.service.signal");
                let commands = self.switcher.handle_signal(&service, &signal);
                self.execute(commands, &me);
            }
            PanelMsg::Online { pane } => {
                let online = self.monitor.is_online();
                self.on_pane(pane, &me, |p| p.set_online(online));
            }
            PanelMsg::User(action) => self.user_action(action, &me),
            PanelMsg::Inspect(reply) => {
                if reply.send(self.switcher.snapshot()).is_err() {
                    debug!("panel.inspect.reply_dropped");
                }
            }
            PanelMsg::Stop => ctx.stop(),
        }
        Ok(())
    }

    async fn stopped(&mut self) {
        for command in self.switcher.dispose() {
            if let Command::ReleasePane { pane } = command {
                self.release(pane);
            }
        }
        for (_, task) in self.signal_tasks.drain() {
            task.abort();
        }
        info!("panel.stopped");
    }
}

/// Run `fut` on its own task and post its result back to the panel.
fn complete<F>(me: &Addr<PanelActor>, fut: F)
where
    F: Future<Output = PanelMsg> + Send + 'static,
{
    let me = me.clone();
    tokio::spawn(async move {
        let msg = fut.await;
        if me.send(msg).await.is_err() {
            debug!("panel.completion.dropped");
        }
    });
}

fn forward_signals(service: Arc<dyn SocialService>, me: Addr<PanelActor>) -> JoinHandle<()> {
    let mut signals = service.subscribe();
    let name = service.name().to_string();
    tokio::spawn(async move {
        loop {
            match signals.recv().await {
                Ok(signal) => {
                    let msg = PanelMsg::Signal {
                        service: name.clone(),
                        signal,
                    };
                    if me.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(service = %name, skipped, "panel.service.signals_lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Cloneable front door to a running [`PanelActor`].
#[derive(Clone)]
pub struct PanelHandle {
    addr: Addr<PanelActor>,
}

impl PanelHandle {
    pub fn new(addr: Addr<PanelActor>) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> &Addr<PanelActor> {
        &self.addr
    }

    pub async fn start(&self) -> mps_common::Result<()> {
        self.send(PanelMsg::Start).await
    }

    pub async fn act(&self, action: UserAction) -> mps_common::Result<()> {
        self.send(PanelMsg::User(action)).await
    }

    pub async fn snapshot(&self) -> mps_common::Result<PanelSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(PanelMsg::Inspect(tx)).await?;
        rx.await.map_err(|_| PanelError::ReplyDropped("panel"))
    }

    pub async fn stop(&self) -> mps_common::Result<()> {
        self.send(PanelMsg::Stop).await
    }

    async fn send(&self, msg: PanelMsg) -> mps_common::Result<()> {
        self.addr
            .send(msg)
            .await
            .map_err(|_| PanelError::MailboxClosed("panel"))
    }
}
