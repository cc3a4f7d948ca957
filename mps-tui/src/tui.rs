use crate::{
    command::{Command, key_command, parse_location},
    view::{self, ViewSnap},
};
use anyhow::Result;
use async_trait::async_trait;
use crossterm::{
    event::{Event as CtEvent, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use mps_actors::{
    actor::{Actor, Addr, Context},
    system::ShutdownHandle,
};
use mps_panel::{PanelHandle, PanelSnapshot, UserAction, geotag::LocationChoice};
use mps_social::online::OnlineMonitor;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    io::{self, Stdout},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub enum TuiMsg {
    InputEvent(CtEvent),
    Tick,
    /// Panel state as of the outbox request numbered `seq`.
    Snapshot {
        seq: u64,
        snapshot: PanelSnapshot,
    },
    OpError(String),
    Shutdown,
}

/// Requests to the panel, delivered one at a time in the order they were made.
enum Outgoing {
    Act(UserAction),
    Inspect(u64),
}

pub struct TuiActor {
    panel: PanelHandle,
    monitor: Arc<OnlineMonitor>,
    outbox: Option<mpsc::UnboundedSender<Outgoing>>,
    seq: u64,
    /// Sequence number of the last composer edit sent to the panel.
    composed_at: u64,

    // terminal
    term: Terminal<CrosstermBackend<Stdout>>,
    tick_rate: Duration,
    last_tick: Instant,

    // ui state
    input: String,
    input_cursor: usize,
    /// Composer text as last seen in (or sent to) the panel.
    synced_composer: String,
    selected: usize,
    /// The location picker owns the input line.
    picking: bool,
    snapshot: Option<PanelSnapshot>,
    inspecting: bool,
    status: Option<String>,
    dirty: bool,

    shutdown: ShutdownHandle,
}

impl TuiActor {
    pub fn new(
        panel: PanelHandle,
        monitor: Arc<OnlineMonitor>,
        shutdown: ShutdownHandle,
    ) -> Result<Self> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut term = Terminal::new(backend)?;
        term.clear()?;

        Ok(Self {
            panel,
            monitor,
            outbox: None,
            seq: 0,
            composed_at: 0,
            term,
            tick_rate: Duration::from_millis(80),
            last_tick: Instant::now(),
            input: String::new(),
            input_cursor: 0,
            synced_composer: String::new(),
            selected: 0,
            picking: false,
            snapshot: None,
            inspecting: false,
            status: None,
            dirty: true,
            shutdown,
        })
    }

    fn cursor_left(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        self.input_cursor -= 1;
        while self.input_cursor > 0 && !self.input.is_char_boundary(self.input_cursor) {
            self.input_cursor -= 1;
        }
    }

    fn cursor_right(&mut self) {
        if self.input_cursor >= self.input.len() {
            return;
        }
        self.input_cursor += 1;
        while self.input_cursor < self.input.len()
            && !self.input.is_char_boundary(self.input_cursor)
        {
            self.input_cursor += 1;
        }
    }

    fn insert_char(&mut self, ch: char) {
        self.input.insert(self.input_cursor, ch);
        self.input_cursor += ch.len_utf8();
    }

    fn backspace(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        let mut prev = self.input_cursor.saturating_sub(1);
        while prev > 0 && !self.input.is_char_boundary(prev) {
            prev -= 1;
        }
        self.input.drain(prev..self.input_cursor);
        self.input_cursor = prev;
    }

    fn delete(&mut self) {
        if self.input_cursor >= self.input.len() {
            return;
        }
        let start = self.input_cursor;
        let mut end = start + 1;
        while end < self.input.len() && !self.input.is_char_boundary(end) {
            end += 1;
        }
        self.input.drain(start..end);
    }

    fn set_input(&mut self, text: String) {
        self.input_cursor = text.len();
        self.input = text;
        self.dirty = true;
    }

    fn picking_location(&self) -> bool {
        self.picking
    }

    /// Queue `msg` behind everything sent before it; it is numbered `self.seq`.
    fn send(&mut self, msg: Outgoing, me: &Addr<TuiActor>) {
        self.seq += 1;
        let outbox = self
            .outbox
            .get_or_insert_with(|| spawn_outbox(self.panel.clone(), me.clone()));
        if outbox.send(msg).is_err() {
            warn!("tui.outbox_closed");
        }
    }

    fn act(&mut self, action: UserAction, me: &Addr<TuiActor>) {
        self.send(Outgoing::Act(action), me);
    }

    /// Push local composer edits to the panel.
    fn sync_composer(&mut self, me: &Addr<TuiActor>) {
        if self.picking_location() || self.input == self.synced_composer {
            return;
        }
        self.synced_composer = self.input.clone();
        self.act(UserAction::Compose(self.input.clone()), me);
        self.composed_at = self.seq;
    }

    /// Adopt the panel's state; composer changes made there (reply, retweet,
    /// clearing after a post) replace the local input unless newer local edits
    /// are still queued.
    fn apply_snapshot(&mut self, seq: u64, snapshot: PanelSnapshot) {
        if let Some(pane) = &snapshot.pane {
            if seq > self.composed_at
                && !self.picking
                && pane.composer_text != self.synced_composer
            {
                self.synced_composer = pane.composer_text.clone();
                self.set_input(pane.composer_text.clone());
            }
            self.selected = self.selected.min(pane.cards.len().saturating_sub(1));
        }
        if self.snapshot.as_ref() != Some(&snapshot) {
            self.dirty = true;
        }
        self.snapshot = Some(snapshot);
    }

    fn request_snapshot(&mut self, me: &Addr<TuiActor>) {
        if self.inspecting {
            return;
        }
        self.inspecting = true;
        let seq = self.seq + 1;
        self.send(Outgoing::Inspect(seq), me);
    }

    fn cycle_service(&mut self, forward: bool, me: &Addr<TuiActor>) {
        if self.picking {
            return;
        }
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        let count = snapshot.buttons.len();
        if count == 0 {
            return;
        }
        let current = snapshot.buttons.iter().position(|b| b.active);
        let next = match (current, forward) {
            (None, _) => 0,
            (Some(i), true) => (i + 1) % count,
            (Some(i), false) => (i + count - 1) % count,
        };
        let service = snapshot.buttons[next].service.clone();
        self.selected = 0;
        self.act(UserAction::Select(Some(service)), me);
    }

    fn enter(&mut self, me: &Addr<TuiActor>) {
        if self.picking_location() {
            match parse_location(&self.input) {
                Some((latitude, longitude)) => {
                    self.act(
                        UserAction::ChooseLocation(LocationChoice {
                            enabled: true,
                            guess_location: false,
                            latitude,
                            longitude,
                        }),
                        me,
                    );
                    self.restore_composer();
                }
                None => self.status = Some(format!("Not a location: {}", self.input)),
            }
            return;
        }
        self.sync_composer(me);
        self.act(UserAction::Submit, me);
    }

    fn restore_composer(&mut self) {
        self.picking = false;
        self.status = None;
        let text = self.synced_composer.clone();
        self.set_input(text);
    }

    fn handle_command(&mut self, cmd: Command, me: &Addr<TuiActor>) -> Option<TuiMsg> {
        match cmd {
            Command::Quit => return Some(TuiMsg::Shutdown),
            Command::Enter => self.enter(me),
            Command::Cancel => {
                if self.picking_location() {
                    self.act(
                        UserAction::ChooseLocation(LocationChoice {
                            enabled: false,
                            guess_location: false,
                            latitude: 0.0,
                            longitude: 0.0,
                        }),
                        me,
                    );
                    self.restore_composer();
                } else {
                    self.status = None;
                }
            }
            Command::NextService => self.cycle_service(true, me),
            Command::PrevService => self.cycle_service(false, me),
            Command::SelectUp => self.selected = self.selected.saturating_sub(1),
            Command::SelectDown => self.selected = self.selected.saturating_add(1),
            Command::Reply => self.act(UserAction::Reply { card: self.selected }, me),
            Command::Retweet => self.act(UserAction::Retweet { card: self.selected }, me),
            Command::LocationPicker => {
                if self.snapshot.as_ref().and_then(|s| s.pane.as_ref()).is_none() {
                    return None;
                }
                self.act(UserAction::ShowLocationPicker, me);
                self.picking = true;
                self.set_input(String::new());
            }
            Command::ToggleOnline => {
                let online = !self.monitor.is_online();
                self.monitor.set_online(online);
            }
            Command::Retire => {
                let active = self
                    .snapshot
                    .as_ref()
                    .and_then(|s| s.active_service())
                    .map(str::to_string);
                if let Some(service) = active {
                    self.act(UserAction::Retire(service), me);
                }
            }
        }
        self.dirty = true;
        None
    }

    fn handle_key(&mut self, key: KeyEvent, me: &Addr<TuiActor>) -> Option<TuiMsg> {
        if let Some(cmd) = key_command(key) {
            return self.handle_command(cmd, me);
        }
        match (key.code, key.modifiers) {
            (KeyCode::Left, _) => self.cursor_left(),
            (KeyCode::Right, _) => self.cursor_right(),
            (KeyCode::Home, _) => self.input_cursor = 0,
            (KeyCode::End, _) => self.input_cursor = self.input.len(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Char(ch), m) if !m.contains(KeyModifiers::CONTROL) => self.insert_char(ch),
            _ => return None,
        }
        self.sync_composer(me);
        self.dirty = true;
        None
    }

    fn draw(&mut self) -> Result<()> {
        let snap = ViewSnap {
            panel: self.snapshot.clone(),
            input: self.input.clone(),
            input_cursor: self.input_cursor,
            selected: self.selected,
            online: self.monitor.is_online(),
            status: self.status.clone(),
        };
        view::draw(&mut self.term, &snap)
    }
}

#[async_trait]
impl Actor for TuiActor {
    type Msg = TuiMsg;

    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
        let me = ctx.addr();
        match msg {
            TuiMsg::InputEvent(ev) => {
                if let CtEvent::Key(k) = ev {
                    if let Some(next) = self.handle_key(k, &me) {
                        let _ = me.try_send(next);
                    }
                }
            }
            TuiMsg::Snapshot { seq, snapshot } => {
                self.inspecting = false;
                self.apply_snapshot(seq, snapshot);
            }
            TuiMsg::OpError(e) => {
                warn!(error = %e, "tui.op_error");
                self.inspecting = false;
                self.status = Some(format!("× Error: {e}"));
                self.dirty = true;
            }
            TuiMsg::Tick => {
                self.request_snapshot(&me);
                if self.dirty || self.last_tick.elapsed() >= self.tick_rate {
                    self.draw()?;
                    self.last_tick = Instant::now();
                    self.dirty = false;
                }
            }
            TuiMsg::Shutdown => {
                debug!("tui.shutdown");
                disable_raw_mode().ok();
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                self.shutdown.signal();
                ctx.stop();
            }
        }

        Ok(())
    }

    async fn stopped(&mut self) {
        disable_raw_mode().ok();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

fn spawn_outbox(panel: PanelHandle, tui: Addr<TuiActor>) -> mpsc::UnboundedSender<Outgoing> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let reply = match msg {
                Outgoing::Act(action) => match panel.act(action).await {
                    Ok(()) => continue,
                    Err(e) => TuiMsg::OpError(format!("panel: {e}")),
                },
                Outgoing::Inspect(seq) => match panel.snapshot().await {
                    Ok(snapshot) => TuiMsg::Snapshot { seq, snapshot },
                    Err(e) => TuiMsg::OpError(format!("panel: {e}")),
                },
            };
            if tui.send(reply).await.is_err() {
                break;
            }
        }
    });
    tx
}
