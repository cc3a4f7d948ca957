use crate::tui::{TuiActor, TuiMsg};
use mps_actors::actor::Addr;
use mps_actors::system::ShutdownHandle;
use crossterm::event::{self, Event};
use std::io;
use std::time::Duration;
use tokio::time;

const INPUT_POLL: Duration = Duration::from_millis(100);

/// Wait briefly for one terminal event so the blocking thread never outlives shutdown.
fn poll_event() -> io::Result<Option<Event>> {
    if event::poll(INPUT_POLL)? {
        event::read().map(Some)
    } else {
        Ok(None)
    }
}

/// Feed terminal input and redraw ticks into the TUI actor until shutdown.
pub fn spawn_tui_feeders(tui: Addr<TuiActor>, shutdown: ShutdownHandle) {
    let tui_in = tui.clone();
    let mut shutdown_input = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_input.recv() => break,
                ev = tokio::task::spawn_blocking(poll_event) => {
                    match ev {
                        Ok(Ok(None)) => {}
                        Ok(Ok(Some(e))) => {
                            if tui_in.send(TuiMsg::InputEvent(e)).await.is_err() {
                                break;
                            }
                        }
                        Ok(Err(e)) => {
                            let _ = tui_in.send(TuiMsg::OpError(format!("input: {e}"))).await;
                        }
                        Err(_) => break,
                    }
                }
            }
        }
    });

    let mut shutdown_tick = shutdown.subscribe();
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_millis(80));
        loop {
            tokio::select! {
                _ = shutdown_tick.recv() => break,
                _ = interval.tick() => {
                    if tui.is_closed() {
                        break;
                    }
                    let _ = tui.try_send(TuiMsg::Tick);
                }
            }
        }
    });
}
