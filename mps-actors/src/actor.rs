use anyhow::Result;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

/// Minimal actor trait. `Self: Sized` avoids object-safety issues when using `Context<Self>`.
///
/// Messages are handled strictly one at a time, so an actor's state is only ever
/// touched from a single logical thread even on a multi-threaded runtime.
#[async_trait::async_trait]
pub trait Actor: Send + Sized + 'static {
    type Msg: Send + 'static;

    /// Handle a single message. Return `Err` to stop the actor.
    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()>;

    /// Called once after the mailbox loop exits, whatever the reason.
    async fn stopped(&mut self) {}
}

/// Runtime context for an actor instance.
pub struct Context<A: Actor> {
    addr: Addr<A>,
    stop: bool,
}

impl<A: Actor> Context<A> {
    /// A clone of this actor's `Addr`, typically moved into spawned completions.
    pub fn addr(&self) -> Addr<A> {
        self.addr.clone()
    }

    /// Request a graceful stop after processing the current message.
    ///
    /// ```
    /// # use anyhow::Result;
    /// # use async_trait::async_trait;
    /// # use mps_actors::actor::{self, Actor, Context};
    /// struct Tally(u32);
    ///
    /// #[async_trait]
    /// impl Actor for Tally {
    ///     type Msg = u32;
    ///     async fn handle(&mut self, msg: u32, ctx: &mut Context<Self>) -> Result<()> {
    ///         self.0 += msg;
    ///         if self.0 >= 3 {
    ///             ctx.stop();
    ///         }
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let rt = tokio::runtime::Runtime::new().unwrap();
    /// rt.block_on(async {
    ///     let actor::ActorHandle { addr, task } = actor::spawn_actor(Tally(0), 4);
    ///     addr.send(1).await.unwrap();
    ///     addr.send(2).await.unwrap();
    ///     task.await.unwrap().unwrap();
    /// });
    /// ```
    pub fn stop(&mut self) {
        self.stop = true;
    }
}

/// Address for sending messages to an actor.
pub struct Addr<A: Actor>(mpsc::Sender<A::Msg>);

/// Manual Clone to avoid unnecessary bounds on `A`/`A::Msg`.
impl<A: Actor> Clone for Addr<A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<A: Actor> Addr<A> {
    /// Async send; awaits backpressure. Returns the message if the receiver is dropped.
    pub async fn send(&self, msg: A::Msg) -> std::result::Result<(), A::Msg> {
        self.0.send(msg).await.map_err(|e| e.0)
    }

    /// Try to send without waiting. Returns the message if the mailbox is full or closed.
    ///
    /// Used from synchronous callbacks (connectivity notifications, for example)
    /// that cannot await.
    pub fn try_send(&self, msg: A::Msg) -> std::result::Result<(), A::Msg> {
        self.0.try_send(msg).map_err(|e| e.into_inner())
    }

    /// Whether the actor has stopped and its mailbox is gone.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// Handle to a running actor task.
pub struct ActorHandle<A: Actor> {
    pub addr: Addr<A>,
    pub task: JoinHandle<anyhow::Result<()>>,
}

/// Spawn an actor with a bounded mailbox.
///
/// Stop conditions:
/// - `handle` returns `Err`
/// - all senders are dropped
/// - `ctx.stop()` is called
pub fn spawn_actor<A: Actor>(actor: A, capacity: usize) -> ActorHandle<A> {
    spawn_actor_with_shutdown(actor, capacity, None)
}

/// Like [`spawn_actor`], additionally stopping when `shutdown` fires.
///
/// The actor keeps a clone of its own address inside its [`Context`], so an
/// actor that hands `ctx.addr()` to spawned tasks only stops through `ctx.stop()`,
/// an error, or the shutdown signal.
pub fn spawn_actor_with_shutdown<A: Actor>(
    actor: A,
    capacity: usize,
    shutdown: Option<broadcast::Receiver<()>>,
) -> ActorHandle<A> {
    let (tx, rx) = mpsc::channel::<A::Msg>(capacity);
    let addr = Addr(tx);
    let ctx = Context {
        addr: addr.clone(),
        stop: false,
    };

    let task = tokio::spawn(run_mailbox(actor, ctx, rx, shutdown));
    ActorHandle { addr, task }
}

async fn run_mailbox<A: Actor>(
    mut actor: A,
    mut ctx: Context<A>,
    mut rx: mpsc::Receiver<A::Msg>,
    shutdown: Option<broadcast::Receiver<()>>,
) -> Result<()> {
    let result = match shutdown {
        Some(mut shutdown_rx) => loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break Ok(()),
                maybe_msg = rx.recv() => match maybe_msg {
                    Some(msg) => {
                        if let Err(e) = dispatch(&mut actor, msg, &mut ctx).await {
                            break Err(e);
                        }
                        if ctx.stop {
                            break Ok(());
                        }
                    }
                    None => break Ok(()),
                },
            }
        },
        None => loop {
            let Some(msg) = rx.recv().await else {
                break Ok(());
            };
            if let Err(e) = dispatch(&mut actor, msg, &mut ctx).await {
                break Err(e);
            }
            if ctx.stop {
                break Ok(());
            }
        },
    };
    actor.stopped().await;
    result
}

async fn dispatch<A: Actor>(actor: &mut A, msg: A::Msg, ctx: &mut Context<A>) -> Result<()> {
    actor.handle(msg, ctx).await.inspect_err(|e| {
        tracing::error!(target = "mps-actors", error = ?e, "actor returned error; stopping");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    struct Recorder {
        seen: Vec<u8>,
        stopped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Actor for Recorder {
        type Msg = u8;

        async fn handle(&mut self, msg: u8, ctx: &mut Context<Self>) -> Result<()> {
            anyhow::ensure!(msg != 0, "zero is not allowed");
            self.seen.push(msg);
            if self.seen.len() == 3 {
                ctx.stop();
            }
            Ok(())
        }

        async fn stopped(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn stops_after_ctx_stop_and_runs_hook() {
        let flag = Arc::new(AtomicBool::new(false));
        let ActorHandle { addr, task } = spawn_actor(
            Recorder {
                seen: Vec::new(),
                stopped: flag.clone(),
            },
            8,
        );
        for n in 1..=3 {
            addr.send(n).await.unwrap();
        }
        task.await.unwrap().unwrap();
        assert!(flag.load(Ordering::SeqCst));
        assert!(addr.is_closed());
    }

    #[tokio::test]
    async fn handler_error_stops_actor() {
        let flag = Arc::new(AtomicBool::new(false));
        let ActorHandle { addr, task } = spawn_actor(
            Recorder {
                seen: Vec::new(),
                stopped: flag.clone(),
            },
            8,
        );
        addr.send(0).await.unwrap();
        assert!(task.await.unwrap().is_err());
        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn shutdown_signal_ends_loop() {
        let (tx, rx) = broadcast::channel(1);
        let flag = Arc::new(AtomicBool::new(false));
        let handle = spawn_actor_with_shutdown(
            Recorder {
                seen: Vec::new(),
                stopped: flag.clone(),
            },
            8,
            Some(rx),
        );
        tx.send(()).unwrap();
        handle.task.await.unwrap().unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }
}
