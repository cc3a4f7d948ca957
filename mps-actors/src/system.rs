//! Task tracking and cooperative shutdown for the panel's actors.
//!
//! Actors subscribe to the broadcast channel; the `JoinSet` lets the binary await
//! every tracked task during teardown.
use crate::actor::{spawn_actor_with_shutdown, Actor, ActorHandle, Addr};
use anyhow::Result;
use tokio::{sync::broadcast, task::JoinSet};

#[derive(Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub fn signal(&self) {
        let _ = self.tx.send(());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

pub struct ActorSystem {
    joinset: JoinSet<Result<()>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorSystem {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(32);
        Self {
            joinset: JoinSet::new(),
            shutdown_tx,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Spawn an actor wired to the shared shutdown signal and track its task.
    pub fn spawn<A: Actor>(&mut self, actor: A, mailbox: usize) -> Addr<A> {
        let ActorHandle { addr, task } =
            spawn_actor_with_shutdown(actor, mailbox, Some(self.shutdown_tx.subscribe()));
        self.track(async move { task.await? });
        addr
    }

    pub fn track(&mut self, fut: impl std::future::Future<Output = Result<()>> + Send + 'static) {
        self.joinset.spawn(fut);
    }

    /// Wait for CTRL-C or an internal shutdown request, then stop everything.
    pub async fn run_until_ctrl_c(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("system.ctrl_c"),
            _ = shutdown_rx.recv() => tracing::info!("system.shutdown_requested"),
        }
        self.graceful_shutdown().await
    }

    pub async fn graceful_shutdown(mut self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        while let Some(res) = self.joinset.join_next().await {
            res??;
        }
        Ok(())
    }
}
