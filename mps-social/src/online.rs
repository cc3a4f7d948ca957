//! Process-wide connectivity state with callback registration.
//!
//! Callbacks are keyed by the [`NotifyToken`] returned from
//! [`OnlineMonitor::add_notify`]; removing the token is the only way to stop
//! notifications, so owners must remove theirs on teardown.
use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, OnceLock,
};

static GLOBAL: OnceLock<Arc<OnlineMonitor>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifyToken(u64);

type OnlineCallback = Arc<dyn Fn(bool) + Send + Sync>;

pub struct OnlineMonitor {
    online: AtomicBool,
    next_token: AtomicU64,
    listeners: DashMap<NotifyToken, OnlineCallback>,
}

impl Default for OnlineMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl OnlineMonitor {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            next_token: AtomicU64::new(1),
            listeners: DashMap::new(),
        }
    }

    /// The monitor shared by every pane in the process.
    pub fn global() -> Arc<OnlineMonitor> {
        GLOBAL.get_or_init(|| Arc::new(OnlineMonitor::default())).clone()
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn add_notify<F>(&self, callback: F) -> NotifyToken
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let token = NotifyToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(token, Arc::new(callback));
        token
    }

    /// Returns `false` when the token was unknown (already removed).
    pub fn remove_notify(&self, token: NotifyToken) -> bool {
        self.listeners.remove(&token).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Record a connectivity transition and notify listeners.
    ///
    /// Setting the current value again is not a transition and notifies nobody.
    ///
    /// ```
    /// use mps_social::online::OnlineMonitor;
    /// use std::sync::{Arc, Mutex};
    ///
    /// let monitor = OnlineMonitor::new(true);
    /// let seen = Arc::new(Mutex::new(Vec::new()));
    /// let sink = seen.clone();
    /// let token = monitor.add_notify(move |online| sink.lock().unwrap().push(online));
    ///
    /// assert!(monitor.set_online(false));
    /// assert!(!monitor.set_online(false));
    /// monitor.remove_notify(token);
    /// monitor.set_online(true);
    ///
    /// assert_eq!(*seen.lock().unwrap(), vec![false]);
    /// ```
    pub fn set_online(&self, online: bool) -> bool {
        if self.online.swap(online, Ordering::SeqCst) == online {
            return false;
        }
        tracing::info!(online, "online.transition");
        // Snapshot first: a callback may remove its own registration.
        let callbacks: Vec<OnlineCallback> =
            self.listeners.iter().map(|entry| entry.value().clone()).collect();
        for callback in callbacks {
            callback(online);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn removed_tokens_stop_receiving() {
        let monitor = OnlineMonitor::new(true);
        let hits = Arc::new(AtomicUsize::new(0));
        let a = {
            let hits = hits.clone();
            monitor.add_notify(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let _b = {
            let hits = hits.clone();
            monitor.add_notify(move |_| {
                hits.fetch_add(10, Ordering::SeqCst);
            })
        };

        monitor.set_online(false);
        assert_eq!(hits.load(Ordering::SeqCst), 11);

        assert!(monitor.remove_notify(a));
        assert!(!monitor.remove_notify(a));
        monitor.set_online(true);
        assert_eq!(hits.load(Ordering::SeqCst), 21);
        assert_eq!(monitor.listener_count(), 1);
    }

    #[test]
    fn callback_may_unregister_itself() {
        let monitor = Arc::new(OnlineMonitor::new(true));
        let slot: Arc<OnceLock<NotifyToken>> = Arc::new(OnceLock::new());
        let token = {
            let inner = monitor.clone();
            let slot = slot.clone();
            monitor.add_notify(move |_| {
                if let Some(token) = slot.get() {
                    inner.remove_notify(*token);
                }
            })
        };
        slot.set(token).unwrap();

        monitor.set_online(false);
        assert_eq!(monitor.listener_count(), 0);
    }
}
