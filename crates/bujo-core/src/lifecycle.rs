//! Application lifecycle signals (visibility, focus, connectivity, unload).
//!
//! The host shell emits these; the snapshot and sync managers listen.

use crate::subscribers::{Subscribers, Subscription};

/// Foreground state of the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Signal emitted by the host shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    VisibilityChanged(Visibility),
    Focus,
    Online,
    Unload,
}

/// Broadcast hub for lifecycle signals.
#[derive(Default)]
pub struct Lifecycle {
    listeners: Subscribers<LifecycleEvent>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        callback: impl Fn(&LifecycleEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.listeners.subscribe(callback)
    }

    pub fn emit(&self, event: LifecycleEvent) {
        tracing::debug!(?event, "Lifecycle signal");
        self.listeners.notify(&event);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn delivers_signals_in_order() {
        let lifecycle = Lifecycle::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = lifecycle.subscribe(move |event| sink.lock().push(*event));

        lifecycle.emit(LifecycleEvent::VisibilityChanged(Visibility::Hidden));
        lifecycle.emit(LifecycleEvent::Unload);

        assert_eq!(
            *seen.lock(),
            vec![
                LifecycleEvent::VisibilityChanged(Visibility::Hidden),
                LifecycleEvent::Unload
            ]
        );
    }
}
