// Notifier state machines, one per notification category.
//
// Architecture:
// - mod.rs: the contract every notifier implements, shared context, pending-state slot
// - assembler.rs: template rendering and notification packaging
// - one file per category; each owns its pending state and decides when a
//   correlation is complete
//
// Handlers take &self. Text, variable and tick events may arrive from
// different producer threads, so counters are atomics updated with
// fetch_update and structured pending state goes through PendingSlot.

pub mod assembler;
pub mod collection;
pub mod death;
pub mod diary;
pub mod kill_count;
pub mod quest;
pub mod slayer;

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use super::client::GameClient;
use super::config::Settings;
use super::dispatch::{Dispatch, Dispatcher};
use super::model::Notification;

/// Capability shared by every notifier. Event handlers are inherent methods
/// because each notifier consumes a different subset of the feed.
pub trait Notifier: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;
    /// Global switch AND this notifier's own flag.
    fn enabled(&self) -> bool;
    /// Drop all pending correlation state. Safe to call between any two
    /// handler invocations.
    fn reset(&self);
}

/// Combine the master switch with a per-notifier flag.
pub fn is_enabled(settings: &Settings, notifier_flag: bool) -> bool {
    settings.enabled && notifier_flag
}

/// Everything a notifier needs besides its own pending state.
pub struct NotifierContext {
    settings: RwLock<Arc<Settings>>,
    client: Arc<dyn GameClient>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl NotifierContext {
    pub fn new(
        settings: Settings,
        client: Arc<dyn GameClient>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings: RwLock::new(Arc::new(settings)),
            client,
            dispatcher,
        })
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Arc<Settings> {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update_settings(&self, settings: Settings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(settings);
    }

    pub fn client(&self) -> &dyn GameClient {
        self.client.as_ref()
    }

    pub fn player_name(&self) -> String {
        self.client.player_name().unwrap_or_default()
    }

    /// Hand a finished notification to the dispatcher.
    pub fn send(&self, notification: Notification, screenshot: bool, webhook_override: &str) {
        let destination = self.settings().destination(webhook_override);
        log::debug!(
            "Dispatching {:?} notification: {}",
            notification.kind,
            notification.text
        );
        self.dispatcher.dispatch(Dispatch {
            notification,
            screenshot,
            destination,
        });
    }
}

/// Pending structured state, replaced as a whole snapshot per update so a
/// reader never observes a half-merged value.
pub struct PendingSlot<T> {
    inner: Mutex<T>,
}

impl<T: Clone + Default> PendingSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(T::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> T {
        self.lock().clone()
    }

    pub fn set(&self, value: T) {
        *self.lock() = value;
    }

    /// Replace the value with `f(old)` in one step, returning the new value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> T {
        let mut guard = self.lock();
        let next = f(&guard);
        *guard = next.clone();
        next
    }

    /// Take the value (leaving the default) only when `predicate` holds.
    pub fn take_if(&self, predicate: impl FnOnce(&T) -> bool) -> Option<T> {
        let mut guard = self.lock();
        if predicate(&guard) {
            Some(std::mem::take(&mut *guard))
        } else {
            None
        }
    }

    pub fn take(&self) -> T {
        std::mem::take(&mut *self.lock())
    }
}

impl<T: Clone + Default> Default for PendingSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrement towards zero, returning the previous value.
pub(crate) fn count_down(counter: &AtomicI32) -> i32 {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i - 1).max(0)))
        .unwrap_or_else(|previous| previous)
}
