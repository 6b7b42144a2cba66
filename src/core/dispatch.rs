//! Hand-off point between the notifier layer and whatever delivers
//! notifications out of process.

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::model::Notification;

/// A notification plus delivery instructions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispatch {
    pub notification: Notification,
    pub screenshot: bool,
    pub destination: String,
}

pub trait Dispatcher: Send + Sync {
    /// Must not block: notifiers call this from inside event handlers.
    fn dispatch(&self, dispatch: Dispatch);
}

/// Forwards every dispatch over an unbounded channel to an async consumer.
pub struct ChannelDispatcher {
    tx: UnboundedSender<Dispatch>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, UnboundedReceiver<Dispatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Dispatcher for ChannelDispatcher {
    fn dispatch(&self, dispatch: Dispatch) {
        let kind = dispatch.notification.kind;
        if self.tx.send(dispatch).is_err() {
            log::warn!("Dropping {:?} notification: consumer has shut down", kind);
        }
    }
}
