// Shared fixtures for notifier tests.

use std::sync::{Arc, Mutex};

use super::config::Settings;
use super::dispatch::{Dispatch, Dispatcher};
use super::model::LoginState;
use super::notifiers::NotifierContext;
use super::script::{ClientState, ScriptedClient};

pub const PLAYER_NAME: &str = "dank dank";
pub const PRIMARY_WEBHOOK: &str = "https://example.invalid/primary";

#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Dispatch>>,
}

impl RecordingDispatcher {
    pub fn sent(&self) -> Vec<Dispatch> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Dispatcher for RecordingDispatcher {
    fn dispatch(&self, dispatch: Dispatch) {
        self.sent.lock().unwrap().push(dispatch);
    }
}

pub struct Harness {
    pub ctx: Arc<NotifierContext>,
    pub client: Arc<ScriptedClient>,
    pub dispatcher: Arc<RecordingDispatcher>,
}

/// Logged-in client, primary webhook set, everything else from `settings`.
pub fn harness(mut settings: Settings) -> Harness {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();

    settings.primary_webhook = PRIMARY_WEBHOOK.to_string();
    let client = Arc::new(ScriptedClient::new(ClientState {
        login_state: LoginState::LoggedIn,
        player_name: Some(PLAYER_NAME.to_string()),
        ..ClientState::default()
    }));
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let ctx = NotifierContext::new(settings, client.clone(), dispatcher.clone());
    Harness {
        ctx,
        client,
        dispatcher,
    }
}
