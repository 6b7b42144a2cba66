//! Fan-out of the event feed to every notifier.
//!
//! Routing follows what each notifier consumes; the tick is delivered last
//! in each cycle, so text and variable events of that cycle are already
//! applied when a notifier evaluates its pending state.

use std::sync::Arc;

use super::client::GameClient;
use super::config::Settings;
use super::dispatch::Dispatcher;
use super::model::{normalize_text, GameEvent, LoginState, TextCategory, VarKind};
use super::notifiers::collection::CollectionNotifier;
use super::notifiers::death::DeathNotifier;
use super::notifiers::diary::DiaryNotifier;
use super::notifiers::kill_count::KillCountNotifier;
use super::notifiers::quest::QuestNotifier;
use super::notifiers::slayer::SlayerNotifier;
use super::notifiers::{Notifier, NotifierContext};

pub struct NotifierHub {
    ctx: Arc<NotifierContext>,
    pub kill_count: KillCountNotifier,
    pub diary: DiaryNotifier,
    pub collection: CollectionNotifier,
    pub slayer: SlayerNotifier,
    pub quest: QuestNotifier,
    pub death: DeathNotifier,
}

impl NotifierHub {
    pub fn new(
        settings: Settings,
        client: Arc<dyn GameClient>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self::with_context(NotifierContext::new(settings, client, dispatcher))
    }

    pub fn with_context(ctx: Arc<NotifierContext>) -> Self {
        Self {
            kill_count: KillCountNotifier::new(ctx.clone()),
            diary: DiaryNotifier::new(ctx.clone()),
            collection: CollectionNotifier::new(ctx.clone()),
            slayer: SlayerNotifier::new(ctx.clone()),
            quest: QuestNotifier::new(ctx.clone()),
            death: DeathNotifier::new(ctx.clone()),
            ctx,
        }
    }

    pub fn context(&self) -> &Arc<NotifierContext> {
        &self.ctx
    }

    fn notifiers(&self) -> [&dyn Notifier; 6] {
        [
            &self.kill_count,
            &self.diary,
            &self.collection,
            &self.slayer,
            &self.quest,
            &self.death,
        ]
    }

    pub fn handle(&self, event: &GameEvent) {
        match event {
            GameEvent::Tick => self.on_tick(),
            GameEvent::Text { category, text } => self.on_text(*category, text),
            GameEvent::VarChange {
                var_kind: VarKind::Varbit,
                id,
                value,
            } => {
                self.diary.on_varbit_changed(*id, *value);
                self.kill_count.on_varbit_changed(*id, *value);
            }
            GameEvent::VarChange {
                var_kind: VarKind::Varp,
                id,
                value,
            } => self.collection.on_varp_changed(*id, *value),
            GameEvent::LoginStateChanged { state } => self.on_login_state(*state),
            GameEvent::UsernameChanged => self.reset_all("username changed"),
            GameEvent::QuestCompleted { title } => self.quest.on_quest_completed(title),
            GameEvent::ActorDeath { actor } => self.death.on_actor_death(actor),
            GameEvent::InteractingChanged { source, target } => {
                self.death.on_interaction(source, target.as_ref())
            }
        }
    }

    fn on_tick(&self) {
        self.collection.on_tick();
        self.slayer.on_tick();
        self.diary.on_tick();
        self.kill_count.on_tick();
        self.quest.on_tick();
    }

    fn on_text(&self, category: TextCategory, raw: &str) {
        let text = normalize_text(raw);
        let text = text.as_str();
        match category {
            TextCategory::GameMessage => {
                self.collection.on_chat_message(text);
                self.slayer.on_chat_message(text);
                self.kill_count.on_game_message(text);
            }
            TextCategory::FriendsChatNotification => {
                self.kill_count.on_friends_chat_notification(text);
            }
            TextCategory::MessageBox => self.diary.on_message_box(text),
            TextCategory::ClanMessage => {}
        }
    }

    fn on_login_state(&self, state: LoginState) {
        self.collection.on_login_state(state);
        self.diary.on_login_state(state);
        if state == LoginState::LoginScreen {
            self.reset_all("logged out");
        }
    }

    fn reset_all(&self, reason: &str) {
        log::debug!("Resetting notifiers: {}", reason);
        for notifier in self.notifiers() {
            notifier.reset();
        }
    }

    /// Swap in new settings. Pending state survives; disabled notifiers
    /// simply stop accepting new input.
    pub fn update_config(&self, settings: Settings) {
        self.ctx.update_settings(settings);
        let enabled: Vec<&str> = self
            .notifiers()
            .iter()
            .filter(|n| n.enabled())
            .map(|n| n.name())
            .collect();
        log::info!("Settings updated; enabled notifiers: {:?}", enabled);
    }

    pub fn shutdown(&self) {
        self.reset_all("shutdown");
    }
}
