// Collection log correlation.
//
// The completed-entries varp lags the chat line by a few ticks, so the
// count is kept locally: seeded from the varp once per login and then
// advanced by one for every chat line. Notifications are deferred to the
// next tick so the total varp has settled.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use super::assembler::{self, item_image_url};
use super::{is_enabled, Notifier, NotifierContext, PendingSlot};
use crate::core::model::{CollectionNotificationData, LoginState, NotificationExtra, NotificationType};

pub const COMPLETED_VARP: i32 = 2943;
pub const TOTAL_VARP: i32 = 2944;

/// Marks the local count as stale until the next logged-in tick.
const UNKNOWN: i32 = -1;

lazy_static! {
    static ref COLLECTION_LOG_REGEX: Regex =
        Regex::new(r"New item added to your collection log: (?P<itemName>(.*))")
            .expect("Invalid collection log regex");
}

pub fn parse_item(message: &str) -> Option<String> {
    COLLECTION_LOG_REGEX
        .captures(message)
        .map(|caps| caps["itemName"].to_string())
}

/// Both counters must be positive to be reported.
pub fn valid_progress(completed: i32, total: i32) -> Option<(i32, i32)> {
    (completed > 0 && total > 0).then_some((completed, total))
}

pub struct CollectionNotifier {
    ctx: Arc<NotifierContext>,
    completed: AtomicI32,
    deferred: PendingSlot<Vec<String>>,
}

impl CollectionNotifier {
    pub fn new(ctx: Arc<NotifierContext>) -> Self {
        Self {
            ctx,
            completed: AtomicI32::new(UNKNOWN),
            deferred: PendingSlot::new(),
        }
    }

    /// Current local count; negative while unknown.
    pub fn completed(&self) -> i32 {
        self.completed.load(Ordering::Acquire)
    }

    pub fn on_login_state(&self, state: LoginState) {
        if state != LoginState::LoggedIn {
            self.reset();
        }
    }

    pub fn on_tick(&self) {
        let client = self.ctx.client();
        if client.login_state() != LoginState::LoggedIn {
            self.completed.store(UNKNOWN, Ordering::Release);
        } else if self.completed() < 0 {
            self.completed
                .store(client.varp_value(COMPLETED_VARP), Ordering::Release);
        }

        for item in self.deferred.take() {
            self.handle(&item);
        }
    }

    /// Only seeds the count; later varp updates lag behind the chat line
    /// and would double count.
    pub fn on_varp_changed(&self, id: i32, value: i32) {
        if id != COMPLETED_VARP {
            return;
        }
        let old = self.completed();
        if old <= 0 {
            let _ = self.completed.compare_exchange(
                old,
                value,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }

    pub fn on_chat_message(&self, message: &str) {
        if !self.enabled() {
            return;
        }
        if let Some(item) = parse_item(message) {
            self.deferred.update(|queue| {
                let mut next = queue.clone();
                next.push(item.clone());
                next
            });
        }
    }

    fn handle(&self, item_name: &str) {
        let settings = self.ctx.settings();
        let config = &settings.collection;
        let client = self.ctx.client();
        let player = self.ctx.player_name();

        let completed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        let total = client.varp_value(TOTAL_VARP);
        let progress = valid_progress(completed, total);
        if progress.is_none() {
            log::debug!(
                "Collection log progress varps were invalid ({} / {})",
                completed,
                total
            );
        }

        let item_id = client.find_item_id(item_name);
        let price = item_id.map(|id| client.item_price(id));

        let notification = assembler::assemble(
            NotificationType::Collection,
            &config.message,
            &[("%USERNAME%", player.as_str()), ("%ITEM%", item_name)],
            NotificationExtra::Collection(CollectionNotificationData {
                item_name: item_name.to_string(),
                item_id,
                price,
                completed_entries: progress.map(|(c, _)| c),
                total_entries: progress.map(|(_, t)| t),
            }),
        )
        .with_player_name(player.clone())
        .with_thumbnail(item_id.map(item_image_url));

        self.ctx.send(notification, config.send_image, &config.webhook);
    }
}

impl Notifier for CollectionNotifier {
    fn name(&self) -> &'static str {
        "collection"
    }

    fn enabled(&self) -> bool {
        let settings = self.ctx.settings();
        is_enabled(&settings, settings.collection.enabled)
    }

    /// The count is not reset after each notification: several entries in
    /// one tick must keep counting up.
    fn reset(&self) {
        self.completed.store(UNKNOWN, Ordering::Release);
        self.deferred.set(Vec::new());
    }
}
